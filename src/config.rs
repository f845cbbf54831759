use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub http: HttpConfig,
    pub paging: PagingConfig,
    #[serde(default)]
    pub resources: ResourcesConfig,
    pub storage: StorageConfig,
    pub sites: HashMap<String, SiteConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
    pub fallback_user_agent: String,
    pub connectivity_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagingConfig {
    /// Items per virtual page.
    pub page_size: usize,
    /// Upper bound on underlying search pages fetched per session.
    pub max_search_pages: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourcesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blacklist_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console_folders_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Candidate ROM roots, first existing `<root>/<folder>` wins.
    pub roms_roots: Vec<String>,
    pub download_dir: String,
    pub thumbnail_dir: String,
    pub thumbnail_workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    pub base_url: String,
    pub enabled: bool,
}

impl Config {
    /// Defaults, then the TOML file at `path` if it exists, then
    /// `PLUNDER_*` environment overrides (`__` separates sections).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let defaults = config::Config::try_from(&Config::default())?;

        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("PLUNDER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Looks a site up by key or display name, case-insensitively.
    pub fn get_site_config(&self, site: &str) -> Option<&SiteConfig> {
        let wanted = site.to_lowercase();
        self.sites.get(&wanted).or_else(|| {
            self.sites
                .values()
                .find(|s| s.name.to_lowercase() == wanted)
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut sites = HashMap::new();

        sites.insert("hexrom".to_string(), SiteConfig {
            name: "Hexrom".to_string(),
            base_url: "https://hexrom.com".to_string(),
            enabled: true,
        });
        sites.insert("gamulator".to_string(), SiteConfig {
            name: "Gamulator".to_string(),
            base_url: "https://www.gamulator.com".to_string(),
            enabled: true,
        });
        sites.insert("romspedia".to_string(), SiteConfig {
            name: "Romspedia".to_string(),
            base_url: "https://www.romspedia.com".to_string(),
            enabled: true,
        });

        Config {
            http: HttpConfig {
                timeout_secs: 15,
                connect_timeout_secs: 10,
                user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36".to_string(),
                fallback_user_agent: "Wget/1.21.4".to_string(),
                connectivity_url: "https://www.google.com/generate_204".to_string(),
            },
            paging: PagingConfig {
                page_size: 15,
                max_search_pages: 20,
            },
            resources: ResourcesConfig::default(),
            storage: StorageConfig {
                roms_roots: ["/mnt/SDCARD/Roms", "/mnt/SDCARD/ROMS", "Roms", "ROMS", "../Roms", "../ROMS"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                download_dir: "./downloads".to_string(),
                thumbnail_dir: "./cache/thumbnails".to_string(),
                thumbnail_workers: 8,
            },
            sites,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.http.timeout_secs, 15);
        assert_eq!(config.paging.page_size, 15);
        assert_eq!(config.paging.max_search_pages, 20);
        assert_eq!(config.storage.thumbnail_workers, 8);
        assert!(config.get_site_config("Gamulator").is_some());
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plunder.toml");
        fs::write(
            &path,
            r#"
[paging]
page_size = 10

[sites.hexrom]
name = "Hexrom"
base_url = "http://localhost:9000"
enabled = false
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.paging.page_size, 10);
        assert_eq!(config.paging.max_search_pages, 20);

        let hexrom = config.get_site_config("hexrom").unwrap();
        assert_eq!(hexrom.base_url, "http://localhost:9000");
        assert!(!hexrom.enabled);
        assert!(config.get_site_config("romspedia").is_some());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");

        let mut config = Config::default();
        config.storage.download_dir = "/tmp/plunder".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.storage.download_dir, "/tmp/plunder");
        assert_eq!(loaded.storage.roms_roots.len(), 6);
    }
}
