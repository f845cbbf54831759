use crate::error::Result;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

const EMBEDDED_TABLE: &str = include_str!("../res/console_folders.toml");

/// Folders whose archives are kept as-is (arcade romsets).
const KEEP_ARCHIVE_FOLDERS: [&str; 8] = [
    "MAME", "FBNEO", "CPS1", "CPS2", "CPS3", "NEOGEO", "NAOMI", "ATOMISWAVE",
];

#[derive(Debug, Deserialize)]
struct FolderTable {
    console: Vec<FolderEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct FolderEntry {
    name: String,
    folder: String,
}

/// Ordered display-name -> folder table. Order decides fuzzy matches.
#[derive(Debug, Clone)]
pub struct ConsoleFolderMap {
    entries: Vec<(String, String)>,
}

impl ConsoleFolderMap {
    pub fn parse(text: &str) -> Result<Self> {
        let table: FolderTable = toml::from_str(text)?;
        Ok(Self {
            entries: table
                .console
                .into_iter()
                .map(|e| (e.name, e.folder))
                .collect(),
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn embedded() -> Result<Self> {
        Self::parse(EMBEDDED_TABLE)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Folder code for a scraped console name, or `""` when nothing fits.
    ///
    /// Tries the exact name, then the name without a trailing `(1234)`
    /// count, then substring containment either way, then the first
    /// parenthesised abbreviation.
    pub fn resolve(&self, scraped: &str) -> String {
        let scraped = scraped.trim();
        if scraped.is_empty() {
            return String::new();
        }

        let folder = self
            .exact(scraped)
            .or_else(|| self.exact(strip_bracketed_count(scraped)))
            .or_else(|| self.fuzzy(scraped))
            .or_else(|| self.by_abbreviation(scraped))
            .unwrap_or_default();

        debug!("[CONSOLE MAP] '{}' -> '{}'", scraped, folder);
        folder
    }

    fn exact(&self, name: &str) -> Option<String> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, folder)| folder.clone())
    }

    fn fuzzy(&self, scraped: &str) -> Option<String> {
        let stripped = strip_bracketed_count(scraped);
        self.entries
            .iter()
            .find(|(key, _)| {
                scraped.contains(key.as_str())
                    || stripped.contains(key.as_str())
                    || key.contains(scraped)
            })
            .map(|(_, folder)| folder.clone())
    }

    fn by_abbreviation(&self, scraped: &str) -> Option<String> {
        let open = scraped.find('(')?;
        let close = open + scraped[open..].find(')')?;
        let abbreviation = &scraped[open + 1..close];
        if abbreviation.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|(key, _)| key.contains(abbreviation))
            .map(|(_, folder)| folder.clone())
    }
}

/// `"Gameboy Color (GBC) (1094)"` -> `"Gameboy Color (GBC)"`.
pub fn strip_bracketed_count(name: &str) -> &str {
    let Some(inner) = name.strip_suffix(')') else {
        return name;
    };
    let Some(open) = inner.rfind('(') else {
        return name;
    };
    let digits = &inner[open + 1..];
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        inner[..open].trim_end()
    } else {
        name
    }
}

/// Whether a downloaded `.zip` should be unpacked into `folder`.
pub fn should_extract(folder: &str) -> bool {
    !KEEP_ARCHIVE_FOLDERS
        .iter()
        .any(|keep| keep.eq_ignore_ascii_case(folder))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ConsoleFolderMap {
        ConsoleFolderMap::embedded().unwrap()
    }

    #[test]
    fn embedded_table_loads_in_order() {
        let map = table();
        assert!(map.len() > 100);
        assert_eq!(map.entries[0].0, "Amstrad CPC (CPC)");
    }

    #[test]
    fn trailing_count_is_ignored() {
        let map = table();
        assert_eq!(map.resolve("Gameboy Color (GBC) (1094)"), map.resolve("Gameboy Color (GBC)"));
        assert_eq!(map.resolve("Gameboy Color (GBC)"), "GBC");
    }

    #[test]
    fn resolves_each_site_style() {
        let map = table();
        assert_eq!(map.resolve("Nintendo (NES) (1500)"), "FC");
        assert_eq!(map.resolve("Megadrive"), "MD");
        assert_eq!(map.resolve("3DO ROMs"), "PANASONIC");
        assert_eq!(map.resolve("SNES Super Nintendo (3000)"), "SFC");
    }

    #[test]
    fn fuzzy_and_abbreviation_passes() {
        let map = ConsoleFolderMap::parse(
            r#"
[[console]]
name = "Sega CD"
folder = "SEGACD"

[[console]]
name = "WonderSwan (WS)"
folder = "WS"
"#,
        )
        .unwrap();

        assert_eq!(map.resolve("Sega CD ROMs"), "SEGACD");
        assert_eq!(map.resolve("Sega"), "SEGACD");
        assert_eq!(map.resolve("Bandai (WS)"), "WS");
        assert_eq!(map.resolve("Unknown Console"), "");
        assert_eq!(map.resolve(""), "");
    }

    #[test]
    fn strips_only_numeric_counts() {
        assert_eq!(strip_bracketed_count("GBA (12)"), "GBA");
        assert_eq!(strip_bracketed_count("Gameboy (GB)"), "Gameboy (GB)");
        assert_eq!(strip_bracketed_count("()"), "()");
    }

    #[test]
    fn arcade_folders_keep_archives() {
        assert!(!should_extract("MAME"));
        assert!(!should_extract("neogeo"));
        assert!(should_extract("GBA"));
    }
}
