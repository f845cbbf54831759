use crate::error::Result;
use crate::text::clean_html_text;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

const EMBEDDED_BLACKLIST: &str = include_str!("../res/blacklist.txt");

static PARENTHESISED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^)]*\)").expect("parenthesis pattern"));
static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\[[^\]]*\]").expect("bracket pattern"));
static NOISE_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:roms?|isos?)\b|&").expect("noise word pattern"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

/// Comparison key for console names: no bracketed suffixes, no ROM/ISO
/// words, single spaces, lowercase.
pub fn normalize_console_name(name: &str) -> String {
    let name = clean_html_text(name);
    let name = PARENTHESISED.replace_all(&name, "");
    let name = BRACKETED.replace_all(&name, "");
    let name = NOISE_WORDS.replace_all(&name, " ");
    WHITESPACE
        .replace_all(name.trim(), " ")
        .to_lowercase()
}

/// Per-site denylist of console names, read-only once loaded.
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    global: HashSet<String>,
    sites: HashMap<String, HashSet<String>>,
}

impl Blacklist {
    /// Parses `[Site]` sections with one name per line; `#` starts a comment.
    pub fn parse(text: &str) -> Self {
        let mut blacklist = Self::default();
        let mut section: Option<String> = None;

        for line in text.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                section = Some(line[1..line.len() - 1].trim().to_lowercase());
                continue;
            }

            let key = normalize_console_name(line);
            if key.is_empty() {
                continue;
            }
            match &section {
                Some(site) => {
                    blacklist.sites.entry(site.clone()).or_default().insert(key);
                }
                None => {
                    blacklist.global.insert(key);
                }
            }
        }

        debug!(
            "[BLACKLIST] {} global entries, {} site sections",
            blacklist.global.len(),
            blacklist.sites.len()
        );
        blacklist
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    pub fn embedded() -> Self {
        Self::parse(EMBEDDED_BLACKLIST)
    }

    /// Every normalized name denied for `site`, global entries included.
    pub fn for_site(&self, site: &str) -> HashSet<String> {
        let mut names = self.global.clone();
        if let Some(entries) = self.sites.get(&site.to_lowercase()) {
            names.extend(entries.iter().cloned());
        }
        names
    }

    pub fn is_blacklisted(&self, name: &str, site: &str) -> bool {
        let key = normalize_console_name(name);
        if key.is_empty() {
            return false;
        }
        self.global.contains(&key)
            || self
                .sites
                .get(&site.to_lowercase())
                .is_some_and(|entries| entries.contains(&key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_console_names() {
        assert_eq!(normalize_console_name("3DO ROMs (120)"), "3do");
        assert_eq!(normalize_console_name("Playstation Portable (PSP ISOs)"), "playstation portable");
        assert_eq!(normalize_console_name("Sega  Genesis [US] &amp; Mega Drive"), "sega genesis mega drive");
        assert_eq!(normalize_console_name("Chromatic"), "chromatic");
    }

    #[test]
    fn sections_scope_entries() {
        let blacklist = Blacklist::parse(
            "# header\nXbox 360\n\n[Hexrom]\n3DO # unsupported\n[Gamulator]\nPS2\n",
        );

        assert!(blacklist.is_blacklisted("3DO ROMs (120)", "Hexrom"));
        assert!(!blacklist.is_blacklisted("3DO ROMs (120)", "Gamulator"));
        assert!(blacklist.is_blacklisted("PS2", "gamulator"));
        assert!(blacklist.is_blacklisted("Xbox 360 ROMs", "Romspedia"));
        assert!(!blacklist.is_blacklisted("", "Hexrom"));
        assert_eq!(blacklist.for_site("hexrom").len(), 2);
    }

    #[test]
    fn embedded_resource_parses() {
        let blacklist = Blacklist::embedded();
        assert!(blacklist.is_blacklisted("PS2 ROMs", "Romspedia"));
        assert!(!blacklist.is_blacklisted("GBA ROMs", "Romspedia"));
    }
}
