pub mod hexrom;
pub mod virtual_pages;

use crate::models::{FilterOptions, ListItem};
use crate::scrapers::console_path;
use std::collections::HashSet;

/// Paging memory of one open listing: what was searched, what has been
/// accumulated so far and where the underlying source left off.
///
/// One session belongs to one console/search. Sessions are never shared;
/// changing the search starts over.
#[derive(Debug, Clone, Default)]
pub struct FilterSession {
    console_url: String,
    console_path: Option<String>,
    search: String,
    options: FilterOptions,
    pub(crate) buffer: Vec<ListItem>,
    pub(crate) seen: HashSet<String>,
    pub(crate) last_page: u32,
    pub(crate) next_source_page: u32,
    pub(crate) last_digest: Option<u64>,
    pub(crate) source_done: bool,
}

impl FilterSession {
    pub fn new(console_url: impl Into<String>) -> Self {
        let console_url = console_url.into();
        Self {
            console_path: console_path(&console_url),
            console_url,
            next_source_page: 1,
            ..Default::default()
        }
    }

    pub fn with_search(mut self, search: impl Into<String>, options: FilterOptions) -> Self {
        self.set_search(search, options);
        self
    }

    /// Replaces the query. Accumulated results belong to the old query,
    /// so they are dropped.
    pub fn set_search(&mut self, search: impl Into<String>, options: FilterOptions) {
        self.search = search.into().trim().to_string();
        self.options = options;
        self.reset();
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.seen.clear();
        self.last_page = 0;
        self.next_source_page = 1;
        self.last_digest = None;
        self.source_done = false;
    }

    pub fn console_url(&self) -> &str {
        &self.console_url
    }

    /// `/roms/<console>` segment of the listing URL, if it is console-scoped.
    pub fn console_path(&self) -> Option<&str> {
        self.console_path.as_deref()
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn options(&self) -> FilterOptions {
        self.options
    }

    /// Items accumulated so far across underlying pages.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn last_page(&self) -> u32 {
        self.last_page
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_derives_console_path() {
        let session = FilterSession::new("https://www.gamulator.com/roms/gameboy-advance");
        assert_eq!(session.console_path(), Some("gameboy-advance"));
        assert_eq!(session.next_source_page, 1);
        assert!(session.search().is_empty());
    }

    #[test]
    fn changing_search_drops_accumulated_state() {
        let mut session = FilterSession::new("https://www.romspedia.com/roms/nintendo-64")
            .with_search("mario", FilterOptions::default());
        session.buffer.push(ListItem::new("Mario Kart 64", "", "https://x/roms/nintendo-64/mk64"));
        session.seen.insert("https://x/roms/nintendo-64/mk64".into());
        session.last_page = 2;
        session.next_source_page = 4;
        session.source_done = true;

        session.set_search("  zelda ", FilterOptions::default());
        assert_eq!(session.search(), "zelda");
        assert_eq!(session.buffered(), 0);
        assert!(session.seen.is_empty());
        assert_eq!(session.last_page(), 0);
        assert_eq!(session.next_source_page, 1);
        assert!(!session.source_done);
    }
}
