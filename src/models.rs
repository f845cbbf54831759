use crate::folders::ConsoleFolderMap;
use serde::{Deserialize, Serialize};

/// Numeric stand-in for an unknown page bound, for display only.
pub const UNKNOWN_TOTAL_PAGES: u32 = 999;

/// One row in a console or game list. `download_url` is the detail page,
/// not the binary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    pub label: String,
    pub image_path: String,
    pub download_url: String,
    pub genre: String,
    pub rating: String,
    pub size: String,
}

impl ListItem {
    pub fn new(label: impl Into<String>, image_path: impl Into<String>, download_url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            image_path: image_path.into(),
            download_url: download_url.into(),
            ..Default::default()
        }
    }
}

/// Upper bound of a paginated listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TotalPages {
    Known(u32),
    /// Keep paging until an empty page shows up.
    Unknown { at_least: u32 },
    /// An empty page was observed after `last_page`.
    Exhausted { last_page: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationInfo {
    pub base_url: String,
    pub current_page: u32,
    pub total: TotalPages,
}

impl PaginationInfo {
    pub fn new(base_url: impl Into<String>, current_page: u32, total: TotalPages) -> Self {
        Self {
            base_url: base_url.into(),
            current_page,
            total,
        }
    }

    pub fn total_pages(&self) -> u32 {
        match self.total {
            TotalPages::Known(n) => n,
            TotalPages::Unknown { .. } => UNKNOWN_TOTAL_PAGES,
            TotalPages::Exhausted { last_page } => last_page,
        }
    }

    pub fn has_next_page(&self) -> bool {
        match self.total {
            TotalPages::Known(n) => self.current_page < n,
            TotalPages::Unknown { .. } => true,
            TotalPages::Exhausted { last_page } => self.current_page < last_page,
        }
    }

    /// Clamps the bound once `current_page` came back empty.
    pub fn exhaust(&mut self) {
        if self.current_page > 1 {
            self.total = TotalPages::Exhausted { last_page: self.current_page - 1 };
        }
    }
}

/// A fetched listing page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameListing {
    pub games: Vec<ListItem>,
    pub pagination: PaginationInfo,
}

impl GameListing {
    /// Empty pages past the first clamp the bound to the previous page.
    pub fn new(games: Vec<ListItem>, mut pagination: PaginationInfo) -> Self {
        if games.is_empty() {
            pagination.exhaust();
        }
        Self { games, pagination }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameDetails {
    pub title: String,
    pub icon_url: String,
    pub publisher: String,
    pub genre: String,
    pub views: String,
    pub downloads: String,
    pub release_date: String,
    pub file_size: String,
    pub about: String,
    pub download_url: String,
    pub language: String,
    pub console_name: String,
    pub mapped_folder: String,
}

impl GameDetails {
    /// Fills in the console context after a detail fetch. The listing's
    /// console label is used when the page did not name one.
    pub fn stamp_console(&mut self, listing_console: &str, folders: &ConsoleFolderMap) {
        if self.console_name.is_empty() {
            self.console_name = listing_console.to_string();
        }
        self.mapped_folder = folders.resolve(&self.console_name);
    }

    /// Labelled, non-empty fields in display order.
    pub fn fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("Console", self.console_name.as_str()),
            ("Publisher", self.publisher.as_str()),
            ("Genre", self.genre.as_str()),
            ("Release", self.release_date.as_str()),
            ("Size", self.file_size.as_str()),
            ("Language", self.language.as_str()),
            ("Downloads", self.downloads.as_str()),
            ("Views", self.views.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .collect()
    }
}

/// One release variant offered on a detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOption {
    pub label: String,
    pub url: String,
}

/// Native search selections; index 0 of region and genre means "none".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub region: usize,
    pub genre: usize,
    pub sort: usize,
    pub order: usize,
}
