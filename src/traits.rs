use crate::filters::FilterSession;
use crate::models::{DownloadOption, GameDetails, GameListing, ListItem};
use std::path::Path;

/// Progress callback for binary transfers: `(downloaded, total)`.
/// The callback may borrow from the caller for the length of the transfer.
pub type ProgressFn<'a> = dyn Fn(u64, Option<u64>) + Send + Sync + 'a;

/// Retrieves pages and files. Failures surface as empty text or `false`.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> String;

    async fn fetch_binary(&self, url: &str, dest: &Path, progress: &ProgressFn<'_>) -> bool;
}

/// One ROM site: console index, game listings and detail pages.
#[async_trait::async_trait]
pub trait SiteScraper: Send + Sync {
    /// Stable display name, also the registry key.
    fn name(&self) -> &str;

    async fn fetch_consoles(&self) -> Vec<ListItem>;

    async fn fetch_games(&self, url: &str, page: u32) -> GameListing;

    async fn fetch_game_details(&self, url: &str) -> GameDetails;
}

/// Finds the binary behind a detail page.
#[async_trait::async_trait]
pub trait DirectLinkResolver: Send + Sync {
    /// Archive URL, or `""` when none could be found.
    async fn resolve_direct_link(&self, detail_url: &str) -> String;

    /// Alternative releases offered on the page, if the site has any.
    async fn download_options(&self, _detail_url: &str) -> Vec<DownloadOption> {
        Vec::new()
    }

    /// Final archive link behind one of the `download_options`.
    async fn final_download_link(&self, option: &DownloadOption) -> String {
        option.url.clone()
    }
}

/// Search endpoint of a site whose search is global across consoles.
#[async_trait::async_trait]
pub trait SearchSource: SiteScraper {
    /// Page-agnostic search URL for `query`.
    fn search_url(&self, query: &str) -> String;

    /// Raw HTML of underlying search page `page` (1-based).
    async fn fetch_search_page(&self, search_url: &str, page: u32) -> String;

    /// Game entries of one search page, in document order.
    fn parse_search_results(&self, html: &str) -> Vec<ListItem>;
}

/// Filtered, paginated view over one site.
#[async_trait::async_trait]
pub trait GameFilter: Send + Sync {
    async fn filter_games(&self, session: &mut FilterSession, page: u32) -> GameListing;
}
