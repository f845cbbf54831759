use crate::downloaders::{bare_archive_url, marked_archive_anchor};
use crate::traits::{DirectLinkResolver, PageFetcher};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct GamulatorResolver {
    fetcher: Arc<dyn PageFetcher>,
}

impl GamulatorResolver {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    /// `<detail>/download`, without a trailing slash.
    pub fn download_page_url(detail_url: &str) -> String {
        let url = detail_url.trim().trim_end_matches('/');
        if url.ends_with("/download") {
            url.to_string()
        } else {
            format!("{}/download", url)
        }
    }
}

#[async_trait::async_trait]
impl DirectLinkResolver for GamulatorResolver {
    async fn resolve_direct_link(&self, detail_url: &str) -> String {
        let page_url = Self::download_page_url(detail_url);
        info!("[GAMULATOR DOWNLOAD] Fetching download page: {}", page_url);

        let html = self.fetcher.fetch_text(&page_url).await;
        if html.is_empty() {
            warn!("[GAMULATOR DOWNLOAD] Empty download page: {}", page_url);
            return String::new();
        }

        if let Some(link) = marked_archive_anchor(&html, "download_link", &page_url) {
            debug!("[GAMULATOR DOWNLOAD] download_link anchor: {}", link);
            return link;
        }
        if let Some(link) = bare_archive_url(&html) {
            debug!("[GAMULATOR DOWNLOAD] bare archive url: {}", link);
            return link;
        }

        warn!("[GAMULATOR DOWNLOAD] No archive link on {}", page_url);
        String::new()
    }
}
