use crate::downloaders::{bare_archive_url, first_archive_anchor, marked_archive_anchor};
use crate::traits::{DirectLinkResolver, PageFetcher};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct RomspediaResolver {
    fetcher: Arc<dyn PageFetcher>,
}

impl RomspediaResolver {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

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
impl DirectLinkResolver for RomspediaResolver {
    async fn resolve_direct_link(&self, detail_url: &str) -> String {
        let page_url = Self::download_page_url(detail_url);
        info!("[ROMSPEDIA DOWNLOAD] Fetching download page: {}", page_url);

        let html = self.fetcher.fetch_text(&page_url).await;
        if html.is_empty() {
            warn!("[ROMSPEDIA DOWNLOAD] Empty download page: {}", page_url);
            return String::new();
        }

        let link = marked_archive_anchor(&html, "download", &page_url)
            .or_else(|| bare_archive_url(&html))
            .or_else(|| first_archive_anchor(&html, &page_url));

        match link {
            Some(link) => {
                debug!("[ROMSPEDIA DOWNLOAD] archive link: {}", link);
                link
            }
            None => {
                warn!("[ROMSPEDIA DOWNLOAD] No archive link on {}", page_url);
                String::new()
            }
        }
    }
}
