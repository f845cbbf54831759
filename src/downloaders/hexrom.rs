use crate::downloaders::{archive_anchor_after_table, bare_archive_url, marked_archive_anchor};
use crate::models::DownloadOption;
use crate::scrapers::absolutize;
use crate::text::clean_html_text;
use crate::traits::{DirectLinkResolver, PageFetcher};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

static FIRST_TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<table[^>]*>(.*?)</table>").expect("table pattern"));
static TABLE_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").expect("row pattern"));
static VERSION_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a[^>]+href=["']([^"']+/download/[^"']+)["'][^>]*>(.*?)</a>"#).expect("version link pattern")
});
static FINAL_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a[^>]+id=["']download["'][^>]+href=["']([^"']+)["']"#).expect("final link pattern")
});

pub struct HexromResolver {
    fetcher: Arc<dyn PageFetcher>,
    base_url: String,
}

impl HexromResolver {
    pub fn new(fetcher: Arc<dyn PageFetcher>, base_url: &str) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `<detail>/download/`, unless the URL already is the download page.
    pub fn download_page_url(detail_url: &str) -> String {
        let mut url = detail_url.trim().to_string();
        if !url.ends_with('/') {
            url.push('/');
        }
        if !url.ends_with("/download/") {
            url.push_str("download/");
        }
        url
    }
}

#[async_trait::async_trait]
impl DirectLinkResolver for HexromResolver {
    async fn resolve_direct_link(&self, detail_url: &str) -> String {
        let page_url = Self::download_page_url(detail_url);
        info!("[HEXROM DOWNLOAD] Fetching download page: {}", page_url);

        let html = self.fetcher.fetch_text(&page_url).await;
        if html.is_empty() {
            warn!("[HEXROM DOWNLOAD] Empty download page: {}", page_url);
            return String::new();
        }

        if let Some(link) = marked_archive_anchor(&html, "download", &page_url) {
            debug!("[HEXROM DOWNLOAD] download anchor: {}", link);
            return link;
        }
        if let Some(link) = bare_archive_url(&html) {
            debug!("[HEXROM DOWNLOAD] bare archive url: {}", link);
            return link;
        }
        if let Some(link) = archive_anchor_after_table(&html, &page_url) {
            debug!("[HEXROM DOWNLOAD] legacy after-table anchor: {}", link);
            return link;
        }

        warn!("[HEXROM DOWNLOAD] No archive link on {}", page_url);
        String::new()
    }

    /// Rows of the first table that link to a `/download/` variant page.
    async fn download_options(&self, detail_url: &str) -> Vec<DownloadOption> {
        let html = self.fetcher.fetch_text(detail_url).await;
        let Some(table) = FIRST_TABLE.captures(&html) else {
            return Vec::new();
        };

        let options: Vec<DownloadOption> = TABLE_ROW
            .captures_iter(&table[1])
            .filter_map(|row| {
                let link = VERSION_LINK.captures(&row[1])?;
                Some(DownloadOption {
                    label: clean_html_text(&link[2]),
                    url: absolutize(&self.base_url, &link[1]),
                })
            })
            .collect();

        debug!("[HEXROM DOWNLOAD] {} download options on {}", options.len(), detail_url);
        options
    }

    async fn final_download_link(&self, option: &DownloadOption) -> String {
        let html = self.fetcher.fetch_text(&option.url).await;
        match FINAL_LINK.captures(&html) {
            Some(c) => absolutize(&option.url, &c[1]),
            None => bare_archive_url(&html).unwrap_or_default(),
        }
    }
}
