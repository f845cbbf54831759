use crate::blacklist::Blacklist;
use crate::config::SiteConfig;
use crate::downloaders::hexrom::HexromResolver;
use crate::models::{GameDetails, GameListing, ListItem, PaginationInfo, TotalPages};
use crate::scrapers::{absolutize, capture, is_non_game, is_search_url, max_capture, with_page_segment};
use crate::text::{clean_html_text, collapse_blank_lines, fragment_text, window};
use crate::traits::{DirectLinkResolver, PageFetcher, SiteScraper};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};

static CONSOLE_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<li>\s*<a href="([^"]+)"[^>]*>([^<]+)</a>\s*<span class="my-game-count">\s*(\d+)\s*</span>\s*</li>"#)
        .expect("console entry pattern")
});
static CARD_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<h2>(.*?)</h2>").expect("card title pattern"));
static CARD_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<img[^>]+data-src="([^"]+)""#).expect("card image pattern"));
static CARD_RATING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<span class="rating">.*?([0-9.]+)[^<]*</span>"#).expect("card rating pattern")
});
static CARD_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<a[^>]+href="([^"]+)"[^>]*>"#).expect("card link pattern"));
static NAVIGATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)<div class="navigation">(.*?)</div>"#).expect("navigation pattern"));
static NAV_PAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<a[^>]+href=[^>]+>(\d+)</a>").expect("nav page pattern"));

static ROW_NAME: LazyLock<Regex> = LazyLock::new(|| detail_row("Name"));
static ROW_SIZE: LazyLock<Regex> = LazyLock::new(|| detail_row("Size"));
static ROW_PUBLISH: LazyLock<Regex> = LazyLock::new(|| detail_row("Publish"));
static ROW_LANGUAGE: LazyLock<Regex> = LazyLock::new(|| detail_row("Language"));
static ROW_DOWNLOADS: LazyLock<Regex> = LazyLock::new(|| detail_row("Downloads"));
static ROW_GENRE: LazyLock<Regex> = LazyLock::new(|| detail_row("Genre"));
static ROW_PUBLISHER: LazyLock<Regex> = LazyLock::new(|| detail_row("Publisher"));
static ROW_CONSOLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<th>\s*Console(?:\s*</th>)?\s*<td>(.*?)</td>").expect("console row pattern")
});
static ANCHOR_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<a[^>]*>([^<]+)</a>").expect("anchor text pattern"));
static OG_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<meta[^>]+property="og:image"[^>]+content="([^"]+)""#).expect("og image pattern")
});
static TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<table.*?</table>").expect("table pattern"));
static PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<p[^>]*>(.*?)</p>").expect("paragraph pattern"));

/// `<th>Label</th><td>value` rows; the closing `</th>` is optional.
fn detail_row(label: &str) -> Regex {
    Regex::new(&format!(r"(?i)<th>\s*{}(?:\s*</th>)?\s*<td>([^<\n]+)", label)).expect("detail row pattern")
}

fn row_value(re: &Regex, html: &str) -> String {
    clean_html_text(&capture(re, html))
}

pub struct HexromScraper {
    fetcher: Arc<dyn PageFetcher>,
    base_url: String,
    blacklist: Arc<Blacklist>,
    resolver: HexromResolver,
}

impl HexromScraper {
    pub const NAME: &'static str = "Hexrom";

    pub fn new(fetcher: Arc<dyn PageFetcher>, site: &SiteConfig, blacklist: Arc<Blacklist>) -> Self {
        let base_url = site.base_url.trim_end_matches('/').to_string();
        Self {
            resolver: HexromResolver::new(fetcher.clone(), &base_url),
            fetcher,
            base_url,
            blacklist,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn resolver(&self) -> &HexromResolver {
        &self.resolver
    }

    fn parse_consoles(&self, html: &str) -> Vec<ListItem> {
        CONSOLE_ENTRY
            .captures_iter(html)
            .filter_map(|c| {
                let label = format!("{} ({})", clean_html_text(&c[2]), &c[3]);
                if self.blacklist.is_blacklisted(&label, Self::NAME) {
                    debug!("[HEXROM] blacklisted console: {}", label);
                    return None;
                }
                Some(ListItem::new(label, "", absolutize(&self.base_url, &c[1])))
            })
            .collect()
    }

    /// Cards are anchored on their `<h2>` title: image and rating are the
    /// last ones since the previous title, the link is the first anchor
    /// shortly after it.
    fn parse_games(&self, html: &str) -> Vec<ListItem> {
        let mut games = Vec::new();
        let mut last_end = 0;

        for caps in CARD_TITLE.captures_iter(html) {
            let Some(whole) = caps.get(0) else { continue };
            let before = &html[last_end..whole.start()];
            last_end = whole.end();

            let title = clean_html_text(&caps[1]);
            let image = CARD_IMAGE
                .captures_iter(before)
                .last()
                .map(|c| c[1].to_string())
                .unwrap_or_default();
            let rating = CARD_RATING
                .captures_iter(before)
                .last()
                .map(|c| c[1].to_string())
                .unwrap_or_default();
            let href = capture(&CARD_LINK, window(html, whole.end(), 500));

            if image.is_empty() || href.is_empty() {
                continue;
            }
            let url = absolutize(&self.base_url, &href);
            if is_non_game(&title, &url) {
                debug!("[HEXROM] skipping non-game entry: {}", title);
                continue;
            }

            let mut item = ListItem::new(title, image, url);
            item.rating = rating;
            games.push(item);
        }

        games
    }

    fn parse_total_pages(html: &str, url: &str, page: u32) -> TotalPages {
        if let Some(nav) = NAVIGATION.captures(html) {
            let max = max_capture(&NAV_PAGE, &nav[1]).unwrap_or(1);
            return TotalPages::Known(max.max(page));
        }
        if is_search_url(url) {
            TotalPages::Unknown { at_least: page }
        } else {
            TotalPages::Known(page.max(1))
        }
    }

    fn parse_details(html: &str) -> GameDetails {
        let console_name = ROW_CONSOLE
            .captures(html)
            .map(|c| {
                let cell = &c[1];
                match ANCHOR_TEXT.captures(cell) {
                    Some(a) => clean_html_text(&a[1]),
                    None => clean_html_text(&fragment_text(cell, " ")),
                }
            })
            .unwrap_or_default();

        let about = TABLE
            .find(html)
            .and_then(|table| PARAGRAPH.captures(&html[table.end()..]))
            .map(|p| collapse_blank_lines(&clean_html_text(&fragment_text(&p[1], "\n"))))
            .unwrap_or_default();

        GameDetails {
            title: row_value(&ROW_NAME, html),
            icon_url: capture(&OG_IMAGE, html),
            publisher: row_value(&ROW_PUBLISHER, html),
            genre: row_value(&ROW_GENRE, html),
            downloads: row_value(&ROW_DOWNLOADS, html),
            release_date: row_value(&ROW_PUBLISH, html),
            file_size: row_value(&ROW_SIZE, html),
            language: row_value(&ROW_LANGUAGE, html),
            console_name,
            about,
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl SiteScraper for HexromScraper {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch_consoles(&self) -> Vec<ListItem> {
        let url = format!("{}/rom-category/", self.base_url);
        let html = self.fetcher.fetch_text(&url).await;
        let consoles = self.parse_consoles(&html);
        info!("[HEXROM] {} consoles from {}", consoles.len(), url);
        consoles
    }

    async fn fetch_games(&self, url: &str, page: u32) -> GameListing {
        let page = page.max(1);
        let page_url = with_page_segment(url, page);
        info!("[HEXROM] Fetching games: {}", page_url);

        let html = self.fetcher.fetch_text(&page_url).await;
        let games = self.parse_games(&html);
        let total = Self::parse_total_pages(&html, url, page);
        debug!("[HEXROM] page {} -> {} games, total {:?}", page, games.len(), total);

        GameListing::new(games, PaginationInfo::new(with_page_segment(url, 1), page, total))
    }

    async fn fetch_game_details(&self, url: &str) -> GameDetails {
        let html = self.fetcher.fetch_text(url).await;
        if html.is_empty() {
            return GameDetails::default();
        }

        let mut details = Self::parse_details(&html);
        details.download_url = self.resolver.resolve_direct_link(url).await;
        if details.download_url.is_empty() {
            details.download_url = url.to_string();
        }
        details
    }
}
