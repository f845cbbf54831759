use crate::blacklist::Blacklist;
use crate::config::SiteConfig;
use crate::downloaders::romspedia::RomspediaResolver;
use crate::models::{GameDetails, GameListing, ListItem, PaginationInfo, TotalPages};
use crate::scrapers::{
    absolutize, capture, card_segments, is_game_path, is_non_game, is_search_url, max_capture,
    strip_query_param, with_page_segment, with_query_param,
};
use crate::text::{clean_html_text, collapse_blank_lines, fragment_text, url_encode, window};
use crate::traits::{DirectLinkResolver, PageFetcher, SearchSource, SiteScraper};
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};

static CONSOLE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<div class="col-12 col-sm-6 col-md-4 col-lg-3 col-xl-3">(.*?<div class="pop-slide">.*?</div>.*?)</div>"#)
        .expect("console block pattern")
});
static FIRST_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<a[^>]+href="([^"]+)""#).expect("link pattern"));
static DATA_SRC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)data-src="([^"]+)""#).expect("data-src pattern"));
static SRC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bsrc="([^"]+)""#).expect("src pattern"));
static CONSOLE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<h2[^>]*>([^<]+)</h2>").expect("console name pattern"));

static ROM_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<div\s+class="single-rom">"#).expect("rom start pattern"));
static ROM_IMAGE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?is)<div\s+class="roms-img">(.*?)</div>"#).expect("rom image block pattern"));
static TITLE_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)title="([^"]+)""#).expect("title attribute pattern"));
static WEBP_SOURCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<source[^>]+(?:srcset|data-srcset)="([^"]+\.webp)""#).expect("webp source pattern")
});
static WEBP_IMG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<img[^>]+(?:src|data-src)="([^"]+\.webp)""#).expect("webp img pattern"));
static DOWN_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<span\s+class="down-number">([0-9,]+)</span>"#).expect("down number pattern"));
static LIST_RATING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<div\s+class="list-rom-rating"[^>]*data-rating="([0-9.]+)""#).expect("list rating pattern")
});
static PAGINATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<ul class=['"]pagination['"][^>]*>(.*?)</ul>"#).expect("pagination pattern")
});
static PAGE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<a[^>]+href=[^>]+>(\d+)</a>").expect("page number pattern"));

static SEARCH_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s+href=['"]([^'"]*/roms/[^'"]+)['"][^>]*>"#).expect("search link pattern")
});
static ROM_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+ROM$").expect("rom suffix pattern"));

static DETAIL_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<h2[^>]*class="main-title-big">([^<]+)</h2>"#).expect("detail title pattern")
});
static DETAIL_SOURCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<source[^>]+srcset="([^"]+)""#).expect("detail source pattern"));
static DETAIL_IMG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<img[^>]+src="([^"]+)""#).expect("detail img pattern"));
static DETAIL_ABOUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<div class="padinzi-gore-dole descSec">.*?<article[^>]*>(.*?)</article>"#)
        .expect("detail about pattern")
});

const PAGE_PARAM: &str = "currentpage";
const SEARCH_LOOKAHEAD: usize = 8000;
const SEARCH_BLOCK_LEN: usize = 5000;

fn detail_field(html: &str, labels: &[&str]) -> String {
    labels
        .iter()
        .find_map(|label| {
            let pattern = format!(
                r#"(?is)<div class="view-emulator-detail-name">\s*{}\s*</div>\s*<div class="view-emulator-detail-value">([^<]+)</div>"#,
                regex::escape(label)
            );
            let value = clean_html_text(&capture(&Regex::new(&pattern).ok()?, html));
            (!value.is_empty()).then_some(value)
        })
        .unwrap_or_default()
}

fn webp_image(block: &str) -> String {
    let image = capture(&WEBP_SOURCE, block);
    if image.is_empty() {
        capture(&WEBP_IMG, block)
    } else {
        image
    }
}

pub struct RomspediaScraper {
    fetcher: Arc<dyn PageFetcher>,
    base_url: String,
    blacklist: Arc<Blacklist>,
    resolver: RomspediaResolver,
}

impl RomspediaScraper {
    pub const NAME: &'static str = "Romspedia";

    pub fn new(fetcher: Arc<dyn PageFetcher>, site: &SiteConfig, blacklist: Arc<Blacklist>) -> Self {
        Self {
            resolver: RomspediaResolver::new(fetcher.clone()),
            fetcher,
            base_url: site.base_url.trim_end_matches('/').to_string(),
            blacklist,
        }
    }

    pub fn resolver(&self) -> &RomspediaResolver {
        &self.resolver
    }

    fn search_page_url(base: &str, page: u32) -> String {
        if page > 1 {
            with_query_param(base, PAGE_PARAM, page)
        } else {
            base.to_string()
        }
    }

    fn parse_consoles(&self, html: &str) -> Vec<ListItem> {
        CONSOLE_BLOCK
            .captures_iter(html)
            .filter_map(|block| {
                let block = &block[1];
                let name = clean_html_text(&capture(&CONSOLE_NAME, block));
                let href = capture(&FIRST_LINK, block);
                if name.is_empty() || href.is_empty() {
                    return None;
                }
                if self.blacklist.is_blacklisted(&name, Self::NAME) {
                    debug!("[ROMSPEDIA] blacklisted console: {}", name);
                    return None;
                }
                let mut image = capture(&DATA_SRC, block);
                if image.is_empty() {
                    image = capture(&SRC, block);
                }
                Some(ListItem::new(
                    name,
                    absolutize(&self.base_url, &image),
                    absolutize(&self.base_url, &href),
                ))
            })
            .collect()
    }

    fn parse_rom(&self, segment: &str) -> Option<ListItem> {
        let image_block = ROM_IMAGE_BLOCK.captures(segment)?;
        let image_block = image_block.get(1)?.as_str();

        let href = capture(&FIRST_LINK, image_block);
        let title = clean_html_text(&capture(&TITLE_ATTR, image_block));
        if href.is_empty() || title.is_empty() {
            return None;
        }

        let url = absolutize(&self.base_url, &href);
        if is_non_game(&title, &url) {
            debug!("[ROMSPEDIA] skipping non-game entry: {}", title);
            return None;
        }
        if self.blacklist.is_blacklisted(&title, Self::NAME) {
            return None;
        }

        let image = webp_image(image_block);
        let mut item = ListItem::new(title, absolutize(&self.base_url, &image), url);
        item.size = capture(&DOWN_NUMBER, segment);
        item.rating = capture(&LIST_RATING, segment);
        Some(item)
    }

    fn parse_games(&self, html: &str) -> Vec<ListItem> {
        card_segments(&ROM_START, html)
            .into_iter()
            .filter_map(|segment| self.parse_rom(segment))
            .collect()
    }

    /// Search pages link each result and follow it with a `single-rom`
    /// block carrying the artwork and counters.
    fn parse_search(&self, html: &str) -> Vec<ListItem> {
        let mut seen = HashSet::new();
        let mut games = Vec::new();

        for caps in SEARCH_LINK.captures_iter(html) {
            let (Some(whole), Some(href)) = (caps.get(0), caps.get(1)) else { continue };
            let url = absolutize(&self.base_url, href.as_str());
            if !is_game_path(&url) || seen.contains(&url) {
                continue;
            }

            let tag = whole.as_str();
            let title = clean_html_text(&capture(&TITLE_ATTR, tag));
            let title = ROM_SUFFIX.replace(&title, "").trim().to_string();
            if title.is_empty() || is_non_game(&title, &url) {
                continue;
            }
            if self.blacklist.is_blacklisted(&title, Self::NAME) {
                continue;
            }

            let after = window(html, whole.end(), SEARCH_LOOKAHEAD);
            let Some(block_start) = ROM_START.find(after) else { continue };
            let block = window(after, block_start.start(), SEARCH_BLOCK_LEN);

            let mut item = ListItem::new(title, absolutize(&self.base_url, &webp_image(block)), url.clone());
            item.size = capture(&DOWN_NUMBER, block);
            item.rating = capture(&LIST_RATING, block);

            seen.insert(url);
            games.push(item);
        }

        games
    }

    fn parse_total_pages(html: &str, page: u32) -> TotalPages {
        let max = PAGINATION
            .captures(html)
            .and_then(|p| max_capture(&PAGE_NUMBER, &p[1]))
            .unwrap_or(page);
        TotalPages::Known(max.max(page).max(1))
    }

    fn parse_details(&self, html: &str) -> GameDetails {
        let mut icon = capture(&DETAIL_SOURCE, html);
        if icon.is_empty() || icon.to_lowercase().ends_with(".webp") {
            icon = DETAIL_IMG
                .captures_iter(html)
                .map(|c| c[1].to_string())
                .find(|src| !src.to_lowercase().ends_with(".webp"))
                .unwrap_or_default();
        }

        GameDetails {
            title: clean_html_text(&capture(&DETAIL_TITLE, html)),
            icon_url: if icon.is_empty() { icon } else { absolutize(&self.base_url, &icon) },
            file_size: detail_field(html, &["Size:"]),
            console_name: detail_field(html, &["Console:", "Console"]),
            genre: detail_field(html, &["Category:", "Genre:"]),
            release_date: detail_field(html, &["Release Year:"]),
            downloads: detail_field(html, &["Downloads:"]),
            about: DETAIL_ABOUT
                .captures(html)
                .map(|c| collapse_blank_lines(&clean_html_text(&fragment_text(&c[1], "\n"))))
                .unwrap_or_default(),
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl SiteScraper for RomspediaScraper {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch_consoles(&self) -> Vec<ListItem> {
        let url = format!("{}/roms", self.base_url);
        let html = self.fetcher.fetch_text(&url).await;
        let consoles = self.parse_consoles(&html);
        info!("[ROMSPEDIA] {} consoles from {}", consoles.len(), url);
        consoles
    }

    async fn fetch_games(&self, url: &str, page: u32) -> GameListing {
        let page = page.max(1);

        if is_search_url(url) {
            let base = strip_query_param(url, PAGE_PARAM);
            let html = self.fetch_search_page(&base, page).await;
            let games = self.parse_search(&html);
            debug!("[ROMSPEDIA] search page {} -> {} games", page, games.len());
            return GameListing::new(games, PaginationInfo::new(base, page, TotalPages::Unknown { at_least: page }));
        }

        let page_url = with_page_segment(url, page);
        info!("[ROMSPEDIA] Fetching games: {}", page_url);
        let html = self.fetcher.fetch_text(&page_url).await;
        let games = self.parse_games(&html);
        let total = Self::parse_total_pages(&html, page);
        debug!("[ROMSPEDIA] page {} -> {} games, total {:?}", page, games.len(), total);

        GameListing::new(games, PaginationInfo::new(with_page_segment(url, 1), page, total))
    }

    async fn fetch_game_details(&self, url: &str) -> GameDetails {
        let html = self.fetcher.fetch_text(url).await;
        if html.is_empty() {
            return GameDetails::default();
        }

        let mut details = self.parse_details(&html);
        details.download_url = self.resolver.resolve_direct_link(url).await;
        if details.download_url.is_empty() {
            details.download_url = url.to_string();
        }
        details
    }
}

#[async_trait::async_trait]
impl SearchSource for RomspediaScraper {
    fn search_url(&self, query: &str) -> String {
        format!("{}/search?search_term_string={}", self.base_url, url_encode(query))
    }

    async fn fetch_search_page(&self, search_url: &str, page: u32) -> String {
        let url = Self::search_page_url(&strip_query_param(search_url, PAGE_PARAM), page.max(1));
        debug!("[ROMSPEDIA] search page {}", url);
        self.fetcher.fetch_text(&url).await
    }

    fn parse_search_results(&self, html: &str) -> Vec<ListItem> {
        self.parse_search(html)
    }
}
