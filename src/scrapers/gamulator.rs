use crate::blacklist::Blacklist;
use crate::config::SiteConfig;
use crate::downloaders::gamulator::GamulatorResolver;
use crate::models::{GameDetails, GameListing, ListItem, PaginationInfo, TotalPages};
use crate::scrapers::{
    absolutize, capture, card_segments, console_path, is_non_game, is_search_url, max_capture,
    strip_query_param, with_query_param,
};
use crate::text::{clean_html_text, fragment_text, url_encode};
use crate::traits::{DirectLinkResolver, PageFetcher, SearchSource, SiteScraper};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};

static CONSOLE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<div class="thumbnail-home">(.*?)</div>"#).expect("console block pattern")
});
static FIRST_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<a[^>]+href="([^"]+)""#).expect("link pattern"));
static FIRST_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<img[^>]+src="([^"]+)""#).expect("image pattern"));
static CONSOLE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<h3[^>]*>([^<]+)</h3>").expect("console name pattern"));

static CARD_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<div class="card"\s*>"#).expect("card start pattern"));
static CARD_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<h5 class="card-title">([^<]+)</h5>"#).expect("card title pattern"));
static CARD_STATS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<div class="opis">\s*([0-9,]+) downs\s*/\s*Rating <span class="zelena">([0-9]+)%</span>"#)
        .expect("card stats pattern")
});
static CARD_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?is)<div class="hideOverflow">(.*?)</div>"#).expect("card tags pattern"));
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<a[^>]+rel="tag"[^>]*>([^<]+)</a>"#).expect("tag pattern"));

static ACTIVE_PAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<li class=['"]page-item (?:disabled|active)['"]>\s*<a class=['"]page-link['"]>\s*([0-9]+)\s*</a>"#)
        .expect("active page pattern")
});
static PAGE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"class=['"]page-link['"] href=['"][^'"]*currentpage=([0-9]+)"#).expect("page link pattern")
});

static DETAIL_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<h1[^>]*itemprop=["']name["'][^>]*>([^<]+)</h1>"#).expect("detail title pattern")
});
static DETAIL_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img[^>]+itemprop=["']image["'][^>]+src=["']([^"']+)["']"#).expect("detail image pattern")
});
static DETAIL_ABOUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<div[^>]+itemprop=["']description["'][^>]*>(.*?)</div>"#).expect("detail about pattern")
});

const PAGE_PARAM: &str = "currentpage";

fn table_field(html: &str, label: &str) -> String {
    let pattern = format!(r"(?is)<td[^>]*>\s*{}\s*</td>\s*<td[^>]*>(.*?)</td>", regex::escape(label));
    Regex::new(&pattern)
        .ok()
        .and_then(|re| re.captures(html).map(|c| clean_html_text(&fragment_text(&c[1], " "))))
        .unwrap_or_default()
}

pub struct GamulatorScraper {
    fetcher: Arc<dyn PageFetcher>,
    base_url: String,
    blacklist: Arc<Blacklist>,
    resolver: GamulatorResolver,
}

impl GamulatorScraper {
    pub const NAME: &'static str = "Gamulator";

    pub fn new(fetcher: Arc<dyn PageFetcher>, site: &SiteConfig, blacklist: Arc<Blacklist>) -> Self {
        Self {
            resolver: GamulatorResolver::new(fetcher.clone()),
            fetcher,
            base_url: site.base_url.trim_end_matches('/').to_string(),
            blacklist,
        }
    }

    pub fn resolver(&self) -> &GamulatorResolver {
        &self.resolver
    }

    fn page_url(base: &str, page: u32) -> String {
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
                    debug!("[GAMULATOR] blacklisted console: {}", name);
                    return None;
                }
                let image = capture(&FIRST_IMAGE, block);
                Some(ListItem::new(
                    name,
                    absolutize(&self.base_url, &image),
                    absolutize(&self.base_url, &href),
                ))
            })
            .collect()
    }

    fn parse_card(&self, card: &str) -> Option<ListItem> {
        let title = clean_html_text(&capture(&CARD_TITLE, card));
        let href = capture(&FIRST_LINK, card);
        if title.is_empty() || href.is_empty() {
            return None;
        }

        let url = absolutize(&self.base_url, &href);
        if is_non_game(&title, &url) {
            debug!("[GAMULATOR] skipping non-game entry: {}", title);
            return None;
        }

        let mut item = ListItem::new(title, absolutize(&self.base_url, &capture(&FIRST_IMAGE, card)), url);

        if let Some(stats) = CARD_STATS.captures(card) {
            item.size = format!("{} downloads", &stats[1]);
            item.rating = stats[2].to_string();
        }

        // The console itself shows up among the tags.
        let console = console_path(&item.download_url).unwrap_or_default();
        if let Some(tags) = CARD_TAGS.captures(card) {
            item.genre = TAG
                .captures_iter(&tags[1])
                .map(|t| clean_html_text(&t[1]))
                .filter(|t| !t.is_empty() && t.to_lowercase().replace(' ', "-") != console)
                .collect::<Vec<_>>()
                .join(", ");
        }

        Some(item)
    }

    fn parse_games(&self, html: &str) -> Vec<ListItem> {
        card_segments(&CARD_START, html)
            .into_iter()
            .filter_map(|card| self.parse_card(card))
            .collect()
    }

    fn parse_total_pages(html: &str, url: &str, page: u32) -> TotalPages {
        let active = max_capture(&ACTIVE_PAGE, html);
        let last_link = max_capture(&PAGE_LINK, html);

        match (active, last_link) {
            (None, None) if is_search_url(url) => TotalPages::Unknown { at_least: page },
            (None, None) => TotalPages::Known(page.max(1)),
            (active, last_link) => {
                let max = active.unwrap_or(page).max(last_link.unwrap_or(page)).max(page);
                TotalPages::Known(max)
            }
        }
    }

    fn parse_details(&self, html: &str) -> GameDetails {
        let icon = capture(&DETAIL_IMAGE, html);
        GameDetails {
            title: clean_html_text(&capture(&DETAIL_TITLE, html)),
            icon_url: if icon.is_empty() { icon } else { absolutize(&self.base_url, &icon) },
            console_name: table_field(html, "Console/System:"),
            genre: table_field(html, "Genre:"),
            file_size: table_field(html, "Filesize:"),
            language: table_field(html, "Region:"),
            release_date: table_field(html, "Year of release:"),
            downloads: table_field(html, "Downloads:"),
            about: DETAIL_ABOUT
                .captures(html)
                .map(|c| clean_html_text(&fragment_text(&c[1], "\n")))
                .unwrap_or_default(),
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl SiteScraper for GamulatorScraper {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch_consoles(&self) -> Vec<ListItem> {
        let url = format!("{}/roms", self.base_url);
        let html = self.fetcher.fetch_text(&url).await;
        let consoles = self.parse_consoles(&html);
        info!("[GAMULATOR] {} consoles from {}", consoles.len(), url);
        consoles
    }

    async fn fetch_games(&self, url: &str, page: u32) -> GameListing {
        let page = page.max(1);
        let base = strip_query_param(url, PAGE_PARAM);
        let page_url = Self::page_url(&base, page);
        info!("[GAMULATOR] Fetching games: {}", page_url);

        let html = self.fetcher.fetch_text(&page_url).await;
        let games = self.parse_games(&html);
        let total = Self::parse_total_pages(&html, &base, page);
        debug!("[GAMULATOR] page {} -> {} games, total {:?}", page, games.len(), total);

        GameListing::new(games, PaginationInfo::new(base, page, total))
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
impl SearchSource for GamulatorScraper {
    fn search_url(&self, query: &str) -> String {
        format!("{}/search?search_term_string={}", self.base_url, url_encode(query))
    }

    async fn fetch_search_page(&self, search_url: &str, page: u32) -> String {
        let url = Self::page_url(&strip_query_param(search_url, PAGE_PARAM), page.max(1));
        debug!("[GAMULATOR] search page {}", url);
        self.fetcher.fetch_text(&url).await
    }

    fn parse_search_results(&self, html: &str) -> Vec<ListItem> {
        self.parse_games(html)
    }
}
