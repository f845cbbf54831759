use crate::filters::FilterSession;
use crate::models::{FilterOptions, GameListing};
use crate::scrapers::with_page_segment;
use crate::text::url_encode;
use crate::traits::{GameFilter, SiteScraper};
use std::sync::Arc;
use tracing::info;

pub const REGION_OPTIONS: [&str; 14] = [
    "Select Region",
    "USA",
    "English(USA)",
    "English",
    "Europe",
    "USA Europe",
    "Germany",
    "Italy",
    "France",
    "Japan",
    "Korea",
    "USA & Japan",
    "Global",
    "English (USA)",
];

pub const SORT_OPTIONS: [&str; 3] = ["Date", "Title", "Most Popular"];

pub const ORDER_OPTIONS: [&str; 2] = ["Ascending", "Descending"];

pub const GENRE_OPTIONS: [&str; 62] = [
    "Select Genre",
    "Role Playing",
    "Adventure, Role Playing",
    "Fighting",
    "Action",
    "Adventure",
    "Action, Simulation",
    "Adventure, Platform",
    "Hack, Role Playing",
    "Misc",
    "Platform",
    "Action, Racing",
    "Card Game",
    "Action, Adventure",
    "Action, Fighting",
    "Strategy, Turn Based Tactics",
    "Sports",
    "Role Playing, Shooter",
    "Beat Em Up",
    "Board Game",
    "Action, Beat Em Up",
    "Racing",
    "Role Playing, Strategy",
    "Turn Based Tactics",
    "Shooter",
    "Action, Shooter",
    "Role Playing, Simulation",
    "Action, Role Playing",
    "Action, Platform",
    "Compilation",
    "Action, Adventure, Platform",
    "Action, Pinball",
    "Puzzle",
    "Action, Fighting, Role Playing",
    "Adventure, Fighting",
    "Platform, Shooter",
    "Strategy",
    "Card Game, Compilation",
    "Simulation",
    "Compilation, Misc",
    "Sports, Simulation",
    "Racing, Simulation",
    "Action, Puzzle",
    "Board Game, Card Game",
    "Adventure, Beat Em Up",
    "Action, Puzzle, Simulation, Strategy",
    "Music, Puzzle, Simulation, Strategy",
    "Card Game, Simulation",
    "Racing, Sports",
    "Card Game, Puzzle",
    "Sports, Strategy",
    "Puzzle, Simulation, Strategy",
    "Puzzle, Shooter",
    "Action, Music",
    "Simulation, Strategy",
    "Music",
    "Board Game, Card Game, Misc",
    "Educational",
    "Puzzle, Sports",
    "Board Game, Misc",
    "Role-Playing",
    "RPG",
];

/// Index 0 is the "no selection" entry.
fn selected(options: &[&str], index: usize) -> String {
    match options.get(index) {
        Some(value) if index > 0 => url_encode(value),
        _ => String::new(),
    }
}

fn chosen(options: &[&str], index: usize) -> String {
    options.get(index).map(|v| url_encode(v)).unwrap_or_default()
}

/// Server-side search: Hexrom filters and pages the results itself.
pub struct HexromFilter {
    scraper: Arc<dyn SiteScraper>,
}

impl HexromFilter {
    pub fn new(scraper: Arc<dyn SiteScraper>) -> Self {
        Self { scraper }
    }

    /// Listing URL with the query string rebuilt from the selections.
    pub fn search_url(console_url: &str, search: &str, options: FilterOptions) -> String {
        let console_url = console_url.trim();
        let path = console_url.split_once('?').map_or(console_url, |(path, _)| path);
        let url = with_page_segment(path, 1);

        format!(
            "{}?search={}&genre={}&region={}&sort_by={}&order={}",
            url,
            url_encode(search),
            selected(&GENRE_OPTIONS, options.genre),
            selected(&REGION_OPTIONS, options.region),
            chosen(&SORT_OPTIONS, options.sort).to_lowercase(),
            chosen(&ORDER_OPTIONS, options.order),
        )
    }
}

#[async_trait::async_trait]
impl GameFilter for HexromFilter {
    async fn filter_games(&self, session: &mut FilterSession, page: u32) -> GameListing {
        let page = page.max(1);
        let url = Self::search_url(session.console_url(), session.search(), session.options());
        info!("[HEXROM FILTER] page {} of {}", page, url);

        session.last_page = page;
        self.scraper.fetch_games(&url, page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_query_from_selections() {
        let options = FilterOptions { region: 1, genre: 4, sort: 2, order: 1 };
        assert_eq!(
            HexromFilter::search_url("https://hexrom.com/roms/nes/page/3/?old=1", "super mario", options),
            "https://hexrom.com/roms/nes/?search=super+mario&genre=Action&region=USA&sort_by=most+popular&order=Descending"
        );
    }

    #[test]
    fn query_url_pages_like_scraper_urls() {
        let url = HexromFilter::search_url("https://hexrom.com/roms/nes/Page/12", "zelda", FilterOptions::default());
        assert!(url.starts_with("https://hexrom.com/roms/nes/?search=zelda&"));
        assert_eq!(
            with_page_segment(&url, 3),
            url.replacen("/nes/?", "/nes/page/3/?", 1)
        );
        assert_eq!(with_page_segment(&url, 1), url);
    }

    #[test]
    fn first_entries_mean_no_region_or_genre() {
        let url = HexromFilter::search_url("https://hexrom.com/roms/gba", "zelda", FilterOptions::default());
        assert_eq!(url, "https://hexrom.com/roms/gba/?search=zelda&genre=&region=&sort_by=date&order=Ascending");
    }

    #[test]
    fn encodes_punctuated_options() {
        let options = FilterOptions { region: 11, genre: 2, ..Default::default() };
        let url = HexromFilter::search_url("https://hexrom.com/roms/snes/", "", options);
        assert!(url.contains("genre=Adventure%2C+Role+Playing"));
        assert!(url.contains("region=USA+%26+Japan"));
    }
}
