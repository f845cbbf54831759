use crate::blacklist::Blacklist;
use crate::filters::FilterSession;
use crate::models::{GameListing, ListItem, PaginationInfo, TotalPages};
use crate::scrapers::console_path;
use crate::traits::{GameFilter, SearchSource};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, info, warn};

fn digest(html: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    html.hash(&mut hasher);
    hasher.finish()
}

/// Console-scoped pages carved out of a site-wide search.
///
/// The site's search spans every console, so each request walks the
/// underlying result pages, keeps the hits under the session's console
/// path and serves fixed-size slices out of the accumulated buffer. The
/// walk stops when the buffer covers the requested page, when the source
/// runs dry or repeats itself, or after `max_search_pages` fetches.
pub struct VirtualPageFilter {
    source: Arc<dyn SearchSource>,
    blacklist: Arc<Blacklist>,
    page_size: usize,
    max_search_pages: u32,
}

impl VirtualPageFilter {
    pub fn new(source: Arc<dyn SearchSource>, blacklist: Arc<Blacklist>, page_size: usize, max_search_pages: u32) -> Self {
        Self {
            source,
            blacklist,
            page_size: page_size.max(1),
            max_search_pages: max_search_pages.max(1),
        }
    }

    async fn accumulate(&self, session: &mut FilterSession, search_url: &str, console: &str, wanted: usize) {
        let site = self.source.name();

        while session.buffer.len() < wanted && !session.source_done {
            if session.next_source_page > self.max_search_pages {
                info!("[VIRTUAL PAGES] {}: stopping after {} search pages", site, self.max_search_pages);
                session.source_done = true;
                break;
            }

            let source_page = session.next_source_page;
            let html = self.source.fetch_search_page(search_url, source_page).await;
            // Only advance once the page is in hand; a cancelled fetch retries it.
            session.next_source_page = source_page + 1;
            if html.is_empty() {
                debug!("[VIRTUAL PAGES] {}: search page {} is empty", site, source_page);
                session.source_done = true;
                break;
            }

            let page_digest = digest(&html);
            if session.last_digest == Some(page_digest) {
                info!("[VIRTUAL PAGES] {}: search page {} repeats the previous one", site, source_page);
                session.source_done = true;
                break;
            }
            session.last_digest = Some(page_digest);

            let raw = self.source.parse_search_results(&html);
            if raw.is_empty() {
                debug!("[VIRTUAL PAGES] {}: no results on search page {}", site, source_page);
                session.source_done = true;
                break;
            }

            let raw_count = raw.len();
            let (matched, added) = self.absorb(session, raw, console, site);
            debug!(
                "[VIRTUAL PAGES] {}: search page {} -> {} raw, {} in console, {} new, {} buffered",
                site,
                source_page,
                raw_count,
                matched,
                added,
                session.buffer.len()
            );

            if matched > 0 && added == 0 {
                warn!("[VIRTUAL PAGES] {}: search page {} added nothing new", site, source_page);
                session.source_done = true;
            }
        }
    }

    /// Returns `(matched, added)` for one underlying page.
    fn absorb(&self, session: &mut FilterSession, raw: Vec<ListItem>, console: &str, site: &str) -> (usize, usize) {
        let mut matched = 0;
        let mut added = 0;
        for item in raw {
            if console_path(&item.download_url).as_deref() != Some(console) {
                continue;
            }
            if self.blacklist.is_blacklisted(&item.label, site) {
                continue;
            }
            matched += 1;
            if session.seen.insert(item.download_url.clone()) {
                session.buffer.push(item);
                added += 1;
            }
        }
        (matched, added)
    }

    fn slice(&self, session: &FilterSession, search_url: &str, page: u32) -> GameListing {
        let len = session.buffer.len();
        let pages_so_far = len.div_ceil(self.page_size) as u32;
        let start = (page as usize - 1) * self.page_size;

        if page > 1 && start >= len {
            return Self::exhausted(search_url, page, pages_so_far);
        }

        let end = (start + self.page_size).min(len);
        let games = session.buffer[start..end].to_vec();

        let total = if session.source_done {
            TotalPages::Known(pages_so_far.max(1))
        } else {
            TotalPages::Unknown { at_least: pages_so_far.max(page) }
        };
        GameListing {
            games,
            pagination: PaginationInfo::new(search_url, page, total),
        }
    }

    fn exhausted(search_url: &str, page: u32, last_page: u32) -> GameListing {
        GameListing {
            games: Vec::new(),
            pagination: PaginationInfo::new(search_url, page, TotalPages::Exhausted { last_page }),
        }
    }
}

#[async_trait::async_trait]
impl GameFilter for VirtualPageFilter {
    async fn filter_games(&self, session: &mut FilterSession, page: u32) -> GameListing {
        let page = page.max(1);

        if session.search().is_empty() {
            return self.source.fetch_games(session.console_url(), page).await;
        }
        let search_url = self.source.search_url(session.search());
        let Some(console) = session.console_path().map(str::to_string) else {
            return self.source.fetch_games(&search_url, page).await;
        };

        if page == 1 || page < session.last_page {
            debug!("[VIRTUAL PAGES] restarting '{}' in {}", session.search(), console);
            session.reset();
        }

        let wanted = page as usize * self.page_size;
        self.accumulate(session, &search_url, &console, wanted).await;

        let listing = self.slice(session, &search_url, page);
        session.last_page = page;
        info!(
            "[VIRTUAL PAGES] {} page {}: {} games, total {:?}",
            self.source.name(),
            page,
            listing.games.len(),
            listing.pagination.total
        );
        listing
    }
}
