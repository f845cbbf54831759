use crate::error::Result;
use crate::filters::FilterSession;
use crate::models::{GameDetails, GameListing, ListItem};
use crate::registry::ScraperRegistry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Filter session shared between the caller and background fetches.
pub type SharedSession = Arc<Mutex<FilterSession>>;

pub fn shared_session(session: FilterSession) -> SharedSession {
    Arc::new(Mutex::new(session))
}

/// Work a screen can ask for.
#[derive(Clone)]
pub enum FetchRequest {
    Consoles { site: String },
    Games { site: String, url: String, page: u32 },
    Filtered { site: String, session: SharedSession, page: u32 },
    Details { site: String, url: String, console: String },
    DirectLink { site: String, detail_url: String },
}

#[derive(Debug, Clone)]
pub enum FetchResult {
    Consoles(Vec<ListItem>),
    Games(GameListing),
    Details(GameDetails),
    DirectLink(String),
    Failed(String),
}

/// Identifies one submitted request. Events from an older generation are
/// stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub generation: u64,
    pub id: u64,
}

#[derive(Debug, Clone)]
pub struct FetchEvent {
    pub ticket: Ticket,
    pub result: FetchResult,
}

/// Runs fetches as background tasks and hands results back over a channel.
pub struct Dispatcher {
    registry: Arc<ScraperRegistry>,
    generation: Arc<AtomicU64>,
    next_id: u64,
    events_tx: mpsc::Sender<FetchEvent>,
    events_rx: mpsc::Receiver<FetchEvent>,
    in_flight: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ScraperRegistry>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(64);
        Self {
            registry,
            generation: Arc::new(AtomicU64::new(0)),
            next_id: 0,
            events_tx,
            events_rx,
            in_flight: Vec::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn submit(&mut self, request: FetchRequest) -> Ticket {
        self.in_flight.retain(|task| !task.is_finished());
        self.next_id += 1;
        let ticket = Ticket {
            generation: self.generation(),
            id: self.next_id,
        };

        let registry = self.registry.clone();
        let generation = self.generation.clone();
        let events_tx = self.events_tx.clone();

        self.in_flight.push(tokio::spawn(async move {
            let result = run(&registry, request).await;
            if generation.load(Ordering::SeqCst) != ticket.generation {
                debug!("[DISPATCH] dropping stale result #{}", ticket.id);
                return;
            }
            if events_tx.send(FetchEvent { ticket, result }).await.is_err() {
                debug!("[DISPATCH] receiver gone, result #{} dropped", ticket.id);
            }
        }));

        ticket
    }

    /// Supersedes every in-flight request, e.g. on a screen change.
    pub fn invalidate(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        for task in self.in_flight.drain(..) {
            task.abort();
        }
    }

    pub fn is_current(&self, event: &FetchEvent) -> bool {
        event.ticket.generation == self.generation()
    }

    /// Next current event; stale ones are skipped.
    pub async fn next_event(&mut self) -> Option<FetchEvent> {
        while let Some(event) = self.events_rx.recv().await {
            if self.is_current(&event) {
                return Some(event);
            }
        }
        None
    }

    /// Non-blocking variant for polling loops.
    pub fn try_next_event(&mut self) -> Option<FetchEvent> {
        while let Ok(event) = self.events_rx.try_recv() {
            if self.is_current(&event) {
                return Some(event);
            }
        }
        None
    }
}

async fn run(registry: &ScraperRegistry, request: FetchRequest) -> FetchResult {
    match execute(registry, request).await {
        Ok(result) => result,
        Err(e) => {
            warn!("[DISPATCH] {}", e);
            FetchResult::Failed(e.to_string())
        }
    }
}

async fn execute(registry: &ScraperRegistry, request: FetchRequest) -> Result<FetchResult> {
    Ok(match request {
        FetchRequest::Consoles { site } => FetchResult::Consoles(registry.scraper(&site)?.fetch_consoles().await),
        FetchRequest::Games { site, url, page } => {
            FetchResult::Games(registry.scraper(&site)?.fetch_games(&url, page).await)
        }
        FetchRequest::Filtered { site, session, page } => {
            let filter = registry.filter(&site)?;
            let mut session = session.lock().await;
            FetchResult::Games(filter.filter_games(&mut session, page).await)
        }
        FetchRequest::Details { site, url, console } => {
            FetchResult::Details(registry.game_details(&site, &url, &console).await?)
        }
        FetchRequest::DirectLink { site, detail_url } => {
            FetchResult::DirectLink(registry.resolver(&site)?.resolve_direct_link(&detail_url).await)
        }
    })
}
