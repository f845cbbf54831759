use crate::traits::PageFetcher;
use futures::future::join_all;
use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const IDLE_POLL: Duration = Duration::from_millis(250);

/// A finished thumbnail request. `path` is `None` when the image could not
/// be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub url: String,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
struct Job {
    url: String,
    dest: PathBuf,
}

struct Queues {
    pending: Mutex<VecDeque<Job>>,
    completed: Mutex<VecDeque<Thumbnail>>,
    wake: Notify,
    stopping: AtomicBool,
}

impl Queues {
    fn pop_pending(&self) -> Option<Job> {
        self.pending.lock().ok()?.pop_front()
    }

    fn push_completed(&self, thumbnail: Thumbnail) {
        if let Ok(mut completed) = self.completed.lock() {
            completed.push_back(thumbnail);
        }
    }
}

/// Fixed pool of workers caching list images on disk. Results are picked
/// up with [`drain_completed`](Self::drain_completed).
pub struct ThumbnailLoader {
    queues: Arc<Queues>,
    cache_dir: PathBuf,
    workers: Vec<JoinHandle<()>>,
}

impl ThumbnailLoader {
    pub fn new(fetcher: Arc<dyn PageFetcher>, cache_dir: impl Into<PathBuf>, workers: usize) -> Self {
        let queues = Arc::new(Queues {
            pending: Mutex::new(VecDeque::new()),
            completed: Mutex::new(VecDeque::new()),
            wake: Notify::new(),
            stopping: AtomicBool::new(false),
        });

        let workers = (0..workers.max(1))
            .map(|id| tokio::spawn(worker(id, queues.clone(), fetcher.clone())))
            .collect();

        Self {
            queues,
            cache_dir: cache_dir.into(),
            workers,
        }
    }

    /// Cache file for `url`: a hash of the URL plus its image extension.
    pub fn cache_path(&self, url: &str) -> PathBuf {
        let mut hasher = DefaultHasher::new();
        url.hash(&mut hasher);
        let ext = Path::new(url.split(['?', '#']).next().unwrap_or(url))
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| e.len() <= 4)
            .unwrap_or("img")
            .to_lowercase();
        self.cache_dir.join(format!("{:016x}.{}", hasher.finish(), ext))
    }

    /// Queues `url`. Already cached images complete immediately.
    pub fn enqueue(&self, url: &str) {
        if url.is_empty() {
            return;
        }
        let dest = self.cache_path(url);
        if dest.is_file() {
            self.queues.push_completed(Thumbnail {
                url: url.to_string(),
                path: Some(dest),
            });
            return;
        }

        if let Ok(mut pending) = self.queues.pending.lock() {
            pending.push_back(Job {
                url: url.to_string(),
                dest,
            });
        }
        self.queues.wake.notify_one();
    }

    pub fn pending(&self) -> usize {
        self.queues.pending.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Everything finished since the last drain, in completion order.
    pub fn drain_completed(&self) -> Vec<Thumbnail> {
        self.queues
            .completed
            .lock()
            .map(|mut q| q.drain(..).collect())
            .unwrap_or_default()
    }

    /// Drops queued work and waits for the workers to exit.
    pub async fn shutdown(self) {
        self.queues.stopping.store(true, Ordering::SeqCst);
        if let Ok(mut pending) = self.queues.pending.lock() {
            pending.clear();
        }
        self.queues.wake.notify_waiters();
        join_all(self.workers).await;
        info!("[THUMBNAILS] workers stopped");
    }
}

async fn worker(id: usize, queues: Arc<Queues>, fetcher: Arc<dyn PageFetcher>) {
    while !queues.stopping.load(Ordering::SeqCst) {
        let Some(job) = queues.pop_pending() else {
            tokio::select! {
                _ = queues.wake.notified() => {}
                _ = tokio::time::sleep(IDLE_POLL) => {}
            }
            continue;
        };

        if let Some(parent) = job.dest.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!("[THUMBNAILS] cannot create {}: {}", parent.display(), e);
                queues.push_completed(Thumbnail { url: job.url, path: None });
                continue;
            }
        }
        let ok = fetcher.fetch_binary(&job.url, &job.dest, &|_: u64, _: Option<u64>| {}).await;
        debug!("[THUMBNAILS] worker {} {} {}", id, if ok { "cached" } else { "failed" }, job.url);

        queues.push_completed(Thumbnail {
            url: job.url,
            path: ok.then_some(job.dest),
        });
    }
}
