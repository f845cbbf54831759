#![allow(dead_code)]

use plunder::traits::{PageFetcher, ProgressFn};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// In-memory site: URL -> HTML, plus binary bodies. Unknown URLs behave
/// like a failed fetch. Every request is recorded.
#[derive(Default)]
pub struct FakeFetcher {
    pages: HashMap<String, String>,
    files: HashMap<String, Vec<u8>>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), html.into());
        self
    }

    pub fn file(mut self, url: &str, body: &[u8]) -> Self {
        self.files.insert(url.to_string(), body.to_vec());
        self
    }

    /// Makes `url` answer only after `delay`.
    pub fn delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn calls_to(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, url: &str) {
        self.calls.lock().expect("calls lock").push(url.to_string());
    }
}

#[async_trait::async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch_text(&self, url: &str) -> String {
        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
        self.record(url);
        self.pages.get(url).cloned().unwrap_or_default()
    }

    async fn fetch_binary(&self, url: &str, dest: &Path, progress: &ProgressFn<'_>) -> bool {
        self.record(url);
        let Some(body) = self.files.get(url) else {
            return false;
        };
        progress(body.len() as u64, Some(body.len() as u64));
        std::fs::write(dest, body).is_ok()
    }
}

/// One Gamulator search/listing card.
pub fn gamulator_card(console: &str, slug: &str, title: &str) -> String {
    format!(
        r#"<div class="card">
  <a href="https://www.gamulator.com/roms/{console}/{slug}"><img src="/img/{slug}.jpg"></a>
  <h5 class="card-title">{title}</h5>
</div>
"#
    )
}

/// A full search page holding `cards`.
pub fn gamulator_page(cards: &[String]) -> String {
    format!("<html><body><div class=\"results\">\n{}</div></body></html>", cards.concat())
}
