use crate::config::HttpConfig;
use crate::error::Result;
use crate::traits::{PageFetcher, ProgressFn};
use reqwest::{Client, RequestBuilder};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Content fetcher with one fallback transport. No retries beyond that.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    fallback: Client,
    connectivity_url: String,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()?;

        let fallback = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(config.fallback_user_agent.as_str())
            .http1_only()
            .build()?;

        Ok(Self {
            client,
            fallback,
            connectivity_url: config.connectivity_url.clone(),
        })
    }

    /// Single attempt on the primary transport; non-2xx is an error.
    pub async fn get(&self, url: &str) -> Result<String> {
        Self::get_with(&self.client, url).await
    }

    /// Probes the connectivity endpoint on both transports.
    pub async fn has_connectivity(&self) -> bool {
        for client in [&self.client, &self.fallback] {
            match client.get(&self.connectivity_url).send().await {
                Ok(response) if response.status().is_success() => return true,
                Ok(response) => debug!("[FETCH] connectivity probe returned {}", response.status()),
                Err(e) => debug!("[FETCH] connectivity probe failed: {}", e),
            }
        }
        warn!("[FETCH] no connectivity ({})", self.connectivity_url);
        false
    }

    async fn get_with(client: &Client, url: &str) -> Result<String> {
        let response = with_referer(client.get(url), url)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }

    async fn download_with(client: &Client, url: &str, dest: &Path, progress: &ProgressFn<'_>) -> Result<u64> {
        let mut response = with_referer(client.get(url), url)
            .send()
            .await?
            .error_for_status()?;

        let total = response.content_length();
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut downloaded = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            progress(downloaded, total);
        }
        file.flush().await?;

        Ok(downloaded)
    }
}

#[async_trait::async_trait]
impl PageFetcher for HttpClient {
    async fn fetch_text(&self, url: &str) -> String {
        match Self::get_with(&self.client, url).await {
            Ok(text) if !text.is_empty() => return text,
            Ok(_) => debug!("[FETCH] empty body from {}, trying fallback", url),
            Err(e) => debug!("[FETCH] {} failed: {}, trying fallback", url, e),
        }

        match Self::get_with(&self.fallback, url).await {
            Ok(text) => text,
            Err(e) => {
                warn!("[FETCH] giving up on {}: {}", url, e);
                String::new()
            }
        }
    }

    async fn fetch_binary(&self, url: &str, dest: &Path, progress: &ProgressFn<'_>) -> bool {
        for client in [&self.client, &self.fallback] {
            match Self::download_with(client, url, dest, progress).await {
                Ok(bytes) => {
                    debug!("[FETCH] {} bytes from {} -> {:?}", bytes, url, dest);
                    return true;
                }
                Err(e) => {
                    debug!("[FETCH] transfer of {} failed: {}", url, e);
                    let _ = tokio::fs::remove_file(dest).await;
                }
            }
        }
        warn!("[FETCH] could not download {}", url);
        false
    }
}

/// Some hosts refuse hotlinked requests without a matching referer.
fn with_referer(request: RequestBuilder, url: &str) -> RequestBuilder {
    match referer_for(url) {
        Some(referer) => request.header(reqwest::header::REFERER, referer),
        None => request,
    }
}

fn referer_for(url: &str) -> Option<&'static str> {
    if url.contains("gamulator.com") {
        Some("https://www.gamulator.com/")
    } else if url.contains("hexrom.com") {
        Some("https://hexrom.com/")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn client_for(connectivity_url: String) -> HttpClient {
        let mut http = Config::default().http;
        http.timeout_secs = 5;
        http.connectivity_url = connectivity_url;
        HttpClient::new(&http).unwrap()
    }

    #[tokio::test]
    async fn fetch_text_returns_body_or_empty() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("GET", "/page")
            .with_status(200)
            .with_body("<html>ok</html>")
            .create_async()
            .await;
        let missing = server
            .mock("GET", "/missing")
            .with_status(404)
            .expect(2)
            .create_async()
            .await;

        let client = client_for(format!("{}/generate_204", server.url()));
        assert_eq!(client.fetch_text(&format!("{}/page", server.url())).await, "<html>ok</html>");
        assert_eq!(client.fetch_text(&format!("{}/missing", server.url())).await, "");

        ok.assert_async().await;
        missing.assert_async().await;
    }

    #[tokio::test]
    async fn unreachable_host_is_empty() {
        let client = client_for("http://127.0.0.1:1/".to_string());
        assert_eq!(client.fetch_text("http://127.0.0.1:1/nothing").await, "");
        assert!(!client.has_connectivity().await);
    }

    #[tokio::test]
    async fn connectivity_accepts_204() {
        let mut server = mockito::Server::new_async().await;
        let check = server
            .mock("GET", "/generate_204")
            .with_status(204)
            .create_async()
            .await;

        let client = client_for(format!("{}/generate_204", server.url()));
        assert!(client.has_connectivity().await);
        check.assert_async().await;
    }

    #[tokio::test]
    async fn binary_download_reports_progress() {
        let mut server = mockito::Server::new_async().await;
        let body = vec![7u8; 4096];
        let _file = server
            .mock("GET", "/game.zip")
            .with_status(200)
            .with_body(body.clone())
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested").join("game.zip");
        let seen = AtomicU64::new(0);
        let progress = |done: u64, _total: Option<u64>| seen.store(done, Ordering::SeqCst);

        let client = client_for(format!("{}/generate_204", server.url()));
        assert!(client.fetch_binary(&format!("{}/game.zip", server.url()), &dest, &progress).await);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
        assert_eq!(seen.load(Ordering::SeqCst), 4096);
    }

    #[test]
    fn referer_matches_host() {
        assert_eq!(referer_for("https://www.gamulator.com/roms/gba/x"), Some("https://www.gamulator.com/"));
        assert_eq!(referer_for("https://example.org/"), None);
    }
}
