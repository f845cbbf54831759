use crate::config::StorageConfig;
use crate::error::DeliveryFailure;
use crate::folders::should_extract;
use crate::traits::PageFetcher;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

const ENOSPC: i32 = 28;
const EXTRACT_TMP_DIR: &str = ".__extract_tmp";

/// `1536` -> `"1.50 KB"`. Two decimals below 10, one below 100.
pub fn human_readable_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if value < 10.0 {
        format!("{:.2} {}", value, UNITS[unit])
    } else if value < 100.0 {
        format!("{:.1} {}", value, UNITS[unit])
    } else {
        format!("{:.0} {}", value, UNITS[unit])
    }
}

fn progress_text(downloaded: u64, total: Option<u64>) -> String {
    match total {
        Some(total) if total > 0 => {
            let pct = (downloaded as f64 / total as f64 * 100.0).round() as u64;
            format!("{} / {} ({}%)", human_readable_size(downloaded), human_readable_size(total), pct)
        }
        _ => human_readable_size(downloaded),
    }
}

fn is_no_space(err: &io::Error) -> bool {
    err.raw_os_error() == Some(ENOSPC)
}

/// Where a delivered file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivered {
    /// Archive unpacked into the console folder and removed.
    Extracted { dir: PathBuf },
    /// File moved into the console folder as-is.
    Saved { path: PathBuf, archive_kept: bool },
}

impl Delivered {
    pub fn status(&self) -> String {
        match self {
            Delivered::Extracted { dir } => format!("Extracted to {}", dir.display()),
            Delivered::Saved { path, archive_kept: true } => format!("Saved to {} (zip kept)", path.display()),
            Delivered::Saved { path, archive_kept: false } => format!("Saved to {}", path.display()),
        }
    }
}

/// Shared view of one running delivery: a status line and a running flag.
#[derive(Clone)]
pub struct DownloadHandle {
    status: Arc<Mutex<String>>,
    running: Arc<AtomicBool>,
    downloaded: Arc<AtomicU64>,
    total: Arc<AtomicU64>,
    outcome: Arc<Mutex<Option<Result<Delivered, DeliveryFailure>>>>,
    cancel: Arc<Notify>,
}

impl Default for DownloadHandle {
    fn default() -> Self {
        Self {
            status: Arc::new(Mutex::new(String::new())),
            running: Arc::new(AtomicBool::new(false)),
            downloaded: Arc::new(AtomicU64::new(0)),
            total: Arc::new(AtomicU64::new(0)),
            outcome: Arc::new(Mutex::new(None)),
            cancel: Arc::new(Notify::new()),
        }
    }
}

impl DownloadHandle {
    pub fn status(&self) -> String {
        self.status.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// `(downloaded, total)`; total is `None` until the server reports it.
    pub fn progress(&self) -> (u64, Option<u64>) {
        let total = self.total.load(Ordering::Relaxed);
        (self.downloaded.load(Ordering::Relaxed), (total > 0).then_some(total))
    }

    /// How the delivery ended; `None` while running or after a cancel.
    pub fn outcome(&self) -> Option<Result<Delivered, DeliveryFailure>> {
        self.outcome.lock().ok()?.clone()
    }

    pub fn cancel(&self) {
        self.cancel.notify_one();
    }

    fn set_status(&self, text: impl Into<String>) {
        if let Ok(mut status) = self.status.lock() {
            *status = text.into();
        }
    }

    fn record_progress(&self, downloaded: u64, total: Option<u64>) {
        self.downloaded.store(downloaded, Ordering::Relaxed);
        if let Some(total) = total {
            self.total.store(total, Ordering::Relaxed);
        }
        self.set_status(progress_text(downloaded, total));
    }
}

/// Transfers an archive and files it under the matching console folder.
#[derive(Clone)]
pub struct StorageManager {
    config: StorageConfig,
    fetcher: Arc<dyn PageFetcher>,
}

impl StorageManager {
    pub fn new(config: &StorageConfig, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            config: config.clone(),
            fetcher,
        }
    }

    /// Download location for `url`: its last path segment, or the title
    /// when the URL does not name a file.
    pub fn download_path(&self, url: &str, title: &str) -> PathBuf {
        let segment = url::Url::parse(url)
            .ok()
            .and_then(|u| u.path_segments()?.filter(|s| !s.is_empty()).last().map(str::to_string))
            .unwrap_or_default();

        let name = if Path::new(&segment).extension().is_some() {
            sanitize_filename(&segment)
        } else {
            format!("{}.zip", sanitize_filename(title))
        };
        Path::new(&self.config.download_dir).join(name)
    }

    /// First existing `<root>/<folder>` among the configured roots.
    pub fn console_dir(&self, folder: &str) -> Option<PathBuf> {
        self.config
            .roms_roots
            .iter()
            .map(|root| Path::new(root).join(folder))
            .find(|candidate| candidate.is_dir())
    }

    /// Runs [`deliver`](Self::deliver) in the background and reports
    /// through the returned handle. Cancelling removes the partial file.
    pub fn start(&self, url: &str, dest: PathBuf, folder_hint: &str) -> DownloadHandle {
        let handle = DownloadHandle::default();
        handle.running.store(true, Ordering::SeqCst);
        handle.set_status("Starting...");

        let storage = self.clone();
        let url = url.to_string();
        let folder = folder_hint.to_string();
        let task_handle = handle.clone();

        tokio::spawn(async move {
            let handle = task_handle;
            tokio::select! {
                result = storage.deliver(&url, &dest, &folder, &handle) => {
                    match &result {
                        Ok(delivered) => handle.set_status(delivered.status()),
                        Err(failure) => handle.set_status(failure.to_string()),
                    }
                    if let Ok(mut outcome) = handle.outcome.lock() {
                        *outcome = Some(result);
                    }
                }
                _ = handle.cancel.notified() => {
                    let _ = tokio::fs::remove_file(&dest).await;
                    info!("[DOWNLOAD] canceled {}", url);
                    handle.set_status("Download canceled.");
                }
            }
            handle.running.store(false, Ordering::SeqCst);
        });

        handle
    }

    /// Fetches `url` to `dest` and files it under `folder_hint`. Every
    /// failure leaves no stray file behind.
    pub async fn deliver(
        &self,
        url: &str,
        dest: &Path,
        folder_hint: &str,
        handle: &DownloadHandle,
    ) -> Result<Delivered, DeliveryFailure> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                warn!("[DOWNLOAD] cannot prepare {}: {}", parent.display(), e);
                if is_no_space(&e) { DeliveryFailure::NoSpace } else { DeliveryFailure::StartFailed }
            })?;
        }

        info!("[DOWNLOAD] {} -> {}", url, dest.display());
        let progress = |downloaded: u64, total: Option<u64>| handle.record_progress(downloaded, total);
        if !self.fetcher.fetch_binary(url, dest, &progress).await {
            return Err(DeliveryFailure::TransferFailed);
        }
        match tokio::fs::metadata(dest).await {
            Ok(meta) if meta.len() > 0 => handle.record_progress(meta.len(), Some(meta.len())),
            _ => {
                let _ = tokio::fs::remove_file(dest).await;
                return Err(DeliveryFailure::TransferFailed);
            }
        }

        let folder = folder_hint.trim();
        if folder.is_empty() {
            discard(dest, "no console mapping").await;
            return Err(DeliveryFailure::NoConsoleMapping);
        }
        let Some(base_dir) = self.console_dir(folder) else {
            discard(dest, "console folder missing").await;
            return Err(DeliveryFailure::ConsoleFolderMissing);
        };

        let file_name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        let target = base_dir.join(&file_name);
        let is_zip = dest
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
        debug!("[DOWNLOAD] post-processing {:?} zip={} folder={}", file_name, is_zip, folder);

        if is_zip && should_extract(folder) {
            handle.set_status("Unzipping...");
            match extract_into(dest, &base_dir).await {
                Ok(()) => {
                    let _ = tokio::fs::remove_file(dest).await;
                    info!("[DOWNLOAD] extracted into {}", base_dir.display());
                    return Ok(Delivered::Extracted { dir: base_dir });
                }
                Err(e) => {
                    warn!("[DOWNLOAD] extraction failed, keeping archive: {}", e);
                    return match move_file(dest, &target).await {
                        Ok(()) => Ok(Delivered::Saved { path: target, archive_kept: true }),
                        Err(e) => {
                            discard(dest, "extract+move failed").await;
                            Err(if is_no_space(&e) { DeliveryFailure::NoSpace } else { DeliveryFailure::ExtractAndMove })
                        }
                    };
                }
            }
        }

        match move_file(dest, &target).await {
            Ok(()) => {
                info!("[DOWNLOAD] saved {}", target.display());
                Ok(Delivered::Saved { path: target, archive_kept: false })
            }
            Err(e) => {
                discard(dest, "move failed").await;
                Err(if is_no_space(&e) { DeliveryFailure::NoSpace } else { DeliveryFailure::MoveFailed })
            }
        }
    }
}

async fn discard(path: &Path, reason: &str) {
    if tokio::fs::remove_file(path).await.is_ok() {
        info!("[DOWNLOAD] {}, deleted {}", reason, path.display());
    }
}

/// Rename, or copy and remove across filesystems.
async fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    if let Err(e) = tokio::fs::copy(from, to).await {
        let _ = tokio::fs::remove_file(to).await;
        return Err(e);
    }
    tokio::fs::remove_file(from).await
}

/// Unpacks into a scratch directory next to the target, then merges each
/// top-level entry into `base_dir`, overwriting files that already exist.
/// The scratch directory is removed on every path.
async fn extract_into(archive: &Path, base_dir: &Path) -> io::Result<()> {
    let tmp = base_dir.join(EXTRACT_TMP_DIR);
    let archive = archive.to_path_buf();
    let scratch = tmp.clone();
    let target = base_dir.to_path_buf();

    let outcome = tokio::task::spawn_blocking(move || unpack_and_merge(&archive, &scratch, &target))
        .await
        .map_err(io::Error::other)
        .and_then(|r| r);

    if tmp.exists() {
        if let Err(e) = tokio::fs::remove_dir_all(&tmp).await {
            warn!("[DOWNLOAD] cannot remove {}: {}", tmp.display(), e);
        }
    }
    outcome
}

fn unpack_and_merge(archive: &Path, scratch: &Path, base_dir: &Path) -> io::Result<()> {
    if scratch.exists() {
        std::fs::remove_dir_all(scratch)?;
    }
    std::fs::create_dir_all(scratch)?;
    let mut zip = zip::ZipArchive::new(File::open(archive)?).map_err(io::Error::other)?;
    zip.extract(scratch).map_err(io::Error::other)?;

    for entry in std::fs::read_dir(scratch)? {
        let entry = entry?;
        merge_entry(&entry.path(), &base_dir.join(entry.file_name()))?;
    }
    Ok(())
}

/// Moves `from` onto `to`. Directories merge recursively; anything else
/// replaces what is there.
fn merge_entry(from: &Path, to: &Path) -> io::Result<()> {
    if from.is_dir() && to.is_dir() {
        for entry in std::fs::read_dir(from)? {
            let entry = entry?;
            merge_entry(&entry.path(), &to.join(entry.file_name()))?;
        }
        return std::fs::remove_dir(from);
    }

    if to.is_dir() {
        std::fs::remove_dir_all(to)?;
    } else if to.exists() {
        std::fs::remove_file(to)?;
    }
    std::fs::rename(from, to)
}

fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim_matches('.')
        .trim_matches(' ')
        .to_string()
}
