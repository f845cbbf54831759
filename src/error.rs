use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlunderError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("Site not supported: {0}")]
    SiteNotSupported(String),

    #[error("{0}")]
    Delivery(#[from] DeliveryFailure),
}

impl PlunderError {
    pub fn site_not_supported(site: impl Into<String>) -> Self {
        Self::SiteNotSupported(site.into())
    }
}

/// Failure branches of a download hand-off. The display text is what the
/// user sees in the status line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryFailure {
    #[error("Failed to start transfer.")]
    StartFailed,

    #[error("Download failed.")]
    TransferFailed,

    #[error("Download failed (no space left on device).")]
    NoSpace,

    #[error("Download failed (no console mapping).")]
    NoConsoleMapping,

    #[error("Download failed (console folder missing).")]
    ConsoleFolderMissing,

    #[error("Download failed (extract+move).")]
    ExtractAndMove,

    #[error("Download failed (move error).")]
    MoveFailed,
}

pub type Result<T> = std::result::Result<T, PlunderError>;
