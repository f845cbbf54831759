//! Cross-site ROM catalog scraping: console and game listings from several
//! ROM sites behind one interface, console-scoped search with virtual
//! pagination, and direct download resolution.

pub mod blacklist;
pub mod config;
pub mod dispatch;
pub mod downloaders;
pub mod error;
pub mod filters;
pub mod folders;
pub mod models;
pub mod registry;
pub mod scrapers;
pub mod storage;
pub mod text;
pub mod thumbnails;
pub mod traits;
pub mod utils;

pub use config::Config;
pub use error::{DeliveryFailure, PlunderError, Result};
pub use registry::ScraperRegistry;
