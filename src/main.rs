use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use plunder::dispatch::{shared_session, Dispatcher, FetchRequest, FetchResult};
use plunder::filters::hexrom::{GENRE_OPTIONS, ORDER_OPTIONS, REGION_OPTIONS, SORT_OPTIONS};
use plunder::filters::FilterSession;
use plunder::models::{FilterOptions, GameListing, ListItem, UNKNOWN_TOTAL_PAGES};
use plunder::storage::StorageManager;
use plunder::thumbnails::ThumbnailLoader;
use plunder::utils::HttpClient;
use plunder::{Config, ScraperRegistry};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "plunder")]
#[command(about = "Browse, search and download from ROM catalog sites")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the enabled sites
    Sites,
    /// Check internet connectivity
    Check,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// List a site's consoles
    Consoles {
        site: String,
        /// Also cache console images
        #[arg(long)]
        thumbnails: bool,
    },
    /// List one page of a console's games
    Games {
        site: String,
        /// Console listing URL
        url: String,
        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },
    /// Search within a console
    Search {
        site: String,
        /// Console listing URL that scopes the search
        console_url: String,
        query: String,
        /// First page to show
        #[arg(short, long, default_value_t = 1)]
        page: u32,
        /// Number of consecutive pages to show
        #[arg(long, default_value_t = 1)]
        pages: u32,
        #[arg(long, default_value_t = 0)]
        region: usize,
        #[arg(long, default_value_t = 0)]
        genre: usize,
        #[arg(long, default_value_t = 0)]
        sort: usize,
        #[arg(long, default_value_t = 0)]
        order: usize,
    },
    /// Show a game's detail page
    Details {
        site: String,
        url: String,
        /// Console label from the listing, used when the page names none
        #[arg(long, default_value = "")]
        console: String,
    },
    /// Resolve the direct archive link of a game
    Resolve { site: String, url: String },
    /// List release variants offered on a detail page, or the native
    /// filter values when no URL is given
    Options { site: String, url: Option<String> },
    /// Download a game into its console folder
    Download {
        site: String,
        url: String,
        #[arg(long, default_value = "")]
        console: String,
        /// Console folder, overriding the mapped one
        #[arg(long)]
        folder: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    let config = Config::load(&cli.config).with_context(|| format!("loading {}", cli.config))?;

    match cli.command {
        Commands::Init { force } => run_init(&cli.config, &config, force)?,
        Commands::Check => {
            let client = HttpClient::new(&config.http)?;
            if client.has_connectivity().await {
                println!("✅ Online");
            } else {
                println!("❌ No internet connection");
            }
        }
        command => {
            let registry = Arc::new(ScraperRegistry::new(&config)?);
            run_command(command, &config, registry, cli.json).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(format!("plunder={}", level))
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .init();

    Ok(())
}

fn run_init(path: &str, config: &Config, force: bool) -> Result<()> {
    if std::path::Path::new(path).exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path);
    }
    config.save(path)?;
    println!("Wrote {}", path);
    Ok(())
}

async fn run_command(command: Commands, config: &Config, registry: Arc<ScraperRegistry>, json: bool) -> Result<()> {
    match command {
        Commands::Sites => {
            let names = registry.site_names();
            if json {
                print_json(&names)?;
            } else {
                for name in names {
                    println!("{}", name);
                }
            }
        }
        Commands::Consoles { site, thumbnails } => {
            let consoles = registry.scraper(&site)?.fetch_consoles().await;
            if thumbnails {
                cache_thumbnails(config, &registry, &consoles).await;
            }
            if json {
                print_json(&consoles)?;
            } else {
                println!("🎮 {} consoles on {}", consoles.len(), site);
                for console in &consoles {
                    let folder = registry.folders().resolve(&console.label);
                    println!("{:<40} {:<12} {}", console.label, folder, console.download_url);
                }
            }
        }
        Commands::Games { site, url, page } => {
            let listing = registry.scraper(&site)?.fetch_games(&url, page).await;
            print_listing(&listing, json)?;
        }
        Commands::Search { site, console_url, query, page, pages, region, genre, sort, order } => {
            let options = FilterOptions { region, genre, sort, order };
            run_search(registry, &site, &console_url, &query, options, page, pages.max(1), json).await?;
        }
        Commands::Details { site, url, console } => {
            let details = registry.game_details(&site, &url, &console).await?;
            if json {
                print_json(&details)?;
            } else {
                println!("📀 {}", details.title);
                for (label, value) in details.fields() {
                    println!("{:<12} {}", label, value);
                }
                if !details.mapped_folder.is_empty() {
                    println!("{:<12} {}", "Folder", details.mapped_folder);
                }
                println!("{:<12} {}", "Download", details.download_url);
                if !details.about.is_empty() {
                    println!("\n{}", details.about);
                }
            }
        }
        Commands::Resolve { site, url } => {
            let link = registry.resolver(&site)?.resolve_direct_link(&url).await;
            if link.is_empty() {
                warn!("No direct link found, the detail page is the download target");
                println!("{}", url);
            } else {
                println!("{}", link);
            }
        }
        Commands::Options { site, url: Some(url) } => {
            let resolver = registry.resolver(&site)?;
            let options = resolver.download_options(&url).await;
            let mut rows = Vec::new();
            for option in options {
                let link = resolver.final_download_link(&option).await;
                rows.push((option.label, link));
            }
            if json {
                print_json(&rows)?;
            } else if rows.is_empty() {
                println!("No release variants on {}", url);
            } else {
                for (label, link) in rows {
                    println!("{:<40} {}", label, link);
                }
            }
        }
        Commands::Options { site, url: None } => {
            if !site.eq_ignore_ascii_case("hexrom") {
                bail!("{} has no native filter options", site);
            }
            println!("Region: {}", numbered(&REGION_OPTIONS));
            println!("Sort:   {}", numbered(&SORT_OPTIONS));
            println!("Order:  {}", numbered(&ORDER_OPTIONS));
            println!("Genre:  {}", numbered(&GENRE_OPTIONS));
        }
        Commands::Download { site, url, console, folder } => {
            run_download(config, &registry, &site, &url, &console, folder).await?;
        }
        Commands::Init { .. } | Commands::Check => unreachable!("handled before the registry is built"),
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_search(
    registry: Arc<ScraperRegistry>,
    site: &str,
    console_url: &str,
    query: &str,
    options: FilterOptions,
    first_page: u32,
    pages: u32,
    json: bool,
) -> Result<()> {
    let session = shared_session(FilterSession::new(console_url).with_search(query, options));
    let mut dispatcher = Dispatcher::new(registry);

    // Pages before the first requested one still have to be walked so the
    // accumulated buffer lines up.
    for page in 1..first_page + pages {
        dispatcher.submit(FetchRequest::Filtered {
            site: site.to_string(),
            session: session.clone(),
            page,
        });
        let Some(event) = dispatcher.next_event().await else {
            bail!("dispatcher closed");
        };

        match event.result {
            FetchResult::Games(listing) => {
                if page >= first_page {
                    print_listing(&listing, json)?;
                }
                if !listing.pagination.has_next_page() {
                    break;
                }
            }
            FetchResult::Failed(reason) => bail!(reason),
            _ => unreachable!("filtered fetches yield listings"),
        }
    }

    Ok(())
}

async fn run_download(
    config: &Config,
    registry: &ScraperRegistry,
    site: &str,
    url: &str,
    console: &str,
    folder: Option<String>,
) -> Result<()> {
    let details = registry.game_details(site, url, console).await?;
    let folder = folder.unwrap_or_else(|| details.mapped_folder.clone());
    let title = if details.title.is_empty() { url } else { details.title.as_str() };

    let storage = StorageManager::new(&config.storage, registry.fetcher());
    let dest = storage.download_path(&details.download_url, title);
    info!("Downloading {} into folder '{}'", title, folder);

    let handle = storage.start(&details.download_url, dest, &folder);
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")?
            .progress_chars("#>-"),
    );

    while handle.is_running() {
        let (done, total) = handle.progress();
        if let Some(total) = total {
            bar.set_length(total);
        }
        bar.set_position(done);
        bar.set_message(handle.status());
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    bar.finish_and_clear();

    match handle.outcome() {
        Some(Ok(delivered)) => {
            println!("✅ {}", delivered.status());
            Ok(())
        }
        Some(Err(failure)) => bail!(failure),
        None => bail!(handle.status()),
    }
}

async fn cache_thumbnails(config: &Config, registry: &ScraperRegistry, items: &[ListItem]) {
    let loader = ThumbnailLoader::new(
        registry.fetcher(),
        &config.storage.thumbnail_dir,
        config.storage.thumbnail_workers,
    );
    let wanted: Vec<&str> = items
        .iter()
        .map(|i| i.image_path.as_str())
        .filter(|p| !p.is_empty())
        .collect();
    for url in &wanted {
        loader.enqueue(url);
    }

    let mut cached = 0;
    let mut finished = 0;
    while finished < wanted.len() {
        for thumbnail in loader.drain_completed() {
            finished += 1;
            if thumbnail.path.is_some() {
                cached += 1;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    loader.shutdown().await;
    info!("Cached {}/{} thumbnails", cached, wanted.len());
}

fn print_listing(listing: &GameListing, json: bool) -> Result<()> {
    if json {
        return print_json(listing);
    }

    let total = listing.pagination.total_pages();
    let total = if total == UNKNOWN_TOTAL_PAGES { "?".to_string() } else { total.to_string() };
    println!("📚 Page {}/{} ({} games)", listing.pagination.current_page, total, listing.games.len());
    println!("{:<45} {:<12} {:<8} {}", "Title", "Size", "Rating", "URL");
    println!("{}", "-".repeat(90));
    for game in &listing.games {
        println!("{:<45} {:<12} {:<8} {}", game.label, game.size, game.rating, game.download_url);
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn numbered(options: &[&str]) -> String {
    options
        .iter()
        .enumerate()
        .map(|(i, o)| format!("{}={}", i, o))
        .collect::<Vec<_>>()
        .join(", ")
}
