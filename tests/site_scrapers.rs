mod common;

use common::FakeFetcher;
use plunder::blacklist::Blacklist;
use plunder::config::{Config, StorageConfig};
use plunder::folders::ConsoleFolderMap;
use plunder::models::TotalPages;
use plunder::storage::{Delivered, DownloadHandle, StorageManager};
use plunder::ScraperRegistry;
use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;

const HEXROM_CATEGORIES: &str = "https://hexrom.com/rom-category/";
const HEXROM_GBA: &str = "https://hexrom.com/roms/gba/";

fn registry(fetcher: Arc<FakeFetcher>, blacklist: &str) -> ScraperRegistry {
    ScraperRegistry::with_parts(
        &Config::default(),
        fetcher,
        Arc::new(Blacklist::parse(blacklist)),
        Arc::new(ConsoleFolderMap::embedded().expect("folder table")),
    )
}

fn zip_with(name: &str, body: &[u8]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    writer
        .start_file(name, zip::write::FileOptions::default())
        .expect("zip entry");
    writer.write_all(body).expect("zip body");
    writer.finish().expect("zip finish").into_inner()
}

#[tokio::test]
async fn hexrom_consoles_skip_blacklisted_entries() {
    let html = r#"<ul class="cats">
<li><a href="https://hexrom.com/roms/3do/">3DO ROMs</a><span class="my-game-count">120</span></li>
<li><a href="https://hexrom.com/roms/gba/">Game Boy Advance</a> <span class="my-game-count">1200</span></li>
<li><a href="/roms/nintendo-switch/">Nintendo Switch</a><span class="my-game-count">50</span></li>
</ul>"#;
    let fetcher = Arc::new(FakeFetcher::new().page(HEXROM_CATEGORIES, html));
    let registry = registry(fetcher, "Nintendo Switch\n[Hexrom]\n3DO\n");

    let consoles = registry.scraper("hexrom").expect("hexrom").fetch_consoles().await;
    let labels: Vec<&str> = consoles.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["Game Boy Advance (1200)"]);
    assert_eq!(consoles[0].download_url, HEXROM_GBA);
}

#[tokio::test]
async fn site_sections_do_not_leak_to_other_sites() {
    let html = r#"<div class="thumbnail-home"><a href="/roms/3do"><img src="/img/3do.png"></a><h3>3DO</h3></div>"#;
    let fetcher = Arc::new(FakeFetcher::new().page("https://www.gamulator.com/roms", html));
    let registry = registry(fetcher, "[Hexrom]\n3DO\n");

    let consoles = registry.scraper("gamulator").expect("gamulator").fetch_consoles().await;
    assert_eq!(consoles.len(), 1);
    assert_eq!(consoles[0].download_url, "https://www.gamulator.com/roms/3do");
    assert_eq!(consoles[0].image_path, "https://www.gamulator.com/img/3do.png");
}

#[tokio::test]
async fn hexrom_listing_drops_emulators_and_bios_packs() {
    let html = r#"<main>
<article><img data-src="https://hexrom.com/img/metroid.jpg"><h2>Metroid Fusion</h2><a href="/roms/gba/metroid-fusion/">Download</a></article>
<article><img data-src="https://hexrom.com/img/mgba.jpg"><h2>mGBA Emulator</h2><a href="/emulators/mgba/">Get</a></article>
<article><img data-src="https://hexrom.com/img/bios.jpg"><h2>Game Boy Advance Pack</h2><a href="/bios/gba/">Get</a></article>
</main>
<div class="navigation"><a href="/roms/gba/page/2/">2</a><a href="/roms/gba/page/4/">4</a></div>"#;
    let fetcher = Arc::new(FakeFetcher::new().page(HEXROM_GBA, html));
    let registry = registry(fetcher, "");

    let listing = registry.scraper("hexrom").expect("hexrom").fetch_games(HEXROM_GBA, 1).await;
    assert_eq!(listing.games.len(), 1);
    assert_eq!(listing.games[0].label, "Metroid Fusion");
    assert_eq!(listing.games[0].download_url, "https://hexrom.com/roms/gba/metroid-fusion/");
    assert_eq!(listing.pagination.total, TotalPages::Known(4));
}

#[tokio::test]
async fn search_listings_page_until_an_empty_page() {
    let search = "https://hexrom.com/roms/gba/?search=zelda";
    let html = r#"<img data-src="https://hexrom.com/img/minish.jpg"><h2>Zelda Minish Cap</h2><a href="/roms/gba/minish-cap/">Go</a>"#;
    let fetcher = Arc::new(FakeFetcher::new().page(search, html));
    let registry = registry(fetcher.clone(), "");
    let scraper = registry.scraper("hexrom").expect("hexrom");

    let first = scraper.fetch_games(search, 1).await;
    assert_eq!(first.games.len(), 1);
    assert_eq!(first.pagination.total, TotalPages::Unknown { at_least: 1 });
    assert_eq!(first.pagination.total_pages(), plunder::models::UNKNOWN_TOTAL_PAGES);
    assert!(first.pagination.has_next_page());

    let second = scraper.fetch_games(search, 2).await;
    assert!(second.games.is_empty());
    assert_eq!(second.pagination.total, TotalPages::Exhausted { last_page: 1 });
    assert!(!second.pagination.has_next_page());
    assert!(fetcher.calls().contains(&"https://hexrom.com/roms/gba/page/2/?search=zelda".to_string()));
}

#[tokio::test]
async fn gamulator_search_uses_the_same_sentinel() {
    let search = "https://www.gamulator.com/search?search_term_string=zelda";
    let card = common::gamulator_card("gameboy-advance", "zelda-minish-cap", "Zelda Minish Cap");
    let fetcher = Arc::new(FakeFetcher::new().page(search, common::gamulator_page(&[card])));
    let registry = registry(fetcher, "");
    let scraper = registry.scraper("gamulator").expect("gamulator");

    let first = scraper.fetch_games(search, 1).await;
    assert_eq!(first.pagination.total, TotalPages::Unknown { at_least: 1 });

    let second = scraper.fetch_games(search, 2).await;
    assert_eq!(second.pagination.total, TotalPages::Exhausted { last_page: 1 });
}

#[tokio::test]
async fn details_fall_back_to_the_detail_page() {
    let detail = "https://hexrom.com/roms/3do/road-rash/";
    let html = r#"<meta property="og:image" content="https://hexrom.com/img/road-rash.jpg">
<table><tr><th>Name</th><td>Road Rash</td></tr><tr><th>Size</th><td>310 MB</td></tr></table>
<p>Motorbike racing with clubs.</p>"#;
    let fetcher = Arc::new(FakeFetcher::new().page(detail, html));
    let registry = registry(fetcher, "");

    let details = registry.game_details("hexrom", detail, "3DO ROMs (120)").await.expect("details");
    assert_eq!(details.title, "Road Rash");
    assert_eq!(details.file_size, "310 MB");
    assert_eq!(details.about, "Motorbike racing with clubs.");
    assert_eq!(details.download_url, detail);
    assert_eq!(details.console_name, "3DO ROMs (120)");
    assert_eq!(details.mapped_folder, "PANASONIC");
}

#[tokio::test]
async fn resolvers_walk_their_fallback_chains() {
    let gamulator_detail = "https://www.gamulator.com/roms/gameboy-advance/metroid-fusion";
    let romspedia_detail = "https://www.romspedia.com/roms/gameboy-advance/metroid-fusion/";
    let fetcher = Arc::new(
        FakeFetcher::new()
            .page(
                &format!("{}/download", gamulator_detail),
                r#"<script>var u = "https://dl.gamulator.com/files/Metroid%20Fusion.zip";</script><a href="/help">Help</a>"#,
            )
            .page(
                "https://www.romspedia.com/roms/gameboy-advance/metroid-fusion/download",
                r#"<a href="/files/metroid-fusion.zip">Mirror</a>"#,
            ),
    );
    let registry = registry(fetcher, "");

    let gamulator = registry.resolver("gamulator").expect("gamulator");
    assert_eq!(
        gamulator.resolve_direct_link(gamulator_detail).await,
        "https://dl.gamulator.com/files/Metroid%20Fusion.zip"
    );

    let romspedia = registry.resolver("romspedia").expect("romspedia");
    assert_eq!(
        romspedia.resolve_direct_link(romspedia_detail).await,
        "https://www.romspedia.com/files/metroid-fusion.zip"
    );
}

#[tokio::test]
async fn marked_anchor_wins_over_bare_urls() {
    let detail = "https://www.gamulator.com/roms/gameboy-advance/metroid-fusion";
    let fetcher = Arc::new(FakeFetcher::new().page(
        &format!("{}/download", detail),
        r#"<p>Old mirror: https://old.example.com/metroid.zip</p>
<a class="btn download_link" href="https://dl.gamulator.com/files/metroid.zip">Download</a>"#,
    ));
    let registry = registry(fetcher, "");

    let link = registry.resolver("gamulator").expect("gamulator").resolve_direct_link(detail).await;
    assert_eq!(link, "https://dl.gamulator.com/files/metroid.zip");
}

#[tokio::test]
async fn resolved_archive_lands_in_the_console_folder() {
    let detail = "https://www.gamulator.com/roms/3do/road-rash";
    let archive = "https://dl.gamulator.com/files/road-rash.zip";
    let fetcher = Arc::new(
        FakeFetcher::new()
            .page(detail, r#"<h1 itemprop="name">Road Rash</h1>"#)
            .page(&format!("{}/download", detail), format!(r#"<a id="download_link" href="{}">Get</a>"#, archive))
            .file(archive, &zip_with("Road Rash.iso", b"disc")),
    );
    let registry = registry(fetcher.clone(), "");
    let details = registry.game_details("gamulator", detail, "3DO ROMs").await.expect("details");
    assert_eq!(details.download_url, archive);
    assert_eq!(details.mapped_folder, "PANASONIC");

    let roms = TempDir::new().expect("roms root");
    let downloads = TempDir::new().expect("download dir");
    std::fs::create_dir(roms.path().join("PANASONIC")).expect("console dir");
    let storage = StorageManager::new(
        &StorageConfig {
            roms_roots: vec![roms.path().to_string_lossy().into_owned()],
            download_dir: downloads.path().to_string_lossy().into_owned(),
            thumbnail_dir: downloads.path().join("thumbs").to_string_lossy().into_owned(),
            thumbnail_workers: 1,
        },
        fetcher,
    );

    let dest = storage.download_path(&details.download_url, &details.title);
    assert_eq!(dest, downloads.path().join("road-rash.zip"));

    let delivered = storage
        .deliver(&details.download_url, &dest, &details.mapped_folder, &DownloadHandle::default())
        .await
        .expect("delivered");
    assert_eq!(delivered, Delivered::Extracted { dir: roms.path().join("PANASONIC") });
    assert_eq!(
        std::fs::read(roms.path().join("PANASONIC").join("Road Rash.iso")).expect("extracted"),
        b"disc"
    );
    assert!(!dest.exists());
}

#[tokio::test]
async fn hexrom_lists_versions_and_resolves_each() {
    let detail = "https://hexrom.com/roms/gba/metroid-fusion/";
    let fetcher = Arc::new(
        FakeFetcher::new()
            .page(
                detail,
                r#"<table>
<tr><th>Version</th><th>Get</th></tr>
<tr><td>USA</td><td><a href="/roms/gba/metroid-fusion/download/usa/">Metroid Fusion (USA)</a></td></tr>
<tr><td>Europe</td><td><a href="https://hexrom.com/roms/gba/metroid-fusion/download/eu/">Metroid Fusion (Europe)</a></td></tr>
<tr><td>Notes</td><td><a href="/faq/">FAQ</a></td></tr>
</table>"#,
            )
            .page(
                "https://hexrom.com/roms/gba/metroid-fusion/download/usa/",
                r#"<a class="btn" id="download" href="/files/metroid-fusion-usa.zip">Start</a>"#,
            )
            .page(
                "https://hexrom.com/roms/gba/metroid-fusion/download/eu/",
                r#"<script>location.href = "https://dl.hexrom.com/metroid-fusion-eu.zip";</script>"#,
            ),
    );
    let registry = registry(fetcher, "");
    let resolver = registry.resolver("hexrom").expect("hexrom");

    let options = resolver.download_options(detail).await;
    let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
    assert_eq!(labels, vec!["Metroid Fusion (USA)", "Metroid Fusion (Europe)"]);
    assert_eq!(options[0].url, "https://hexrom.com/roms/gba/metroid-fusion/download/usa/");

    assert_eq!(
        resolver.final_download_link(&options[0]).await,
        "https://hexrom.com/files/metroid-fusion-usa.zip"
    );
    assert_eq!(
        resolver.final_download_link(&options[1]).await,
        "https://dl.hexrom.com/metroid-fusion-eu.zip"
    );
}

#[tokio::test]
async fn hexrom_falls_back_to_the_archive_after_the_table() {
    let detail = "https://hexrom.com/roms/gba/advance-wars/";
    let fetcher = Arc::new(
        FakeFetcher::new()
            .page(detail, r#"<table><tr><th>Name</th><td>Advance Wars</td></tr></table>"#)
            .page(
                "https://hexrom.com/roms/gba/advance-wars/download/",
                r#"<table><tr><td><a href="/files/readme.zip">Readme</a></td></tr></table>
<p>Choose a mirror</p>
<a class="btn" href="/files/advance-wars.zip">Mirror 1</a>"#,
            ),
    );
    let registry = registry(fetcher, "");

    let details = registry.game_details("hexrom", detail, "GBA ROMs").await.expect("details");
    assert_eq!(details.title, "Advance Wars");
    assert_eq!(details.download_url, "https://hexrom.com/files/advance-wars.zip");
    assert_eq!(details.mapped_folder, "GBA");
}
