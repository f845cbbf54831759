use crate::blacklist::Blacklist;
use crate::config::Config;
use crate::downloaders::gamulator::GamulatorResolver;
use crate::downloaders::hexrom::HexromResolver;
use crate::downloaders::romspedia::RomspediaResolver;
use crate::error::{PlunderError, Result};
use crate::filters::hexrom::HexromFilter;
use crate::filters::virtual_pages::VirtualPageFilter;
use crate::folders::ConsoleFolderMap;
use crate::models::GameDetails;
use crate::scrapers::gamulator::GamulatorScraper;
use crate::scrapers::hexrom::HexromScraper;
use crate::scrapers::romspedia::RomspediaScraper;
use crate::traits::{DirectLinkResolver, GameFilter, PageFetcher, SiteScraper};
use crate::utils::HttpClient;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Scrapers, resolvers and filters of every enabled site, keyed by the
/// lowercased site name.
pub struct ScraperRegistry {
    scrapers: HashMap<String, Arc<dyn SiteScraper>>,
    resolvers: HashMap<String, Arc<dyn DirectLinkResolver>>,
    filters: HashMap<String, Arc<dyn GameFilter>>,
    fetcher: Arc<dyn PageFetcher>,
    blacklist: Arc<Blacklist>,
    folders: Arc<ConsoleFolderMap>,
}

impl ScraperRegistry {
    /// Live registry over HTTP. Resource overrides from the config replace
    /// the embedded tables.
    pub fn new(config: &Config) -> Result<Self> {
        let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpClient::new(&config.http)?);

        let blacklist = match &config.resources.blacklist_path {
            Some(path) => Blacklist::load(path)?,
            None => Blacklist::embedded(),
        };
        let folders = match &config.resources.console_folders_path {
            Some(path) => ConsoleFolderMap::load(path)?,
            None => ConsoleFolderMap::embedded()?,
        };

        Ok(Self::with_parts(config, fetcher, Arc::new(blacklist), Arc::new(folders)))
    }

    /// Registry over an arbitrary fetcher with the embedded tables.
    pub fn with_fetcher(config: &Config, fetcher: Arc<dyn PageFetcher>) -> Result<Self> {
        let folders = ConsoleFolderMap::embedded()?;
        Ok(Self::with_parts(config, fetcher, Arc::new(Blacklist::embedded()), Arc::new(folders)))
    }

    pub fn with_parts(
        config: &Config,
        fetcher: Arc<dyn PageFetcher>,
        blacklist: Arc<Blacklist>,
        folders: Arc<ConsoleFolderMap>,
    ) -> Self {
        let mut registry = Self {
            scrapers: HashMap::new(),
            resolvers: HashMap::new(),
            filters: HashMap::new(),
            fetcher: fetcher.clone(),
            blacklist: blacklist.clone(),
            folders,
        };

        let page_size = config.paging.page_size;
        let max_pages = config.paging.max_search_pages;

        for (key, site) in &config.sites {
            if !site.enabled {
                info!("[REGISTRY] {} disabled", site.name);
                continue;
            }

            match key.to_lowercase().as_str() {
                "hexrom" => {
                    let scraper = Arc::new(HexromScraper::new(fetcher.clone(), site, blacklist.clone()));
                    let resolver = HexromResolver::new(fetcher.clone(), scraper.base_url());
                    registry.register_resolver(key, Arc::new(resolver));
                    registry.register_filter(key, Arc::new(HexromFilter::new(scraper.clone())));
                    registry.register_scraper(key, scraper);
                }
                "gamulator" => {
                    let scraper = Arc::new(GamulatorScraper::new(fetcher.clone(), site, blacklist.clone()));
                    registry.register_resolver(key, Arc::new(GamulatorResolver::new(fetcher.clone())));
                    registry.register_filter(
                        key,
                        Arc::new(VirtualPageFilter::new(scraper.clone(), blacklist.clone(), page_size, max_pages)),
                    );
                    registry.register_scraper(key, scraper);
                }
                "romspedia" => {
                    let scraper = Arc::new(RomspediaScraper::new(fetcher.clone(), site, blacklist.clone()));
                    registry.register_resolver(key, Arc::new(RomspediaResolver::new(fetcher.clone())));
                    registry.register_filter(
                        key,
                        Arc::new(VirtualPageFilter::new(scraper.clone(), blacklist.clone(), page_size, max_pages)),
                    );
                    registry.register_scraper(key, scraper);
                }
                other => warn!("[REGISTRY] no scraper for site '{}'", other),
            }
        }

        registry
    }

    pub fn register_scraper(&mut self, name: &str, scraper: Arc<dyn SiteScraper>) {
        self.scrapers.insert(name.to_lowercase(), scraper);
    }

    pub fn register_resolver(&mut self, name: &str, resolver: Arc<dyn DirectLinkResolver>) {
        self.resolvers.insert(name.to_lowercase(), resolver);
    }

    pub fn register_filter(&mut self, name: &str, filter: Arc<dyn GameFilter>) {
        self.filters.insert(name.to_lowercase(), filter);
    }

    pub fn get_scraper(&self, name: &str) -> Option<Arc<dyn SiteScraper>> {
        self.scrapers.get(&name.to_lowercase()).cloned()
    }

    pub fn get_resolver(&self, name: &str) -> Option<Arc<dyn DirectLinkResolver>> {
        self.resolvers.get(&name.to_lowercase()).cloned()
    }

    pub fn get_filter(&self, name: &str) -> Option<Arc<dyn GameFilter>> {
        self.filters.get(&name.to_lowercase()).cloned()
    }

    pub fn scraper(&self, name: &str) -> Result<Arc<dyn SiteScraper>> {
        self.get_scraper(name).ok_or_else(|| PlunderError::site_not_supported(name))
    }

    pub fn resolver(&self, name: &str) -> Result<Arc<dyn DirectLinkResolver>> {
        self.get_resolver(name).ok_or_else(|| PlunderError::site_not_supported(name))
    }

    pub fn filter(&self, name: &str) -> Result<Arc<dyn GameFilter>> {
        self.get_filter(name).ok_or_else(|| PlunderError::site_not_supported(name))
    }

    /// Display names of the registered sites, alphabetically.
    pub fn site_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.scrapers.values().map(|s| s.name().to_string()).collect();
        names.sort();
        names
    }

    pub fn fetcher(&self) -> Arc<dyn PageFetcher> {
        self.fetcher.clone()
    }

    pub fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }

    pub fn folders(&self) -> Arc<ConsoleFolderMap> {
        self.folders.clone()
    }

    /// Detail page with the console context filled in.
    pub async fn game_details(&self, site: &str, url: &str, listing_console: &str) -> Result<GameDetails> {
        let scraper = self.scraper(site)?;
        let mut details = scraper.fetch_game_details(url).await;
        details.stamp_console(listing_console, &self.folders);
        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_enabled_sites_case_insensitively() {
        let mut config = Config::default();
        if let Some(site) = config.sites.get_mut("romspedia") {
            site.enabled = false;
        }

        let registry = ScraperRegistry::new(&config).expect("registry");
        assert_eq!(registry.site_names(), vec!["Gamulator".to_string(), "Hexrom".to_string()]);
        assert!(registry.get_scraper("HEXROM").is_some());
        assert!(registry.get_filter("gamulator").is_some());
        assert!(registry.get_resolver("Hexrom").is_some());
        assert!(registry.get_scraper("romspedia").is_none());
        assert!(matches!(registry.scraper("romspedia"), Err(PlunderError::SiteNotSupported(_))));
    }
}
