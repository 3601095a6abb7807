use std::sync::Arc;
use tracing::{error, info};

use crate::models::asset::AssetType;
use crate::models::settings::Settings;

use super::coincap::CoinCapProvider;
use super::coinmarketcap::CoinMarketCapScraper;
use super::google_finance::GoogleFinanceScraper;
use super::scraping::ScrapePool;
use super::traits::MarketDataProvider;
use super::yahoo_finance::YahooFinanceProvider;

/// Priority-ordered list of market-data providers.
///
/// Registration order is fallback order: for each asset type, the first
/// registered provider supporting it is asked first.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn MarketDataProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the default providers:
    /// CoinCap, CoinMarketCap (scraper), Yahoo Finance, Google Finance (scraper).
    pub fn new_with_defaults(settings: &Settings) -> Self {
        let timeout = settings.provider_timeout();
        let pool = ScrapePool::new(settings.scrape_concurrency, timeout);
        let mut registry = Self::new();

        let coincap_key = settings.api_keys.get("coincap").cloned();
        registry.register(Arc::new(CoinCapProvider::new(timeout).with_api_key(coincap_key)));
        registry.register(Arc::new(CoinMarketCapScraper::new(pool.clone())));

        match YahooFinanceProvider::new() {
            Ok(yahoo) => registry.register(Arc::new(yahoo)),
            Err(e) => error!(error = %e, "Yahoo Finance unavailable, stocks fall back to scraping"),
        }

        registry.register(Arc::new(GoogleFinanceScraper::new(pool)));

        registry
    }

    /// Append a provider at the lowest priority.
    pub fn register(&mut self, provider: Arc<dyn MarketDataProvider>) {
        self.providers.push(provider);
    }

    /// All providers supporting `asset_type`, in priority order.
    pub fn get_providers_for(&self, asset_type: AssetType) -> Vec<Arc<dyn MarketDataProvider>> {
        self.providers
            .iter()
            .filter(|p| p.supports(asset_type))
            .cloned()
            .collect()
    }

    pub fn has_provider_for(&self, asset_type: AssetType) -> bool {
        self.providers.iter().any(|p| p.supports(asset_type))
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn all(&self) -> &[Arc<dyn MarketDataProvider>] {
        &self.providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Run every provider's one-time setup. Failures are logged and the
    /// provider stays registered with whatever mappings it already has.
    /// Returns the number of providers that initialized cleanly.
    pub async fn initialize_all(&self) -> usize {
        let mut ok = 0;
        for provider in &self.providers {
            match provider.initialize().await {
                Ok(()) => {
                    info!(provider = provider.name(), "Provider initialized");
                    ok += 1;
                }
                Err(e) => error!(
                    provider = provider.name(),
                    error = %e,
                    "Provider initialization failed, continuing with partial mappings"
                ),
            }
        }
        ok
    }
}
