use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use tracing::{info, instrument, warn};

use super::scraping::ScrapePool;
use super::traits::MarketDataProvider;
use super::util::valid_price;
use crate::errors::CoreError;
use crate::models::asset::{AssetKey, AssetType};
use crate::models::price::PriceQuote;

const BASE_URL: &str = "https://coinmarketcap.com";
const PROVIDER: &str = "CoinMarketCap";
const MAX_IN_FLIGHT: usize = 4;

/// Page slugs of the largest coins, loaded by `initialize`.
const KNOWN_SLUGS: &[(&str, &str)] = &[
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("USDT", "tether"),
    ("USDC", "usd-coin"),
    ("BNB", "bnb"),
    ("XRP", "xrp"),
    ("ADA", "cardano"),
    ("SOL", "solana"),
    ("DOGE", "dogecoin"),
    ("DOT", "polkadot-new"),
    ("LTC", "litecoin"),
    ("AVAX", "avalanche"),
    ("LINK", "chainlink"),
    ("SHIB", "shiba-inu"),
    ("TRX", "tron"),
];

const PRICE_SELECTORS: &[&str] = &[
    "span[data-test=\"text-cdp-price-display\"]",
    "div.priceValue span",
    ".priceValue",
];

/// Scrapes coin pages on coinmarketcap.com for current USD prices.
///
/// Fallback for the crypto API provider: no history, no search.
pub struct CoinMarketCapScraper {
    pool: ScrapePool,
    base_url: String,
    slugs: DashMap<String, String>,
}

impl CoinMarketCapScraper {
    pub fn new(pool: ScrapePool) -> Self {
        Self::with_base_url(BASE_URL, pool)
    }

    pub fn with_base_url(base_url: &str, pool: ScrapePool) -> Self {
        Self {
            pool,
            base_url: base_url.trim_end_matches('/').to_string(),
            slugs: DashMap::new(),
        }
    }

    /// Teach the scraper a page slug for a symbol (e.g., "PEPE" → "pepe").
    pub fn register_slug(&self, symbol: &str, slug: &str) {
        self.slugs.insert(symbol.to_uppercase(), slug.to_lowercase());
    }

    fn slug_for(&self, symbol: &str) -> Option<String> {
        self.slugs.get(&symbol.to_uppercase()).map(|s| s.value().clone())
    }
}

#[async_trait]
impl MarketDataProvider for CoinMarketCapScraper {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn supported_asset_types(&self) -> Vec<AssetType> {
        vec![AssetType::Crypto]
    }

    /// Load the known symbol → slug table. Slugs registered earlier win.
    async fn initialize(&self) -> Result<(), CoreError> {
        for (symbol, slug) in KNOWN_SLUGS {
            self.slugs
                .entry(symbol.to_string())
                .or_insert_with(|| slug.to_string());
        }
        info!(symbols = self.slugs.len(), "CoinMarketCap slug map loaded");
        Ok(())
    }

    #[instrument(name = "CoinMarketCapScrape", skip_all, fields(count = assets.len()))]
    async fn fetch_prices(&self, assets: &[AssetKey]) -> Vec<PriceQuote> {
        let supported: Vec<AssetKey> = assets.iter().filter(|a| self.supports(a.asset_type)).cloned().collect();
        stream::iter(supported)
            .map(|key| async move {
                let Some(slug) = self.slug_for(&key.ticker) else {
                    warn!(ticker = %key.ticker, "No CoinMarketCap page known for ticker, skipping");
                    return None;
                };
                let url = format!("{}/currencies/{slug}/", self.base_url);
                match self.pool.scrape_price(&url, PRICE_SELECTORS).await {
                    Ok(Some(price)) => valid_price(PROVIDER, &key.ticker, price).map(|price| PriceQuote {
                        key: key.clone(),
                        price,
                        source: PROVIDER.to_string(),
                    }),
                    Ok(None) => {
                        warn!(ticker = %key.ticker, "CoinMarketCap page carried no price");
                        None
                    }
                    Err(e) => {
                        warn!(ticker = %key.ticker, error = %e, "CoinMarketCap scrape failed");
                        None
                    }
                }
            })
            .buffer_unordered(MAX_IN_FLIGHT)
            .filter_map(|quote| async move { quote })
            .collect()
            .await
    }
}
