use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use tracing::{debug, instrument, warn};

use super::scraping::ScrapePool;
use super::traits::MarketDataProvider;
use super::util::valid_price;
use crate::models::asset::{AssetKey, AssetType, Market};
use crate::models::price::PriceQuote;

const BASE_URL: &str = "https://www.google.com";
const PROVIDER: &str = "Google Finance";
const MAX_IN_FLIGHT: usize = 4;

const PRICE_SELECTORS: &[&str] = &["div.YMlKec.fxKbKc", "div.YMlKec"];

/// Scrapes Google Finance quote pages for current stock and ETF prices.
///
/// Fallback for the stock API provider: no history, no search. Foreign
/// tickers are tried on each US exchange in turn until a page yields a price.
pub struct GoogleFinanceScraper {
    pool: ScrapePool,
    base_url: String,
}

impl GoogleFinanceScraper {
    pub fn new(pool: ScrapePool) -> Self {
        Self::with_base_url(BASE_URL, pool)
    }

    pub fn with_base_url(base_url: &str, pool: ScrapePool) -> Self {
        Self {
            pool,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Exchanges to try for a key, in order.
    pub fn exchanges_for(key: &AssetKey) -> &'static [&'static str] {
        match (key.market, key.asset_type) {
            (Some(Market::Domestic), _) => &["BVMF"],
            (_, AssetType::Etf) => &["NYSEARCA", "NASDAQ", "BATS"],
            _ => &["NASDAQ", "NYSE"],
        }
    }

    async fn scrape(&self, key: &AssetKey) -> Option<Decimal> {
        for exchange in Self::exchanges_for(key) {
            let url = format!("{}/finance/quote/{}:{exchange}", self.base_url, key.ticker);
            match self.pool.scrape_price(&url, PRICE_SELECTORS).await {
                Ok(Some(price)) => {
                    if let Some(price) = valid_price(PROVIDER, &key.ticker, price) {
                        return Some(price);
                    }
                }
                Ok(None) => debug!(ticker = %key.ticker, exchange, "No price on Google Finance page"),
                Err(e) => warn!(ticker = %key.ticker, exchange, error = %e, "Google Finance scrape failed"),
            }
        }
        None
    }
}

#[async_trait]
impl MarketDataProvider for GoogleFinanceScraper {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn supported_asset_types(&self) -> Vec<AssetType> {
        vec![AssetType::Stock, AssetType::Etf]
    }

    #[instrument(name = "GoogleFinanceScrape", skip_all, fields(count = assets.len()))]
    async fn fetch_prices(&self, assets: &[AssetKey]) -> Vec<PriceQuote> {
        let supported: Vec<AssetKey> = assets.iter().filter(|a| self.supports(a.asset_type)).cloned().collect();
        stream::iter(supported)
            .map(|key| async move {
                self.scrape(&key).await.map(|price| PriceQuote {
                    key: key.clone(),
                    price,
                    source: PROVIDER.to_string(),
                })
            })
            .buffer_unordered(MAX_IN_FLIGHT)
            .filter_map(|quote| async move { quote })
            .collect()
            .await
    }
}
