use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate};
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use reqwest::{Client, RequestBuilder};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::traits::MarketDataProvider;
use super::util::{http_client, parse_decimal, valid_price};
use crate::errors::CoreError;
use crate::models::asset::{AssetDescriptor, AssetKey, AssetType};
use crate::models::price::PriceQuote;

const BASE_URL: &str = "https://api.coincap.io/v2";
const PROVIDER: &str = "CoinCap";
const MAX_IN_FLIGHT: usize = 8;

/// CoinCap API provider for cryptocurrency prices (USD).
///
/// - **Free**: works anonymously; an optional API key raises rate limits.
/// - **Endpoints**: `/assets`, `/assets/{id}`, `/assets/{id}/history`, `/assets?search=`
///
/// CoinCap addresses coins by lowercase ids ("bitcoin"). The symbol → id
/// table is seeded with common coins and filled from `/assets` by
/// `initialize()`; symbols missing from it are skipped, never guessed.
pub struct CoinCapProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    symbol_map: DashMap<String, String>,
}

impl CoinCapProvider {
    pub fn new(timeout: Duration) -> Self {
        Self::with_base_url(BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Self {
        let symbol_map = DashMap::new();
        let common = [
            ("BTC", "bitcoin"),
            ("ETH", "ethereum"),
            ("USDT", "tether"),
            ("USDC", "usd-coin"),
            ("BNB", "binance-coin"),
            ("XRP", "xrp"),
            ("ADA", "cardano"),
            ("SOL", "solana"),
            ("DOGE", "dogecoin"),
            ("DOT", "polkadot"),
            ("MATIC", "polygon"),
            ("LTC", "litecoin"),
            ("AVAX", "avalanche"),
            ("LINK", "chainlink"),
            ("UNI", "uniswap"),
            ("ATOM", "cosmos"),
            ("XLM", "stellar"),
            ("SHIB", "shiba-inu"),
            ("TRX", "tron"),
            ("DAI", "multi-collateral-dai"),
        ];
        for (sym, id) in common {
            symbol_map.insert(sym.to_string(), id.to_string());
        }

        Self {
            client: http_client(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            symbol_map,
        }
    }

    /// Send `key` as a bearer token (raises the anonymous rate limit).
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    fn get(&self, url: String) -> RequestBuilder {
        let request = self.client.get(url);
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Resolve a symbol like "BTC" to a CoinCap id like "bitcoin".
    pub fn resolve_id(&self, symbol: &str) -> Option<String> {
        self.symbol_map
            .get(&symbol.to_uppercase())
            .map(|id| id.value().clone())
    }

    pub fn known_symbols(&self) -> usize {
        self.symbol_map.len()
    }

    async fn fetch_current(&self, key: &AssetKey) -> Result<Option<Decimal>, CoreError> {
        let Some(id) = self.resolve_id(&key.ticker) else {
            warn!(ticker = %key.ticker, "No CoinCap id mapped for ticker, skipping");
            return Ok(None);
        };
        let url = format!("{}/assets/{id}", self.base_url);

        let resp: AssetResponse = self
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Failed to parse response for {}: {e}", key.ticker),
            })?;

        Ok(resp.data.price_usd.as_deref().and_then(parse_decimal))
    }

    async fn fetch_history(&self, key: &AssetKey, date: NaiveDate) -> Result<Option<Decimal>, CoreError> {
        let Some(id) = self.resolve_id(&key.ticker) else {
            warn!(ticker = %key.ticker, "No CoinCap id mapped for ticker, skipping history");
            return Ok(None);
        };
        // A week-long window covers gaps in the daily series.
        let from = date - ChronoDuration::days(7);
        let start = from
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp_millis())
            .unwrap_or_default();
        let end = date
            .and_hms_opt(23, 59, 59)
            .map(|dt| dt.and_utc().timestamp_millis())
            .unwrap_or_default();

        let url = format!(
            "{}/assets/{id}/history?interval=d1&start={start}&end={end}",
            self.base_url
        );

        let resp: HistoryResponse = self
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Failed to parse history for {}: {e}", key.ticker),
            })?;

        let price = resp
            .data
            .iter()
            .filter_map(|p| {
                let day = chrono::DateTime::from_timestamp_millis(p.time)?.date_naive();
                (day <= date).then_some((day, p))
            })
            .max_by_key(|(day, _)| *day)
            .and_then(|(_, p)| parse_decimal(&p.price_usd));

        Ok(price)
    }

    async fn search_assets(&self, term: &str) -> Result<Vec<AssetDescriptor>, CoreError> {
        let resp: AssetsListResponse = self
            .get(format!("{}/assets", self.base_url))
            .query(&[("search", term), ("limit", "10")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Failed to parse search results for '{term}': {e}"),
            })?;

        Ok(resp
            .data
            .into_iter()
            .map(|entry| {
                let symbol = entry.symbol.to_uppercase();
                self.symbol_map.entry(symbol.clone()).or_insert(entry.id);
                AssetDescriptor {
                    ticker: symbol,
                    name: entry.name,
                    asset_type: AssetType::Crypto,
                    market: None,
                    source: PROVIDER.to_string(),
                }
            })
            .collect())
    }
}

// ── CoinCap API response types ──────────────────────────────────────

#[derive(Deserialize)]
struct AssetResponse {
    data: AssetData,
}

#[derive(Deserialize)]
struct AssetData {
    #[serde(rename = "priceUsd")]
    price_usd: Option<String>,
}

#[derive(Deserialize)]
struct HistoryResponse {
    data: Vec<HistoryPoint>,
}

#[derive(Deserialize)]
struct HistoryPoint {
    #[serde(rename = "priceUsd")]
    price_usd: String,
    time: i64, // unix timestamp in milliseconds
}

#[derive(Deserialize)]
struct AssetsListResponse {
    data: Vec<AssetListEntry>,
}

#[derive(Deserialize)]
struct AssetListEntry {
    id: String,
    symbol: String,
    #[serde(default)]
    name: String,
}

#[async_trait]
impl MarketDataProvider for CoinCapProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn supported_asset_types(&self) -> Vec<AssetType> {
        vec![AssetType::Crypto]
    }

    async fn initialize(&self) -> Result<(), CoreError> {
        let resp: AssetsListResponse = self
            .get(format!("{}/assets", self.base_url))
            .query(&[("limit", "2000")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Failed to parse asset list: {e}"),
            })?;

        // Ranked list: keep the first (largest) coin for duplicated symbols.
        for entry in resp.data {
            self.symbol_map
                .entry(entry.symbol.to_uppercase())
                .or_insert(entry.id);
        }
        info!(symbols = self.symbol_map.len(), "CoinCap symbol map loaded");
        Ok(())
    }

    #[instrument(name = "CoinCapFetch", skip_all, fields(count = assets.len()))]
    async fn fetch_prices(&self, assets: &[AssetKey]) -> Vec<PriceQuote> {
        let supported: Vec<AssetKey> = assets.iter().filter(|a| self.supports(a.asset_type)).cloned().collect();
        stream::iter(supported)
            .map(|key| async move {
                match self.fetch_current(&key).await {
                    Ok(Some(price)) => valid_price(PROVIDER, &key.ticker, price).map(|price| PriceQuote {
                        key: key.clone(),
                        price,
                        source: PROVIDER.to_string(),
                    }),
                    Ok(None) => {
                        debug!(ticker = %key.ticker, "CoinCap returned no price");
                        None
                    }
                    Err(e) => {
                        warn!(ticker = %key.ticker, error = %e, "CoinCap price fetch failed");
                        None
                    }
                }
            })
            .buffer_unordered(MAX_IN_FLIGHT)
            .filter_map(|quote| async move { quote })
            .collect()
            .await
    }

    async fn fetch_historical_price(&self, asset: &AssetKey, date: NaiveDate) -> Option<Decimal> {
        match self.fetch_history(asset, date).await {
            Ok(price) => price.and_then(|p| valid_price(PROVIDER, &asset.ticker, p)),
            Err(e) => {
                warn!(ticker = %asset.ticker, %date, error = %e, "CoinCap history fetch failed");
                None
            }
        }
    }

    async fn search(&self, term: &str) -> Vec<AssetDescriptor> {
        match self.search_assets(term).await {
            Ok(results) => results,
            Err(e) => {
                warn!(term, error = %e, "CoinCap search failed");
                Vec::new()
            }
        }
    }
}
