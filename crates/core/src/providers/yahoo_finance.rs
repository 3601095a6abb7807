use async_trait::async_trait;
use chrono::{Datelike, Duration as ChronoDuration, NaiveDate};
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};

use super::traits::MarketDataProvider;
use super::util::{decimal_from_f64, valid_price};
use crate::errors::CoreError;
use crate::models::asset::{AssetDescriptor, AssetKey, AssetType, Market};
use crate::models::price::PriceQuote;

const PROVIDER: &str = "Yahoo Finance";
const DOMESTIC_SUFFIX: &str = ".SA";
const HISTORY_LOOKBACK_DAYS: i64 = 7;
const MAX_IN_FLIGHT: usize = 8;

/// Yahoo Finance provider for stock and ETF prices.
///
/// - **Free**: No API key required (unofficial public API).
/// - **Coverage**: B3 listings (".SA" suffix) and US/global equities.
/// - **Data**: Latest quotes, daily history, symbol search.
///
/// Prices come back in the listing's currency: home currency for domestic
/// tickers, USD for foreign ones.
pub struct YahooFinanceProvider {
    connector: yahoo_finance_api::YahooConnector,
}

impl YahooFinanceProvider {
    pub fn new() -> Result<Self, CoreError> {
        let connector = yahoo_finance_api::YahooConnector::new().map_err(|e| CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("Failed to create connector: {e}"),
        })?;
        Ok(Self { connector })
    }

    /// Yahoo symbol for a key: domestic listings carry the ".SA" suffix.
    pub fn yahoo_symbol(key: &AssetKey) -> String {
        match key.market {
            Some(Market::Domestic) if !key.ticker.ends_with(DOMESTIC_SUFFIX) => {
                format!("{}{DOMESTIC_SUFFIX}", key.ticker)
            }
            _ => key.ticker.clone(),
        }
    }

    /// Map a Yahoo search hit back to our asset model.
    pub fn descriptor_from_search(
        symbol: &str,
        name: &str,
        quote_type: &str,
    ) -> Option<AssetDescriptor> {
        let asset_type = match quote_type.to_uppercase().as_str() {
            "EQUITY" => AssetType::Stock,
            "ETF" => AssetType::Etf,
            _ => return None,
        };
        let upper = symbol.to_uppercase();
        let (ticker, market) = match upper.strip_suffix(DOMESTIC_SUFFIX) {
            Some(base) => (base.to_string(), Market::Domestic),
            None => (upper, Market::Foreign),
        };
        Some(AssetDescriptor {
            ticker,
            name: name.to_string(),
            asset_type,
            market: Some(market),
            source: PROVIDER.to_string(),
        })
    }

    /// Convert a `chrono::NaiveDate` to `time::OffsetDateTime` (midnight UTC).
    fn to_offset_datetime(date: NaiveDate) -> Result<OffsetDateTime, CoreError> {
        let month = time::Month::try_from(date.month() as u8).map_err(|e| CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("Invalid month in {date}: {e}"),
        })?;

        let odt = time::Date::from_calendar_date(date.year(), month, date.day() as u8)
            .map_err(|e| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Invalid date {date}: {e}"),
            })?
            .with_hms(0, 0, 0)
            .map_err(|e| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Invalid time for {date}: {e}"),
            })?
            .assume_utc();
        Ok(odt)
    }

    async fn fetch_current(&self, key: &AssetKey) -> Result<Option<Decimal>, CoreError> {
        let symbol = Self::yahoo_symbol(key);
        let resp = self
            .connector
            .get_latest_quotes(&symbol, "1d")
            .await
            .map_err(|e| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Failed to fetch latest quote for {symbol}: {e}"),
            })?;

        let quote = resp.last_quote().map_err(|e| CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("No quote data for {symbol}: {e}"),
        })?;

        Ok(decimal_from_f64(quote.close))
    }

    async fn fetch_history(&self, key: &AssetKey, date: NaiveDate) -> Result<Option<Decimal>, CoreError> {
        let symbol = Self::yahoo_symbol(key);
        let start = Self::to_offset_datetime(date - ChronoDuration::days(HISTORY_LOOKBACK_DAYS))?;
        let end = Self::to_offset_datetime(date + ChronoDuration::days(1))?;

        let resp = self
            .connector
            .get_quote_history(&symbol, start, end)
            .await
            .map_err(|e| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Failed to fetch history for {symbol} on {date}: {e}"),
            })?;

        let quotes = resp.quotes().map_err(|e| CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("Failed to parse quotes for {symbol}: {e}"),
        })?;

        // Latest session at or before the requested date (weekends/holidays).
        let close = quotes
            .iter()
            .filter_map(|q| {
                let day = chrono::DateTime::from_timestamp(q.timestamp as i64, 0)?.date_naive();
                (day <= date).then_some((day, q.close))
            })
            .max_by_key(|(day, _)| *day)
            .and_then(|(_, close)| decimal_from_f64(close));

        Ok(close)
    }
}

#[async_trait]
impl MarketDataProvider for YahooFinanceProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn supported_asset_types(&self) -> Vec<AssetType> {
        vec![AssetType::Stock, AssetType::Etf]
    }

    #[instrument(name = "YahooFetch", skip_all, fields(count = assets.len()))]
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
                        debug!(ticker = %key.ticker, "Yahoo returned a non-finite close");
                        None
                    }
                    Err(e) => {
                        warn!(ticker = %key.ticker, error = %e, "Yahoo price fetch failed");
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
                warn!(ticker = %asset.ticker, %date, error = %e, "Yahoo history fetch failed");
                None
            }
        }
    }

    async fn search(&self, term: &str) -> Vec<AssetDescriptor> {
        match self.connector.search_ticker(term).await {
            Ok(result) => result
                .quotes
                .iter()
                .filter_map(|q| Self::descriptor_from_search(&q.symbol, &q.short_name, &q.quote_type))
                .collect(),
            Err(e) => {
                warn!(term, error = %e, "Yahoo search failed");
                Vec::new()
            }
        }
    }
}
