use chrono::{Duration, NaiveDate};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use crate::models::price::DatedSeries;
use crate::providers::traits::ExchangeRateSource;

/// Currency that foreign listings and crypto are quoted in.
pub const QUOTE_CURRENCY: &str = "USD";

/// Days fetched before a requested date so that weekends and holiday
/// stretches still have a sample at or before it.
const LOOKBACK_DAYS: i64 = 14;

/// Serves USD → home-currency rates, current and historical.
///
/// - The spot rate is fetched on every valuation; a failed fetch falls back
///   to the last good value.
/// - Historical rates are cached by the *requested* date for the process
///   lifetime, since past rates never change.
/// - An unavailable rate is `None`, never 1.
pub struct CurrencyService {
    source: Arc<dyn ExchangeRateSource>,
    home_currency: String,
    spot: RwLock<Option<Decimal>>,
    series: RwLock<DatedSeries>,
    fetched_windows: RwLock<Vec<(NaiveDate, NaiveDate)>>,
    historical: DashMap<NaiveDate, Decimal>,
}

impl CurrencyService {
    pub fn new(source: Arc<dyn ExchangeRateSource>, home_currency: &str) -> Self {
        Self {
            source,
            home_currency: home_currency.to_uppercase(),
            spot: RwLock::new(None),
            series: RwLock::new(DatedSeries::new()),
            fetched_windows: RwLock::new(Vec::new()),
            historical: DashMap::new(),
        }
    }

    pub fn home_currency(&self) -> &str {
        &self.home_currency
    }

    fn is_identity(&self) -> bool {
        self.home_currency == QUOTE_CURRENCY
    }

    /// Fetch the spot rate from the source. On failure returns `None` and
    /// leaves the previously cached rate in place.
    pub async fn fetch_current_rate(&self) -> Option<Decimal> {
        if self.is_identity() {
            return Some(Decimal::ONE);
        }
        match self.source.spot_rate(QUOTE_CURRENCY, &self.home_currency).await {
            Ok(rate) if rate > Decimal::ZERO => {
                *self.spot.write().unwrap_or_else(|e| e.into_inner()) = Some(rate);
                debug!(%rate, currency = %self.home_currency, "Spot rate refreshed");
                Some(rate)
            }
            Ok(rate) => {
                warn!(%rate, source = self.source.name(), "Ignoring non-positive spot rate");
                None
            }
            Err(e) => {
                warn!(source = self.source.name(), error = %e, "Spot rate fetch failed");
                None
            }
        }
    }

    /// Most recently cached spot rate, without I/O.
    pub fn cached_rate(&self) -> Option<Decimal> {
        if self.is_identity() {
            return Some(Decimal::ONE);
        }
        *self.spot.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Fresh spot rate, or the last good one when the source fails.
    pub async fn current_rate(&self) -> Option<Decimal> {
        match self.fetch_current_rate().await {
            Some(rate) => Some(rate),
            None => {
                let cached = self.cached_rate();
                if cached.is_some() {
                    debug!(currency = %self.home_currency, "Using last cached spot rate");
                }
                cached
            }
        }
    }

    /// Rate of the nearest trading day at or before `date`.
    pub async fn fetch_historical_rate(&self, date: NaiveDate) -> Option<Decimal> {
        if self.is_identity() {
            return Some(Decimal::ONE);
        }
        if let Some(rate) = self.historical.get(&date) {
            return Some(*rate);
        }

        if !self.window_fetched(date) {
            self.preload_history(date - Duration::days(LOOKBACK_DAYS), date).await;
        }

        let rate = self
            .series
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .at_or_before(date)
            .filter(|sample| (date - sample.date).num_days() <= LOOKBACK_DAYS)
            .map(|sample| sample.value);

        match rate {
            Some(rate) => {
                self.historical.insert(date, rate);
                Some(rate)
            }
            None => {
                warn!(%date, currency = %self.home_currency, "No historical exchange rate available");
                None
            }
        }
    }

    /// Fetch and merge the series for `[from, to]` in one call.
    /// Returns false when the source failed.
    pub async fn preload_history(&self, from: NaiveDate, to: NaiveDate) -> bool {
        if self.is_identity() || from > to {
            return true;
        }
        match self
            .source
            .rate_series(QUOTE_CURRENCY, &self.home_currency, from, to)
            .await
        {
            Ok(points) => {
                debug!(%from, %to, samples = points.len(), "Exchange-rate history loaded");
                self.series
                    .write()
                    .unwrap_or_else(|e| e.into_inner())
                    .merge(points);
                self.fetched_windows
                    .write()
                    .unwrap_or_else(|e| e.into_inner())
                    .push((from, to));
                true
            }
            Err(e) => {
                warn!(%from, %to, source = self.source.name(), error = %e, "Exchange-rate history fetch failed");
                false
            }
        }
    }

    /// A fetched window contains both `date` and its lookback span.
    fn window_fetched(&self, date: NaiveDate) -> bool {
        let lookback_start = date - Duration::days(LOOKBACK_DAYS);
        self.fetched_windows
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|(from, to)| *from <= lookback_start && date <= *to)
    }

    pub fn cached_historical_rates(&self) -> usize {
        self.historical.len()
    }
}

/// Multiply by `rate` if present; `None` propagates as "unknown".
pub fn convert(amount: Decimal, rate: Option<Decimal>) -> Option<Decimal> {
    rate.map(|r| amount * r)
}
