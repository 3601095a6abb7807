use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use super::traits::ExchangeRateSource;
use super::util::{decimal_from_f64, http_client};
use crate::errors::CoreError;
use crate::models::price::DatedValue;

const BASE_URL: &str = "https://api.frankfurter.dev/v1";
const PROVIDER: &str = "Frankfurter";

/// Frankfurter API source for fiat exchange rates.
///
/// - **Free**: No API key, no rate limits, open-source.
/// - **Source**: European Central Bank (ECB) reference rates, business days only.
/// - **Endpoints**: `/latest`, `/{start}..{end}`
pub struct FrankfurterRateSource {
    client: Client,
    base_url: String,
}

impl FrankfurterRateSource {
    pub fn new(timeout: Duration) -> Self {
        Self::with_base_url(BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

// ── Frankfurter API response types ──────────────────────────────────

#[derive(Deserialize)]
struct RatesResponse {
    rates: HashMap<String, f64>,
}

#[derive(Deserialize)]
struct TimeSeriesResponse {
    rates: HashMap<String, HashMap<String, f64>>,
}

#[async_trait]
impl ExchangeRateSource for FrankfurterRateSource {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn spot_rate(&self, base: &str, quote: &str) -> Result<Decimal, CoreError> {
        let base = base.to_uppercase();
        let target = quote.to_uppercase();

        if base == target {
            return Ok(Decimal::ONE);
        }

        let url = format!("{}/latest?base={base}&symbols={target}", self.base_url);

        let resp: RatesResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Failed to parse response for {base}/{target}: {e}"),
            })?;

        resp.rates
            .get(&target)
            .copied()
            .and_then(decimal_from_f64)
            .ok_or_else(|| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("No rate found for {base} → {target}"),
            })
    }

    async fn rate_series(
        &self,
        base: &str,
        quote: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DatedValue>, CoreError> {
        let base = base.to_uppercase();
        let target = quote.to_uppercase();

        let from_str = from.format("%Y-%m-%d");
        let to_str = to.format("%Y-%m-%d");
        let url = format!(
            "{}/{from_str}..{to_str}?base={base}&symbols={target}",
            self.base_url
        );

        let resp: TimeSeriesResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Failed to parse time series for {base}/{target}: {e}"),
            })?;

        let mut points: Vec<DatedValue> = resp
            .rates
            .iter()
            .filter_map(|(date_str, rates)| {
                let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").ok()?;
                let value = rates.get(&target).copied().and_then(decimal_from_f64)?;
                Some(DatedValue { date, value })
            })
            .collect();

        points.sort_by_key(|p| p.date);
        Ok(points)
    }
}
