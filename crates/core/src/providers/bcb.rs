use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use super::traits::IndexRateSource;
use super::util::{http_client, parse_decimal};
use crate::errors::CoreError;
use crate::models::fixed_income::IndexType;
use crate::models::price::DatedValue;

const BASE_URL: &str = "https://api.bcb.gov.br";
const PROVIDER: &str = "BCB SGS";

/// SGS series code: CDI daily rate (% per day).
const CDI_SERIES: u32 = 12;
/// SGS series code: IPCA monthly variation (% per month).
const IPCA_SERIES: u32 = 433;

/// Banco Central do Brasil time-series (SGS) source for CDI and IPCA.
pub struct BcbIndexSource {
    client: Client,
    base_url: String,
}

impl BcbIndexSource {
    pub fn new(timeout: Duration) -> Self {
        Self::with_base_url(BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn series_code(index: IndexType) -> Option<u32> {
        match index {
            IndexType::Cdi => Some(CDI_SERIES),
            IndexType::Ipca => Some(IPCA_SERIES),
            IndexType::PreFixed => None,
        }
    }
}

#[derive(Deserialize)]
struct SgsEntry {
    data: String,
    valor: String,
}

#[async_trait]
impl IndexRateSource for BcbIndexSource {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn series(
        &self,
        index: IndexType,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DatedValue>, CoreError> {
        let Some(code) = Self::series_code(index) else {
            return Ok(Vec::new());
        };
        let url = format!("{}/dados/serie/bcdata.sgs.{code}/dados", self.base_url);
        let start = from.format("%d/%m/%Y").to_string();
        let end = to.format("%d/%m/%Y").to_string();

        let entries: Vec<SgsEntry> = self
            .client
            .get(&url)
            .query(&[
                ("formato", "json"),
                ("dataInicial", start.as_str()),
                ("dataFinal", end.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Failed to parse {index} series: {e}"),
            })?;

        let mut points: Vec<DatedValue> = entries
            .iter()
            .filter_map(|entry| {
                let parsed = NaiveDate::parse_from_str(&entry.data, "%d/%m/%Y")
                    .ok()
                    .zip(parse_decimal(&entry.valor));
                if parsed.is_none() {
                    warn!(index = %index, date = %entry.data, value = %entry.valor, "Skipping malformed SGS sample");
                }
                parsed.map(|(date, value)| DatedValue { date, value })
            })
            .collect();

        points.sort_by_key(|p| p.date);
        Ok(points)
    }
}
