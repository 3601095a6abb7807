use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::traits::HolidaySource;
use super::util::http_client;
use crate::errors::CoreError;

const BASE_URL: &str = "https://brasilapi.com.br";
const PROVIDER: &str = "BrasilAPI";

/// National holidays from BrasilAPI (`/api/feriados/v1/{year}`).
pub struct BrasilApiHolidaySource {
    client: Client,
    base_url: String,
}

impl BrasilApiHolidaySource {
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

#[derive(Deserialize)]
struct HolidayEntry {
    date: String,
}

#[async_trait]
impl HolidaySource for BrasilApiHolidaySource {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn holidays(&self, year: i32) -> Result<Vec<NaiveDate>, CoreError> {
        let url = format!("{}/api/feriados/v1/{year}", self.base_url);
        let entries: Vec<HolidayEntry> = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Failed to parse holidays for {year}: {e}"),
            })?;

        entries
            .iter()
            .map(|h| {
                NaiveDate::parse_from_str(&h.date, "%Y-%m-%d")
                    .map_err(|e| CoreError::Parse(format!("Bad holiday date '{}': {e}", h.date)))
            })
            .collect()
    }
}
