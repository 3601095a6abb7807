use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::errors::CoreError;

/// Runtime configuration for the valuation engine.
///
/// Loading the JSON text (file, env, etc.) is the caller's job; this type
/// only parses and validates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// The currency in which all portfolio values are reported (e.g., "BRL").
    pub home_currency: String,

    /// Optional API keys for providers that require them.
    pub api_keys: HashMap<String, String>,

    /// Upper bound for a single provider call before it counts as "no result".
    pub provider_timeout_secs: u64,

    /// Period of the scheduled background price refresh.
    pub refresh_interval_secs: u64,

    /// First and last year (inclusive) of the holiday calendar.
    pub holiday_years: (i32, i32),

    /// Maximum number of page scrapes running at once.
    pub scrape_concurrency: usize,

    /// Convert crypto cost basis from USD to the home currency.
    /// Off by default: crypto is assumed to be bought in the home currency.
    pub convert_crypto_invested: bool,

    /// Number of monthly snapshots in the evolution series (plus today).
    pub evolution_months: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            home_currency: "BRL".to_string(),
            api_keys: HashMap::new(),
            provider_timeout_secs: 15,
            refresh_interval_secs: 300,
            holiday_years: (2015, 2035),
            scrape_concurrency: 4,
            convert_crypto_invested: false,
            evolution_months: 12,
        }
    }
}

impl Settings {
    /// Parse settings from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let mut settings: Settings = serde_json::from_str(json)
            .map_err(|e| CoreError::Configuration(format!("Malformed settings: {e}")))?;
        settings.home_currency = settings.home_currency.trim().to_uppercase();
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let code = &self.home_currency;
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CoreError::Configuration(format!(
                "Invalid currency code '{code}': must be exactly 3 ASCII letters (e.g., BRL, USD)"
            )));
        }
        if self.provider_timeout_secs == 0 {
            return Err(CoreError::Configuration("provider_timeout_secs must be > 0".into()));
        }
        if self.refresh_interval_secs == 0 {
            return Err(CoreError::Configuration("refresh_interval_secs must be > 0".into()));
        }
        if self.scrape_concurrency == 0 {
            return Err(CoreError::Configuration("scrape_concurrency must be > 0".into()));
        }
        let (from, to) = self.holiday_years;
        if from > to {
            return Err(CoreError::Configuration(format!(
                "holiday_years start {from} is after end {to}"
            )));
        }
        Ok(())
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}
