use reqwest::Client;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) investment-tracker/0.1";

/// Shared HTTP client configuration for all providers.
pub fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Parse a plain decimal string as returned by JSON APIs ("43210.12", "1.2e-5").
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
}

/// Parse a human-formatted price as shown on web pages.
///
/// Handles currency prefixes and both separator conventions:
/// "$43,210.12", "R$ 1.234,56", "38,45", "0.000123".
pub fn parse_display_price(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.' || *c == '-')
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let last_comma = cleaned.rfind(',');
    let last_dot = cleaned.rfind('.');
    let normalized = match (last_comma, last_dot) {
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(c), None) => {
            let decimals = cleaned.len() - c - 1;
            if cleaned.matches(',').count() == 1 && decimals != 3 {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        (None, Some(_)) if cleaned.matches('.').count() > 1 => cleaned.replace('.', ""),
        _ => cleaned,
    };

    parse_decimal(&normalized)
}

/// A quote must be strictly positive; anything else is a broken page or feed.
pub fn valid_price(provider: &str, ticker: &str, price: Decimal) -> Option<Decimal> {
    if price > Decimal::ZERO {
        Some(price)
    } else {
        warn!(provider, ticker, %price, "Ignoring non-positive price");
        None
    }
}

/// Convert a provider's binary float into a decimal, dropping float noise.
pub fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::try_from(value).ok().map(|d| d.round_dp(8).normalize())
}
