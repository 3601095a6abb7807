use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::errors::CoreError;
use crate::models::asset::{AssetDescriptor, AssetKey, AssetType};
use crate::models::fixed_income::IndexType;
use crate::models::price::{DatedValue, PriceQuote};

/// Contract for every market-data source (API client or page scraper).
///
/// Providers never fail a call for "no data": a missing quote is simply
/// absent from the returned batch, a missing historical price is `None`.
/// Per-item errors are logged inside the provider and do not affect
/// sibling items of the same batch.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider (for logs).
    fn name(&self) -> &str;

    /// Which asset types this provider can price.
    fn supported_asset_types(&self) -> Vec<AssetType>;

    fn supports(&self, asset_type: AssetType) -> bool {
        self.supported_asset_types().contains(&asset_type)
    }

    /// One-time setup (e.g., loading a ticker → internal id table).
    /// A failure leaves the provider usable with whatever it already knows.
    async fn initialize(&self) -> Result<(), CoreError> {
        Ok(())
    }

    /// Current prices for a batch, in each asset's native currency.
    /// Assets that cannot be resolved are omitted.
    async fn fetch_prices(&self, assets: &[AssetKey]) -> Vec<PriceQuote>;

    /// Closing price on `date` (or the nearest trading day before it).
    /// Providers without history return `None`.
    async fn fetch_historical_price(&self, _asset: &AssetKey, _date: NaiveDate) -> Option<Decimal> {
        None
    }

    /// Assets matching `term`. Providers without search return nothing.
    async fn search(&self, _term: &str) -> Vec<AssetDescriptor> {
        Vec::new()
    }
}

/// Source of fiat exchange rates.
#[async_trait]
pub trait ExchangeRateSource: Send + Sync {
    fn name(&self) -> &str;

    /// Latest `base → quote` rate.
    async fn spot_rate(&self, base: &str, quote: &str) -> Result<Decimal, CoreError>;

    /// Daily `base → quote` rates for `[from, to]`; non-trading days are absent.
    async fn rate_series(
        &self,
        base: &str,
        quote: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DatedValue>, CoreError>;
}

/// Source of national holidays.
#[async_trait]
pub trait HolidaySource: Send + Sync {
    fn name(&self) -> &str;

    async fn holidays(&self, year: i32) -> Result<Vec<NaiveDate>, CoreError>;
}

/// Source of reference index rates (CDI daily %, IPCA monthly %).
#[async_trait]
pub trait IndexRateSource: Send + Sync {
    fn name(&self) -> &str;

    /// Samples dated within `[from, to]`, values in percent.
    async fn series(
        &self,
        index: IndexType,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DatedValue>, CoreError>;
}
