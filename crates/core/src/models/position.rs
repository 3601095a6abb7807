use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::asset::{AssetType, Market};

/// Consolidated view of one asset at a point in time. Derived, never stored.
///
/// All monetary fields except `average_price` and `current_price` are in the
/// home currency. A position only exists while `quantity > 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetPosition {
    /// Ticker, or the name of a fixed-income holding
    pub ticker: String,

    pub asset_type: AssetType,

    pub market: Option<Market>,

    /// Units held (1 for fixed income)
    pub quantity: Decimal,

    /// Cost basis per unit, in the currency the asset was traded in
    pub average_price: Decimal,

    /// Market price per unit, in the asset's native currency
    pub current_price: Decimal,

    /// Cost basis of the units still held
    pub total_invested: Decimal,

    pub current_value: Decimal,

    pub profit_or_loss: Decimal,

    /// `profit_or_loss / total_invested × 100`, 0 when nothing is invested
    pub profitability: Decimal,

    /// No price could be resolved; current value falls back to cost basis
    #[serde(default)]
    pub stale: bool,
}

impl AssetPosition {
    pub fn profitability_of(profit: Decimal, invested: Decimal) -> Decimal {
        if invested.is_zero() {
            Decimal::ZERO
        } else {
            profit / invested * Decimal::ONE_HUNDRED
        }
    }
}

/// One snapshot in the portfolio evolution series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionPoint {
    pub date: NaiveDate,
    /// Total market value of the portfolio at `date`
    pub total_value: Decimal,
    /// Total cost basis of the portfolio at `date`
    pub total_invested: Decimal,
    /// Number of positions making up the snapshot
    pub positions: usize,
}
