use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::asset::{AssetKey, AssetType, Market};
use crate::errors::CoreError;

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    Buy,
    Sell,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::Buy => write!(f, "Buy"),
            TransactionKind::Sell => write!(f, "Sell"),
        }
    }
}

/// One immutable buy or sell of a listed asset or crypto.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,

    /// Uppercased ticker symbol
    pub ticker: String,

    pub asset_type: AssetType,

    /// `None` for crypto
    pub market: Option<Market>,

    pub kind: TransactionKind,

    /// Units traded (always positive, fractional units allowed)
    pub quantity: Decimal,

    /// Price per unit in the currency the asset was traded in
    pub price: Decimal,

    /// Brokerage fees and similar costs, added to the cost basis of buys
    #[serde(default)]
    pub other_costs: Option<Decimal>,

    pub date: NaiveDate,
}

impl Transaction {
    /// Build and validate a transaction against `today`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ticker: &str,
        asset_type: AssetType,
        market: Option<Market>,
        kind: TransactionKind,
        quantity: Decimal,
        price: Decimal,
        other_costs: Option<Decimal>,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<Self, CoreError> {
        let tx = Self {
            id: Uuid::new_v4(),
            ticker: ticker.trim().to_uppercase(),
            asset_type,
            market,
            kind,
            quantity,
            price,
            other_costs,
            date,
        };
        tx.validate(today)?;
        Ok(tx)
    }

    pub fn buy(
        key: &AssetKey,
        quantity: Decimal,
        price: Decimal,
        other_costs: Option<Decimal>,
        date: NaiveDate,
    ) -> Self {
        Self::unchecked(key, TransactionKind::Buy, quantity, price, other_costs, date)
    }

    pub fn sell(key: &AssetKey, quantity: Decimal, price: Decimal, date: NaiveDate) -> Self {
        Self::unchecked(key, TransactionKind::Sell, quantity, price, None, date)
    }

    fn unchecked(
        key: &AssetKey,
        kind: TransactionKind,
        quantity: Decimal,
        price: Decimal,
        other_costs: Option<Decimal>,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticker: key.ticker.clone(),
            asset_type: key.asset_type,
            market: key.market,
            kind,
            quantity,
            price,
            other_costs,
            date,
        }
    }

    /// The grouping key of this transaction.
    pub fn key(&self) -> AssetKey {
        AssetKey::new(self.ticker.clone(), self.asset_type, self.market)
    }

    /// Check field invariants.
    ///
    /// Rules:
    /// - Ticker must be non-empty
    /// - Fixed-income assets are not traded through transactions
    /// - Listed assets need a market
    /// - Quantity and price must be positive, other costs non-negative
    /// - Date must not be after `today`
    pub fn validate(&self, today: NaiveDate) -> Result<(), CoreError> {
        if self.ticker.trim().is_empty() {
            return Err(CoreError::Validation("Ticker must not be empty".into()));
        }
        if self.asset_type == AssetType::FixedIncome {
            return Err(CoreError::Validation(
                "Fixed-income assets are recorded as fixed-income holdings, not transactions".into(),
            ));
        }
        if self.asset_type != AssetType::Crypto && self.market.is_none() {
            return Err(CoreError::Validation(format!(
                "{} {} requires a market",
                self.asset_type, self.ticker
            )));
        }
        if self.quantity <= Decimal::ZERO {
            return Err(CoreError::Validation(format!(
                "Quantity must be positive, got {}",
                self.quantity
            )));
        }
        if self.price <= Decimal::ZERO {
            return Err(CoreError::Validation(format!(
                "Price must be positive, got {}",
                self.price
            )));
        }
        if self.other_costs.is_some_and(|c| c < Decimal::ZERO) {
            return Err(CoreError::Validation("Other costs must not be negative".into()));
        }
        if self.date > today {
            return Err(CoreError::Validation(format!(
                "Transaction date {} is in the future",
                self.date
            )));
        }
        Ok(())
    }
}
