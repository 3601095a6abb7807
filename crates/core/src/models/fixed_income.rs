use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// How a fixed-income instrument accrues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexType {
    /// Contracted rate is an annual percentage (e.g., 12.5 = 12.5% a.a.)
    PreFixed,
    /// Contracted rate is a percentage of the daily CDI (e.g., 110 = 110% CDI)
    Cdi,
    /// Contracted rate is an annual real spread over IPCA (e.g., 6 = IPCA + 6%)
    Ipca,
}

impl std::fmt::Display for IndexType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexType::PreFixed => write!(f, "Pre-fixed"),
            IndexType::Cdi => write!(f, "CDI"),
            IndexType::Ipca => write!(f, "IPCA"),
        }
    }
}

/// One fixed-income holding, identified by its unique name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedIncomeAsset {
    pub name: String,
    pub invested_amount: Decimal,
    pub investment_date: NaiveDate,
    pub maturity_date: NaiveDate,
    pub daily_liquidity: bool,
    pub index_type: IndexType,
    /// Percentage; meaning depends on `index_type`
    pub contracted_rate: Decimal,
}

impl FixedIncomeAsset {
    pub fn new(
        name: impl Into<String>,
        invested_amount: Decimal,
        investment_date: NaiveDate,
        maturity_date: NaiveDate,
        index_type: IndexType,
        contracted_rate: Decimal,
    ) -> Self {
        Self {
            name: name.into().trim().to_string(),
            invested_amount,
            investment_date,
            maturity_date,
            daily_liquidity: false,
            index_type,
            contracted_rate,
        }
    }

    pub fn with_daily_liquidity(mut self, daily_liquidity: bool) -> Self {
        self.daily_liquidity = daily_liquidity;
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.is_empty() {
            return Err(CoreError::Validation("Fixed-income name must not be empty".into()));
        }
        if self.invested_amount <= Decimal::ZERO {
            return Err(CoreError::Validation(format!(
                "Invested amount must be positive, got {}",
                self.invested_amount
            )));
        }
        if self.maturity_date < self.investment_date {
            return Err(CoreError::Validation(format!(
                "Maturity {} precedes investment date {}",
                self.maturity_date, self.investment_date
            )));
        }
        if self.contracted_rate < Decimal::ZERO {
            return Err(CoreError::Validation("Contracted rate must not be negative".into()));
        }
        Ok(())
    }
}

/// Result of accruing a fixed-income asset up to a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedIncomeValuation {
    pub gross_value: Decimal,
    pub tax_amount: Decimal,
    pub net_value: Decimal,
}

impl FixedIncomeValuation {
    /// No accrual: gross and net both equal the invested amount.
    pub fn flat(invested: Decimal) -> Self {
        Self {
            gross_value: invested,
            tax_amount: Decimal::ZERO,
            net_value: invested,
        }
    }
}
