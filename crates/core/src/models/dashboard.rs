use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::asset::{AssetType, Market};
use super::position::AssetPosition;

/// Totals across the whole portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    /// Total market value in the home currency
    pub total_value: Decimal,

    /// Total cost basis of everything still held
    pub total_invested: Decimal,

    /// total_value - total_invested
    pub profit_or_loss: Decimal,

    /// (profit_or_loss / total_invested) * 100
    pub profitability: Decimal,

    /// Number of positions
    pub positions: usize,
}

/// Presentation bucket for a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    DomesticStocks,
    ForeignStocks,
    Etfs,
    Crypto,
    FixedIncome,
}

impl Category {
    pub fn of(asset_type: AssetType, market: Option<Market>) -> Self {
        match asset_type {
            AssetType::Stock if market == Some(Market::Foreign) => Category::ForeignStocks,
            AssetType::Stock => Category::DomesticStocks,
            AssetType::Etf => Category::Etfs,
            AssetType::Crypto => Category::Crypto,
            AssetType::FixedIncome => Category::FixedIncome,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::DomesticStocks => write!(f, "Domestic stocks"),
            Category::ForeignStocks => write!(f, "Foreign stocks"),
            Category::Etfs => write!(f, "ETFs"),
            Category::Crypto => write!(f, "Crypto"),
            Category::FixedIncome => write!(f, "Fixed income"),
        }
    }
}

/// A position together with its share of the enclosing category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionAllocation {
    pub position: AssetPosition,
    /// current_value / category current_value * 100
    pub allocation_pct: Decimal,
}

/// One branch of the allocation tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryNode {
    pub category: Category,
    pub total_value: Decimal,
    pub total_invested: Decimal,
    pub profit_or_loss: Decimal,
    /// category total_value / portfolio total_value * 100
    pub allocation_pct: Decimal,
    /// Sorted by current value, largest first
    pub positions: Vec<PositionAllocation>,
}

/// Summary plus the category/allocation tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub summary: PortfolioSummary,
    /// Sorted by category order; empty categories are omitted
    pub categories: Vec<CategoryNode>,
}
