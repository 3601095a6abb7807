use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::models::dashboard::{Category, CategoryNode, Dashboard, PortfolioSummary, PositionAllocation};
use crate::models::position::AssetPosition;

/// Aggregates computed positions into totals and an allocation tree.
///
/// Pure: no I/O. Percentages are 0 when the denominator is 0.
pub struct DashboardService;

impl DashboardService {
    pub fn summary(positions: &[AssetPosition]) -> PortfolioSummary {
        let total_value: Decimal = positions.iter().map(|p| p.current_value).sum();
        let total_invested: Decimal = positions.iter().map(|p| p.total_invested).sum();
        let profit_or_loss = total_value - total_invested;

        PortfolioSummary {
            total_value,
            total_invested,
            profit_or_loss,
            profitability: AssetPosition::profitability_of(profit_or_loss, total_invested),
            positions: positions.len(),
        }
    }

    /// Group positions by category, in category order.
    /// Categories without positions are left out.
    pub fn build(positions: &[AssetPosition]) -> Dashboard {
        let summary = Self::summary(positions);

        let mut grouped: BTreeMap<Category, Vec<&AssetPosition>> = BTreeMap::new();
        for position in positions {
            grouped
                .entry(Category::of(position.asset_type, position.market))
                .or_default()
                .push(position);
        }

        let categories = grouped
            .into_iter()
            .map(|(category, members)| {
                let total_value: Decimal = members.iter().map(|p| p.current_value).sum();
                let total_invested: Decimal = members.iter().map(|p| p.total_invested).sum();

                let mut positions: Vec<PositionAllocation> = members
                    .into_iter()
                    .map(|p| PositionAllocation {
                        position: p.clone(),
                        allocation_pct: percentage(p.current_value, total_value),
                    })
                    .collect();
                positions.sort_by(|a, b| b.position.current_value.cmp(&a.position.current_value));

                CategoryNode {
                    category,
                    total_value,
                    total_invested,
                    profit_or_loss: total_value - total_invested,
                    allocation_pct: percentage(total_value, summary.total_value),
                    positions,
                }
            })
            .collect();

        Dashboard { summary, categories }
    }
}

fn percentage(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        Decimal::ZERO
    } else {
        part / whole * Decimal::ONE_HUNDRED
    }
}
