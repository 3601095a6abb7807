use chrono::{Duration, Local, NaiveDate};
use dashmap::DashMap;
use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};
use std::sync::Arc;
use tracing::{debug, warn};

use super::calendar_service::CalendarService;
use super::tax_service::TaxService;
use crate::models::asset::{AssetType, Market};
use crate::models::fixed_income::{FixedIncomeAsset, FixedIncomeValuation, IndexType};
use crate::models::position::AssetPosition;
use crate::models::price::{DatedSeries, DatedValue};
use crate::providers::traits::IndexRateSource;

/// Business days per year in the accrual convention.
const BUSINESS_DAYS_PER_YEAR: i64 = 252;

/// Scale kept for compounded factors between steps.
const FACTOR_SCALE: u32 = 16;

struct CachedIndex {
    from: NaiveDate,
    to: NaiveDate,
    series: DatedSeries,
}

/// Accrues fixed-income holdings and applies withholding tax.
///
/// Pre-fixed holdings compound on business days. CDI and IPCA holdings
/// compound on published index samples; without samples they are valued
/// at the invested amount. Index series are cached for the process
/// lifetime and refetched only when a wider window is needed.
pub struct FixedIncomeService {
    calendar: Arc<CalendarService>,
    index_source: Option<Arc<dyn IndexRateSource>>,
    index_cache: DashMap<IndexType, CachedIndex>,
}

impl FixedIncomeService {
    pub fn new(calendar: Arc<CalendarService>, index_source: Option<Arc<dyn IndexRateSource>>) -> Self {
        Self {
            calendar,
            index_source,
            index_cache: DashMap::new(),
        }
    }

    /// Value as of today.
    pub async fn calculate_values(&self, asset: &FixedIncomeAsset) -> FixedIncomeValuation {
        self.calculate_values_at(asset, Local::now().date_naive()).await
    }

    pub async fn calculate_values_at(&self, asset: &FixedIncomeAsset, as_of: NaiveDate) -> FixedIncomeValuation {
        if as_of <= asset.investment_date {
            return FixedIncomeValuation::flat(asset.invested_amount);
        }

        let gross = match asset.index_type {
            IndexType::PreFixed => self.pre_fixed_gross(asset, as_of),
            IndexType::Cdi => self.cdi_gross(asset, as_of).await,
            IndexType::Ipca => self.ipca_gross(asset, as_of).await,
        };

        let profit = gross - asset.invested_amount;
        if profit <= Decimal::ZERO {
            return FixedIncomeValuation {
                gross_value: gross,
                tax_amount: Decimal::ZERO,
                net_value: gross,
            };
        }

        let holding_days = (as_of - asset.investment_date).num_days();
        let tax = (profit * TaxService::rate_for_days(holding_days))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

        FixedIncomeValuation {
            gross_value: gross,
            tax_amount: tax,
            net_value: gross - tax,
        }
    }

    /// The holding as a single-unit position valued at its net amount.
    pub async fn position_at(&self, asset: &FixedIncomeAsset, as_of: NaiveDate) -> AssetPosition {
        let valuation = self.calculate_values_at(asset, as_of).await;
        let invested = asset.invested_amount;
        let profit = valuation.net_value - invested;
        AssetPosition {
            ticker: asset.name.clone(),
            asset_type: AssetType::FixedIncome,
            market: Some(Market::Domestic),
            quantity: Decimal::ONE,
            average_price: invested,
            current_price: valuation.net_value,
            total_invested: invested,
            current_value: valuation.net_value,
            profit_or_loss: profit,
            profitability: AssetPosition::profitability_of(profit, invested),
            stale: false,
        }
    }

    fn pre_fixed_gross(&self, asset: &FixedIncomeAsset, as_of: NaiveDate) -> Decimal {
        let business_days = self.calendar.count_business_days(asset.investment_date, as_of);
        let annual = Decimal::ONE + asset.contracted_rate / Decimal::ONE_HUNDRED;
        match annualized_factor(annual, business_days) {
            Some(factor) => asset.invested_amount * factor,
            None => {
                warn!(name = %asset.name, business_days, "Pre-fixed factor overflowed, valuing at invested amount");
                asset.invested_amount
            }
        }
    }

    /// Daily CDI compounding at `contracted_rate`% of the index.
    async fn cdi_gross(&self, asset: &FixedIncomeAsset, as_of: NaiveDate) -> Decimal {
        let samples = self.index_samples(IndexType::Cdi, asset.investment_date, as_of).await;
        if samples.is_empty() {
            warn!(name = %asset.name, "No CDI samples for holding period, valuing at invested amount");
            return asset.invested_amount;
        }

        let share = asset.contracted_rate / Decimal::ONE_HUNDRED;
        let factor = samples.iter().fold(Decimal::ONE, |acc, sample| {
            let daily = Decimal::ONE + sample.value / Decimal::ONE_HUNDRED * share;
            (acc * daily).round_dp(FACTOR_SCALE)
        });
        debug!(name = %asset.name, days = samples.len(), %factor, "CDI accrual");
        asset.invested_amount * factor
    }

    /// Monthly IPCA variation plus the contracted real spread on business days.
    async fn ipca_gross(&self, asset: &FixedIncomeAsset, as_of: NaiveDate) -> Decimal {
        let samples = self.index_samples(IndexType::Ipca, asset.investment_date, as_of).await;
        if samples.is_empty() {
            warn!(name = %asset.name, "No IPCA samples for holding period, valuing at invested amount");
            return asset.invested_amount;
        }

        let inflation = samples.iter().fold(Decimal::ONE, |acc, sample| {
            (acc * (Decimal::ONE + sample.value / Decimal::ONE_HUNDRED)).round_dp(FACTOR_SCALE)
        });

        let business_days = self.calendar.count_business_days(asset.investment_date, as_of);
        let spread = Decimal::ONE + asset.contracted_rate / Decimal::ONE_HUNDRED;
        let real = annualized_factor(spread, business_days).unwrap_or_else(|| {
            warn!(name = %asset.name, "IPCA spread factor overflowed, ignoring spread");
            Decimal::ONE
        });

        asset.invested_amount * inflation * real
    }

    /// Samples dated in `[from, to)`, fetched once per wider window.
    async fn index_samples(
        &self,
        index: IndexType,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<DatedValue> {
        let last = to - Duration::days(1);

        if let Some(cached) = self.index_cache.get(&index) {
            if cached.from <= from && last <= cached.to {
                return cached.series.range(from, to).to_vec();
            }
        }

        let Some(source) = &self.index_source else {
            return Vec::new();
        };

        let (fetch_from, fetch_to) = match self.index_cache.get(&index) {
            Some(cached) => (cached.from.min(from), cached.to.max(last)),
            None => (from, last),
        };

        match source.series(index, fetch_from, fetch_to).await {
            Ok(points) => {
                let series = DatedSeries::from_points(points);
                let samples = series.range(from, to).to_vec();
                self.index_cache.insert(
                    index,
                    CachedIndex {
                        from: fetch_from,
                        to: fetch_to,
                        series,
                    },
                );
                samples
            }
            Err(e) => {
                warn!(%index, source = source.name(), error = %e, "Index series fetch failed");
                Vec::new()
            }
        }
    }
}

/// `annual ^ (business_days / 252)`; integral exponents use exact powers.
fn annualized_factor(annual: Decimal, business_days: i64) -> Option<Decimal> {
    if annual == Decimal::ONE {
        return Some(Decimal::ONE);
    }
    if business_days % BUSINESS_DAYS_PER_YEAR == 0 {
        return annual.checked_powi(business_days / BUSINESS_DAYS_PER_YEAR);
    }
    let exponent = Decimal::from(business_days) / Decimal::from(BUSINESS_DAYS_PER_YEAR);
    annual.checked_powd(exponent)
}
