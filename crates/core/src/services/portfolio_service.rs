use chrono::{Datelike, Duration, Local, Months, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::currency_service::CurrencyService;
use super::dashboard_service::DashboardService;
use super::fixed_income_service::FixedIncomeService;
use super::market_data_service::MarketDataService;
use crate::models::asset::{AssetKey, AssetType};
use crate::models::fixed_income::FixedIncomeAsset;
use crate::models::position::{AssetPosition, EvolutionPoint};
use crate::models::price::ValuationCache;
use crate::models::transaction::{Transaction, TransactionKind};

/// Scale of the running average price used when a sale reduces cost basis.
const AVERAGE_PRICE_SCALE: u32 = 16;

/// Quantity and cost basis left after replaying a ticker's transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostBasis {
    pub quantity: Decimal,
    /// Cost basis of the units still held, in the traded currency
    pub invested: Decimal,
    pub average_price: Decimal,
}

/// Consolidates transactions into valued positions.
///
/// Each call runs with its own [`ValuationCache`], so prices never bleed
/// from one calculation into the next. An evolution run shares a single
/// cache across all of its snapshot dates.
pub struct PortfolioService {
    market_data: Arc<MarketDataService>,
    currency: Arc<CurrencyService>,
    fixed_income: Arc<FixedIncomeService>,
    convert_crypto_invested: bool,
}

impl PortfolioService {
    pub fn new(
        market_data: Arc<MarketDataService>,
        currency: Arc<CurrencyService>,
        fixed_income: Arc<FixedIncomeService>,
    ) -> Self {
        Self {
            market_data,
            currency,
            fixed_income,
            convert_crypto_invested: false,
        }
    }

    /// Also convert crypto cost basis from USD (off by default: crypto is
    /// assumed to have been bought in the home currency).
    pub fn with_crypto_invested_conversion(mut self, enabled: bool) -> Self {
        self.convert_crypto_invested = enabled;
        self
    }

    /// Replay one asset's transactions with the moving-average method.
    ///
    /// Transactions are ordered by date, buys before sells on the same day,
    /// so the result does not depend on input order. Returns `None` when
    /// nothing is left held.
    pub fn consolidate<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Option<CostBasis> {
        let mut ordered: Vec<&Transaction> = transactions.into_iter().collect();
        ordered.sort_by_key(|tx| (tx.date, tx.kind == TransactionKind::Sell));

        let mut quantity = Decimal::ZERO;
        let mut invested = Decimal::ZERO;

        for tx in ordered {
            match tx.kind {
                TransactionKind::Buy => {
                    invested += tx.quantity * tx.price + tx.other_costs.unwrap_or_default();
                    quantity += tx.quantity;
                }
                TransactionKind::Sell => {
                    if quantity > Decimal::ZERO {
                        let average = (invested / quantity)
                            .round_dp_with_strategy(AVERAGE_PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero);
                        invested -= tx.quantity * average;
                    }
                    quantity -= tx.quantity;
                }
            }
        }

        if quantity <= Decimal::ZERO {
            return None;
        }

        Some(CostBasis {
            quantity,
            invested,
            average_price: (invested / quantity)
                .round_dp_with_strategy(AVERAGE_PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero),
        })
    }

    /// Positions valued today (`date = None`) or at a past date.
    pub async fn calculate_positions(
        &self,
        transactions: &[Transaction],
        fixed_income: &[FixedIncomeAsset],
        date: Option<NaiveDate>,
    ) -> Vec<AssetPosition> {
        let today = Local::now().date_naive();
        let mut cache = ValuationCache::new();
        self.snapshot(transactions, fixed_income, date.filter(|d| *d < today), today, &mut cache)
            .await
    }

    /// Portfolio totals on the first day of each of the last `months`
    /// months, plus `today`, in ascending date order.
    pub async fn calculate_evolution(
        &self,
        transactions: &[Transaction],
        fixed_income: &[FixedIncomeAsset],
        months: u32,
        today: NaiveDate,
    ) -> Vec<EvolutionPoint> {
        let dates = snapshot_dates(today, months);
        let mut cache = ValuationCache::new();

        let converts = transactions.iter().any(|tx| tx.key().price_in_usd());
        if converts {
            if let Some(first) = dates.first() {
                self.currency.preload_history(*first - Duration::days(14), today).await;
            }
        }

        let mut points = Vec::with_capacity(dates.len());
        for date in dates {
            let historical = (date < today).then_some(date);
            let positions = self
                .snapshot(transactions, fixed_income, historical, today, &mut cache)
                .await;
            let summary = DashboardService::summary(&positions);
            points.push(EvolutionPoint {
                date,
                total_value: summary.total_value,
                total_invested: summary.total_invested,
                positions: summary.positions,
            });
        }

        info!(points = points.len(), prices = cache.price_entries(), "Evolution series computed");
        points
    }

    /// One valuation: `historical = None` values at current prices.
    async fn snapshot(
        &self,
        transactions: &[Transaction],
        fixed_income: &[FixedIncomeAsset],
        historical: Option<NaiveDate>,
        today: NaiveDate,
        cache: &mut ValuationCache,
    ) -> Vec<AssetPosition> {
        let as_of = historical.unwrap_or(today);

        let mut groups: BTreeMap<AssetKey, Vec<&Transaction>> = BTreeMap::new();
        for tx in transactions {
            if tx.ticker.trim().is_empty() || tx.date > as_of {
                continue;
            }
            groups.entry(tx.key()).or_default().push(tx);
        }

        if historical.is_none() {
            self.preload_current_prices(groups.keys(), cache).await;
        }

        let mut positions = Vec::with_capacity(groups.len() + fixed_income.len());
        for (key, txs) in &groups {
            let Some(basis) = Self::consolidate(txs.iter().copied()) else {
                debug!(ticker = %key.ticker, "Position closed, skipped");
                continue;
            };
            let price = self.resolve_price(key, historical, cache).await;
            positions.push(self.value_position(key, basis, price, historical, cache).await);
        }

        for asset in fixed_income.iter().filter(|fi| fi.investment_date <= as_of) {
            positions.push(self.fixed_income.position_at(asset, as_of).await);
        }

        positions
    }

    /// Batch-fetch current prices for keys this run has not priced yet.
    /// The orchestrator's cache is never read here, so every run sees fresh
    /// quotes; keys the batch could not price are unavailable for this run.
    async fn preload_current_prices<'a>(
        &self,
        keys: impl Iterator<Item = &'a AssetKey>,
        cache: &mut ValuationCache,
    ) {
        let missing: Vec<AssetKey> = keys.filter(|key| !cache.has_price(key, None)).cloned().collect();
        if missing.is_empty() {
            return;
        }

        let resolved = self.market_data.fetch_and_cache(&missing).await;
        for key in &missing {
            cache.set_price(key, None, resolved.get(key).copied());
        }
    }

    async fn resolve_price(
        &self,
        key: &AssetKey,
        historical: Option<NaiveDate>,
        cache: &mut ValuationCache,
    ) -> Option<Decimal> {
        if let Some(cached) = cache.price(key, historical) {
            return cached;
        }

        let price = match historical {
            Some(date) => self.market_data.get_historical_price_with_fallback(key, date).await,
            None => self.market_data.get_price_with_fallback(key).await,
        };
        cache.set_price(key, historical, price);
        price
    }

    async fn resolve_rate(&self, historical: Option<NaiveDate>, cache: &mut ValuationCache) -> Option<Decimal> {
        if let Some(cached) = cache.rate(historical) {
            return cached;
        }

        let rate = match historical {
            Some(date) => self.currency.fetch_historical_rate(date).await,
            None => self.currency.current_rate().await,
        };
        cache.set_rate(historical, rate);
        rate
    }

    async fn value_position(
        &self,
        key: &AssetKey,
        basis: CostBasis,
        price: Option<Decimal>,
        historical: Option<NaiveDate>,
        cache: &mut ValuationCache,
    ) -> AssetPosition {
        let convert_price = key.price_in_usd();
        let convert_invested =
            key.is_foreign() || (key.asset_type == AssetType::Crypto && self.convert_crypto_invested);

        let rate = if convert_price || convert_invested {
            let rate = self.resolve_rate(historical, cache).await;
            if rate.is_none() {
                warn!(
                    ticker = %key.ticker,
                    currency = self.currency.home_currency(),
                    "Exchange rate unavailable, using unconverted values"
                );
            }
            rate
        } else {
            None
        };

        let to_home = |amount: Decimal, convert: bool| match (convert, rate) {
            (true, Some(rate)) => amount * rate,
            _ => amount,
        };

        let total_invested = to_home(basis.invested, convert_invested);

        let Some(native_price) = price else {
            warn!(ticker = %key.ticker, "No price available, valuing at cost basis");
            return AssetPosition {
                ticker: key.ticker.clone(),
                asset_type: key.asset_type,
                market: key.market,
                quantity: basis.quantity,
                average_price: basis.average_price,
                current_price: basis.average_price,
                total_invested,
                current_value: total_invested,
                profit_or_loss: Decimal::ZERO,
                profitability: Decimal::ZERO,
                stale: true,
            };
        };

        let current_value = to_home(native_price, convert_price) * basis.quantity;
        let profit = current_value - total_invested;

        AssetPosition {
            ticker: key.ticker.clone(),
            asset_type: key.asset_type,
            market: key.market,
            quantity: basis.quantity,
            average_price: basis.average_price,
            current_price: native_price,
            total_invested,
            current_value,
            profit_or_loss: profit,
            profitability: AssetPosition::profitability_of(profit, total_invested),
            stale: false,
        }
    }
}

/// First day of each of the last `months` months (the current month
/// included), then `today`; ascending and without duplicates.
pub fn snapshot_dates(today: NaiveDate, months: u32) -> Vec<NaiveDate> {
    let month_start = today.with_day(1).unwrap_or(today);
    let mut dates: Vec<NaiveDate> = (0..months)
        .rev()
        .filter_map(|back| month_start.checked_sub_months(Months::new(back)))
        .collect();
    if dates.last() != Some(&today) {
        dates.push(today);
    }
    dates
}
