// ═══════════════════════════════════════════════════════════════════
// Service Tests: valuation, currency, fixed income, calendar, dashboard
// ═══════════════════════════════════════════════════════════════════

use async_trait::async_trait;
use chrono::NaiveDate;
use investment_tracker_core::errors::CoreError;
use investment_tracker_core::models::asset::{AssetKey, AssetType, Market};
use investment_tracker_core::models::fixed_income::{FixedIncomeAsset, IndexType};
use investment_tracker_core::models::position::AssetPosition;
use investment_tracker_core::models::price::{DatedValue, PriceQuote};
use investment_tracker_core::models::transaction::Transaction;
use investment_tracker_core::providers::registry::ProviderRegistry;
use investment_tracker_core::providers::traits::{
    ExchangeRateSource, HolidaySource, IndexRateSource, MarketDataProvider,
};
use investment_tracker_core::services::calendar_service::CalendarService;
use investment_tracker_core::services::currency_service::CurrencyService;
use investment_tracker_core::services::fixed_income_service::FixedIncomeService;
use investment_tracker_core::services::market_data_service::MarketDataService;
use investment_tracker_core::services::portfolio_service::PortfolioService;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

// ═══════════════════════════════════════════════════════════════════
// Mock collaborators (no network)
// ═══════════════════════════════════════════════════════════════════

/// Prices every supported type from fixed tables.
struct TablePrices {
    current: HashMap<String, Decimal>,
    history: HashMap<(String, NaiveDate), Decimal>,
}

impl TablePrices {
    fn new() -> Self {
        Self {
            current: HashMap::new(),
            history: HashMap::new(),
        }
    }

    fn price(mut self, ticker: &str, price: Decimal) -> Self {
        self.current.insert(ticker.to_string(), price);
        self
    }

    fn on(mut self, ticker: &str, date: NaiveDate, price: Decimal) -> Self {
        self.history.insert((ticker.to_string(), date), price);
        self
    }
}

#[async_trait]
impl MarketDataProvider for TablePrices {
    fn name(&self) -> &str {
        "Table"
    }

    fn supported_asset_types(&self) -> Vec<AssetType> {
        vec![AssetType::Stock, AssetType::Etf, AssetType::Crypto]
    }

    async fn fetch_prices(&self, assets: &[AssetKey]) -> Vec<PriceQuote> {
        assets
            .iter()
            .filter_map(|key| {
                self.current.get(&key.ticker).map(|price| PriceQuote {
                    key: key.clone(),
                    price: *price,
                    source: "Table".into(),
                })
            })
            .collect()
    }

    async fn fetch_historical_price(&self, asset: &AssetKey, date: NaiveDate) -> Option<Decimal> {
        self.history.get(&(asset.ticker.clone(), date)).copied()
    }
}

/// USD→home rates from a fixed spot and series; `None` spot means failure.
struct FixedRates {
    spot: Option<Decimal>,
    series: Vec<DatedValue>,
    series_calls: AtomicUsize,
}

impl FixedRates {
    fn new(spot: Option<Decimal>, series: Vec<(NaiveDate, Decimal)>) -> Self {
        Self {
            spot,
            series: series
                .into_iter()
                .map(|(date, value)| DatedValue { date, value })
                .collect(),
            series_calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self::new(None, Vec::new())
    }
}

#[async_trait]
impl ExchangeRateSource for FixedRates {
    fn name(&self) -> &str {
        "FixedRates"
    }

    async fn spot_rate(&self, _base: &str, _quote: &str) -> Result<Decimal, CoreError> {
        self.spot.ok_or_else(|| CoreError::Network("offline".into()))
    }

    async fn rate_series(
        &self,
        _base: &str,
        _quote: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DatedValue>, CoreError> {
        self.series_calls.fetch_add(1, Ordering::SeqCst);
        if self.spot.is_none() {
            return Err(CoreError::Network("offline".into()));
        }
        Ok(self
            .series
            .iter()
            .filter(|p| from <= p.date && p.date <= to)
            .copied()
            .collect())
    }
}

/// Spot rate that can move or go offline between calls.
struct MovingSpot(std::sync::Mutex<Option<Decimal>>);

impl MovingSpot {
    fn set(&self, rate: Option<Decimal>) {
        *self.0.lock().unwrap() = rate;
    }
}

#[async_trait]
impl ExchangeRateSource for MovingSpot {
    fn name(&self) -> &str {
        "MovingSpot"
    }

    async fn spot_rate(&self, _base: &str, _quote: &str) -> Result<Decimal, CoreError> {
        self.0.lock().unwrap().ok_or_else(|| CoreError::Network("offline".into()))
    }

    async fn rate_series(
        &self,
        _base: &str,
        _quote: &str,
        _from: NaiveDate,
        _to: NaiveDate,
    ) -> Result<Vec<DatedValue>, CoreError> {
        Ok(Vec::new())
    }
}

/// Index samples from a fixed table, filtered to the requested window.
struct FixedIndex {
    samples: Vec<DatedValue>,
    calls: AtomicUsize,
}

impl FixedIndex {
    fn new(samples: Vec<(NaiveDate, Decimal)>) -> Self {
        Self {
            samples: samples
                .into_iter()
                .map(|(date, value)| DatedValue { date, value })
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl IndexRateSource for FixedIndex {
    fn name(&self) -> &str {
        "FixedIndex"
    }

    async fn series(&self, _index: IndexType, from: NaiveDate, to: NaiveDate) -> Result<Vec<DatedValue>, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .samples
            .iter()
            .filter(|p| from <= p.date && p.date <= to)
            .copied()
            .collect())
    }
}

/// Knows holidays for one year; every other year fails.
struct OneYearHolidays {
    year: i32,
    days: Vec<NaiveDate>,
}

#[async_trait]
impl HolidaySource for OneYearHolidays {
    fn name(&self) -> &str {
        "OneYear"
    }

    async fn holidays(&self, year: i32) -> Result<Vec<NaiveDate>, CoreError> {
        if year == self.year {
            Ok(self.days.clone())
        } else {
            Err(CoreError::Api {
                provider: "OneYear".into(),
                message: format!("no data for {year}"),
            })
        }
    }
}

fn market_data(prices: TablePrices) -> Arc<MarketDataService> {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(prices));
    Arc::new(MarketDataService::new(registry, Duration::from_secs(1)))
}

fn portfolio(prices: TablePrices, rates: FixedRates) -> PortfolioService {
    let calendar = Arc::new(CalendarService::new());
    PortfolioService::new(
        market_data(prices),
        Arc::new(CurrencyService::new(Arc::new(rates), "BRL")),
        Arc::new(FixedIncomeService::new(calendar, None)),
    )
}

fn petr4() -> AssetKey {
    AssetKey::stock("PETR4", Market::Domestic)
}

fn aapl() -> AssetKey {
    AssetKey::stock("AAPL", Market::Foreign)
}

// ═══════════════════════════════════════════════════════════════════
// Moving-average consolidation
// ═══════════════════════════════════════════════════════════════════

mod consolidation {
    use super::*;

    #[test]
    fn buys_accumulate_costs() {
        let txs = vec![
            Transaction::buy(&petr4(), dec!(10), dec!(100), Some(dec!(5)), d(2024, 1, 10)),
            Transaction::buy(&petr4(), dec!(10), dec!(120), None, d(2024, 2, 10)),
        ];
        let basis = PortfolioService::consolidate(&txs).unwrap();
        assert_eq!(basis.quantity, dec!(20));
        assert_eq!(basis.invested, dec!(2205));
        assert_eq!(basis.average_price, dec!(110.25));
    }

    #[test]
    fn sell_reduces_basis_at_average_price() {
        let txs = vec![
            Transaction::buy(&petr4(), dec!(10), dec!(100), None, d(2024, 1, 10)),
            Transaction::buy(&petr4(), dec!(10), dec!(200), None, d(2024, 1, 11)),
            Transaction::sell(&petr4(), dec!(5), dec!(300), d(2024, 1, 12)),
        ];
        let basis = PortfolioService::consolidate(&txs).unwrap();
        assert_eq!(basis.quantity, dec!(15));
        assert_eq!(basis.invested, dec!(2250));
        assert_eq!(basis.average_price, dec!(150));
    }

    #[test]
    fn fully_sold_position_is_gone() {
        let txs = vec![
            Transaction::buy(&petr4(), dec!(10), dec!(100), None, d(2024, 1, 10)),
            Transaction::sell(&petr4(), dec!(10), dec!(130), d(2024, 3, 1)),
        ];
        assert!(PortfolioService::consolidate(&txs).is_none());
    }

    #[test]
    fn oversold_position_is_gone() {
        let txs = vec![
            Transaction::buy(&petr4(), dec!(1), dec!(100), None, d(2024, 1, 10)),
            Transaction::sell(&petr4(), dec!(3), dec!(100), d(2024, 1, 11)),
        ];
        assert!(PortfolioService::consolidate(&txs).is_none());
    }

    #[test]
    fn same_day_buy_is_applied_before_sell() {
        let sell_first = vec![
            Transaction::sell(&petr4(), dec!(5), dec!(100), d(2024, 1, 10)),
            Transaction::buy(&petr4(), dec!(10), dec!(100), None, d(2024, 1, 10)),
        ];
        let basis = PortfolioService::consolidate(&sell_first).unwrap();
        assert_eq!(basis.quantity, dec!(5));
        assert_eq!(basis.invested, dec!(500));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Position valuation
// ═══════════════════════════════════════════════════════════════════

mod positions {
    use super::*;

    #[tokio::test]
    async fn domestic_stock_end_to_end() {
        let svc = portfolio(TablePrices::new().price("PETR4", dec!(150)), FixedRates::failing());
        let txs = vec![Transaction::buy(&petr4(), dec!(10), dec!(100), Some(dec!(5)), d(2024, 1, 10))];

        let positions = svc.calculate_positions(&txs, &[], None).await;

        assert_eq!(positions.len(), 1);
        let p = &positions[0];
        assert_eq!(p.quantity, dec!(10));
        assert_eq!(p.total_invested, dec!(1005));
        assert_eq!(p.average_price, dec!(100.5));
        assert_eq!(p.current_price, dec!(150));
        assert_eq!(p.current_value, dec!(1500));
        assert_eq!(p.profit_or_loss, dec!(495));
        assert_eq!(p.profitability.round_dp(2), dec!(49.25));
        assert!(!p.stale);
    }

    #[tokio::test]
    async fn closed_positions_are_omitted() {
        let svc = portfolio(TablePrices::new().price("PETR4", dec!(150)), FixedRates::failing());
        let txs = vec![
            Transaction::buy(&petr4(), dec!(10), dec!(100), None, d(2024, 1, 10)),
            Transaction::sell(&petr4(), dec!(10), dec!(120), d(2024, 2, 10)),
        ];
        assert!(svc.calculate_positions(&txs, &[], None).await.is_empty());
    }

    #[tokio::test]
    async fn unpriced_position_is_stale_at_cost() {
        let svc = portfolio(TablePrices::new(), FixedRates::failing());
        let txs = vec![Transaction::buy(&petr4(), dec!(4), dec!(25), None, d(2024, 1, 10))];

        let positions = svc.calculate_positions(&txs, &[], None).await;

        let p = &positions[0];
        assert!(p.stale);
        assert_eq!(p.current_value, dec!(100));
        assert_eq!(p.total_invested, dec!(100));
        assert_eq!(p.profit_or_loss, Decimal::ZERO);
        assert_eq!(p.profitability, Decimal::ZERO);
    }

    #[tokio::test]
    async fn foreign_stock_converts_price_and_cost() {
        let svc = portfolio(
            TablePrices::new().price("AAPL", dec!(150)),
            FixedRates::new(Some(dec!(5)), Vec::new()),
        );
        let txs = vec![Transaction::buy(&aapl(), dec!(2), dec!(100), None, d(2024, 1, 10))];

        let p = &svc.calculate_positions(&txs, &[], None).await[0];

        assert_eq!(p.current_price, dec!(150));
        assert_eq!(p.current_value, dec!(1500));
        assert_eq!(p.total_invested, dec!(1000));
        assert_eq!(p.profit_or_loss, dec!(500));
    }

    #[tokio::test]
    async fn missing_rate_leaves_values_unconverted() {
        let svc = portfolio(TablePrices::new().price("AAPL", dec!(150)), FixedRates::failing());
        let txs = vec![Transaction::buy(&aapl(), dec!(2), dec!(100), None, d(2024, 1, 10))];

        let p = &svc.calculate_positions(&txs, &[], None).await[0];

        assert_eq!(p.current_value, dec!(300));
        assert_eq!(p.total_invested, dec!(200));
        assert!(!p.stale);
    }

    #[tokio::test]
    async fn crypto_price_is_converted_but_cost_is_not_by_default() {
        let svc = portfolio(
            TablePrices::new().price("BTC", dec!(60000)),
            FixedRates::new(Some(dec!(5)), Vec::new()),
        );
        let txs = vec![Transaction::buy(&AssetKey::crypto("BTC"), dec!(0.5), dec!(100000), None, d(2024, 1, 10))];

        let p = &svc.calculate_positions(&txs, &[], None).await[0];

        assert_eq!(p.current_value, dec!(150000));
        assert_eq!(p.total_invested, dec!(50000));
    }

    #[tokio::test]
    async fn crypto_cost_conversion_can_be_enabled() {
        let svc = portfolio(
            TablePrices::new().price("BTC", dec!(60000)),
            FixedRates::new(Some(dec!(5)), Vec::new()),
        )
        .with_crypto_invested_conversion(true);
        let txs = vec![Transaction::buy(&AssetKey::crypto("BTC"), dec!(0.5), dec!(20000), None, d(2024, 1, 10))];

        let p = &svc.calculate_positions(&txs, &[], None).await[0];

        assert_eq!(p.total_invested, dec!(50000));
        assert_eq!(p.current_value, dec!(150000));
    }

    #[tokio::test]
    async fn past_date_uses_historical_prices_and_ignores_later_trades() {
        let svc = portfolio(
            TablePrices::new()
                .price("PETR4", dec!(999))
                .on("PETR4", d(2024, 2, 1), dec!(35)),
            FixedRates::failing(),
        );
        let txs = vec![
            Transaction::buy(&petr4(), dec!(10), dec!(30), None, d(2024, 1, 15)),
            Transaction::buy(&petr4(), dec!(10), dec!(40), None, d(2024, 2, 20)),
        ];

        let positions = svc.calculate_positions(&txs, &[], Some(d(2024, 2, 1))).await;

        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].quantity, dec!(10));
        assert_eq!(positions[0].current_value, dec!(350));
    }

    #[tokio::test]
    async fn same_ticker_on_two_markets_is_two_positions() {
        let svc = portfolio(
            TablePrices::new().price("XP", dec!(20)),
            FixedRates::new(Some(dec!(5)), Vec::new()),
        );
        let txs = vec![
            Transaction::buy(&AssetKey::stock("XP", Market::Domestic), dec!(1), dec!(10), None, d(2024, 1, 10)),
            Transaction::buy(&AssetKey::stock("XP", Market::Foreign), dec!(1), dec!(2), None, d(2024, 1, 10)),
        ];

        let positions = svc.calculate_positions(&txs, &[], None).await;
        assert_eq!(positions.len(), 2);
    }

    #[tokio::test]
    async fn fixed_income_is_appended_once_invested() {
        let svc = portfolio(TablePrices::new(), FixedRates::failing());
        let cdb = FixedIncomeAsset::new("CDB", dec!(1000), d(2024, 1, 1), d(2026, 1, 1), IndexType::Ipca, dec!(6));

        let before = svc.calculate_positions(&[], &[cdb.clone()], Some(d(2023, 12, 1))).await;
        let after = svc.calculate_positions(&[], &[cdb], Some(d(2024, 3, 1))).await;

        assert!(before.is_empty());
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].asset_type, AssetType::FixedIncome);
        assert_eq!(after[0].quantity, Decimal::ONE);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Evolution
// ═══════════════════════════════════════════════════════════════════

mod evolution {
    use super::*;

    #[tokio::test]
    async fn empty_portfolio_is_all_zeros() {
        let svc = portfolio(TablePrices::new(), FixedRates::failing());
        let points = svc.calculate_evolution(&[], &[], 3, d(2024, 3, 15)).await;

        assert_eq!(points.len(), 4);
        assert!(points
            .iter()
            .all(|p| p.total_value.is_zero() && p.total_invested.is_zero() && p.positions == 0));
    }

    #[tokio::test]
    async fn each_snapshot_uses_its_own_date() {
        let svc = portfolio(
            TablePrices::new()
                .price("PETR4", dec!(40))
                .on("PETR4", d(2024, 2, 1), dec!(35))
                .on("PETR4", d(2024, 3, 1), dec!(36)),
            FixedRates::failing(),
        );
        let txs = vec![Transaction::buy(&petr4(), dec!(10), dec!(30), None, d(2024, 1, 15))];

        let points = svc.calculate_evolution(&txs, &[], 3, d(2024, 3, 15)).await;

        let dates: Vec<NaiveDate> = points.iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![d(2024, 1, 1), d(2024, 2, 1), d(2024, 3, 1), d(2024, 3, 15)]);
        let values: Vec<Decimal> = points.iter().map(|p| p.total_value).collect();
        assert_eq!(values, vec![dec!(0), dec!(350), dec!(360), dec!(400)]);
        assert_eq!(points[1].total_invested, dec!(300));
    }

    #[tokio::test]
    async fn foreign_history_preloads_rates_once() {
        let rates = Arc::new(FixedRates::new(
            Some(dec!(5)),
            vec![(d(2024, 1, 31), dec!(4.9)), (d(2024, 2, 29), dec!(5.0))],
        ));
        let calendar = Arc::new(CalendarService::new());
        let svc = PortfolioService::new(
            market_data(
                TablePrices::new()
                    .price("AAPL", dec!(200))
                    .on("AAPL", d(2024, 2, 1), dec!(180))
                    .on("AAPL", d(2024, 3, 1), dec!(190)),
            ),
            Arc::new(CurrencyService::new(rates.clone(), "BRL")),
            Arc::new(FixedIncomeService::new(calendar, None)),
        );
        let txs = vec![Transaction::buy(&aapl(), dec!(1), dec!(170), None, d(2024, 1, 10))];

        let points = svc.calculate_evolution(&txs, &[], 2, d(2024, 3, 15)).await;

        assert_eq!(points[0].date, d(2024, 2, 1));
        assert_eq!(points[0].total_value, dec!(882.0));
        assert_eq!(points[1].total_value, dec!(950.0));
        assert_eq!(points[2].total_value, dec!(1000));
        assert_eq!(rates.series_calls.load(Ordering::SeqCst), 1);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Currency
// ═══════════════════════════════════════════════════════════════════

mod currency {
    use super::*;

    #[tokio::test]
    async fn weekend_resolves_to_prior_trading_day() {
        let rates = Arc::new(FixedRates::new(
            Some(dec!(5)),
            vec![(d(2024, 1, 4), dec!(4.88)), (d(2024, 1, 5), dec!(4.9)), (d(2024, 1, 8), dec!(4.95))],
        ));
        let svc = CurrencyService::new(rates.clone(), "BRL");

        assert_eq!(svc.fetch_historical_rate(d(2024, 1, 7)).await, Some(dec!(4.9)));
        assert_eq!(svc.fetch_historical_rate(d(2024, 1, 7)).await, Some(dec!(4.9)));
        assert_eq!(svc.cached_historical_rates(), 1);
        assert_eq!(rates.series_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_samples_beyond_lookback_are_not_used() {
        let rates = Arc::new(FixedRates::new(Some(dec!(5)), vec![(d(2024, 1, 2), dec!(4.85))]));
        let svc = CurrencyService::new(rates, "BRL");
        assert_eq!(svc.fetch_historical_rate(d(2024, 2, 20)).await, None);
    }

    #[tokio::test]
    async fn failure_is_none_never_one() {
        let svc = CurrencyService::new(Arc::new(FixedRates::failing()), "BRL");
        assert_eq!(svc.fetch_current_rate().await, None);
        assert_eq!(svc.current_rate().await, None);
        assert_eq!(svc.fetch_historical_rate(d(2024, 1, 5)).await, None);
        assert_eq!(svc.cached_historical_rates(), 0);
    }

    #[tokio::test]
    async fn spot_rate_is_cached() {
        let svc = CurrencyService::new(Arc::new(FixedRates::new(Some(dec!(5.1)), Vec::new())), "brl");
        assert_eq!(svc.home_currency(), "BRL");
        assert_eq!(svc.cached_rate(), None);
        assert_eq!(svc.current_rate().await, Some(dec!(5.1)));
        assert_eq!(svc.cached_rate(), Some(dec!(5.1)));
    }

    #[tokio::test]
    async fn spot_rate_is_refetched_and_survives_an_outage() {
        let source = Arc::new(MovingSpot(std::sync::Mutex::new(Some(dec!(5)))));
        let svc = CurrencyService::new(source.clone(), "BRL");
        assert_eq!(svc.current_rate().await, Some(dec!(5)));

        source.set(Some(dec!(6)));
        assert_eq!(svc.current_rate().await, Some(dec!(6)));

        source.set(None);
        assert_eq!(svc.fetch_current_rate().await, None);
        assert_eq!(svc.current_rate().await, Some(dec!(6)));
    }

    #[tokio::test]
    async fn usd_home_currency_is_identity() {
        let rates = Arc::new(FixedRates::failing());
        let svc = CurrencyService::new(rates.clone(), "USD");
        assert_eq!(svc.current_rate().await, Some(Decimal::ONE));
        assert_eq!(svc.fetch_historical_rate(d(2024, 1, 5)).await, Some(Decimal::ONE));
        assert_eq!(rates.series_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn convert_propagates_unknown_rate() {
        use investment_tracker_core::services::currency_service::convert;
        assert_eq!(convert(dec!(10), Some(dec!(5))), Some(dec!(50)));
        assert_eq!(convert(dec!(10), None), None);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Fixed income
// ═══════════════════════════════════════════════════════════════════

mod fixed_income {
    use super::*;

    fn service(index: Option<Arc<dyn IndexRateSource>>) -> FixedIncomeService {
        FixedIncomeService::new(Arc::new(CalendarService::new()), index)
    }

    #[tokio::test]
    async fn pre_fixed_one_business_year() {
        // 2024-01-01 (Mon) to 2024-12-18 spans exactly 252 weekdays
        let asset = FixedIncomeAsset::new("LTN", dec!(1000), d(2024, 1, 1), d(2026, 1, 1), IndexType::PreFixed, dec!(10));

        let v = service(None).calculate_values_at(&asset, d(2024, 12, 18)).await;

        assert_eq!(v.gross_value, dec!(1100.00));
        // 352 calendar days held: 20% bracket
        assert_eq!(v.tax_amount, dec!(20.00));
        assert_eq!(v.net_value, dec!(1080.00));
    }

    #[tokio::test]
    async fn valuation_on_investment_date_is_flat() {
        let asset = FixedIncomeAsset::new("LTN", dec!(1000), d(2024, 1, 1), d(2026, 1, 1), IndexType::PreFixed, dec!(10));
        let v = service(None).calculate_values_at(&asset, d(2024, 1, 1)).await;
        assert_eq!(v.gross_value, dec!(1000));
        assert_eq!(v.tax_amount, Decimal::ZERO);
        assert_eq!(v.net_value, dec!(1000));
    }

    #[tokio::test]
    async fn cdi_compounds_daily_samples() {
        let index = Arc::new(FixedIndex::new(vec![
            (d(2024, 1, 2), dec!(0.05)),
            (d(2024, 1, 3), dec!(0.05)),
            (d(2024, 1, 4), dec!(0.05)),
            (d(2024, 1, 5), dec!(0.05)),
        ]));
        let svc = service(Some(index.clone() as Arc<dyn IndexRateSource>));
        let asset = FixedIncomeAsset::new("CDB", dec!(1000), d(2024, 1, 2), d(2025, 1, 2), IndexType::Cdi, dec!(100));

        let v = svc.calculate_values_at(&asset, d(2024, 1, 5)).await;

        // 1000 * 1.0005^3, gross is not rounded
        assert_eq!(v.gross_value, dec!(1001.500750125));
        // 1.500750125 * 22.5% = 0.3376..., only the tax is rounded
        assert_eq!(v.tax_amount, dec!(0.34));
        assert_eq!(v.net_value, dec!(1001.160750125));

        // narrower window is served from cache
        svc.calculate_values_at(&asset, d(2024, 1, 4)).await;
        assert_eq!(index.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cdi_percentage_scales_the_index() {
        let index = Arc::new(FixedIndex::new(vec![(d(2024, 1, 2), dec!(1))]));
        let asset = FixedIncomeAsset::new("LCI", dec!(1000), d(2024, 1, 2), d(2025, 1, 2), IndexType::Cdi, dec!(50));

        let v = service(Some(index as Arc<dyn IndexRateSource>)).calculate_values_at(&asset, d(2024, 1, 3)).await;
        assert_eq!(v.gross_value, dec!(1005.00));
    }

    #[tokio::test]
    async fn ipca_without_samples_stays_at_invested_amount() {
        let asset = FixedIncomeAsset::new("NTN-B", dec!(1000), d(2024, 1, 2), d(2035, 5, 15), IndexType::Ipca, dec!(6));
        let v = service(None).calculate_values_at(&asset, d(2024, 6, 1)).await;
        assert_eq!(v.gross_value, dec!(1000));
        assert_eq!(v.tax_amount, Decimal::ZERO);
        assert_eq!(v.net_value, dec!(1000));
    }

    #[tokio::test]
    async fn ipca_applies_inflation_then_spread() {
        let index = Arc::new(FixedIndex::new(vec![(d(2024, 1, 1), dec!(1))]));
        // zero spread isolates the inflation factor
        let asset = FixedIncomeAsset::new("IPCA+", dec!(1000), d(2024, 1, 1), d(2030, 1, 1), IndexType::Ipca, dec!(0));

        let v = service(Some(index as Arc<dyn IndexRateSource>)).calculate_values_at(&asset, d(2024, 2, 1)).await;
        assert_eq!(v.gross_value, dec!(1010.00));
        assert_eq!(v.tax_amount, dec!(2.25));
    }

    #[tokio::test]
    async fn position_is_one_unit_at_net_value() {
        let asset = FixedIncomeAsset::new("LTN", dec!(1000), d(2024, 1, 1), d(2026, 1, 1), IndexType::PreFixed, dec!(10));
        let p = service(None).position_at(&asset, d(2024, 12, 18)).await;

        assert_eq!(p.ticker, "LTN");
        assert_eq!(p.quantity, Decimal::ONE);
        assert_eq!(p.average_price, dec!(1000));
        assert_eq!(p.current_value, dec!(1080.00));
        assert_eq!(p.profit_or_loss, dec!(80.00));
        assert_eq!(p.market, Some(Market::Domestic));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Calendar
// ═══════════════════════════════════════════════════════════════════

mod calendar {
    use super::*;

    #[tokio::test]
    async fn failed_years_do_not_abort_loading() {
        let source = OneYearHolidays {
            year: 2024,
            days: vec![d(2024, 1, 1), d(2024, 12, 25)],
        };
        let cal = CalendarService::new();

        let total = cal.load_holidays(&source, 2024, 2025).await;

        assert_eq!(total, 2);
        assert!(!cal.is_business_day(d(2024, 12, 25)));
        assert!(cal.is_business_day(d(2025, 12, 25)));
    }

    #[tokio::test]
    async fn holidays_shorten_pre_fixed_accrual() {
        let calendar = Arc::new(CalendarService::with_holidays([d(2024, 1, 1)]));
        let svc = FixedIncomeService::new(calendar, None);
        let asset = FixedIncomeAsset::new("LTN", dec!(1000), d(2024, 1, 1), d(2026, 1, 1), IndexType::PreFixed, dec!(10));

        // one holiday leaves 251 business days
        let v = svc.calculate_values_at(&asset, d(2024, 12, 18)).await;
        assert!(v.gross_value < dec!(1100));
        assert!(v.gross_value > dec!(1099));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Dashboard
// ═══════════════════════════════════════════════════════════════════

mod dashboard {
    use super::*;
    use investment_tracker_core::models::dashboard::Category;
    use investment_tracker_core::services::dashboard_service::DashboardService;

    fn pos(ticker: &str, asset_type: AssetType, market: Option<Market>, invested: Decimal, value: Decimal) -> AssetPosition {
        let profit = value - invested;
        AssetPosition {
            ticker: ticker.into(),
            asset_type,
            market,
            quantity: Decimal::ONE,
            average_price: invested,
            current_price: value,
            total_invested: invested,
            current_value: value,
            profit_or_loss: profit,
            profitability: AssetPosition::profitability_of(profit, invested),
            stale: false,
        }
    }

    #[test]
    fn summary_totals() {
        let positions = vec![
            pos("PETR4", AssetType::Stock, Some(Market::Domestic), dec!(1000), dec!(1200)),
            pos("BTC", AssetType::Crypto, None, dec!(1000), dec!(800)),
        ];
        let s = DashboardService::summary(&positions);
        assert_eq!(s.total_value, dec!(2000));
        assert_eq!(s.total_invested, dec!(2000));
        assert_eq!(s.profit_or_loss, Decimal::ZERO);
        assert_eq!(s.positions, 2);
    }

    #[test]
    fn categories_in_fixed_order_with_allocations() {
        let positions = vec![
            pos("BTC", AssetType::Crypto, None, dec!(100), dec!(250)),
            pos("VALE3", AssetType::Stock, Some(Market::Domestic), dec!(100), dec!(150)),
            pos("PETR4", AssetType::Stock, Some(Market::Domestic), dec!(100), dec!(600)),
        ];

        let dash = DashboardService::build(&positions);

        let cats: Vec<Category> = dash.categories.iter().map(|c| c.category).collect();
        assert_eq!(cats, vec![Category::DomesticStocks, Category::Crypto]);

        let domestic = &dash.categories[0];
        assert_eq!(domestic.total_value, dec!(750));
        assert_eq!(domestic.allocation_pct, dec!(75));
        assert_eq!(domestic.positions[0].position.ticker, "PETR4");
        assert_eq!(domestic.positions[0].allocation_pct, dec!(80));
        assert_eq!(domestic.positions[1].allocation_pct, dec!(20));
        assert_eq!(dash.categories[1].allocation_pct, dec!(25));
    }

    #[test]
    fn empty_portfolio_has_zero_percentages() {
        let dash = DashboardService::build(&[]);
        assert!(dash.categories.is_empty());
        assert_eq!(dash.summary.profitability, Decimal::ZERO);

        let zero = vec![pos("X", AssetType::Etf, Some(Market::Foreign), dec!(0), dec!(0))];
        let dash = DashboardService::build(&zero);
        assert_eq!(dash.categories[0].allocation_pct, Decimal::ZERO);
        assert_eq!(dash.categories[0].category, Category::Etfs);
    }
}
