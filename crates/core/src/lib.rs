pub mod errors;
pub mod log;
pub mod models;
pub mod notifications;
pub mod providers;
pub mod services;
pub mod storage;

use chrono::{Local, NaiveDate};
use models::{
    asset::{AssetDescriptor, AssetKey},
    dashboard::{Dashboard, PortfolioSummary},
    fixed_income::{FixedIncomeAsset, FixedIncomeValuation},
    position::{AssetPosition, EvolutionPoint},
    settings::Settings,
    transaction::Transaction,
};
use notifications::{NoopNotifier, PriceNotifier};
use providers::{
    bcb::BcbIndexSource,
    brasil_api::BrasilApiHolidaySource,
    frankfurter::FrankfurterRateSource,
    registry::ProviderRegistry,
    traits::{ExchangeRateSource, HolidaySource, IndexRateSource},
};
use rust_decimal::Decimal;
use services::{
    calendar_service::CalendarService,
    currency_service::CurrencyService,
    dashboard_service::DashboardService,
    fixed_income_service::FixedIncomeService,
    market_data_service::{AssetSource, MarketDataService, RefreshHandle},
    portfolio_service::PortfolioService,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use storage::{
    memory::{InMemoryFixedIncomeStore, InMemoryTransactionStore},
    traits::{FixedIncomeStore, TransactionStore},
};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use errors::CoreError;

/// What `initialize()` managed to set up. Nothing in it is fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializationReport {
    /// Providers whose one-time setup succeeded
    pub providers_ready: usize,
    /// Holidays cached by the calendar
    pub holidays: usize,
    /// Spot USD → home rate, if the source answered
    pub exchange_rate: Option<Decimal>,
}

/// Main entry point for the investment tracker core library.
/// Holds the stores and every service needed to value the portfolio.
#[must_use]
pub struct InvestmentTracker {
    settings: Settings,
    transactions: Arc<dyn TransactionStore>,
    fixed_income: Arc<dyn FixedIncomeStore>,
    market_data: Arc<MarketDataService>,
    currency: Arc<CurrencyService>,
    calendar: Arc<CalendarService>,
    holiday_source: Arc<dyn HolidaySource>,
    accrual: Arc<FixedIncomeService>,
    portfolio: PortfolioService,
}

impl std::fmt::Debug for InvestmentTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvestmentTracker")
            .field("settings", &self.settings)
            .field("transactions", &self.transactions.find_all().len())
            .field("fixed_income", &self.fixed_income.find_all().len())
            .field("providers", &self.market_data.registry().provider_names())
            .field("cached_prices", &self.market_data.cached_prices())
            .finish()
    }
}

impl InvestmentTracker {
    /// Tracker with in-memory stores and the default external sources.
    pub fn new(settings: Settings) -> Self {
        Self::builder(settings).build()
    }

    /// Tracker configured from JSON settings text.
    pub fn from_settings_json(json: &str) -> Result<Self, CoreError> {
        Ok(Self::new(Settings::from_json(json)?))
    }

    pub fn builder(settings: Settings) -> TrackerBuilder {
        TrackerBuilder::new(settings)
    }

    /// Load provider id maps, the holiday calendar and the spot rate.
    /// Every step degrades instead of failing.
    pub async fn initialize(&self) -> InitializationReport {
        let providers_ready = self.market_data.initialize().await;

        let (from_year, to_year) = self.settings.holiday_years;
        let holidays = self
            .calendar
            .load_holidays(self.holiday_source.as_ref(), from_year, to_year)
            .await;

        let exchange_rate = self.currency.fetch_current_rate().await;
        if exchange_rate.is_none() {
            warn!(currency = %self.settings.home_currency, "Starting without a spot exchange rate");
        }

        info!(providers_ready, holidays, "Investment tracker initialized");
        InitializationReport {
            providers_ready,
            holidays,
            exchange_rate,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn market_data(&self) -> &Arc<MarketDataService> {
        &self.market_data
    }

    // ── Transactions ────────────────────────────────────────────────

    /// Validate and store a transaction. Returns its id.
    pub fn add_transaction(&self, mut transaction: Transaction) -> Result<Uuid, CoreError> {
        transaction.ticker = transaction.ticker.trim().to_uppercase();
        transaction.validate(today())?;
        let id = transaction.id;
        info!(ticker = %transaction.ticker, kind = %transaction.kind, "Transaction added");
        self.transactions.save(transaction)?;
        Ok(id)
    }

    pub fn delete_transaction(&self, id: Uuid) -> Result<(), CoreError> {
        self.transactions.delete_by_id(id)
    }

    /// Delete every transaction of `ticker`; returns how many were removed.
    pub fn delete_transactions_by_ticker(&self, ticker: &str) -> usize {
        let removed = self.transactions.delete_by_ticker(&ticker.trim().to_uppercase());
        info!(ticker, removed, "Transactions deleted");
        removed
    }

    #[must_use]
    pub fn transactions(&self) -> Vec<Transaction> {
        self.transactions.find_all()
    }

    #[must_use]
    pub fn transactions_for(&self, ticker: &str) -> Vec<Transaction> {
        self.transactions.find_by_ticker(&ticker.trim().to_uppercase())
    }

    #[must_use]
    pub fn tickers(&self) -> Vec<String> {
        self.transactions.find_distinct_tickers()
    }

    // ── Fixed income ────────────────────────────────────────────────

    /// Validate and store a fixed-income holding; names must be unique.
    pub fn add_fixed_income(&self, asset: FixedIncomeAsset) -> Result<(), CoreError> {
        asset.validate()?;
        if self.fixed_income.find_by_name(&asset.name).is_some() {
            return Err(CoreError::DuplicateFixedIncome(asset.name));
        }
        info!(name = %asset.name, index = %asset.index_type, "Fixed-income holding added");
        self.fixed_income.save(asset)
    }

    pub fn delete_fixed_income(&self, name: &str) -> Result<(), CoreError> {
        self.fixed_income.delete_by_name(name.trim())
    }

    #[must_use]
    pub fn fixed_income_assets(&self) -> Vec<FixedIncomeAsset> {
        self.fixed_income.find_all()
    }

    /// Gross, tax and net value of one holding as of today.
    pub async fn fixed_income_values(&self, name: &str) -> Result<FixedIncomeValuation, CoreError> {
        let asset = self
            .fixed_income
            .find_by_name(name.trim())
            .ok_or_else(|| CoreError::FixedIncomeNotFound(name.to_string()))?;
        Ok(self.accrual.calculate_values(&asset).await)
    }

    // ── Valuation ───────────────────────────────────────────────────

    /// All positions valued at current prices.
    pub async fn positions(&self) -> Vec<AssetPosition> {
        self.portfolio
            .calculate_positions(&self.transactions.find_all(), &self.fixed_income.find_all(), None)
            .await
    }

    /// Positions as they stood at the end of `date`.
    pub async fn positions_at(&self, date: NaiveDate) -> Vec<AssetPosition> {
        self.portfolio
            .calculate_positions(&self.transactions.find_all(), &self.fixed_income.find_all(), Some(date))
            .await
    }

    pub async fn summary(&self) -> PortfolioSummary {
        DashboardService::summary(&self.positions().await)
    }

    pub async fn dashboard(&self) -> Dashboard {
        DashboardService::build(&self.positions().await)
    }

    /// Totals for the first day of each of the last `evolution_months`
    /// months, plus today.
    pub async fn evolution(&self) -> Vec<EvolutionPoint> {
        self.portfolio
            .calculate_evolution(
                &self.transactions.find_all(),
                &self.fixed_income.find_all(),
                self.settings.evolution_months,
                today(),
            )
            .await
    }

    // ── Market data ─────────────────────────────────────────────────

    pub async fn search(&self, term: &str) -> Vec<AssetDescriptor> {
        self.market_data.search(term).await
    }

    /// Cached current price, `None` when unknown.
    #[must_use]
    pub fn get_price(&self, ticker: &str) -> Option<Decimal> {
        self.market_data.get_price(ticker)
    }

    /// Start refreshing every held asset in the background.
    /// The returned handle resolves to the number of prices updated.
    pub fn refresh_all_market_data(&self) -> JoinHandle<usize> {
        self.market_data.refresh_all_market_data(held_assets(self.transactions.as_ref()))
    }

    /// Refresh held assets every `refresh_interval_secs` until the handle
    /// is stopped or dropped.
    pub fn start_scheduled_refresh(&self) -> RefreshHandle {
        let store = Arc::clone(&self.transactions);
        let assets: AssetSource = Arc::new(move || held_assets(store.as_ref()));
        self.market_data
            .start_scheduled_refresh(self.settings.refresh_interval(), assets)
    }
}

/// Wires an [`InvestmentTracker`], with every collaborator replaceable.
#[must_use]
pub struct TrackerBuilder {
    settings: Settings,
    transactions: Option<Arc<dyn TransactionStore>>,
    fixed_income: Option<Arc<dyn FixedIncomeStore>>,
    registry: Option<ProviderRegistry>,
    exchange_rates: Option<Arc<dyn ExchangeRateSource>>,
    holidays: Option<Arc<dyn HolidaySource>>,
    index_rates: Option<Option<Arc<dyn IndexRateSource>>>,
    notifier: Option<Arc<dyn PriceNotifier>>,
    calendar: Option<Arc<CalendarService>>,
}

impl TrackerBuilder {
    fn new(settings: Settings) -> Self {
        Self {
            settings,
            transactions: None,
            fixed_income: None,
            registry: None,
            exchange_rates: None,
            holidays: None,
            index_rates: None,
            notifier: None,
            calendar: None,
        }
    }

    pub fn transaction_store(mut self, store: Arc<dyn TransactionStore>) -> Self {
        self.transactions = Some(store);
        self
    }

    pub fn fixed_income_store(mut self, store: Arc<dyn FixedIncomeStore>) -> Self {
        self.fixed_income = Some(store);
        self
    }

    pub fn registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn exchange_rates(mut self, source: Arc<dyn ExchangeRateSource>) -> Self {
        self.exchange_rates = Some(source);
        self
    }

    pub fn holidays(mut self, source: Arc<dyn HolidaySource>) -> Self {
        self.holidays = Some(source);
        self
    }

    /// `None` disables index lookups: CDI and IPCA holdings stay at the
    /// invested amount.
    pub fn index_rates(mut self, source: Option<Arc<dyn IndexRateSource>>) -> Self {
        self.index_rates = Some(source);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn PriceNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Use a pre-loaded calendar instead of an empty one.
    pub fn calendar(mut self, calendar: Arc<CalendarService>) -> Self {
        self.calendar = Some(calendar);
        self
    }

    pub fn build(self) -> InvestmentTracker {
        let settings = self.settings;
        let timeout = settings.provider_timeout();

        let registry = self
            .registry
            .unwrap_or_else(|| ProviderRegistry::new_with_defaults(&settings));
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(NoopNotifier) as Arc<dyn PriceNotifier>);
        let market_data = Arc::new(MarketDataService::with_notifier(registry, timeout, notifier));

        let exchange_rates = self
            .exchange_rates
            .unwrap_or_else(|| Arc::new(FrankfurterRateSource::new(timeout)) as Arc<dyn ExchangeRateSource>);
        let currency = Arc::new(CurrencyService::new(exchange_rates, &settings.home_currency));

        let calendar = self.calendar.unwrap_or_else(|| Arc::new(CalendarService::new()));
        let holiday_source = self
            .holidays
            .unwrap_or_else(|| Arc::new(BrasilApiHolidaySource::new(timeout)) as Arc<dyn HolidaySource>);
        let index_rates = self
            .index_rates
            .unwrap_or_else(|| Some(Arc::new(BcbIndexSource::new(timeout)) as Arc<dyn IndexRateSource>));
        let accrual = Arc::new(FixedIncomeService::new(Arc::clone(&calendar), index_rates));

        let portfolio = PortfolioService::new(Arc::clone(&market_data), Arc::clone(&currency), Arc::clone(&accrual))
            .with_crypto_invested_conversion(settings.convert_crypto_invested);

        InvestmentTracker {
            transactions: self
                .transactions
                .unwrap_or_else(|| Arc::new(InMemoryTransactionStore::new()) as Arc<dyn TransactionStore>),
            fixed_income: self
                .fixed_income
                .unwrap_or_else(|| Arc::new(InMemoryFixedIncomeStore::new()) as Arc<dyn FixedIncomeStore>),
            settings,
            market_data,
            currency,
            calendar,
            holiday_source,
            accrual,
            portfolio,
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Distinct asset keys across all stored transactions.
fn held_assets(store: &dyn TransactionStore) -> Vec<AssetKey> {
    store
        .find_all()
        .iter()
        .map(Transaction::key)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
