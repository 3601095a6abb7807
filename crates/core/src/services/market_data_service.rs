use chrono::NaiveDate;
use dashmap::DashMap;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::error::Elapsed;
use tokio::time::{timeout, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::errors::CoreError;
use crate::models::asset::{AssetDescriptor, AssetKey, AssetType};
use crate::models::price::PriceQuote;
use crate::notifications::{NoopNotifier, PriceNotifier};
use crate::providers::registry::ProviderRegistry;
use crate::providers::traits::MarketDataProvider;

/// Provider calls in flight at once during a batch.
const MAX_IN_FLIGHT: usize = 8;

/// Supplies the assets a scheduled refresh should price on each tick.
pub type AssetSource = Arc<dyn Fn() -> Vec<AssetKey> + Send + Sync>;

/// Routes price requests to providers and keeps the current-price cache.
///
/// Fallback rules:
/// - Providers are tried one at a time, in registry order, and the first
///   one returning a price wins. Later providers are never called once a
///   price is found.
/// - An error, an empty result or a timeout all mean "try the next one".
/// - When every provider is exhausted the result is `None`, not zero.
///
/// The current-price cache is process-wide and last-write-wins; a
/// background refresh may overwrite a value while a calculation reads it.
pub struct MarketDataService {
    registry: ProviderRegistry,
    prices: Arc<DashMap<String, Decimal>>,
    notifier: Arc<dyn PriceNotifier>,
    call_timeout: Duration,
}

impl MarketDataService {
    pub fn new(registry: ProviderRegistry, call_timeout: Duration) -> Self {
        Self::with_notifier(registry, call_timeout, Arc::new(NoopNotifier))
    }

    pub fn with_notifier(
        registry: ProviderRegistry,
        call_timeout: Duration,
        notifier: Arc<dyn PriceNotifier>,
    ) -> Self {
        Self {
            registry,
            prices: Arc::new(DashMap::new()),
            notifier,
            call_timeout,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Providers able to price `asset_type`, in fallback order.
    pub fn find_providers_for(&self, asset_type: AssetType) -> Vec<Arc<dyn MarketDataProvider>> {
        self.registry.get_providers_for(asset_type)
    }

    /// Run every provider's one-time setup; failures are non-fatal.
    pub async fn initialize(&self) -> usize {
        self.registry.initialize_all().await
    }

    /// Current price from the first provider that has one.
    /// Successful lookups update the price cache.
    #[instrument(skip(self), fields(ticker = %asset.ticker, asset_type = %asset.asset_type))]
    pub async fn get_price_with_fallback(&self, asset: &AssetKey) -> Option<Decimal> {
        let providers = self.find_providers_for(asset.asset_type);
        if providers.is_empty() {
            warn!("{}", CoreError::NoProvider(asset.asset_type.to_string()));
            return None;
        }

        for provider in &providers {
            let batch = std::slice::from_ref(asset);
            match timeout(self.call_timeout, provider.fetch_prices(batch)).await {
                Ok(quotes) => {
                    if let Some(quote) = quotes.into_iter().find(|q| q.key.ticker == asset.ticker) {
                        debug!(provider = provider.name(), price = %quote.price, "Price resolved");
                        self.cache_price(&asset.ticker, quote.price);
                        return Some(quote.price);
                    }
                    debug!(provider = provider.name(), "No price, trying next provider");
                }
                Err(_) => warn!(error = %self.timeout_error(provider.as_ref()), "Provider timed out"),
            }
        }

        warn!(providers = providers.len(), "All providers exhausted, no price available");
        None
    }

    /// Closing price on or just before `date`, same fallback chain.
    /// Historical prices never touch the current-price cache.
    #[instrument(skip(self), fields(ticker = %asset.ticker, asset_type = %asset.asset_type))]
    pub async fn get_historical_price_with_fallback(&self, asset: &AssetKey, date: NaiveDate) -> Option<Decimal> {
        let providers = self.find_providers_for(asset.asset_type);

        for provider in &providers {
            match timeout(self.call_timeout, provider.fetch_historical_price(asset, date)).await {
                Ok(Some(price)) => {
                    debug!(provider = provider.name(), %price, "Historical price resolved");
                    return Some(price);
                }
                Ok(None) => debug!(provider = provider.name(), "No historical price, trying next provider"),
                Err(_) => warn!(error = %self.timeout_error(provider.as_ref()), "Provider timed out"),
            }
        }

        warn!(providers = providers.len(), "All providers exhausted, no historical price available");
        None
    }

    /// Cached current price for `ticker`, without I/O.
    /// `None` means "unknown", never "worth zero".
    pub fn get_price(&self, ticker: &str) -> Option<Decimal> {
        self.prices.get(&ticker.trim().to_uppercase()).map(|p| *p)
    }

    pub fn cached_prices(&self) -> usize {
        self.prices.len()
    }

    /// Price a batch through the fallback chain. Each provider only sees
    /// the assets its predecessors could not price, one call per asset
    /// with its own timeout, so a stuck item never costs its siblings.
    pub async fn fetch_and_cache(&self, assets: &[AssetKey]) -> HashMap<AssetKey, Decimal> {
        let mut by_type: HashMap<AssetType, Vec<AssetKey>> = HashMap::new();
        let mut seen = HashSet::new();
        for asset in assets {
            if asset.asset_type != AssetType::FixedIncome && seen.insert(asset.clone()) {
                by_type.entry(asset.asset_type).or_default().push(asset.clone());
            }
        }

        let mut resolved = HashMap::new();
        for (asset_type, mut pending) in by_type {
            for provider in self.find_providers_for(asset_type) {
                if pending.is_empty() {
                    break;
                }
                let call_timeout = self.call_timeout;
                let outcomes: Vec<(AssetKey, Result<Vec<PriceQuote>, Elapsed>)> = stream::iter(pending.clone())
                    .map(|asset| {
                        let provider = Arc::clone(&provider);
                        async move {
                            let quotes = timeout(call_timeout, provider.fetch_prices(std::slice::from_ref(&asset))).await;
                            (asset, quotes)
                        }
                    })
                    .buffer_unordered(MAX_IN_FLIGHT)
                    .collect()
                    .await;

                for (asset, outcome) in outcomes {
                    let quotes = match outcome {
                        Ok(quotes) => quotes,
                        Err(_) => {
                            warn!(ticker = %asset.ticker, error = %self.timeout_error(provider.as_ref()), "Provider timed out");
                            continue;
                        }
                    };
                    if let Some(quote) = quotes.into_iter().find(|q| q.key.ticker == asset.ticker) {
                        self.cache_price(&asset.ticker, quote.price);
                        resolved.insert(asset, quote.price);
                    }
                }
                pending.retain(|a| !resolved.contains_key(a));
            }

            for asset in &pending {
                warn!(ticker = %asset.ticker, %asset_type, "All providers exhausted, no price available");
            }
        }
        resolved
    }

    /// Refresh prices for `assets` in the background. Returns at once; the
    /// handle resolves to the number of prices fetched.
    pub fn update_prices_for_tickers(self: &Arc<Self>, assets: Vec<AssetKey>) -> JoinHandle<usize> {
        let service = Arc::clone(self);
        tokio::spawn(async move { service.fetch_and_cache(&assets).await.len() })
    }

    /// Background refresh of every given asset, logged at start and finish.
    pub fn refresh_all_market_data(self: &Arc<Self>, assets: Vec<AssetKey>) -> JoinHandle<usize> {
        let service = Arc::clone(self);
        info!(assets = assets.len(), "Market data refresh started");
        tokio::spawn(async move {
            let total = assets.len();
            let updated = service.fetch_and_cache(&assets).await.len();
            info!(updated, total, "Market data refresh finished");
            updated
        })
    }

    /// Refresh on a fixed interval until the handle is stopped or dropped.
    /// The first refresh runs immediately.
    pub fn start_scheduled_refresh(self: &Arc<Self>, interval: Duration, assets: AssetSource) -> RefreshHandle {
        let service = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let batch = assets();
                if batch.is_empty() {
                    debug!("Scheduled refresh skipped, nothing to price");
                    continue;
                }
                info!(assets = batch.len(), "Scheduled market data refresh started");
                let updated = service.fetch_and_cache(&batch).await.len();
                info!(updated, total = batch.len(), "Scheduled market data refresh finished");
            }
        });
        info!(interval_secs = interval.as_secs(), "Scheduled refresh running");
        RefreshHandle { task: Some(task) }
    }

    /// Search every provider concurrently, deduplicated by
    /// `(ticker, asset type, market)` in provider order.
    pub async fn search(&self, term: &str) -> Vec<AssetDescriptor> {
        let term = term.trim();
        if term.is_empty() {
            return Vec::new();
        }

        let searches = self.registry.all().iter().map(|provider| async move {
            match timeout(self.call_timeout, provider.search(term)).await {
                Ok(results) => results,
                Err(_) => {
                    warn!(error = %self.timeout_error(provider.as_ref()), "Search timed out");
                    Vec::new()
                }
            }
        });

        let mut seen = HashSet::new();
        join_all(searches)
            .await
            .into_iter()
            .flatten()
            .filter(|d| seen.insert((d.ticker.clone(), d.asset_type, d.market)))
            .collect()
    }

    fn cache_price(&self, ticker: &str, price: Decimal) {
        let ticker = ticker.trim().to_uppercase();
        self.notifier.notify(&ticker, price);
        self.prices.insert(ticker, price);
    }

    fn timeout_error(&self, provider: &dyn MarketDataProvider) -> CoreError {
        CoreError::Timeout {
            provider: provider.name().to_string(),
            seconds: self.call_timeout.as_secs(),
        }
    }
}

/// Owns the periodic refresh task; stopping or dropping it aborts the task.
pub struct RefreshHandle {
    task: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn stop(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("Scheduled refresh stopped");
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.abort();
    }
}
