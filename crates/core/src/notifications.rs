use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// A freshly fetched price, pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub ticker: String,
    pub price: Decimal,
}

/// Fire-and-forget sink for price updates (e.g., a WebSocket hub).
pub trait PriceNotifier: Send + Sync {
    fn notify(&self, ticker: &str, price: Decimal);
}

/// Drops every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl PriceNotifier for NoopNotifier {
    fn notify(&self, _ticker: &str, _price: Decimal) {}
}

/// Fans updates out over a tokio broadcast channel. Slow subscribers lag
/// and lose messages; sending with no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<PriceUpdate>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PriceUpdate> {
        self.sender.subscribe()
    }
}

impl PriceNotifier for BroadcastNotifier {
    fn notify(&self, ticker: &str, price: Decimal) {
        let update = PriceUpdate {
            ticker: ticker.to_string(),
            price,
        };
        if self.sender.send(update).is_err() {
            trace!(ticker, "No price subscribers");
        }
    }
}
