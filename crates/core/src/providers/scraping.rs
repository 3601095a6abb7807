use reqwest::Client;
use rust_decimal::Decimal;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

use super::util::{http_client, parse_display_price};
use crate::errors::CoreError;

/// Bounded pool for page scrapes.
///
/// Downloads are gated by a semaphore and HTML parsing runs on the blocking
/// thread pool, so slow scrapes never starve the async request workers.
/// Cloning shares the same permits.
#[derive(Clone)]
pub struct ScrapePool {
    client: Client,
    permits: Arc<Semaphore>,
}

impl ScrapePool {
    pub fn new(concurrency: usize, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Download `url` and extract the first price matched by `selectors`.
    /// `Ok(None)` means the page loaded but carried no recognizable price.
    pub async fn scrape_price(
        &self,
        url: &str,
        selectors: &'static [&'static str],
    ) -> Result<Option<Decimal>, CoreError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| CoreError::Network(format!("Scrape pool closed: {e}")))?;

        debug!(url, "Scraping page");
        let html = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        tokio::task::spawn_blocking(move || extract_price(&html, selectors))
            .await
            .map_err(|e| CoreError::Parse(format!("Scrape parser task failed: {e}")))
    }
}

/// First element matching any selector (tried in order) whose text parses as a price.
pub fn extract_price(html: &str, selectors: &[&str]) -> Option<Decimal> {
    let document = Html::parse_document(html);
    selectors
        .iter()
        .filter_map(|raw| Selector::parse(raw).ok())
        .find_map(|selector| {
            document.select(&selector).find_map(|element| {
                let text: String = element.text().collect();
                parse_display_price(&text)
            })
        })
}
