use std::collections::BTreeSet;
use std::sync::RwLock;
use uuid::Uuid;

use super::traits::{FixedIncomeStore, TransactionStore};
use crate::errors::CoreError;
use crate::models::fixed_income::FixedIncomeAsset;
use crate::models::transaction::Transaction;

/// Process-local transaction store, kept in date order.
#[derive(Debug, Default)]
pub struct InMemoryTransactionStore {
    transactions: RwLock<Vec<Transaction>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transactions(transactions: Vec<Transaction>) -> Self {
        let store = Self::new();
        for tx in transactions {
            store.insert_sorted(tx);
        }
        store
    }

    /// Binary insert by date; same-day transactions keep insertion order.
    fn insert_sorted(&self, tx: Transaction) {
        let mut txs = self.transactions.write().unwrap_or_else(|e| e.into_inner());
        let pos = txs.partition_point(|t| t.date <= tx.date);
        txs.insert(pos, tx);
    }
}

impl TransactionStore for InMemoryTransactionStore {
    fn find_all(&self) -> Vec<Transaction> {
        self.transactions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn find_by_ticker(&self, ticker: &str) -> Vec<Transaction> {
        let upper = ticker.trim().to_uppercase();
        self.transactions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|t| t.ticker == upper)
            .cloned()
            .collect()
    }

    fn find_distinct_tickers(&self) -> Vec<String> {
        let txs = self.transactions.read().unwrap_or_else(|e| e.into_inner());
        txs.iter()
            .map(|t| t.ticker.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn save(&self, tx: Transaction) -> Result<(), CoreError> {
        self.insert_sorted(tx);
        Ok(())
    }

    fn delete_by_ticker(&self, ticker: &str) -> usize {
        let upper = ticker.trim().to_uppercase();
        let mut txs = self.transactions.write().unwrap_or_else(|e| e.into_inner());
        let before = txs.len();
        txs.retain(|t| t.ticker != upper);
        before - txs.len()
    }

    fn delete_by_id(&self, id: Uuid) -> Result<(), CoreError> {
        let mut txs = self.transactions.write().unwrap_or_else(|e| e.into_inner());
        let idx = txs
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| CoreError::TransactionNotFound(id.to_string()))?;
        txs.remove(idx);
        Ok(())
    }
}

/// Process-local fixed-income store keyed by name.
#[derive(Debug, Default)]
pub struct InMemoryFixedIncomeStore {
    assets: RwLock<Vec<FixedIncomeAsset>>,
}

impl InMemoryFixedIncomeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FixedIncomeStore for InMemoryFixedIncomeStore {
    fn find_all(&self) -> Vec<FixedIncomeAsset> {
        self.assets.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn find_by_name(&self, name: &str) -> Option<FixedIncomeAsset> {
        self.assets
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|a| a.name == name.trim())
            .cloned()
    }

    fn save(&self, asset: FixedIncomeAsset) -> Result<(), CoreError> {
        let mut assets = self.assets.write().unwrap_or_else(|e| e.into_inner());
        if assets.iter().any(|a| a.name == asset.name) {
            return Err(CoreError::DuplicateFixedIncome(asset.name));
        }
        assets.push(asset);
        Ok(())
    }

    fn delete_by_name(&self, name: &str) -> Result<(), CoreError> {
        let mut assets = self.assets.write().unwrap_or_else(|e| e.into_inner());
        let idx = assets
            .iter()
            .position(|a| a.name == name.trim())
            .ok_or_else(|| CoreError::FixedIncomeNotFound(name.to_string()))?;
        assets.remove(idx);
        Ok(())
    }
}
