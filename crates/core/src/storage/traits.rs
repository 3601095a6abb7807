use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::fixed_income::FixedIncomeAsset;
use crate::models::transaction::Transaction;

/// Persistence contract for transactions. Implemented outside the core.
pub trait TransactionStore: Send + Sync {
    fn find_all(&self) -> Vec<Transaction>;

    /// Transactions of one ticker (case-insensitive), oldest first.
    fn find_by_ticker(&self, ticker: &str) -> Vec<Transaction>;

    /// Sorted, de-duplicated tickers.
    fn find_distinct_tickers(&self) -> Vec<String>;

    fn save(&self, tx: Transaction) -> Result<(), CoreError>;

    /// Returns the number of transactions removed.
    fn delete_by_ticker(&self, ticker: &str) -> usize;

    fn delete_by_id(&self, id: Uuid) -> Result<(), CoreError>;
}

/// Persistence contract for fixed-income holdings. Implemented outside the core.
pub trait FixedIncomeStore: Send + Sync {
    fn find_all(&self) -> Vec<FixedIncomeAsset>;

    fn find_by_name(&self, name: &str) -> Option<FixedIncomeAsset>;

    fn save(&self, asset: FixedIncomeAsset) -> Result<(), CoreError>;

    fn delete_by_name(&self, name: &str) -> Result<(), CoreError>;
}
