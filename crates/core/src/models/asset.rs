use serde::{Deserialize, Serialize};

/// The class of a tracked asset.
/// Determines which market-data providers are asked for its price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssetType {
    /// Listed shares (PETR4, AAPL, etc.)
    Stock,
    /// Exchange-traded funds (BOVA11, IVV, etc.)
    Etf,
    /// Cryptocurrencies (BTC, ETH, etc.), always quoted in USD
    Crypto,
    /// Fixed-income instruments; valued by accrual, never by a market quote
    FixedIncome,
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetType::Stock => write!(f, "Stock"),
            AssetType::Etf => write!(f, "ETF"),
            AssetType::Crypto => write!(f, "Crypto"),
            AssetType::FixedIncome => write!(f, "Fixed Income"),
        }
    }
}

/// Where a listed asset trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Market {
    /// Home exchange, quoted in the home currency
    Domestic,
    /// Foreign exchange, quoted in USD
    Foreign,
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Market::Domestic => write!(f, "Domestic"),
            Market::Foreign => write!(f, "Foreign"),
        }
    }
}

/// Grouping key for transactions: `(ticker, asset type, market)`.
///
/// A ticker listed both at home and abroad yields two distinct keys,
/// and therefore two positions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetKey {
    /// Uppercased ticker symbol (e.g., "PETR4", "BTC")
    pub ticker: String,
    pub asset_type: AssetType,
    /// `None` for crypto
    pub market: Option<Market>,
}

impl AssetKey {
    pub fn new(ticker: impl Into<String>, asset_type: AssetType, market: Option<Market>) -> Self {
        Self {
            ticker: ticker.into().trim().to_uppercase(),
            asset_type,
            market,
        }
    }

    pub fn crypto(ticker: impl Into<String>) -> Self {
        Self::new(ticker, AssetType::Crypto, None)
    }

    pub fn stock(ticker: impl Into<String>, market: Market) -> Self {
        Self::new(ticker, AssetType::Stock, Some(market))
    }

    pub fn etf(ticker: impl Into<String>, market: Market) -> Self {
        Self::new(ticker, AssetType::Etf, Some(market))
    }

    /// Quoted on a foreign exchange (prices in USD).
    pub fn is_foreign(&self) -> bool {
        self.market == Some(Market::Foreign)
    }

    /// Whether the market price comes back in USD and must be converted
    /// to the home currency. Crypto providers always quote in USD.
    pub fn price_in_usd(&self) -> bool {
        self.asset_type == AssetType::Crypto || self.is_foreign()
    }
}

impl std::fmt::Display for AssetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.market {
            Some(market) => write!(f, "{} ({}, {})", self.ticker, self.asset_type, market),
            None => write!(f, "{} ({})", self.ticker, self.asset_type),
        }
    }
}

/// A search hit returned by a provider's search capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    pub ticker: String,
    pub name: String,
    pub asset_type: AssetType,
    pub market: Option<Market>,
    /// Provider that produced this hit
    pub source: String,
}
