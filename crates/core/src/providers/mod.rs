pub mod registry;
pub mod scraping;
pub mod traits;
pub mod util;

// Market-data providers
pub mod coincap;
pub mod coinmarketcap;
pub mod google_finance;
pub mod yahoo_finance;

// Exchange-rate, holiday and index sources
pub mod bcb;
pub mod brasil_api;
pub mod frankfurter;
