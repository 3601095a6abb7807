pub mod calendar_service;
pub mod currency_service;
pub mod dashboard_service;
pub mod fixed_income_service;
pub mod market_data_service;
pub mod portfolio_service;
pub mod tax_service;
