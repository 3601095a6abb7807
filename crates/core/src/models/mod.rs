pub mod asset;
pub mod dashboard;
pub mod fixed_income;
pub mod position;
pub mod price;
pub mod settings;
pub mod transaction;
