pub mod errors;
pub mod ledger;
pub mod models;
pub mod services;
pub mod validation;
