//! biblioteka Library
//!
//! Re-exports modules for integration testing and external use.

pub mod api;
pub mod catalog;
pub mod domain;
pub mod jobs;
pub mod policy;
pub mod rental;

// Server wiring and the shared error type
pub mod config;
pub mod db;
mod error;

pub use config::Config;
pub use domain::{Caller, RentalStatus, Role, LOAN_PERIOD_DAYS};
pub use error::{AppError, AppResult};
pub use rental::{Rental, RentalLedger, RentalQueries, RentalView};
