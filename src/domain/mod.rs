//! Domain types
//!
//! Caller identity and derived rental state shared across layers.

mod caller;
mod status;

pub use caller::{Caller, Role};
pub use status::RentalStatus;

/// Fixed loan period applied at rental creation.
pub const LOAN_PERIOD_DAYS: i64 = 30;
