//! gRPC adapters.
//!
//! Thin layer between generated service traits and [`crate::services`]:
//! validate, delegate, map errors to status codes.

pub mod health;
pub mod ledger;

pub use health::HealthHandler;
pub use ledger::{storage_error_to_status, LedgerHandler};
