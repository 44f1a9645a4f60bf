//! Ledger business operations.

pub mod transaction;

pub use transaction::TransactionService;
