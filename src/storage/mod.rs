//! Ledger storage.
//!
//! This module contains:
//! - `LedgerStore` trait: durable transactions and balances
//! - `StorageError`: failures surfaced unchanged to callers
//! - Implementations: PostgreSQL (primary/replica), Mock

use async_trait::async_trait;

use crate::model::{NewTransaction, Transaction, TransactionWindow, UserBalance, UserId};

pub mod mock;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "postgres")]
pub mod schema;

pub use mock::MockLedgerStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresLedgerStore;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
///
/// `UserNotFound` is an expected outcome callers branch on. Everything else
/// is a fault and is never retried inside the store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("user id: {user_id} not found")]
    UserNotFound { user_id: UserId },

    #[cfg(feature = "postgres")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[cfg(feature = "postgres")]
    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Whether this is the expected "user does not exist" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::UserNotFound { .. })
    }
}

/// Interface for ledger persistence.
///
/// Reads may be served by a replica. Writes always go to the primary.
///
/// Implementations:
/// - `PostgresLedgerStore`: PostgreSQL with optional read replica
/// - `MockLedgerStore`: In-memory mock for testing
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Record a deposit and increment the user's balance by its amount.
    ///
    /// Both writes commit together or not at all. Fails with `UserNotFound`
    /// when the user does not exist.
    async fn create_transaction(&self, new: &NewTransaction) -> Result<Transaction>;

    /// Transactions for the user with `start <= datetime <= end`, ordered by
    /// datetime ascending. Empty when nothing matches.
    async fn list_transactions(&self, window: &TransactionWindow) -> Result<Vec<Transaction>>;

    /// Current balance. Fails with `UserNotFound` when the user does not exist.
    async fn get_balance(&self, user_id: UserId) -> Result<UserBalance>;
}

/// Initialize the ledger store from configuration.
///
/// Connects the primary pool (and the replica pool when configured) and
/// applies migrations unless disabled.
#[cfg(feature = "postgres")]
pub async fn init_storage(
    config: &crate::config::StorageConfig,
) -> std::result::Result<std::sync::Arc<dyn LedgerStore>, Box<dyn std::error::Error>> {
    let store = PostgresLedgerStore::connect(&config.postgres).await?;

    if config.postgres.migrate {
        store.migrate().await?;
        tracing::info!("Ledger migrations applied");
    }

    Ok(std::sync::Arc::new(store))
}
