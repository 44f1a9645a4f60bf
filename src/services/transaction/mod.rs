//! Transaction service: record deposits and answer reads.
//!
//! Reads follow cache-aside over [`ResponseCache`]. Creates never touch the
//! cache, so a balance or list read may trail a create by up to one TTL.

use std::sync::Arc;

use tracing::debug;

use crate::cache::{keys, ResponseCache};
use crate::model::{
    NewTransaction, Transaction, TransactionList, TransactionWindow, UserBalance, UserId,
};
use crate::storage::{LedgerStore, Result};


/// Ledger operations over a store and a read cache.
#[derive(Clone)]
pub struct TransactionService {
    store: Arc<dyn LedgerStore>,
    cache: ResponseCache,
}

impl TransactionService {
    pub fn new(store: Arc<dyn LedgerStore>, cache: ResponseCache) -> Self {
        Self { store, cache }
    }

    /// Record a deposit and increment the user's balance.
    #[tracing::instrument(name = "ledger.create_transaction", skip_all, fields(user_id = new.user_id))]
    pub async fn create_transaction(&self, new: &NewTransaction) -> Result<Transaction> {
        let created = self.store.create_transaction(new).await?;
        debug!(transaction_id = created.id, "Transaction created");
        Ok(created)
    }

    /// Transactions inside `window`, served from cache when fresh.
    #[tracing::instrument(name = "ledger.list_transactions", skip_all, fields(user_id = window.user_id))]
    pub async fn list_transactions(&self, window: &TransactionWindow) -> Result<TransactionList> {
        let key = keys::transactions(window);
        if let Some(list) = self.cache.fetch::<TransactionList>(&key).await {
            return Ok(list);
        }

        let list = TransactionList {
            transactions: self.store.list_transactions(window).await?,
        };
        self.cache.populate(&key, &list).await;

        Ok(list)
    }

    /// Current balance, served from cache when fresh.
    ///
    /// A missing user is never cached.
    #[tracing::instrument(name = "ledger.get_balance", skip_all, fields(user_id = user_id))]
    pub async fn get_balance(&self, user_id: UserId) -> Result<UserBalance> {
        let key = keys::balance(user_id);
        if let Some(balance) = self.cache.fetch::<UserBalance>(&key).await {
            return Ok(balance);
        }

        let balance = self.store.get_balance(user_id).await?;
        self.cache.populate(&key, &balance).await;

        Ok(balance)
    }
}
