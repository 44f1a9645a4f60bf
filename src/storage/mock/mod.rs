//! Mock storage implementation for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::model::{NewTransaction, Transaction, TransactionWindow, UserBalance, UserId};
use crate::storage::{LedgerStore, Result, StorageError};


#[derive(Default)]
struct Ledger {
    balances: HashMap<UserId, Decimal>,
    transactions: Vec<Transaction>,
}

/// Mock ledger store that keeps users and transactions in memory.
///
/// Both writes of a create happen under one lock, so readers never observe
/// a transaction without its balance increment.
#[derive(Default)]
pub struct MockLedgerStore {
    ledger: RwLock<Ledger>,
    next_id: AtomicI64,
    fail_on_write: RwLock<bool>,
    fail_on_read: RwLock<bool>,
    list_calls: AtomicUsize,
    balance_calls: AtomicUsize,
}

impl MockLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision a user with a starting balance.
    pub async fn insert_user(&self, user_id: UserId, balance: Decimal) {
        self.ledger.write().await.balances.insert(user_id, balance);
    }

    /// Overwrite a balance without recording a transaction.
    pub async fn set_balance(&self, user_id: UserId, balance: Decimal) {
        self.ledger.write().await.balances.insert(user_id, balance);
    }

    /// Insert a transaction row directly, leaving the balance untouched.
    pub async fn insert_transaction(&self, tx: Transaction) {
        self.ledger.write().await.transactions.push(tx);
    }

    pub async fn set_fail_on_write(&self, fail: bool) {
        *self.fail_on_write.write().await = fail;
    }

    pub async fn set_fail_on_read(&self, fail: bool) {
        *self.fail_on_read.write().await = fail;
    }

    /// Every stored transaction, in insertion order.
    pub async fn stored_transactions(&self) -> Vec<Transaction> {
        self.ledger.read().await.transactions.clone()
    }

    /// Number of `list_transactions` calls that reached the store.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `get_balance` calls that reached the store.
    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerStore for MockLedgerStore {
    async fn create_transaction(&self, new: &NewTransaction) -> Result<Transaction> {
        let mut ledger = self.ledger.write().await;

        if !ledger.balances.contains_key(&new.user_id) {
            return Err(StorageError::UserNotFound {
                user_id: new.user_id,
            });
        }
        if *self.fail_on_write.read().await {
            return Err(StorageError::Unavailable(
                "mock write failure".to_string(),
            ));
        }

        let created = Transaction {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            user_id: new.user_id,
            datetime: new.datetime,
            amount: new.amount,
        };

        if let Some(balance) = ledger.balances.get_mut(&new.user_id) {
            *balance += new.amount;
        }
        ledger.transactions.push(created.clone());

        Ok(created)
    }

    async fn list_transactions(&self, window: &TransactionWindow) -> Result<Vec<Transaction>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_on_read.read().await {
            return Err(StorageError::Unavailable("mock read failure".to_string()));
        }

        let ledger = self.ledger.read().await;
        let mut transactions: Vec<Transaction> = ledger
            .transactions
            .iter()
            .filter(|tx| tx.user_id == window.user_id && window.contains(&tx.datetime))
            .cloned()
            .collect();
        transactions.sort_by(|a, b| a.datetime.cmp(&b.datetime).then(a.id.cmp(&b.id)));

        Ok(transactions)
    }

    async fn get_balance(&self, user_id: UserId) -> Result<UserBalance> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_on_read.read().await {
            return Err(StorageError::Unavailable("mock read failure".to_string()));
        }

        let ledger = self.ledger.read().await;
        match ledger.balances.get(&user_id) {
            Some(balance) => Ok(UserBalance {
                user_id,
                balance: *balance,
            }),
            None => Err(StorageError::UserNotFound { user_id }),
        }
    }
}
