//! Ledger domain types.
//!
//! These are the values that flow between the service, the store and the
//! cache. Wire (protobuf) types live in [`crate::proto`]; conversions sit at
//! the bottom of this module.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::proto;

/// User identifier. Users are provisioned outside this service.
pub type UserId = i64;

/// A committed deposit. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Server-assigned identifier.
    pub id: i64,
    pub user_id: UserId,
    pub datetime: DateTime<Utc>,
    pub amount: Decimal,
}

/// Parameters for recording a deposit.
///
/// `amount` is validated as strictly positive before one of these is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub user_id: UserId,
    pub datetime: DateTime<Utc>,
    pub amount: Decimal,
}

/// Inclusive `[start, end]` query window over a user's transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionWindow {
    pub user_id: UserId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// The caller sent no end; `end` is the time the request was validated.
    pub open_end: bool,
}

impl TransactionWindow {
    /// Whether `datetime` falls inside the window (both bounds inclusive).
    pub fn contains(&self, datetime: &DateTime<Utc>) -> bool {
        *datetime >= self.start && *datetime <= self.end
    }
}

/// Balance response. Cached whole, not as a bare scalar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBalance {
    pub user_id: UserId,
    pub balance: Decimal,
}

/// Transaction list response, ordered by `datetime` ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionList {
    pub transactions: Vec<Transaction>,
}

// ============================================================================
// Wire conversions
// ============================================================================

/// Convert a chrono timestamp to its protobuf form.
pub fn to_proto_timestamp(datetime: &DateTime<Utc>) -> prost_types::Timestamp {
    prost_types::Timestamp {
        seconds: datetime.timestamp(),
        nanos: datetime.timestamp_subsec_nanos() as i32,
    }
}

fn decimal_to_f64(value: &Decimal) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

impl From<&Transaction> for proto::Transaction {
    fn from(tx: &Transaction) -> Self {
        proto::Transaction {
            id: tx.id,
            user_id: tx.user_id,
            datetime: Some(to_proto_timestamp(&tx.datetime)),
            amount: decimal_to_f64(&tx.amount),
        }
    }
}

impl From<&UserBalance> for proto::UserBalance {
    fn from(balance: &UserBalance) -> Self {
        proto::UserBalance {
            user_id: balance.user_id,
            balance: decimal_to_f64(&balance.balance),
        }
    }
}

impl From<&TransactionList> for proto::ListTransactionResponse {
    fn from(list: &TransactionList) -> Self {
        proto::ListTransactionResponse {
            transactions: list.transactions.iter().map(Into::into).collect(),
        }
    }
}
