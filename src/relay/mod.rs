//! Queue-to-ledger relay.
//!
//! Turns transaction events from an at-least-once feed into create calls
//! against the ledger and decides what happens to each delivery:
//!
//! ```text
//! Received -> Parsed -> Submitted -> Ack | Requeue | Drop
//! ```
//!
//! A bounded [`RedeliveryTracker`] counts deliveries per correlation token.
//! Once a token has been seen more than `max_redeliveries` times the
//! delivery is dropped (acknowledged without processing) so a poison
//! message cannot cycle forever.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{info, warn, Instrument};

use crate::config::RelayConfig;
use crate::model::{to_proto_timestamp, UserId};
use crate::proto::{CreateTransactionRequest, Transaction};

pub mod grpc;
pub mod tracker;

pub use grpc::GrpcSubmitter;
pub use tracker::RedeliveryTracker;


/// Event body published to the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub user_id: UserId,
    pub amount: f64,
    pub datetime: DateTime<Utc>,
}

impl From<&TransactionEvent> for CreateTransactionRequest {
    fn from(event: &TransactionEvent) -> Self {
        CreateTransactionRequest {
            user_id: event.user_id,
            datetime: Some(to_proto_timestamp(&event.datetime)),
            amount: event.amount,
        }
    }
}

/// What to do with a delivery once the relay is done with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processed; remove from the feed.
    Ack,
    /// Failed; return to the feed for another attempt.
    Requeue,
    /// Redelivered too often; remove from the feed unprocessed.
    Drop,
}

/// Errors from processing one delivery.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Malformed event: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Submit failed: {0}")]
    Submit(#[from] tonic::Status),

    #[error("Submit timed out after {0:?}")]
    Timeout(Duration),
}

/// Downstream that records a transaction.
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    async fn submit(&self, request: CreateTransactionRequest)
        -> Result<Transaction, tonic::Status>;
}

/// Token used to count redeliveries of one logical message.
///
/// Prefers the producer-assigned `app_id`, then `message_id`. Messages with
/// neither are keyed by a digest of their body.
pub fn correlation_token(app_id: Option<&str>, message_id: Option<&str>, body: &[u8]) -> String {
    app_id
        .filter(|id| !id.is_empty())
        .or(message_id.filter(|id| !id.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| hex::encode(Sha256::digest(body)))
}

/// Applies the redelivery policy and forwards events to a submitter.
///
/// Deliveries are handled one at a time; the caller awaits `handle` before
/// taking the next message.
pub struct MessageRelay {
    submitter: Arc<dyn TransactionSubmitter>,
    tracker: Mutex<RedeliveryTracker>,
    max_redeliveries: u32,
    submit_timeout: Option<Duration>,
}

impl MessageRelay {
    pub fn new(
        submitter: Arc<dyn TransactionSubmitter>,
        max_redeliveries: u32,
        tracked_tokens: usize,
        submit_timeout: Option<Duration>,
    ) -> Self {
        Self {
            submitter,
            tracker: Mutex::new(RedeliveryTracker::new(tracked_tokens)),
            max_redeliveries,
            submit_timeout,
        }
    }

    pub fn from_config(submitter: Arc<dyn TransactionSubmitter>, config: &RelayConfig) -> Self {
        Self::new(
            submitter,
            config.max_redeliveries,
            config.tracked_tokens,
            config.submit_timeout(),
        )
    }

    /// Decide the fate of one delivery.
    pub async fn handle(&self, token: &str, body: &[u8]) -> Disposition {
        let span = tracing::info_span!("relay.handle", token = %token);
        self.handle_inner(token, body).instrument(span).await
    }

    async fn handle_inner(&self, token: &str, body: &[u8]) -> Disposition {
        let seen = self.tracker.lock().await.record(token);
        if seen > self.max_redeliveries {
            self.tracker.lock().await.clear(token);
            warn!(
                deliveries = seen,
                max_redeliveries = self.max_redeliveries,
                "Redelivery limit reached, dropping message"
            );
            return Disposition::Drop;
        }

        match self.process(body).await {
            Ok(created) => {
                self.tracker.lock().await.clear(token);
                info!(
                    transaction_id = created.id,
                    user_id = created.user_id,
                    "Transaction created"
                );
                Disposition::Ack
            }
            Err(e) => {
                warn!(error = %e, deliveries = seen, "Failed to relay message, requeueing");
                Disposition::Requeue
            }
        }
    }

    async fn process(&self, body: &[u8]) -> Result<Transaction, RelayError> {
        let event: TransactionEvent = serde_json::from_slice(body)?;
        let request = CreateTransactionRequest::from(&event);

        let submit = self.submitter.submit(request);
        let created = match self.submit_timeout {
            Some(limit) => tokio::time::timeout(limit, submit)
                .await
                .map_err(|_| RelayError::Timeout(limit))??,
            None => submit.await?,
        };

        Ok(created)
    }

    /// Deliveries currently counted for `token`.
    pub async fn deliveries(&self, token: &str) -> u32 {
        self.tracker.lock().await.count(token)
    }
}
