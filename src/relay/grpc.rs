//! gRPC submitter.

use async_trait::async_trait;
use tonic::transport::Channel;

use super::TransactionSubmitter;
use crate::proto::ledger_service_client::LedgerServiceClient;
use crate::proto::{CreateTransactionRequest, Transaction};

/// Submits over one long-lived channel to the ledger server.
#[derive(Clone)]
pub struct GrpcSubmitter {
    client: LedgerServiceClient<Channel>,
}

impl GrpcSubmitter {
    pub fn new(channel: Channel) -> Self {
        Self {
            client: LedgerServiceClient::new(channel),
        }
    }
}

#[async_trait]
impl TransactionSubmitter for GrpcSubmitter {
    async fn submit(&self, request: CreateTransactionRequest) -> Result<Transaction, tonic::Status> {
        // Clones share the underlying channel.
        let mut client = self.client.clone();
        let response = client.create_transaction(request).await?;
        Ok(response.into_inner())
    }
}
