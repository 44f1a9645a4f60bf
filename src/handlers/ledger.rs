//! LedgerService gRPC handler.

use chrono::Utc;
use tonic::{Request, Response, Status};
use tracing::error;

use crate::model::{TransactionList, UserBalance};
use crate::proto::ledger_service_server::{LedgerService, LedgerServiceServer};
use crate::proto::{
    CreateTransactionRequest, GetUserBalanceRequest, ListTransactionRequest,
    ListTransactionResponse, Transaction, UserBalance as ProtoUserBalance,
};
use crate::services::TransactionService;
use crate::storage::StorageError;
use crate::validation;

/// Map a storage failure to a gRPC status.
///
/// `UserNotFound` is an expected outcome. Everything else is internal.
pub fn storage_error_to_status(err: StorageError) -> Status {
    match err {
        StorageError::UserNotFound { .. } => Status::not_found(err.to_string()),
        other => {
            error!(error = %other, "Storage failure");
            Status::internal(other.to_string())
        }
    }
}

/// gRPC facade over [`TransactionService`].
#[derive(Clone)]
pub struct LedgerHandler {
    service: TransactionService,
}

impl LedgerHandler {
    pub fn new(service: TransactionService) -> Self {
        Self { service }
    }

    pub fn into_service(self) -> LedgerServiceServer<Self> {
        LedgerServiceServer::new(self)
    }
}

#[tonic::async_trait]
impl LedgerService for LedgerHandler {
    async fn create_transaction(
        &self,
        request: Request<CreateTransactionRequest>,
    ) -> Result<Response<Transaction>, Status> {
        let new = validation::validate_create(request.get_ref())?;

        let created = self
            .service
            .create_transaction(&new)
            .await
            .map_err(storage_error_to_status)?;

        Ok(Response::new(Transaction::from(&created)))
    }

    async fn list_transaction(
        &self,
        request: Request<ListTransactionRequest>,
    ) -> Result<Response<ListTransactionResponse>, Status> {
        let window = validation::validate_list(request.get_ref(), Utc::now())?;

        let list: TransactionList = self
            .service
            .list_transactions(&window)
            .await
            .map_err(storage_error_to_status)?;

        Ok(Response::new(ListTransactionResponse::from(&list)))
    }

    async fn get_user_balance(
        &self,
        request: Request<GetUserBalanceRequest>,
    ) -> Result<Response<ProtoUserBalance>, Status> {
        let user_id = validation::validate_balance(request.get_ref())?;

        let balance: UserBalance = self
            .service
            .get_balance(user_id)
            .await
            .map_err(storage_error_to_status)?;

        Ok(Response::new(ProtoUserBalance::from(&balance)))
    }
}
