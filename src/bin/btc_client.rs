//! btc-client: exercise the ledger RPCs once.
//!
//! Usage: `btc-client [--config <path>] [user_id]` (user_id defaults to 1).
//!
//! Records a random deposit, lists the user's transactions from an hour ago
//! to an hour from now, then reads the balance. Connects to
//! `relay.ledger_address`.

use chrono::{Duration, Utc};
use rand::Rng;
use tracing::info;

use btc_ledger::config::Config;
use btc_ledger::model::to_proto_timestamp;
use btc_ledger::proto::ledger_service_client::LedgerServiceClient;
use btc_ledger::proto::{CreateTransactionRequest, GetUserBalanceRequest, ListTransactionRequest};
use btc_ledger::transport::connect_channel;
use btc_ledger::utils::bootstrap;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    bootstrap::init_tracing();

    let config = Config::load(bootstrap::parse_config_path().as_deref())?;
    let user_id = bootstrap::parse_user_id()?.unwrap_or(1);

    let channel = connect_channel(&config.relay.ledger_address)
        .await
        .map_err(|e| e as Box<dyn std::error::Error>)?;
    let mut client = LedgerServiceClient::new(channel);

    let now = Utc::now();
    let amount: f64 = rand::rng().random_range(0.01..100.0);

    let transaction = client
        .create_transaction(CreateTransactionRequest {
            user_id,
            datetime: Some(to_proto_timestamp(&now)),
            amount: (amount * 100.0).round() / 100.0,
        })
        .await?
        .into_inner();
    info!(?transaction, "Transaction created");

    let transactions = client
        .list_transaction(ListTransactionRequest {
            user_id,
            start_datetime: Some(to_proto_timestamp(&(now - Duration::hours(1)))),
            end_datetime: Some(to_proto_timestamp(&(now + Duration::hours(1)))),
        })
        .await?
        .into_inner();
    info!(count = transactions.transactions.len(), ?transactions, "Listed transactions");

    let balance = client
        .get_user_balance(GetUserBalanceRequest { user_id })
        .await?
        .into_inner();
    info!(?balance, "User balance");

    Ok(())
}
