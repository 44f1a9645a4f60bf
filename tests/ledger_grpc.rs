//! End-to-end gRPC tests over a loopback server with in-memory backends.
//!
//! Run with: cargo test --test ledger_grpc

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use btc_ledger::cache::{MemoryCache, ResponseCache};
use btc_ledger::handlers::{HealthHandler, LedgerHandler};
use btc_ledger::proto::ledger_service_client::LedgerServiceClient;
use btc_ledger::proto::{CreateTransactionRequest, GetUserBalanceRequest, ListTransactionRequest};
use btc_ledger::relay::{Disposition, GrpcSubmitter, MessageRelay, TransactionEvent};
use btc_ledger::services::TransactionService;
use btc_ledger::storage::MockLedgerStore;
use btc_ledger::transport::{connect_channel, grpc_trace_layer};
use chrono::{TimeZone, Utc};
use prost_types::Timestamp;
use rust_decimal::Decimal;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Channel, Server};
use tonic::Code;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;

struct TestServer {
    store: Arc<MockLedgerStore>,
    channel: Channel,
}

/// Start a ledger server on an ephemeral port.
async fn start_server(ttl: Duration) -> TestServer {
    let store = Arc::new(MockLedgerStore::new());
    let cache = ResponseCache::new(Arc::new(MemoryCache::new()), ttl);
    let service = TransactionService::new(store.clone(), cache);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind listener");
    let addr = listener.local_addr().expect("Failed to read local addr");

    tokio::spawn(async move {
        Server::builder()
            .layer(grpc_trace_layer())
            .add_service(HealthHandler.into_service())
            .add_service(LedgerHandler::new(service).into_service())
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .expect("Server failed");
    });

    let channel = connect_channel(&addr.to_string())
        .await
        .expect("Failed to connect to server");

    TestServer { store, channel }
}

fn timestamp(seconds: i64) -> Option<Timestamp> {
    Some(Timestamp { seconds, nanos: 0 })
}

fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

#[tokio::test]
async fn test_create_list_and_balance() {
    let server = start_server(Duration::from_secs(1)).await;
    server.store.insert_user(1988, Decimal::ZERO).await;
    let mut client = LedgerServiceClient::new(server.channel.clone());

    let created = client
        .create_transaction(CreateTransactionRequest {
            user_id: 1988,
            datetime: timestamp(1_676_169_338),
            amount: 100.5,
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(created.amount, 100.5);

    let balance = client
        .get_user_balance(GetUserBalanceRequest { user_id: 1988 })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(balance.balance, 100.5);

    let listed = client
        .list_transaction(ListTransactionRequest {
            user_id: 1988,
            start_datetime: timestamp(1_676_169_338),
            end_datetime: timestamp(1_676_169_338),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(listed.transactions, vec![created]);
}

#[tokio::test]
async fn test_balance_served_from_cache_within_ttl() {
    let server = start_server(Duration::from_millis(300)).await;
    server.store.insert_user(1988, dec("100.5")).await;
    let mut client = LedgerServiceClient::new(server.channel.clone());

    let first = client
        .get_user_balance(GetUserBalanceRequest { user_id: 1988 })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(first.balance, 100.5);

    server.store.set_balance(1988, dec("200")).await;

    let cached = client
        .get_user_balance(GetUserBalanceRequest { user_id: 1988 })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(cached.balance, 100.5);

    tokio::time::sleep(Duration::from_millis(400)).await;

    let fresh = client
        .get_user_balance(GetUserBalanceRequest { user_id: 1988 })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(fresh.balance, 200.0);
}

#[tokio::test]
async fn test_status_codes() {
    let server = start_server(Duration::from_secs(1)).await;
    server.store.insert_user(1, Decimal::ZERO).await;
    let mut client = LedgerServiceClient::new(server.channel.clone());

    let status = client
        .create_transaction(CreateTransactionRequest {
            user_id: 1,
            datetime: timestamp(0),
            amount: -1.0,
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    let status = client
        .get_user_balance(GetUserBalanceRequest { user_id: 404 })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);

    server.store.set_fail_on_read(true).await;
    let status = client
        .list_transaction(ListTransactionRequest {
            user_id: 1,
            start_datetime: None,
            end_datetime: None,
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Internal);
}

#[tokio::test]
async fn test_health_check() {
    let server = start_server(Duration::from_secs(1)).await;
    let mut health = HealthClient::new(server.channel.clone());

    let response = health
        .check(HealthCheckRequest {
            service: String::new(),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(
        response.status,
        tonic_health::pb::health_check_response::ServingStatus::Serving as i32
    );

    let status = health
        .watch(HealthCheckRequest {
            service: String::new(),
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unimplemented);
}

#[tokio::test]
async fn test_relay_submits_over_grpc() {
    let server = start_server(Duration::from_secs(1)).await;
    server.store.insert_user(1, Decimal::ZERO).await;

    let relay = MessageRelay::new(
        Arc::new(GrpcSubmitter::new(server.channel.clone())),
        3,
        100,
        Some(Duration::from_secs(5)),
    );
    let body = serde_json::to_vec(&TransactionEvent {
        user_id: 1,
        amount: 0.42,
        datetime: Utc.timestamp_opt(1_676_169_338, 0).unwrap(),
    })
    .unwrap();

    assert_eq!(relay.handle("app-1", &body).await, Disposition::Ack);
    let stored = server.store.stored_transactions().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].amount, dec("0.42"));

    // Unknown user: the server answers NOT_FOUND and the relay requeues.
    let body = serde_json::to_vec(&TransactionEvent {
        user_id: 404,
        amount: 1.0,
        datetime: Utc.timestamp_opt(1_676_169_338, 0).unwrap(),
    })
    .unwrap();
    assert_eq!(relay.handle("app-2", &body).await, Disposition::Requeue);
}
