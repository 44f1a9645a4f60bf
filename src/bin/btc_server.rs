//! btc-server: ledger gRPC server
//!
//! Serves `btc.LedgerService` and `grpc.health.v1.Health`.
//!
//! ## Architecture
//! ```text
//! [Client / btc-relay] -> [btc-server] -> [Response Cache] (reads)
//!                              |
//!                              v
//!                   [PostgreSQL primary] (writes)
//!                   [PostgreSQL replica] (reads)
//! ```
//!
//! ## Configuration
//! - `--config <path>` or BTC_CONFIG: YAML configuration file
//! - BTC__STORAGE__POSTGRES__PRIMARY_URI / REPLICA_URI: storage
//! - BTC__CACHE__TYPE: redis | memory | none
//! - BTC_LOG: tracing filter (default "info")

use std::net::SocketAddr;

use tonic::transport::Server;
use tracing::{error, info};

use btc_ledger::cache::init_cache;
use btc_ledger::config::Config;
use btc_ledger::handlers::{HealthHandler, LedgerHandler};
use btc_ledger::services::TransactionService;
use btc_ledger::storage::init_storage;
use btc_ledger::transport::{grpc_trace_layer, shutdown_signal};
use btc_ledger::utils::bootstrap;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    bootstrap::init_tracing();

    let config_path = bootstrap::parse_config_path();
    let config = Config::load(config_path.as_deref()).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!("Starting btc-server");

    let store = init_storage(&config.storage).await?;
    info!("Storage initialized");

    let cache = init_cache(&config.cache).await;
    let service = TransactionService::new(store, cache);

    let addr: SocketAddr = config.server.addr().parse()?;

    let mut builder = Server::builder();
    if let Some(timeout) = config.server.request_timeout() {
        info!(timeout_secs = timeout.as_secs(), "Request timeout enabled");
        builder = builder.timeout(timeout);
    }

    let router = builder
        .layer(grpc_trace_layer())
        .add_service(HealthHandler.into_service())
        .add_service(LedgerHandler::new(service).into_service());

    info!(address = %addr, "btc-server listening");
    router.serve_with_shutdown(addr, shutdown_signal()).await?;

    info!("btc-server stopped");
    Ok(())
}
