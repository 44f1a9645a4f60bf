//! btc-relay: queue consumer
//!
//! Takes transaction events off the AMQP feed and records each one through
//! the ledger's CreateTransaction RPC. Deliveries are acked on success,
//! requeued on failure, and dropped once redelivered too often.
//!
//! ## Configuration
//! - BTC__MESSAGING__AMQP__URL / QUEUE: feed
//! - BTC__RELAY__LEDGER_ADDRESS: btc-server address
//! - BTC__RELAY__MAX_REDELIVERIES, BTC__RELAY__SUBMIT_TIMEOUT_SECS
//! - BTC_LOG: tracing filter (default "info")

use std::sync::Arc;

use tracing::{error, info};

use btc_ledger::bus::AmqpConsumer;
use btc_ledger::config::Config;
use btc_ledger::relay::{GrpcSubmitter, MessageRelay};
use btc_ledger::transport::{connect_channel, shutdown_signal};
use btc_ledger::utils::bootstrap;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    bootstrap::init_tracing();

    let config_path = bootstrap::parse_config_path();
    let config = Config::load(config_path.as_deref()).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!("Starting btc-relay");

    let address = config.relay.ledger_address.as_str();
    let channel = bootstrap::connect_with_retry("ledger", address, move || connect_channel(address))
        .await
        .map_err(|e| e as Box<dyn std::error::Error>)?;

    let relay = Arc::new(MessageRelay::from_config(
        Arc::new(GrpcSubmitter::new(channel)),
        &config.relay,
    ));

    let consumer = AmqpConsumer::new(&config.messaging.amqp, relay)?;
    info!(
        queue = %config.messaging.amqp.queue,
        max_redeliveries = config.relay.max_redeliveries,
        "Waiting for messages"
    );
    consumer.run_until(shutdown_signal()).await;

    info!("btc-relay stopped");
    Ok(())
}
