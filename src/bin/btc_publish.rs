//! btc-publish: publish one sample transaction event to the feed.
//!
//! Usage: `btc-publish [--config <path>] [user_id]` (user_id defaults to 1).
//! The amount is random, rounded to two decimal places.

use chrono::Utc;
use rand::Rng;
use tracing::info;

use btc_ledger::bus::AmqpPublisher;
use btc_ledger::config::Config;
use btc_ledger::relay::TransactionEvent;
use btc_ledger::utils::bootstrap;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    bootstrap::init_tracing();

    let config = Config::load(bootstrap::parse_config_path().as_deref())?;
    let user_id = bootstrap::parse_user_id()?.unwrap_or(1);

    let amount: f64 = rand::rng().random_range(0.01..100.0);
    let event = TransactionEvent {
        user_id,
        amount: (amount * 100.0).round() / 100.0,
        datetime: Utc::now(),
    };

    let publisher = AmqpPublisher::new(&config.messaging.amqp).await?;
    let app_id = publisher.publish(&event).await?;

    info!(
        app_id = %app_id,
        user_id = event.user_id,
        amount = event.amount,
        "Published transaction event"
    );
    Ok(())
}
