//! AMQP (RabbitMQ) feed implementation.
//!
//! Producers publish JSON transaction events straight to a named queue
//! through the default exchange. The consumer takes one delivery at a time,
//! hands it to the [`MessageRelay`] and acks or nacks according to the
//! returned [`Disposition`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use deadpool_lapin::{Manager, Pool, PoolError};
use futures::StreamExt;
use lapin::{
    message::Delivery,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
        QueueDeclareOptions,
    },
    types::FieldTable,
    BasicProperties, Channel,
};
use tracing::{debug, error, info};

use super::{BusError, Result};
use crate::config::AmqpConfig;
use crate::relay::{correlation_token, Disposition, MessageRelay, TransactionEvent};

/// Consumer tag reported to the broker.
const CONSUMER_TAG: &str = "btc-relay";

fn build_pool(url: &str) -> Result<Pool> {
    let manager = Manager::new(url.to_string(), Default::default());
    Pool::builder(manager)
        .max_size(2)
        .build()
        .map_err(|e| BusError::Connection(format!("Failed to create pool: {}", e)))
}

async fn open_channel(pool: &Pool) -> Result<Channel> {
    let conn = pool.get().await.map_err(|e: PoolError| {
        BusError::Connection(format!("Failed to get connection from pool: {}", e))
    })?;

    conn.create_channel()
        .await
        .map_err(|e| BusError::Connection(format!("Failed to create channel: {}", e)))
}

/// Declare the feed queue. Non-durable, matching what producers declare.
async fn declare_queue(channel: &Channel, queue: &str) -> Result<()> {
    channel
        .queue_declare(queue, QueueDeclareOptions::default(), FieldTable::default())
        .await
        .map_err(|e| BusError::Subscribe(format!("Failed to declare queue: {}", e)))?;
    Ok(())
}

/// Redelivery token for a delivery's properties and body.
pub fn delivery_token(properties: &BasicProperties, body: &[u8]) -> String {
    correlation_token(
        properties.app_id().as_ref().map(|id| id.as_str()),
        properties.message_id().as_ref().map(|id| id.as_str()),
        body,
    )
}

/// Reconnecting queue consumer that feeds a [`MessageRelay`].
pub struct AmqpConsumer {
    pool: Pool,
    queue: String,
    relay: Arc<MessageRelay>,
}

impl AmqpConsumer {
    pub fn new(config: &AmqpConfig, relay: Arc<MessageRelay>) -> Result<Self> {
        Ok(Self {
            pool: build_pool(&config.url)?,
            queue: config.queue.clone(),
            relay,
        })
    }

    /// Consume until `shutdown` resolves.
    ///
    /// A delivery in flight when shutdown fires is abandoned unacknowledged
    /// and the broker redelivers it.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = self.consume_with_reconnect() => {},
            _ = shutdown => {
                info!(queue = %self.queue, "Consumer stopping");
            }
        }
    }

    /// Consumer loop with automatic reconnection and exponential backoff with jitter.
    async fn consume_with_reconnect(&self) {
        let backoff_builder = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(30))
            .with_jitter();

        let mut backoff_iter = backoff_builder.build();

        loop {
            match self.setup_consumer().await {
                Ok(mut consumer) => {
                    info!(queue = %self.queue, "Consumer connected, waiting for messages");
                    backoff_iter = backoff_builder.build();

                    // Strictly one delivery at a time.
                    while let Some(delivery) = consumer.next().await {
                        match delivery {
                            Ok(delivery) => self.process_delivery(delivery).await,
                            Err(e) => {
                                error!(error = %e, "Consumer delivery error, will reconnect");
                                break;
                            }
                        }
                    }

                    info!(queue = %self.queue, "Consumer stream ended, reconnecting...");
                }
                Err(e) => {
                    let delay = backoff_iter.next().unwrap_or(Duration::from_secs(30));
                    error!(
                        error = %e,
                        backoff_ms = %delay.as_millis(),
                        queue = %self.queue,
                        "Failed to set up consumer, retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }

            let delay = backoff_iter.next().unwrap_or(Duration::from_secs(30));
            tokio::time::sleep(delay).await;
        }
    }

    async fn setup_consumer(&self) -> Result<lapin::Consumer> {
        let channel = open_channel(&self.pool).await?;
        declare_queue(&channel, &self.queue).await?;

        // One unacknowledged delivery at a time.
        channel
            .basic_qos(1, Default::default())
            .await
            .map_err(|e| BusError::Subscribe(format!("Failed to set prefetch: {}", e)))?;

        channel
            .basic_consume(
                &self.queue,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Subscribe(format!("Failed to start consumer: {}", e)))
    }

    async fn process_delivery(&self, delivery: Delivery) {
        let token = delivery_token(&delivery.properties, &delivery.data);
        debug!(
            token = %token,
            redelivered = delivery.redelivered,
            "Received message"
        );

        let outcome = match self.relay.handle(&token, &delivery.data).await {
            Disposition::Ack | Disposition::Drop => delivery.ack(BasicAckOptions::default()).await,
            Disposition::Requeue => {
                delivery
                    .nack(BasicNackOptions {
                        requeue: true,
                        multiple: false,
                    })
                    .await
            }
        };

        if let Err(e) = outcome {
            error!(token = %token, error = %e, "Failed to settle message");
        }
    }
}

/// Publishes transaction events to the feed queue.
pub struct AmqpPublisher {
    pool: Pool,
    queue: String,
}

impl AmqpPublisher {
    pub async fn new(config: &AmqpConfig) -> Result<Self> {
        let pool = build_pool(&config.url)?;

        let channel = open_channel(&pool).await?;
        declare_queue(&channel, &config.queue).await?;

        info!(queue = %config.queue, "Connected to AMQP");

        Ok(Self {
            pool,
            queue: config.queue.clone(),
        })
    }

    /// Publish one event; returns the `app_id` it was tagged with.
    #[tracing::instrument(name = "bus.publish", skip_all, fields(user_id = event.user_id))]
    pub async fn publish(&self, event: &TransactionEvent) -> Result<String> {
        let payload = serde_json::to_vec(event)?;
        let app_id = uuid::Uuid::new_v4().to_string();

        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_app_id(app_id.clone().into());

        let channel = open_channel(&self.pool).await?;
        channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                &payload,
                properties,
            )
            .await
            .map_err(|e| BusError::Publish(format!("Failed to publish: {}", e)))?
            .await
            .map_err(|e| BusError::Publish(format!("Publish confirmation failed: {}", e)))?;

        debug!(queue = %self.queue, app_id = %app_id, "Published transaction event");
        Ok(app_id)
    }
}
