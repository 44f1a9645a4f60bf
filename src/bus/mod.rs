//! Message feed plumbing.
//!
//! This module contains:
//! - `BusError`: failures talking to the broker
//! - Implementations: AMQP (RabbitMQ) consumer and publisher
//!
//! Delivery decisions live in [`crate::relay`]; this layer only moves
//! bytes and applies the relay's [`Disposition`](crate::relay::Disposition).

#[cfg(feature = "amqp")]
pub mod amqp;

#[cfg(feature = "amqp")]
pub use amqp::{AmqpConsumer, AmqpPublisher};

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors that can occur during bus operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    #[error("Encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}
