//! BTC Ledger - deposit ledger service
//!
//! Records deposit transactions against users and serves each user's running
//! balance. Writes go straight to the ledger store; reads go through a short
//! lived cache-aside layer. A queue relay bridges an at-least-once event feed
//! into the same create operation.

pub mod bus;
pub mod cache;
pub mod config;
pub mod handlers;
pub mod model;
pub mod relay;
pub mod services;
pub mod storage;
pub mod transport;
pub mod utils;
pub mod validation;

pub mod proto {
    tonic::include_proto!("btc");
}
