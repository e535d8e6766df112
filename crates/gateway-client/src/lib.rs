//! gateway-client
//!
//! Async client for the trading-data gateway: one framed TCP connection,
//! request/response correlation, and streaming subscriptions.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use gateway_client::{Client, ClientConfig, LoggingHandler};
//!
//! # async fn run() -> Result<(), gateway_client::ClientError> {
//! let client = Client::connect(ClientConfig::new("127.0.0.1:4002"), Arc::new(LoggingHandler)).await?;
//! println!("gateway time: {}", client.current_time().await?);
//! client.close().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod subscription;
pub mod types;

// these are internal modules, not re-exported
mod connection;
mod request;
mod request_manager;
mod rundown;

pub use client::{Client, MAX_DEPTH_ROWS, MAX_REDIRECTS};
pub use config::ClientConfig;
pub use error::ClientError;
pub use handler::{EventHandler, LoggingHandler, NoopHandler};
pub use subscription::Subscription;
pub use types::{DepthStream, SharedHandler, TickStream};

pub use gateway_core::{
    Bar, Contract, ContractDetails, DepthLevel, HistoricalDataRequest, MarketDepth, Side,
    TickEvent, TopOfBook,
};
