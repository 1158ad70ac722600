//! # MarketSockets
//!
//! A reconnecting WebSocket client for event-framed market data feeds.
//!
//! ## Features
//!
//! - **One connection, many listeners**: consumers register per-event listeners
//!   and receive decoded `{event, data}` frames on their own channel
//! - **Symbol multiplexing**: reference-counted symbol subscriptions that are
//!   replayed to the server after every reconnect
//! - **Pluggable reconnection**: exponential backoff with a ceiling, fixed delay,
//!   or never
//! - **Atomic state**: connection state and metrics readable without locks
//!
//! ## Example
//!
//! ```rust,ignore
//! use marketsockets::{SocketClient, ExponentialBackoff};
//! use std::time::Duration;
//!
//! let client = SocketClient::builder()
//!     .url("wss://feed.example.com/ws")
//!     .reconnect_strategy(ExponentialBackoff::unbounded(
//!         Duration::from_millis(500),
//!         Duration::from_secs(30),
//!     ))
//!     .build()
//!     .await?;
//!
//! let mut prices = client.on("price_update_batch");
//! client.subscribe_symbols(["TCS", "INFY"])?;
//!
//! while let Some(event) = prices.recv().await {
//!     println!("{:?}", event);
//! }
//! ```

pub mod engine;
pub mod traits;

// Re-export all traits
pub use traits::*;

// Re-export core client functionality
pub use engine::{
    builder::{states, SocketClientBuilder},
    client::{ClientEvent, Metrics, SocketClient},
    config::ClientConfig,
    connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState},
    listeners::{Listener, ListenerHandle, ListenerRegistry, SocketEvent},
    subscriptions::SymbolSubscriptions,
};

/// Type alias for Result with SocketError
pub type Result<T> = std::result::Result<T, traits::SocketError>;
