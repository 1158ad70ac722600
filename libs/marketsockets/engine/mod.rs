//! Client engine: builder, connection loop, listener dispatch and state.

pub mod builder;
pub mod client;
pub mod config;
pub mod connection_state;
pub mod listeners;
pub mod subscriptions;

pub use builder::{states, SocketClientBuilder};
pub use client::{ClientEvent, Metrics, SocketClient};
pub use config::ClientConfig;
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
pub use listeners::{Listener, ListenerHandle, ListenerRegistry, SocketEvent};
pub use subscriptions::SymbolSubscriptions;
