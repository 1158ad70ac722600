//! # MarketSockets Traits
//!
//! Core traits and wire types shared by the client and its consumers:
//!
//! - **ReconnectionStrategy**: control reconnection behavior
//! - **WsMessage / EventFrame**: raw messages and the `{event, data}` envelope
//! - **SocketError**: the error type for every socket operation

pub mod error;
pub mod frame;
pub mod reconnect;

// Re-export commonly used types
pub use error::{Result, SocketError};
pub use frame::{EventFrame, WsMessage};
pub use reconnect::{ExponentialBackoff, FixedDelay, NeverReconnect, ReconnectionStrategy};
