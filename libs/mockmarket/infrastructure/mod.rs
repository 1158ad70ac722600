//! Infrastructure Layer
//!
//! Implementations of external interfaces: the REST client, the realtime
//! connection owner, configuration, logging and process lifecycle.
//! This layer depends on the domain layer but not on the application layer.

pub mod api;
pub mod config;
pub mod connector;
pub mod heartbeat;
pub mod logging;
pub mod shutdown;

pub use api::{ApiError, MarketApiClient};
pub use config::{ConfigError, TerminalConfig};
pub use connector::SocketConnector;
pub use heartbeat::Heartbeat;
pub use logging::{init_tracing, init_tracing_with_level};
pub use shutdown::ShutdownManager;
