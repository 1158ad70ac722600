//! MockMarket Terminal - Main Library
//!
//! ## Architecture
//!
//! - **bin_common**: Shared plumbing for the binaries (config path, runner)
//! - **mockmarket**: Domain, REST client, live prices and the order flow
//! - **marketsockets**: WebSocket client (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use mockmarket_terminal::bin_common::load_terminal_config;
//! use mockmarket_terminal::mockmarket::AppContext;
//! ```

// Re-export workspace libraries for convenience
pub use marketsockets;
pub use mockmarket;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod runner;

    pub use cli::{load_config_from_env, load_terminal_config, parse_args, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
    pub use runner::{BinaryRunner, RunConfig};
}
