//! CLI utilities for binaries
//!
//! Resolves the config path and loads the terminal configuration the same
//! way for every binary.

use anyhow::{Context, Result};
use mockmarket::TerminalConfig;
use std::path::PathBuf;

/// Environment variable holding the config file path
pub const CONFIG_PATH_ENV: &str = "MOCKMARKET_CONFIG_PATH";

/// Config file used when `MOCKMARKET_CONFIG_PATH` is unset
pub const DEFAULT_CONFIG_PATH: &str = "config/terminal.yaml";

/// Load configuration path from environment or use default
///
/// # Examples
/// ```
/// use mockmarket_terminal::bin_common::load_config_from_env;
///
/// let path = load_config_from_env();
/// ```
pub fn load_config_from_env() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
        .into()
}

/// Load and validate the terminal config
///
/// A missing file falls back to defaults plus environment overrides, so the
/// binaries run against a local backend without any YAML.
pub fn load_terminal_config() -> Result<TerminalConfig> {
    let path = load_config_from_env();
    TerminalConfig::load_or_default(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}
