//! Shared main-loop scaffolding for the binaries

use mockmarket::infrastructure::Heartbeat;
use std::time::Duration;
use tracing::{error, info};

/// Name and heartbeat period of a binary
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub name: String,
    pub heartbeat_interval_secs: u64,
}

impl RunConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            heartbeat_interval_secs: 300,
        }
    }

    pub fn with_heartbeat(mut self, secs: u64) -> Self {
        self.heartbeat_interval_secs = secs;
        self
    }

    /// "Still alive" logger for the main loop
    pub fn heartbeat(&self) -> Heartbeat {
        Heartbeat::new(Duration::from_secs(self.heartbeat_interval_secs))
    }
}

/// A long-running terminal binary
///
/// Implementors provide the main loop; [`execute`](Self::execute) wraps it
/// in start and stop banners.
pub trait BinaryRunner {
    async fn run(&mut self) -> anyhow::Result<()>;

    fn config(&self) -> &RunConfig;

    /// Summary for the stop banner
    fn stats(&self) -> Option<String> {
        None
    }

    fn print_banner(&self) {
        let rule = "=".repeat(40);
        info!("{}", rule);
        info!("{} starting (Ctrl+C to stop)", self.config().name);
        info!("{}", rule);
    }

    fn print_shutdown(&self) {
        let rule = "=".repeat(40);
        info!("{}", rule);
        info!("{} stopped", self.config().name);
        if let Some(stats) = self.stats() {
            info!("  {}", stats);
        }
        info!("{}", rule);
    }

    async fn execute(&mut self) -> anyhow::Result<()> {
        self.print_banner();
        let result = self.run().await;
        if let Err(e) = &result {
            error!("{} failed: {:#}", self.config().name, e);
        }
        self.print_shutdown();
        result
    }
}
