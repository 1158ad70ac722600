//! Owner of the process-wide realtime connection
//!
//! Consumers never build a `SocketClient` themselves. They ask the
//! connector, which opens one lazily and hands the same `Arc` to everyone.
//! Creation is serialised behind an async mutex, so callers racing on
//! first use all receive the connection the first caller opened.

use crate::infrastructure::config::TerminalConfig;
use marketsockets::{ExponentialBackoff, SocketClient, WsMessage};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

/// Ping frame sent when a heartbeat is configured
const PING_FRAME: &str = r#"{"event":"ping","data":null}"#;

pub struct SocketConnector {
    url: String,
    strategy: ExponentialBackoff,
    heartbeat: Option<Duration>,
    token: Option<String>,
    shutdown_flag: Option<Arc<AtomicBool>>,
    client: Mutex<Option<Arc<SocketClient>>>,
}

impl SocketConnector {
    /// Reconnect forever with exponential backoff up to `strategy`'s ceiling
    pub fn new(url: impl Into<String>, strategy: ExponentialBackoff) -> Self {
        Self {
            url: url.into(),
            strategy,
            heartbeat: None,
            token: None,
            shutdown_flag: None,
            client: Mutex::new(None),
        }
    }

    pub fn from_config(config: &TerminalConfig) -> Self {
        let mut connector = Self::new(config.socket.url.clone(), config.reconnect_strategy());
        connector.heartbeat = config.socket.heartbeat_secs.map(Duration::from_secs);
        connector.token = config.token.clone();
        connector
    }

    /// Share the process shutdown flag with the connection task
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The live connection, opening it on first use
    ///
    /// Only configuration problems (a malformed URL) are returned as errors.
    /// An unreachable server is not an error: the client keeps retrying in
    /// the background and subscribers simply see no ticks until it connects.
    pub async fn get_connection(&self) -> marketsockets::Result<Arc<SocketClient>> {
        let mut slot = self.client.lock().await;

        if let Some(client) = slot.as_ref() {
            if !client.is_shut_down() {
                return Ok(Arc::clone(client));
            }
        }

        info!("[Socket] Opening realtime connection to {}", self.url);

        let mut builder = SocketClient::builder()
            .url(self.url.as_str())
            .reconnect_strategy(self.strategy.clone());

        if let Some(interval) = self.heartbeat {
            builder = builder.heartbeat(interval, WsMessage::Text(PING_FRAME.to_string()));
        }
        if let Some(token) = &self.token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(flag) = &self.shutdown_flag {
            builder = builder.shutdown_flag(Arc::clone(flag));
        }

        let client = Arc::new(builder.build().await?);
        *slot = Some(Arc::clone(&client));
        Ok(client)
    }

    /// The connection if one was opened, without opening it
    pub async fn current(&self) -> Option<Arc<SocketClient>> {
        self.client.lock().await.clone()
    }

    /// Stop the connection; a later `get_connection` opens a fresh one
    pub async fn shutdown(&self) {
        let client = self.client.lock().await.take();
        if let Some(client) = client {
            client.shutdown().await;
        }
    }
}
