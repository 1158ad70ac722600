use crate::traits::*;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// Settings of one [`SocketClient`](crate::SocketClient), fixed at build time
pub struct ClientConfig {
    pub(crate) url: String,
    /// Added to the upgrade request (e.g. `Authorization`)
    pub(crate) headers: Vec<(String, String)>,
    /// Sent every interval while connected
    pub(crate) heartbeat: Option<(Duration, WsMessage)>,
    pub(crate) reconnect_strategy: Box<dyn ReconnectionStrategy>,
    /// Outbound event names carrying `{"symbols": [...]}`
    pub(crate) subscribe_event: String,
    pub(crate) unsubscribe_event: String,
    /// Reads `false` once the process is stopping; the client then exits
    /// and never reconnects
    pub(crate) shutdown_flag: Arc<AtomicBool>,
}

impl ClientConfig {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn has_heartbeat(&self) -> bool {
        self.heartbeat.is_some()
    }

    pub fn subscribe_event(&self) -> &str {
        &self.subscribe_event
    }

    pub fn unsubscribe_event(&self) -> &str {
        &self.unsubscribe_event
    }
}
