pub mod states;

use crate::engine::client::SocketClient;
use crate::engine::config::ClientConfig;
use crate::traits::*;
use states::*;
use std::marker::PhantomData;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// Default reconnect backoff start
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Default reconnect backoff ceiling
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Type-state builder for [`SocketClient`]
///
/// Without an explicit strategy the client reconnects forever with
/// exponential backoff between 500ms and 30s.
pub struct SocketClientBuilder<U: UrlState> {
    _url_state: PhantomData<U>,
    url: Option<String>,
    headers: Vec<(String, String)>,
    heartbeat: Option<(Duration, WsMessage)>,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    subscribe_event: String,
    unsubscribe_event: String,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl SocketClientBuilder<NoUrl> {
    pub fn new() -> Self {
        Self {
            _url_state: PhantomData,
            url: None,
            headers: Vec::new(),
            heartbeat: None,
            reconnect_strategy: None,
            subscribe_event: "subscribe".to_string(),
            unsubscribe_event: "unsubscribe".to_string(),
            shutdown_flag: None,
        }
    }

    pub fn url(self, url: impl Into<String>) -> SocketClientBuilder<HasUrl> {
        SocketClientBuilder {
            _url_state: PhantomData,
            url: Some(url.into()),
            headers: self.headers,
            heartbeat: self.heartbeat,
            reconnect_strategy: self.reconnect_strategy,
            subscribe_event: self.subscribe_event,
            unsubscribe_event: self.unsubscribe_event,
            shutdown_flag: self.shutdown_flag,
        }
    }
}

impl Default for SocketClientBuilder<NoUrl> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U: UrlState> SocketClientBuilder<U> {
    /// Add a header to the upgrade request
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Send `payload` every `interval` while connected
    pub fn heartbeat(mut self, interval: Duration, payload: WsMessage) -> Self {
        self.heartbeat = Some((interval, payload));
        self
    }

    pub fn reconnect_strategy<S>(mut self, strategy: S) -> Self
    where
        S: ReconnectionStrategy + 'static,
    {
        self.reconnect_strategy = Some(Box::new(strategy));
        self
    }

    /// Override the event names used for symbol (un)subscription
    pub fn subscription_events(
        mut self,
        subscribe: impl Into<String>,
        unsubscribe: impl Into<String>,
    ) -> Self {
        self.subscribe_event = subscribe.into();
        self.unsubscribe_event = unsubscribe.into();
        self
    }

    /// Share an external shutdown flag (true = keep running)
    pub fn shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }
}

impl SocketClientBuilder<HasUrl> {
    /// Validate the configuration and start the client task
    ///
    /// Returns immediately; the connection is established in the background.
    pub async fn build(self) -> crate::Result<SocketClient> {
        let url = self.url.unwrap_or_default();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(SocketError::Configuration(format!(
                "URL must start with ws:// or wss://, got '{}'",
                url
            )));
        }

        if let Some((interval, _)) = &self.heartbeat {
            if interval.is_zero() {
                return Err(SocketError::Configuration(
                    "heartbeat interval must be greater than 0".to_string(),
                ));
            }
        }

        let config = ClientConfig {
            url,
            headers: self.headers,
            heartbeat: self.heartbeat,
            reconnect_strategy: self.reconnect_strategy.unwrap_or_else(|| {
                Box::new(ExponentialBackoff::unbounded(
                    DEFAULT_INITIAL_BACKOFF,
                    DEFAULT_MAX_BACKOFF,
                ))
            }),
            subscribe_event: self.subscribe_event,
            unsubscribe_event: self.unsubscribe_event,
            shutdown_flag: self
                .shutdown_flag
                .unwrap_or_else(|| Arc::new(AtomicBool::new(true))),
        };

        Ok(SocketClient::start(config))
    }
}
