use crate::engine::builder::{states::NoUrl, SocketClientBuilder};
use crate::engine::config::ClientConfig;
use crate::engine::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
use crate::engine::listeners::{Listener, ListenerRegistry, SocketEvent};
use crate::engine::subscriptions::SymbolSubscriptions;
use crate::traits::*;
use crossbeam_channel::{unbounded, Receiver, Sender};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Give up on a single connect attempt after this long
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How often idle loops re-check the external shutdown flag
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Internal command messages for client control
#[derive(Debug)]
enum ClientCommand {
    /// Send a raw message to the server
    Send(WsMessage),
    /// Ask the server for updates on these symbols
    Subscribe(Vec<String>),
    /// Stop updates for these symbols
    Unsubscribe(Vec<String>),
    /// Shutdown the client
    Shutdown,
}

/// Lifecycle events from the client task
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Connected to the server
    Connected,
    /// Disconnected from the server
    Disconnected,
    /// Reconnecting (attempt number)
    Reconnecting(usize),
    /// Connect or stream error; logged and retried, never fatal
    Error(String),
}

/// Client metrics snapshot
#[derive(Debug, Clone)]
pub struct Metrics {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub reconnect_count: u64,
    pub epoch: u64,
    pub connection_state: ConnectionState,
}

/// Reconnecting WebSocket client for event-framed market feeds
///
/// One `SocketClient` owns one connection. Any number of consumers attach
/// with [`on`](Self::on) and share it. Connection failures never surface as
/// errors to listeners; they see `Disconnected` and later `Connected` again.
pub struct SocketClient {
    config: Arc<ClientConfig>,
    /// Cleared by this client's own shutdown; the external flag is only read
    running: Arc<AtomicBool>,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    listeners: Arc<ListenerRegistry>,
    subscriptions: Arc<SymbolSubscriptions>,
    command_tx: UnboundedSender<ClientCommand>,
    event_rx: Receiver<ClientEvent>,
    task_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl SocketClient {
    /// Start building a client
    pub fn builder() -> SocketClientBuilder<NoUrl> {
        SocketClientBuilder::new()
    }

    /// Spawn the connection task. Called by the builder.
    pub(crate) fn start(config: ClientConfig) -> Self {
        let config = Arc::new(config);
        let running = Arc::new(AtomicBool::new(true));
        let state = Arc::new(AtomicConnectionState::new(ConnectionState::Disconnected));
        let metrics = Arc::new(AtomicMetrics::new());
        let listeners = ListenerRegistry::new();
        let subscriptions = Arc::new(SymbolSubscriptions::new());

        let (command_tx, command_rx) = unbounded_channel();
        let (event_tx, event_rx) = unbounded();

        let task_handle = {
            let task = ClientTask {
                config: Arc::clone(&config),
                running: Arc::clone(&running),
                state: Arc::clone(&state),
                metrics: Arc::clone(&metrics),
                listeners: Arc::clone(&listeners),
                subscriptions: Arc::clone(&subscriptions),
                command_rx,
                event_tx,
            };
            tokio::spawn(task.run())
        };

        Self {
            config,
            running,
            state,
            metrics,
            listeners,
            subscriptions,
            command_tx,
            event_rx,
            task_handle: Mutex::new(Some(task_handle)),
        }
    }

    /// Register a listener for frames with the given event name
    pub fn on(&self, event: impl Into<String>) -> Listener {
        self.listeners.register(event)
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.listener_count(event)
    }

    pub fn total_listeners(&self) -> usize {
        self.listeners.total_listeners()
    }

    /// Add a watcher for each symbol
    ///
    /// Only symbols nobody was watching yet are sent to the server. All
    /// watched symbols are re-sent after every reconnect.
    pub fn subscribe_symbols<I, S>(&self, symbols: I) -> crate::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let added = self.subscriptions.acquire(symbols);
        if added.is_empty() {
            return Ok(());
        }
        self.command(ClientCommand::Subscribe(added))
    }

    /// Remove a watcher for each symbol
    pub fn unsubscribe_symbols<I, S>(&self, symbols: I) -> crate::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let removed = self.subscriptions.release(symbols);
        if removed.is_empty() {
            return Ok(());
        }
        self.command(ClientCommand::Unsubscribe(removed))
    }

    /// Symbols with at least one watcher
    pub fn active_symbols(&self) -> Vec<String> {
        self.subscriptions.active()
    }

    /// Send a raw message
    pub fn send(&self, message: WsMessage) -> crate::Result<()> {
        self.command(ClientCommand::Send(message))
    }

    /// Send an `{event, data}` frame
    pub fn emit(&self, event: impl Into<String>, data: Value) -> crate::Result<()> {
        let message = EventFrame::new(event, data).encode()?;
        self.send(message)
    }

    fn command(&self, command: ClientCommand) -> crate::Result<()> {
        if self.is_shut_down() {
            return Err(SocketError::ShutDown);
        }
        self.command_tx
            .send(command)
            .map_err(|e| SocketError::ChannelSend(e.to_string()))
    }

    pub fn url(&self) -> &str {
        self.config.url()
    }

    #[inline]
    pub fn connection_state(&self) -> ConnectionState {
        self.state.get()
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Number of successful connections so far
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.metrics.epoch()
    }

    /// True once shutdown was requested, by [`shutdown`](Self::shutdown) or the shared flag
    pub fn is_shut_down(&self) -> bool {
        !self.running.load(Ordering::Acquire) || !self.config.shutdown_flag.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> Metrics {
        Metrics {
            messages_sent: self.metrics.messages_sent(),
            messages_received: self.metrics.messages_received(),
            reconnect_count: self.metrics.reconnect_count(),
            epoch: self.metrics.epoch(),
            connection_state: self.state.get(),
        }
    }

    /// Try to receive a lifecycle event (non-blocking)
    pub fn try_recv_event(&self) -> Option<ClientEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Stop the client and wait for its task to exit
    pub async fn shutdown(&self) {
        info!("[Socket] Shutting down client for {}", self.config.url());

        self.running.store(false, Ordering::Release);
        self.state.set(ConnectionState::ShuttingDown);
        let _ = self.command_tx.send(ClientCommand::Shutdown);

        let handle = self.task_handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        debug!("[Socket] Client task joined");
    }
}

impl Drop for SocketClient {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        let _ = self.command_tx.send(ClientCommand::Shutdown);
    }
}

/// State owned by the background connection task
struct ClientTask {
    config: Arc<ClientConfig>,
    running: Arc<AtomicBool>,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    listeners: Arc<ListenerRegistry>,
    subscriptions: Arc<SymbolSubscriptions>,
    command_rx: UnboundedReceiver<ClientCommand>,
    event_tx: Sender<ClientEvent>,
}

/// Why a connection ended
enum LoopExit {
    Shutdown,
    Dropped(SocketError),
}

impl ClientTask {
    fn running(&self) -> bool {
        self.running.load(Ordering::Acquire)
            && self.config.shutdown_flag.load(Ordering::Acquire)
            && !self.state.is_shutting_down()
    }

    /// Main loop: connect, pump messages, back off, repeat
    async fn run(mut self) {
        let mut reconnect_attempt = 0usize;

        loop {
            if !self.running() {
                debug!("[Socket] Shutdown requested, exiting main loop");
                break;
            }

            self.state.set(if reconnect_attempt == 0 {
                ConnectionState::Connecting
            } else {
                ConnectionState::Reconnecting
            });

            if reconnect_attempt > 0 {
                let _ = self.event_tx.send(ClientEvent::Reconnecting(reconnect_attempt));
            }

            let config = Arc::clone(&self.config);
            let connected = tokio::select! {
                result = tokio::time::timeout(CONNECT_TIMEOUT, connect(&config)) => match result {
                    Ok(result) => result,
                    Err(_) => Err(SocketError::WebSocket("connect timed out".to_string())),
                },
                _ = self.wait_for_shutdown() => break,
            };

            match connected {
                Ok(ws_stream) => {
                    let epoch = self.metrics.next_epoch();
                    info!("[Socket] Connected to {} (epoch {})", self.config.url, epoch);
                    self.state.set(ConnectionState::Connected);
                    let _ = self.event_tx.send(ClientEvent::Connected);
                    self.listeners.broadcast(SocketEvent::Connected { epoch });

                    reconnect_attempt = 0;

                    match self.handle_connection(ws_stream).await {
                        LoopExit::Shutdown => {
                            self.state.set(ConnectionState::ShuttingDown);
                            break;
                        }
                        LoopExit::Dropped(e) => {
                            warn!("[Socket] Connection lost: {}", e);
                            let _ = self.event_tx.send(ClientEvent::Error(e.to_string()));
                        }
                    }

                    self.state.set(ConnectionState::Disconnected);
                    let _ = self.event_tx.send(ClientEvent::Disconnected);
                    self.listeners.broadcast(SocketEvent::Disconnected);
                }
                Err(e) => {
                    warn!("[Socket] Failed to connect to {}: {}", self.config.url, e);
                    let _ = self.event_tx.send(ClientEvent::Error(e.to_string()));
                    self.state.set(ConnectionState::Disconnected);
                }
            }

            if !self.running() {
                break;
            }

            match self.config.reconnect_strategy.next_delay(reconnect_attempt) {
                Some(delay) => {
                    info!(
                        "[Socket] Reconnecting in {:?} (attempt {})",
                        delay,
                        reconnect_attempt + 1
                    );
                    if !self.sleep_unless_shutdown(delay).await {
                        break;
                    }
                    reconnect_attempt += 1;
                    self.metrics.increment_reconnects();
                }
                None => {
                    warn!("[Socket] Reconnection strategy exhausted, stopping");
                    break;
                }
            }
        }

        if !self.state.is_shutting_down() {
            self.state.set(ConnectionState::Disconnected);
        }
        info!("[Socket] Client task exiting");
    }

    /// Resolves once shutdown is requested
    ///
    /// Commands other than shutdown arriving while disconnected are dropped.
    /// Subscribed symbols stay recorded and are replayed on the next connect.
    async fn wait_for_shutdown(&mut self) {
        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(ClientCommand::Shutdown) | None => return,
                    Some(other) => debug!("[Socket] Not connected, dropping {:?}", other),
                },
                _ = tokio::time::sleep(SHUTDOWN_POLL_INTERVAL) => {
                    if !self.running() {
                        return;
                    }
                }
            }
        }
    }

    /// Sleep for `delay`; returns false if shutdown interrupted the wait
    async fn sleep_unless_shutdown(&mut self, delay: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => self.running(),
            _ = self.wait_for_shutdown() => false,
        }
    }

    /// Pump one live connection until it drops or shutdown is requested
    async fn handle_connection(&mut self, ws_stream: WsStream) -> LoopExit {
        let (mut write, mut read) = ws_stream.split();

        let active = self.subscriptions.active();
        if !active.is_empty() {
            let frame = self.symbols_frame(&self.config.subscribe_event, &active);
            if let Err(e) = self.write_frame(&mut write, frame).await {
                return LoopExit::Dropped(e);
            }
            debug!("[Socket] Replayed subscription for {} symbols", active.len());
        }

        let mut heartbeat = self.config.heartbeat.as_ref().map(|(interval, payload)| {
            let mut ticker = tokio::time::interval(*interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            (ticker, payload.clone())
        });
        let mut flag_check = tokio::time::interval(SHUTDOWN_POLL_INTERVAL);

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(msg)) => self.on_message(msg),
                        Some(Err(e)) => {
                            error!("[Socket] WebSocket error: {}", e);
                            return LoopExit::Dropped(SocketError::WebSocket(e.to_string()));
                        }
                        None => {
                            return LoopExit::Dropped(SocketError::ConnectionClosed(
                                "stream ended".to_string(),
                            ));
                        }
                    }
                }

                cmd = self.command_rx.recv() => {
                    let message = match cmd {
                        Some(ClientCommand::Send(message)) => message,
                        Some(ClientCommand::Subscribe(symbols)) => {
                            self.symbols_frame(&self.config.subscribe_event, &symbols)
                        }
                        Some(ClientCommand::Unsubscribe(symbols)) => {
                            self.symbols_frame(&self.config.unsubscribe_event, &symbols)
                        }
                        Some(ClientCommand::Shutdown) | None => {
                            info!("[Socket] Received shutdown command");
                            let _ = write.close().await;
                            return LoopExit::Shutdown;
                        }
                    };
                    if let Err(e) = self.write_frame(&mut write, message).await {
                        return LoopExit::Dropped(e);
                    }
                }

                payload = async {
                    match heartbeat.as_mut() {
                        Some((ticker, payload)) => {
                            ticker.tick().await;
                            payload.clone()
                        }
                        None => std::future::pending::<WsMessage>().await,
                    }
                } => {
                    if let Err(e) = self.write_frame(&mut write, payload).await {
                        return LoopExit::Dropped(e);
                    }
                    debug!("[Socket] Heartbeat sent");
                }

                _ = flag_check.tick() => {
                    if !self.running() {
                        debug!("[Socket] Shutdown flag cleared, closing connection");
                        let _ = write.close().await;
                        return LoopExit::Shutdown;
                    }
                }
            }
        }
    }

    fn on_message(&self, msg: Message) {
        let raw = match msg {
            Message::Text(text) => WsMessage::Text(text),
            Message::Binary(data) => WsMessage::Binary(data),
            Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => return,
        };

        self.metrics.increment_received();

        match EventFrame::decode(&raw) {
            Ok(frame) => {
                let delivered = self.listeners.dispatch(&frame.event, &frame.data);
                if delivered == 0 {
                    debug!("[Socket] No listener for '{}'", frame.event);
                }
            }
            Err(e) => debug!("[Socket] Ignoring undecodable frame: {}", e),
        }
    }

    fn symbols_frame(&self, event: &str, symbols: &[String]) -> WsMessage {
        let text = json!({ "event": event, "data": { "symbols": symbols } }).to_string();
        WsMessage::Text(text)
    }

    async fn write_frame(
        &self,
        write: &mut futures::stream::SplitSink<WsStream, Message>,
        message: WsMessage,
    ) -> crate::Result<()> {
        let message = match message {
            WsMessage::Text(text) => Message::Text(text),
            WsMessage::Binary(data) => Message::Binary(data),
        };
        write
            .send(message)
            .await
            .map_err(|e| SocketError::WebSocket(e.to_string()))?;
        self.metrics.increment_sent();
        Ok(())
    }
}

/// Open the WebSocket, applying configured headers
async fn connect(config: &ClientConfig) -> crate::Result<WsStream> {
    let mut request = config
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| SocketError::Configuration(e.to_string()))?;

    for (key, value) in &config.headers {
        match (
            key.parse::<http::header::HeaderName>(),
            value.parse::<http::header::HeaderValue>(),
        ) {
            (Ok(name), Ok(value)) => {
                request.headers_mut().insert(name, value);
            }
            _ => warn!("[Socket] Skipping invalid header '{}'", key),
        }
    }

    let (ws_stream, _) = connect_async(request)
        .await
        .map_err(|e| SocketError::WebSocket(e.to_string()))?;
    Ok(ws_stream)
}
