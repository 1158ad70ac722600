//! Common test utilities for MarketSockets integration tests
//!
//! Provides a scriptable feed server: tests push frames to every connected
//! client, force-drop connections, and inspect what clients sent.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Notify};
use tokio_tungstenite::tungstenite::Message;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

#[derive(Debug, Clone)]
enum Control {
    Push(String),
    DropAll,
}

/// Mock market feed server
pub struct MockFeedServer {
    pub addr: SocketAddr,
    control: broadcast::Sender<Control>,
    received: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    shutdown: Arc<Notify>,
}

impl MockFeedServer {
    /// Create and start a new mock feed server
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (control, _) = broadcast::channel(256);
        let received = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let active = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(Notify::new());

        {
            let control = control.clone();
            let received = received.clone();
            let connections = connections.clone();
            let active = active.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        result = listener.accept() => {
                            let Ok((stream, _)) = result else { break };
                            connections.fetch_add(1, Ordering::SeqCst);
                            let rx = control.subscribe();
                            let received = received.clone();
                            let active = active.clone();
                            let shutdown = shutdown.clone();
                            tokio::spawn(async move {
                                Self::handle_connection(stream, rx, received, active, shutdown).await;
                            });
                        }
                        _ = shutdown.notified() => break,
                    }
                }
            });
        }

        Self {
            addr,
            control,
            received,
            connections,
            active,
            shutdown,
        }
    }

    async fn handle_connection(
        stream: tokio::net::TcpStream,
        mut control: broadcast::Receiver<Control>,
        received: Arc<Mutex<Vec<String>>>,
        active: Arc<AtomicUsize>,
        shutdown: Arc<Notify>,
    ) {
        let ws_stream = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };
        active.fetch_add(1, Ordering::SeqCst);

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => received.lock().push(text),
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    }
                }
                cmd = control.recv() => {
                    match cmd {
                        Ok(Control::Push(text)) => {
                            if write.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Ok(Control::DropAll) | Err(_) => break,
                    }
                }
                _ = shutdown.notified() => break,
            }
        }

        active.fetch_sub(1, Ordering::SeqCst);
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Send a raw text frame to every connected client
    pub fn push(&self, text: impl Into<String>) {
        let _ = self.control.send(Control::Push(text.into()));
    }

    /// Send an `{event, data}` frame to every connected client
    pub fn push_event(&self, event: &str, data: serde_json::Value) {
        self.push(serde_json::json!({ "event": event, "data": data }).to_string());
    }

    /// Abruptly drop every open connection
    pub fn drop_connections(&self) {
        let _ = self.control.send(Control::DropAll);
    }

    /// Total accepted TCP connections
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Currently open WebSocket sessions
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Text frames received from clients, in arrival order
    pub fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }

    /// Received frames whose `event` field equals `event`
    pub fn received_events(&self, event: &str) -> Vec<serde_json::Value> {
        self.received()
            .iter()
            .filter_map(|text| serde_json::from_str::<serde_json::Value>(text).ok())
            .filter(|frame| frame["event"] == event)
            .collect()
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockFeedServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
