//! Common test utilities for MockMarket integration tests
//!
//! - `MockFeedServer`: WebSocket feed that pushes `{event, data}` frames
//! - `MockHttpServer`: canned JSON responses keyed by method and path,
//!   recording every request it serves

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
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

// ============================================================================
// WebSocket feed
// ============================================================================

#[derive(Debug, Clone)]
enum FeedControl {
    Push(String),
    DropAll,
}

pub struct MockFeedServer {
    pub addr: SocketAddr,
    control: broadcast::Sender<FeedControl>,
    received: Arc<Mutex<Vec<Value>>>,
    sessions: Arc<AtomicUsize>,
    shutdown: Arc<Notify>,
}

impl MockFeedServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (control, _) = broadcast::channel(256);
        let received = Arc::new(Mutex::new(Vec::new()));
        let sessions = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(Notify::new());

        let accept_control = control.clone();
        let accept_received = Arc::clone(&received);
        let accept_sessions = Arc::clone(&sessions);
        let accept_shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        let Ok((stream, _)) = result else { break };
                        tokio::spawn(Self::serve(
                            stream,
                            accept_control.subscribe(),
                            Arc::clone(&accept_received),
                            Arc::clone(&accept_sessions),
                            Arc::clone(&accept_shutdown),
                        ));
                    }
                    _ = accept_shutdown.notified() => break,
                }
            }
        });

        Self {
            addr,
            control,
            received,
            sessions,
            shutdown,
        }
    }

    async fn serve(
        stream: TcpStream,
        mut control: broadcast::Receiver<FeedControl>,
        received: Arc<Mutex<Vec<Value>>>,
        sessions: Arc<AtomicUsize>,
        shutdown: Arc<Notify>,
    ) {
        let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
            return;
        };
        sessions.fetch_add(1, Ordering::SeqCst);
        let (mut write, mut read) = ws.split();

        loop {
            tokio::select! {
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(frame) = serde_json::from_str::<Value>(&text) {
                            received.lock().push(frame);
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
                cmd = control.recv() => match cmd {
                    Ok(FeedControl::Push(text)) => {
                        if write.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Ok(FeedControl::DropAll) | Err(_) => break,
                },
                _ = shutdown.notified() => break,
            }
        }

        sessions.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn push_event(&self, event: &str, data: Value) {
        let frame = json!({ "event": event, "data": data }).to_string();
        let _ = self.control.send(FeedControl::Push(frame));
    }

    /// Push a `price_update_batch` of `(symbol, ltp)` pairs
    pub fn push_prices(&self, ticks: &[(&str, f64)]) {
        let batch: Vec<Value> = ticks
            .iter()
            .map(|(symbol, ltp)| json!({ "symbol": symbol, "ltp": ltp, "as_of": 1_772_600_000 }))
            .collect();
        self.push_event("price_update_batch", Value::Array(batch));
    }

    pub fn drop_connections(&self) {
        let _ = self.control.send(FeedControl::DropAll);
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    /// `data.symbols` of every received frame named `event`
    pub fn symbol_frames(&self, event: &str) -> Vec<Vec<String>> {
        self.received
            .lock()
            .iter()
            .filter(|frame| frame["event"] == event)
            .map(|frame| {
                frame["data"]["symbols"]
                    .as_array()
                    .map(|symbols| {
                        symbols
                            .iter()
                            .filter_map(|s| s.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect()
    }
}

impl Drop for MockFeedServer {
    fn drop(&mut self) {
        self.shutdown.notify_waiters();
    }
}

// ============================================================================
// HTTP
// ============================================================================

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Path including the query string
    pub target: String,
    /// Header names lowercased
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl RecordedRequest {
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or_default()
    }

    pub fn query(&self) -> &str {
        self.target.split_once('?').map(|(_, q)| q).unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

type Routes = Arc<Mutex<HashMap<(String, String), (u16, String)>>>;

/// One-request-per-connection HTTP/1.1 server with canned responses
///
/// Unrouted requests get a 404 with a plain-text body.
pub struct MockHttpServer {
    pub addr: SocketAddr,
    routes: Routes,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    shutdown: Arc<Notify>,
}

impl MockHttpServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes: Routes = Arc::new(Mutex::new(HashMap::new()));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let shutdown = Arc::new(Notify::new());

        let accept_routes = Arc::clone(&routes);
        let accept_requests = Arc::clone(&requests);
        let accept_shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        let Ok((stream, _)) = result else { break };
                        tokio::spawn(Self::serve(
                            stream,
                            Arc::clone(&accept_routes),
                            Arc::clone(&accept_requests),
                        ));
                    }
                    _ = accept_shutdown.notified() => break,
                }
            }
        });

        Self {
            addr,
            routes,
            requests,
            shutdown,
        }
    }

    /// Base URL with the `/api` prefix the client is configured with
    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Answer `method path` (path without query, after `/api`) with `body`
    pub fn route(&self, method: &str, path: &str, status: u16, body: Value) {
        self.route_raw(method, path, status, body.to_string());
    }

    pub fn route_raw(&self, method: &str, path: &str, status: u16, body: impl Into<String>) {
        self.routes.lock().insert(
            (method.to_uppercase(), format!("/api{}", path)),
            (status, body.into()),
        );
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn last_request(&self) -> RecordedRequest {
        self.requests.lock().last().cloned().expect("no request recorded")
    }

    async fn serve(mut stream: TcpStream, routes: Routes, requests: Arc<Mutex<Vec<RecordedRequest>>>) {
        let Some(request) = read_request(&mut stream).await else {
            return;
        };

        let (status, body) = routes
            .lock()
            .get(&(request.method.clone(), request.path().to_string()))
            .cloned()
            .unwrap_or((404, "not found".to_string()));
        requests.lock().push(request);

        let reason = match status {
            200 => "OK",
            400 => "Bad Request",
            404 => "Not Found",
            500 => "Internal Server Error",
            _ => "Status",
        };
        let response = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            reason,
            body.len(),
            body
        );
        let _ = stream.write_all(response.as_bytes()).await;
        let _ = stream.shutdown().await;
    }
}

impl Drop for MockHttpServer {
    fn drop(&mut self) {
        self.shutdown.notify_waiters();
    }
}

async fn read_request(stream: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();

    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .get("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(RecordedRequest {
        method,
        target,
        headers,
        body: String::from_utf8_lossy(&body).to_string(),
    })
}

/// `{status: "success", data}`
pub fn success(data: Value) -> Value {
    json!({ "status": "success", "data": data })
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
