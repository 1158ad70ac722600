//! REST client for the MockMarket backend
//!
//! Every endpoint answers with the `{status, data?, message?}` envelope.
//! The envelope is parsed whatever the HTTP status, since the backend
//! reports business errors (unknown stock, insufficient funds) as 4xx
//! responses carrying `status: "error"` and a message.

use super::types::*;
use crate::domain::{clean_server_message, TradeIntent};
use reqwest::{header, Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// `status: "error"`, message already cleaned of internal codes
    #[error("{0}")]
    Server(String),

    #[error("Response had no data")]
    MissingData,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Typed client for the stock, news, sentiment, watchlist and trade endpoints
#[derive(Debug, Clone)]
pub struct MarketApiClient {
    base_url: Url,
    client: Client,
    token: Option<String>,
}

impl MarketApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(15))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ApiError::InvalidParameter(format!("base url '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidParameter(format!(
                "base url '{}' cannot carry a path",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(5)
            .tcp_keepalive(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            base_url,
            client,
            token: None,
        })
    }

    /// Send `Authorization: Bearer <token>` on every request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = (!token.trim().is_empty()).then_some(token);
        self
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Base URL plus percent-encoded path segments
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidParameter("base url cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!("[Api] {} {}", method, url);
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send and parse the envelope, whatever the HTTP status
    async fn envelope<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<Envelope<T>> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str::<Envelope<T>>(&body) {
            Ok(envelope) => Ok(envelope),
            Err(e) if status.is_success() => {
                warn!("[Api] Undecodable {} response: {}", status, e);
                Err(ApiError::UnexpectedResponse(e.to_string()))
            }
            Err(_) => Err(ApiError::Http {
                status: status.as_u16(),
                body: truncate(&body, 200),
            }),
        }
    }

    /// Envelope whose `success`/`pending` status must carry data
    async fn data<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let envelope = self.envelope::<T>(builder).await?;
        match envelope.status {
            ResponseStatus::Error => Err(server_error(envelope.message)),
            ResponseStatus::Success | ResponseStatus::Pending => {
                envelope.data.ok_or(ApiError::MissingData)
            }
        }
    }

    /// Envelope where only the status matters
    async fn ack(&self, builder: RequestBuilder) -> Result<()> {
        let envelope = self.envelope::<Value>(builder).await?;
        match envelope.status {
            ResponseStatus::Error => Err(server_error(envelope.message)),
            ResponseStatus::Success | ResponseStatus::Pending => Ok(()),
        }
    }

    fn get(&self, segments: &[&str]) -> Result<RequestBuilder> {
        Ok(self.request(Method::GET, self.endpoint(segments)?))
    }

    fn with_body<B: Serialize>(&self, method: Method, segments: &[&str], body: &B) -> Result<RequestBuilder> {
        Ok(self.request(method, self.endpoint(segments)?).json(body))
    }

    // ---- stocks ----

    /// Cached detail; the backend may answer from its database copy
    pub async fn stock_detail(&self, symbol: &str) -> Result<StockDetail> {
        let symbol = normalize_symbol(symbol)?;
        self.data(self.get(&["stocks", "detail", &symbol])?).await
    }

    /// Detail forced through the live path, bypassing every cache layer
    pub async fn stock_detail_live(&self, symbol: &str) -> Result<StockDetail> {
        let symbol = normalize_symbol(symbol)?;
        let builder = self
            .get(&["stocks", "detail", &symbol])?
            .query(&[("forceLive", "1")])
            .header(header::CACHE_CONTROL, "no-cache, no-store")
            .header(header::PRAGMA, "no-cache");
        self.data(builder).await
    }

    pub async fn price_history(&self, symbol: &str, range: HistoryRange) -> Result<Vec<HistoryPoint>> {
        let symbol = normalize_symbol(symbol)?;
        let builder = self
            .get(&["stocks", "history", &symbol])?
            .query(&[("range", range.as_str())]);
        self.data(builder).await
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.data(self.get(&["stocks", "search"])?.query(&[("q", query)]))
            .await
    }

    pub async fn movers(&self) -> Result<Movers> {
        self.data(self.get(&["stocks", "movers"])?).await
    }

    /// Market-wide news, or news for one symbol
    pub async fn news(&self, symbol: Option<&str>) -> Result<Vec<NewsItem>> {
        let mut builder = self.get(&["news"])?;
        if let Some(symbol) = symbol {
            builder = builder.query(&[("symbol", normalize_symbol(symbol)?)]);
        }
        self.data(builder).await
    }

    pub async fn sentiment(&self, symbol: &str) -> Result<Sentiment> {
        let symbol = normalize_symbol(symbol)?;
        self.data(self.get(&["stocks", "sentiment", &symbol])?).await
    }

    // ---- watchlist ----

    pub async fn watchlist(&self, user_id: &str) -> Result<Vec<WatchlistEntry>> {
        self.data(self.get(&["watchlist"])?.query(&[("user_id", user_id)]))
            .await
    }

    pub async fn watchlist_contains(&self, user_id: &str, symbol: &str) -> Result<bool> {
        let symbol = normalize_symbol(symbol)?;
        let builder = self
            .get(&["watchlist", "check", &symbol])?
            .query(&[("user_id", user_id)]);
        let data: Value = self.data(builder).await?;
        // Backend answers either a bare bool or {in_watchlist: bool}
        data.as_bool()
            .or_else(|| data.get("in_watchlist").and_then(Value::as_bool))
            .or_else(|| data.get("exists").and_then(Value::as_bool))
            .ok_or_else(|| ApiError::UnexpectedResponse(format!("watchlist check: {}", data)))
    }

    pub async fn watchlist_add(&self, user_id: &str, symbol: &str) -> Result<()> {
        let symbol = normalize_symbol(symbol)?;
        let body = WatchlistRequest {
            user_id,
            stock_name: &symbol,
        };
        self.ack(self.with_body(Method::POST, &["watchlist", "add"], &body)?)
            .await
    }

    pub async fn watchlist_remove(&self, user_id: &str, symbol: &str) -> Result<()> {
        let symbol = normalize_symbol(symbol)?;
        let body = WatchlistRequest {
            user_id,
            stock_name: &symbol,
        };
        self.ack(self.with_body(Method::DELETE, &["watchlist", "remove"], &body)?)
            .await
    }

    // ---- trading ----

    /// Submit a trade
    ///
    /// An `error` status is returned as a receipt, not as `Err`, so the
    /// caller can show the server's message. `Err` means the request itself
    /// failed or the response was not an envelope.
    pub async fn submit_trade(&self, intent: &TradeIntent, user_id: &str) -> Result<TradeReceipt> {
        let body = TradeRequest::new(intent, user_id);
        let builder = self.with_body(Method::POST, &["order", "trade"], &body)?;
        let envelope = self.envelope::<Value>(builder).await?;
        Ok(envelope.into())
    }
}

fn normalize_symbol(symbol: &str) -> Result<String> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(ApiError::InvalidParameter("symbol is empty".to_string()));
    }
    Ok(symbol.to_uppercase())
}

fn server_error(message: Option<String>) -> ApiError {
    ApiError::Server(
        message
            .as_deref()
            .map(clean_server_message)
            .unwrap_or_else(|| "Request failed".to_string()),
    )
}

fn truncate(body: &str, max: usize) -> String {
    match body.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
