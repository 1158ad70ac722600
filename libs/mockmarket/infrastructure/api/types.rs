//! Wire types for the MockMarket REST API

use crate::domain::{PriceSnapshot, PriceSource, Side, TradeIntent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Envelope status shared by every endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    /// Accepted but deferred, e.g. a trade queued for the next session
    Pending,
    Error,
}

/// `{status, data?, message?}`
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub status: ResponseStatus,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `GET /stocks/detail/:symbol`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockDetail {
    pub symbol: String,
    #[serde(default, alias = "company_name")]
    pub name: Option<String>,
    #[serde(alias = "ltp", alias = "current_price")]
    pub price: f64,
    #[serde(default)]
    pub change: Option<f64>,
    #[serde(default)]
    pub change_percent: Option<f64>,
    #[serde(default)]
    pub source: Option<PriceSource>,
    #[serde(default, alias = "as_of")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StockDetail {
    pub fn snapshot(&self) -> PriceSnapshot {
        PriceSnapshot {
            symbol: self.symbol.to_uppercase(),
            price: self.price,
            source: self.source,
            as_of: self.updated_at,
        }
    }
}

/// Chart window for `GET /stocks/history/:symbol`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryRange {
    #[default]
    OneDay,
    OneWeek,
    OneMonth,
    SixMonths,
    OneYear,
    FiveYears,
}

impl HistoryRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryRange::OneDay => "1D",
            HistoryRange::OneWeek => "1W",
            HistoryRange::OneMonth => "1M",
            HistoryRange::SixMonths => "6M",
            HistoryRange::OneYear => "1Y",
            HistoryRange::FiveYears => "5Y",
        }
    }
}

impl fmt::Display for HistoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HistoryRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "1D" => Ok(HistoryRange::OneDay),
            "1W" => Ok(HistoryRange::OneWeek),
            "1M" => Ok(HistoryRange::OneMonth),
            "6M" => Ok(HistoryRange::SixMonths),
            "1Y" => Ok(HistoryRange::OneYear),
            "5Y" => Ok(HistoryRange::FiveYears),
            other => Err(format!("unknown range '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPoint {
    #[serde(alias = "date", alias = "time")]
    pub timestamp: DateTime<Utc>,
    #[serde(alias = "close")]
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub symbol: String,
    #[serde(default, alias = "company_name")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mover {
    pub symbol: String,
    #[serde(alias = "ltp")]
    pub price: f64,
    #[serde(default)]
    pub change_percent: f64,
}

/// `GET /stocks/movers`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Movers {
    #[serde(default)]
    pub gainers: Vec<Mover>,
    #[serde(default)]
    pub losers: Vec<Mover>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

/// `GET /stocks/sentiment/:symbol`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub symbol: String,
    pub score: f64,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub articles_analyzed: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    #[serde(alias = "symbol")]
    pub stock_name: String,
    #[serde(default)]
    pub added_at: Option<DateTime<Utc>>,
}

/// Body of `POST /watchlist/add` and `DELETE /watchlist/remove`
#[derive(Debug, Clone, Serialize)]
pub struct WatchlistRequest<'a> {
    pub user_id: &'a str,
    pub stock_name: &'a str,
}

/// Body of `POST /order/trade`
#[derive(Debug, Clone, Serialize)]
pub struct TradeRequest<'a> {
    pub stock_name: &'a str,
    pub intended_price: f64,
    pub user_id: &'a str,
    pub quantity: u32,
    pub trade_type: Side,
}

impl<'a> TradeRequest<'a> {
    pub fn new(intent: &'a TradeIntent, user_id: &'a str) -> Self {
        Self {
            stock_name: &intent.stock_name,
            intended_price: intent.intended_price,
            user_id,
            quantity: intent.quantity,
            trade_type: intent.side,
        }
    }
}

/// Outcome of a trade submission as reported by the server
#[derive(Debug, Clone, PartialEq)]
pub struct TradeReceipt {
    pub status: ResponseStatus,
    pub message: Option<String>,
    pub data: Option<Value>,
}

impl From<Envelope<Value>> for TradeReceipt {
    fn from(envelope: Envelope<Value>) -> Self {
        Self {
            status: envelope.status,
            message: envelope.message,
            data: envelope.data,
        }
    }
}
