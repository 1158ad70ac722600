//! Prices, their provenance, and the LIVE/CACHED badge

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Latest traded price for one symbol, as pushed by the realtime feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivePrice {
    /// Always uppercase
    pub symbol: String,
    pub last_traded_price: f64,
    pub as_of: Option<DateTime<Utc>>,
}

impl LivePrice {
    pub fn new(symbol: impl AsRef<str>, last_traded_price: f64) -> Self {
        Self {
            symbol: symbol.as_ref().trim().to_uppercase(),
            last_traded_price,
            as_of: None,
        }
    }

    pub fn with_as_of(mut self, as_of: DateTime<Utc>) -> Self {
        self.as_of = Some(as_of);
        self
    }

    /// Decode one `{symbol, ltp, as_of}` entry of a `price_update_batch`
    ///
    /// `ltp` may be a number or a numeric string. `as_of` may be RFC 3339 or
    /// epoch seconds/milliseconds. Entries without a symbol or a finite
    /// positive price are rejected.
    pub fn from_wire(entry: &Value) -> Option<Self> {
        let symbol = entry.get("symbol")?.as_str()?.trim();
        if symbol.is_empty() {
            return None;
        }

        let ltp = number(entry.get("ltp")?)?;
        if !ltp.is_finite() || ltp <= 0.0 {
            return None;
        }

        Some(Self {
            symbol: symbol.to_uppercase(),
            last_traded_price: ltp,
            as_of: entry.get("as_of").and_then(timestamp),
        })
    }

    /// Decode a whole batch payload, skipping malformed entries
    pub fn parse_batch(data: &Value) -> Vec<Self> {
        match data {
            Value::Array(entries) => entries.iter().filter_map(Self::from_wire).collect(),
            // Some producers send a single object instead of a one-element batch
            Value::Object(_) => Self::from_wire(data).into_iter().collect(),
            _ => Vec::new(),
        }
    }
}

pub(crate) fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => {
            let raw = n.as_i64()?;
            // Anything past year 2286 in seconds is really milliseconds
            if raw > 9_999_999_999 {
                Utc.timestamp_millis_opt(raw).single()
            } else {
                Utc.timestamp_opt(raw, 0).single()
            }
        }
        _ => None,
    }
}

/// Where a REST price snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    /// Backend's copy of the realtime feed
    WebsocketCache,
    /// Fetched from the upstream broker API on demand
    UpstoxApi,
    /// Last stored close; may be hours old
    Database,
}

impl PriceSource {
    /// Sources fresh enough to be shown as LIVE
    pub fn is_live(self) -> bool {
        matches!(self, PriceSource::WebsocketCache | PriceSource::UpstoxApi)
    }
}

/// A price read from REST rather than the realtime feed
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSnapshot {
    pub symbol: String,
    pub price: f64,
    pub source: Option<PriceSource>,
    pub as_of: Option<DateTime<Utc>>,
}

/// Freshness badge shown next to a price
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceBadge {
    Live,
    Cached,
}

impl fmt::Display for PriceBadge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceBadge::Live => write!(f, "LIVE"),
            PriceBadge::Cached => write!(f, "CACHED"),
        }
    }
}

/// LIVE iff a realtime tick exists or the snapshot source is live
pub fn badge_for(live_tick: Option<&LivePrice>, snapshot_source: Option<PriceSource>) -> PriceBadge {
    if live_tick.is_some() || snapshot_source.is_some_and(PriceSource::is_live) {
        PriceBadge::Live
    } else {
        PriceBadge::Cached
    }
}
