//! Order intents, price-change thresholds and user-facing failures

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Shown when the server gave nothing usable to display
pub const GENERIC_TRADE_ERROR: &str = "Trade failed. Please try again.";

/// Float slack so that a difference of exactly 2.00 counts as 2.00
const PRICE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" | "b" => Ok(Side::Buy),
            "sell" | "s" => Ok(Side::Sell),
            other => Err(format!("unknown side '{}', expected buy or sell", other)),
        }
    }
}

/// What the user asked to trade, built at submit time
#[derive(Debug, Clone, PartialEq)]
pub struct TradeIntent {
    pub stock_name: String,
    pub intended_price: f64,
    pub quantity: u32,
    pub side: Side,
}

impl TradeIntent {
    /// Same intent at a different price
    pub fn at_price(&self, price: f64) -> Self {
        Self {
            intended_price: price,
            ..self.clone()
        }
    }

    pub fn notional(&self) -> f64 {
        self.intended_price * f64::from(self.quantity)
    }
}

/// When a re-fetched price differs enough from the displayed one to ask the user
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceChangeThresholds {
    /// Absolute difference in rupees
    pub absolute: f64,
    /// Difference relative to the displayed price, in percent
    pub relative_percent: f64,
}

impl Default for PriceChangeThresholds {
    fn default() -> Self {
        Self {
            absolute: 2.0,
            relative_percent: 0.5,
        }
    }
}

impl PriceChangeThresholds {
    /// True if either rule fires; both boundaries are inclusive
    pub fn is_material(&self, displayed: f64, fetched: f64) -> bool {
        let diff = (fetched - displayed).abs();
        if diff + PRICE_EPSILON >= self.absolute {
            return true;
        }
        displayed > 0.0 && (diff / displayed) * 100.0 + PRICE_EPSILON >= self.relative_percent
    }
}

/// Why an order did not go through
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrderFailure {
    #[error("Please log in to place orders")]
    AuthMissing,

    #[error("{0}")]
    Validation(String),

    /// The pre-submit price check failed; the order was not sent
    #[error("Could not confirm the latest price. Please try again.")]
    PreflightUnavailable(String),

    #[error("{0}")]
    Server(String),
}

impl OrderFailure {
    /// Cleaned server failure; falls back to the generic message
    pub fn server(raw: Option<&str>) -> Self {
        OrderFailure::Server(raw.map_or_else(|| GENERIC_TRADE_ERROR.to_string(), clean_server_message))
    }
}

/// Strip internal error-code prefixes from a server message
///
/// Handles `[E123] `, `CODE_NAME: ` and `Error: ` in any order and number.
pub fn clean_server_message(raw: &str) -> String {
    let mut message = raw.trim();

    while let Some(rest) = strip_bracket_code(message)
        .or_else(|| strip_error_word(message))
        .or_else(|| strip_code_prefix(message))
    {
        message = rest.trim_start();
    }

    if message.is_empty() {
        GENERIC_TRADE_ERROR.to_string()
    } else {
        message.to_string()
    }
}

fn is_code_char(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' || c == '-'
}

fn strip_bracket_code(s: &str) -> Option<&str> {
    let inner = s.strip_prefix('[')?;
    let end = inner.find(']')?;
    let code = &inner[..end];
    if !code.is_empty() && code.chars().all(is_code_char) {
        Some(&inner[end + 1..])
    } else {
        None
    }
}

fn strip_error_word(s: &str) -> Option<&str> {
    let head = s.get(..6)?;
    head.eq_ignore_ascii_case("error:").then(|| &s[6..])
}

/// `CODE_NAME:` or `E42:`; a bare uppercase word such as a symbol is kept
fn strip_code_prefix(s: &str) -> Option<&str> {
    let colon = s.find(':')?;
    let code = &s[..colon];
    let looks_like_code = code.chars().any(|c| c.is_ascii_digit() || c == '_');
    if code.len() >= 2 && looks_like_code && code.chars().all(is_code_char) {
        Some(&s[colon + 1..])
    } else {
        None
    }
}
