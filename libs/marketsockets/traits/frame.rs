use crate::traits::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw WebSocket message, text or binary
#[derive(Debug, Clone, PartialEq)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
}

impl WsMessage {
    /// Get the message as text, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            WsMessage::Text(s) => Some(s),
            WsMessage::Binary(_) => None,
        }
    }

    /// Check if message is text
    pub fn is_text(&self) -> bool {
        matches!(self, WsMessage::Text(_))
    }
}

/// Event envelope carried on the market feed
///
/// Every frame in both directions is a JSON object:
///
/// ```json
/// { "event": "price_update_batch", "data": [{ "symbol": "TCS", "ltp": 3921.5 }] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl EventFrame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Decode a frame from an incoming message
    ///
    /// Binary frames are accepted when they hold UTF-8 JSON.
    pub fn decode(message: &WsMessage) -> Result<Self> {
        let frame = match message {
            WsMessage::Text(text) => serde_json::from_str(text)?,
            WsMessage::Binary(bytes) => serde_json::from_slice(bytes)?,
        };
        Ok(frame)
    }

    /// Encode this frame as a text message
    pub fn encode(&self) -> Result<WsMessage> {
        Ok(WsMessage::Text(serde_json::to_string(self)?))
    }
}
