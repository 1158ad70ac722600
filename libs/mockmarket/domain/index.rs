use crate::domain::price::number;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Latest value of a market index (NIFTY 50, SENSEX, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexQuote {
    pub index: String,
    pub value: f64,
    pub change: f64,
    pub change_percent: f64,
}

impl IndexQuote {
    /// Decode one `{index, value, change, change_percent}` entry
    pub fn from_wire(entry: &Value) -> Option<Self> {
        let index = entry.get("index")?.as_str()?.trim();
        if index.is_empty() {
            return None;
        }
        Some(Self {
            index: index.to_uppercase(),
            value: number(entry.get("value")?)?,
            change: entry.get("change").and_then(number).unwrap_or(0.0),
            change_percent: entry.get("change_percent").and_then(number).unwrap_or(0.0),
        })
    }

    pub fn parse_batch(data: &Value) -> Vec<Self> {
        data.as_array()
            .map(|entries| entries.iter().filter_map(Self::from_wire).collect())
            .unwrap_or_default()
    }
}
