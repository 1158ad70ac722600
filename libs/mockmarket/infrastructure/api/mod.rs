//! MockMarket REST API client
//!
//! # Example
//!
//! ```rust,ignore
//! use mockmarket::infrastructure::api::MarketApiClient;
//!
//! let api = MarketApiClient::new("http://localhost:8000/api")?.with_token(token);
//!
//! let detail = api.stock_detail("TCS").await?;
//! let fresh = api.stock_detail_live("TCS").await?;
//! let movers = api.movers().await?;
//! ```

mod client;
mod types;

pub use client::{ApiError, MarketApiClient, Result};
pub use types::{
    Envelope, HistoryPoint, HistoryRange, Mover, Movers, NewsItem, ResponseStatus, SearchResult,
    Sentiment, StockDetail, TradeReceipt, TradeRequest, WatchlistEntry, WatchlistRequest,
};
