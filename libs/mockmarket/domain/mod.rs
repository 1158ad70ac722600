//! Domain Layer
//!
//! Pure market entities and rules: prices and their provenance, order
//! intents and failures, and the exchange trading session.
//! This layer has no dependencies on infrastructure or application layers.

pub mod index;
pub mod market_hours;
pub mod order;
pub mod price;

pub use index::IndexQuote;
pub use market_hours::{FixedClock, MarketClock, MarketSession, SystemClock};
pub use order::{
    clean_server_message, OrderFailure, PriceChangeThresholds, Side, TradeIntent,
    GENERIC_TRADE_ERROR,
};
pub use price::{badge_for, LivePrice, PriceBadge, PriceSnapshot, PriceSource};
