//! MockMarket Terminal
//!
//! Client side of a simulated Indian equities market: live prices over a
//! shared WebSocket connection, REST snapshots, and an order flow that
//! re-checks the price before trading while the market is open.
//!
//! # Example
//!
//! ```rust,ignore
//! use mockmarket::{AppContext, TerminalConfig};
//!
//! let ctx = AppContext::new(TerminalConfig::load("config/terminal.yaml")?)?;
//!
//! let prices = ctx.prices().subscribe(["RELIANCE", "TCS"]).await?;
//! let mut panel = ctx.order_panel("RELIANCE", 2875.40, Some(&prices));
//! panel.set_quantity(5);
//! panel.submit(Side::Buy).await;
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{
    AppContext, OrderGateway, OrderPanel, OrderState, Poller, PriceSubscription, RealtimePrices,
    TraderSession,
};
pub use domain::{
    LivePrice, MarketClock, MarketSession, OrderFailure, PriceBadge, PriceChangeThresholds,
    PriceSource, Side, TradeIntent,
};
pub use infrastructure::{
    init_tracing, init_tracing_with_level, ApiError, MarketApiClient, ShutdownManager,
    SocketConnector, TerminalConfig,
};
