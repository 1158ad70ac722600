//! Application Layer
//!
//! Use cases built on the domain and infrastructure layers: live price
//! subscriptions, the order flow and its driver, background polling, and
//! the [`AppContext`] that wires them together.

pub mod context;
pub mod order_flow;
pub mod order_panel;
pub mod poller;
pub mod realtime;

pub use context::AppContext;
pub use order_flow::{
    transition, Effect, OrderContext, OrderEvent, OrderRequest, OrderState, StockContext,
    Transition,
};
pub use order_panel::{OrderGateway, OrderPanel, TraderSession};
pub use poller::Poller;
pub use realtime::{
    IndexBoard, IndexMap, PriceMap, PriceSubscription, RealtimePrices, INDEX_EVENT, PRICE_EVENT,
};
