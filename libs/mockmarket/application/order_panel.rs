//! Order panel: drives [`order_flow`](super::order_flow) against real I/O

use super::order_flow::{
    transition, Effect, OrderContext, OrderEvent, OrderRequest, OrderState, StockContext,
};
use super::realtime::PriceMap;
use crate::domain::{MarketClock, PriceChangeThresholds, PriceSnapshot, Side, TradeIntent};
use crate::infrastructure::api::{ApiError, MarketApiClient, TradeReceipt};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

/// The two network calls an order needs
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Forced-live, cache-bypassing price
    async fn fetch_live_price(&self, symbol: &str) -> Result<PriceSnapshot, ApiError>;

    async fn submit_trade(&self, intent: &TradeIntent, user_id: &str) -> Result<TradeReceipt, ApiError>;
}

#[async_trait]
impl OrderGateway for MarketApiClient {
    async fn fetch_live_price(&self, symbol: &str) -> Result<PriceSnapshot, ApiError> {
        Ok(self.stock_detail_live(symbol).await?.snapshot())
    }

    async fn submit_trade(&self, intent: &TradeIntent, user_id: &str) -> Result<TradeReceipt, ApiError> {
        MarketApiClient::submit_trade(self, intent, user_id).await
    }
}

/// Who is trading
#[derive(Debug, Clone, Default)]
pub struct TraderSession {
    pub token: Option<String>,
    pub user_id: Option<String>,
}

impl TraderSession {
    pub fn new(token: Option<String>, user_id: Option<String>) -> Self {
        Self { token, user_id }
    }

    pub fn is_authenticated(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.token) && present(&self.user_id)
    }
}

/// Order entry for one stock
///
/// Each call runs the state machine until it needs the user again (a price
/// confirmation) or reaches an outcome. If a call's future is dropped
/// mid-step, the next call aborts the stale preflight fetch and resets the
/// panel before handling its own event. Dropping the panel aborts an
/// in-flight preflight fetch too.
pub struct OrderPanel {
    gateway: Arc<dyn OrderGateway>,
    clock: Arc<dyn MarketClock>,
    thresholds: PriceChangeThresholds,
    session: TraderSession,
    stock: Option<StockContext>,
    live_prices: Option<watch::Receiver<Arc<PriceMap>>>,
    quantity: Option<i64>,
    state: OrderState,
    preflight: Option<AbortHandle>,
    login_requested: bool,
}

impl OrderPanel {
    pub fn new(
        gateway: Arc<dyn OrderGateway>,
        clock: Arc<dyn MarketClock>,
        session: TraderSession,
    ) -> Self {
        Self {
            gateway,
            clock,
            thresholds: PriceChangeThresholds::default(),
            session,
            stock: None,
            live_prices: None,
            quantity: None,
            state: OrderState::default(),
            preflight: None,
            login_requested: false,
        }
    }

    pub fn with_thresholds(mut self, thresholds: PriceChangeThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Read live ticks from a price subscription
    pub fn with_live_prices(mut self, prices: watch::Receiver<Arc<PriceMap>>) -> Self {
        self.live_prices = Some(prices);
        self
    }

    /// Attach the panel to a stock and the price currently shown for it
    pub fn set_stock(&mut self, symbol: impl AsRef<str>, displayed_price: f64) {
        self.stock = Some(StockContext {
            symbol: symbol.as_ref().trim().to_uppercase(),
            displayed_price,
        });
    }

    /// Refresh the shown price without changing the stock
    pub fn set_displayed_price(&mut self, displayed_price: f64) {
        if let Some(stock) = self.stock.as_mut() {
            stock.displayed_price = displayed_price;
        }
    }

    pub fn set_quantity(&mut self, quantity: i64) {
        self.quantity = Some(quantity);
    }

    pub fn quantity(&self) -> Option<i64> {
        self.quantity
    }

    pub fn state(&self) -> &OrderState {
        &self.state
    }

    pub fn stock(&self) -> Option<&StockContext> {
        self.stock.as_ref()
    }

    /// True once a submit was refused for lack of credentials
    pub fn login_requested(&self) -> bool {
        self.login_requested
    }

    /// Submit the current quantity
    pub async fn submit(&mut self, side: Side) -> &OrderState {
        let request = OrderRequest {
            quantity: self.quantity.unwrap_or(0),
            side,
        };
        self.run(OrderEvent::Submit(request)).await
    }

    /// Accept a changed price
    pub async fn confirm(&mut self) -> &OrderState {
        self.run(OrderEvent::Confirm).await
    }

    /// Reject a changed price; nothing is sent
    pub async fn decline(&mut self) -> &OrderState {
        self.run(OrderEvent::Decline).await
    }

    /// Close a success or error message
    pub async fn dismiss(&mut self) -> &OrderState {
        self.run(OrderEvent::Dismiss).await
    }

    /// Abandon the step in progress and abort any preflight fetch
    pub async fn cancel(&mut self) -> &OrderState {
        self.abort_preflight();
        self.run(OrderEvent::Cancel).await
    }

    fn abort_preflight(&mut self) {
        if let Some(preflight) = self.preflight.take() {
            preflight.abort();
            debug!("[Order] Aborted in-flight price check");
        }
    }

    /// Reset a step left behind by a dropped call
    ///
    /// `run` holds `&mut self` until the flow settles, so finding a
    /// transient state here means the previous caller stopped waiting.
    fn recover_interrupted(&mut self) {
        if !matches!(
            self.state,
            OrderState::Submitting { .. } | OrderState::PreflightFetch { .. } | OrderState::Executing { .. }
        ) {
            return;
        }

        warn!("[Order] Previous call abandoned in state {}, resetting", self.state.name());
        self.abort_preflight();

        let ctx = OrderContext {
            authenticated: self.session.is_authenticated(),
            stock: self.stock.as_ref(),
            live_price: None,
            market_open: self.clock.is_market_open(),
            thresholds: self.thresholds,
        };
        self.state = transition(&self.state, OrderEvent::Cancel, &ctx).state;
    }

    fn live_price(&self) -> Option<f64> {
        let symbol = &self.stock.as_ref()?.symbol;
        let prices = self.live_prices.as_ref()?;
        let price = prices.borrow().get(symbol).map(|tick| tick.last_traded_price);
        price
    }

    async fn run(&mut self, first: OrderEvent) -> &OrderState {
        self.recover_interrupted();
        let mut queue = VecDeque::from([first]);

        while let Some(event) = queue.pop_front() {
            let ctx = OrderContext {
                authenticated: self.session.is_authenticated(),
                stock: self.stock.as_ref(),
                live_price: self.live_price(),
                market_open: self.clock.is_market_open(),
                thresholds: self.thresholds,
            };

            let event_name = format!("{:?}", event);
            let step = transition(&self.state, event, &ctx);
            if !step.applied {
                debug!("[Order] Ignoring {} in state {}", event_name, self.state.name());
                continue;
            }

            debug!("[Order] {} -> {}", self.state.name(), step.state.name());
            self.state = step.state;

            if matches!(self.state, OrderState::Submitting { .. }) {
                queue.push_back(OrderEvent::Route);
            }

            for effect in step.effects {
                match effect {
                    Effect::FetchLivePrice { symbol } => {
                        queue.push_back(self.preflight(symbol).await);
                    }
                    Effect::ExecuteTrade(intent) => {
                        queue.push_back(self.execute(intent).await);
                    }
                    Effect::RedirectToLogin => {
                        warn!("[Order] Not logged in, redirecting to login");
                        self.login_requested = true;
                    }
                    Effect::ClearForm => {
                        self.quantity = None;
                    }
                }
            }
        }

        &self.state
    }

    /// Forced-live fetch; a newer fetch aborts an older one
    async fn preflight(&mut self, symbol: String) -> OrderEvent {
        self.abort_preflight();

        info!("[Order] Market open and no live tick, re-checking {} price", symbol);
        let gateway = Arc::clone(&self.gateway);
        let task = tokio::spawn(async move { gateway.fetch_live_price(&symbol).await });
        self.preflight = Some(task.abort_handle());

        let result = task.await;
        self.preflight = None;

        match result {
            Ok(Ok(snapshot)) => OrderEvent::PreflightFetched {
                price: snapshot.price,
            },
            Ok(Err(e)) => {
                warn!("[Order] Live price check failed: {}", e);
                OrderEvent::PreflightFailed {
                    reason: e.to_string(),
                }
            }
            Err(e) => OrderEvent::PreflightFailed {
                reason: if e.is_cancelled() {
                    "price check cancelled".to_string()
                } else {
                    e.to_string()
                },
            },
        }
    }

    async fn execute(&mut self, intent: TradeIntent) -> OrderEvent {
        let Some(user_id) = self.session.user_id.clone() else {
            return OrderEvent::TradeFailed {
                reason: "no user id".to_string(),
            };
        };

        info!(
            "[Order] Placing {} {} x {} @ {:.2}",
            intent.side, intent.quantity, intent.stock_name, intent.intended_price
        );

        match self.gateway.submit_trade(&intent, &user_id).await {
            Ok(receipt) => {
                info!("[Order] Trade answered {:?}", receipt.status);
                OrderEvent::TradeCompleted(receipt)
            }
            Err(e) => {
                warn!("[Order] Trade request failed: {}", e);
                OrderEvent::TradeFailed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

impl Drop for OrderPanel {
    fn drop(&mut self) {
        self.abort_preflight();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FixedClock, LivePrice, OrderFailure, PriceSource};
    use crate::infrastructure::api::ResponseStatus;
    use chrono::{NaiveDate, NaiveTime};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Gateway with scripted answers that records every call
    #[derive(Default)]
    struct ScriptedGateway {
        live_price: Mutex<Option<f64>>,
        trade_status: Mutex<Option<ResponseStatus>>,
        fetches: Mutex<Vec<String>>,
        trades: Mutex<Vec<TradeIntent>>,
        /// How long a price fetch takes
        fetch_delay: Mutex<Duration>,
        /// Fetches that ran to completion
        fetches_completed: AtomicUsize,
    }

    #[async_trait]
    impl OrderGateway for ScriptedGateway {
        async fn fetch_live_price(&self, symbol: &str) -> Result<PriceSnapshot, ApiError> {
            self.fetches.lock().push(symbol.to_string());
            let delay = *self.fetch_delay.lock();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            self.fetches_completed.fetch_add(1, Ordering::SeqCst);
            match *self.live_price.lock() {
                Some(price) => Ok(PriceSnapshot {
                    symbol: symbol.to_string(),
                    price,
                    source: Some(PriceSource::UpstoxApi),
                    as_of: None,
                }),
                None => Err(ApiError::UnexpectedResponse("upstream down".into())),
            }
        }

        async fn submit_trade(&self, intent: &TradeIntent, _user_id: &str) -> Result<TradeReceipt, ApiError> {
            self.trades.lock().push(intent.clone());
            let status = self.trade_status.lock().unwrap_or(ResponseStatus::Success);
            Ok(TradeReceipt {
                status,
                message: None,
                data: None,
            })
        }
    }

    fn wednesday_at(h: u32, m: u32) -> Arc<dyn MarketClock> {
        Arc::new(FixedClock::at_ist(
            NaiveDate::from_ymd_opt(2026, 3, 4).unwrap(),
            NaiveTime::from_hms_opt(h, m, 0).unwrap(),
        ))
    }

    fn saturday() -> Arc<dyn MarketClock> {
        Arc::new(FixedClock::at_ist(
            NaiveDate::from_ymd_opt(2026, 3, 7).unwrap(),
            NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
        ))
    }

    fn logged_in() -> TraderSession {
        TraderSession::new(Some("token".into()), Some("user-1".into()))
    }

    fn panel(gateway: &Arc<ScriptedGateway>, clock: Arc<dyn MarketClock>) -> OrderPanel {
        let mut panel = OrderPanel::new(Arc::clone(gateway) as Arc<dyn OrderGateway>, clock, logged_in());
        panel.set_stock("reliance", 1000.0);
        panel.set_quantity(3);
        panel
    }

    #[tokio::test]
    async fn test_small_move_goes_straight_through() {
        let gateway = Arc::new(ScriptedGateway::default());
        *gateway.live_price.lock() = Some(1001.99);
        let mut panel = panel(&gateway, wednesday_at(11, 0));

        let state = panel.submit(Side::Buy).await.clone();

        assert!(matches!(state, OrderState::Success { pending: false, .. }));
        assert_eq!(*gateway.fetches.lock(), vec!["RELIANCE".to_string()]);
        let trades = gateway.trades.lock();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].intended_price, 1001.99);
        assert_eq!(trades[0].quantity, 3);
        assert_eq!(panel.quantity(), None, "form is cleared on success");
    }

    #[tokio::test]
    async fn test_large_move_waits_for_confirmation() {
        let gateway = Arc::new(ScriptedGateway::default());
        *gateway.live_price.lock() = Some(1002.0);
        let mut panel = panel(&gateway, wednesday_at(11, 0));

        let state = panel.submit(Side::Sell).await.clone();
        assert!(matches!(state, OrderState::PriceConfirmPending { .. }));
        assert!(state.message().unwrap().contains("1002.00"));
        assert!(gateway.trades.lock().is_empty());

        let state = panel.confirm().await.clone();
        assert!(matches!(state, OrderState::Success { .. }));
        assert_eq!(gateway.trades.lock()[0].intended_price, 1002.0);
        assert_eq!(gateway.trades.lock()[0].side, Side::Sell);
    }

    #[tokio::test]
    async fn test_declined_price_sends_nothing() {
        let gateway = Arc::new(ScriptedGateway::default());
        *gateway.live_price.lock() = Some(1010.0);
        let mut panel = panel(&gateway, wednesday_at(11, 0));

        panel.submit(Side::Buy).await;
        let state = panel.decline().await.clone();

        assert_eq!(state, OrderState::default());
        assert!(gateway.trades.lock().is_empty());
        assert_eq!(panel.quantity(), Some(3), "declining keeps the form");
    }

    #[tokio::test]
    async fn test_preflight_failure_never_trades() {
        let gateway = Arc::new(ScriptedGateway::default());
        let mut panel = panel(&gateway, wednesday_at(11, 0));

        let state = panel.submit(Side::Buy).await.clone();

        assert!(matches!(
            state,
            OrderState::Error {
                failure: OrderFailure::PreflightUnavailable(_)
            }
        ));
        assert_eq!(gateway.fetches.lock().len(), 1);
        assert!(gateway.trades.lock().is_empty());
    }

    #[tokio::test]
    async fn test_closed_market_skips_preflight() {
        for clock in [saturday(), wednesday_at(16, 0)] {
            let gateway = Arc::new(ScriptedGateway::default());
            *gateway.trade_status.lock() = Some(ResponseStatus::Pending);
            let mut panel = panel(&gateway, clock);

            let state = panel.submit(Side::Buy).await.clone();

            assert!(matches!(state, OrderState::Success { pending: true, .. }));
            assert!(gateway.fetches.lock().is_empty());
            assert_eq!(gateway.trades.lock()[0].intended_price, 1000.0);
        }
    }

    #[tokio::test]
    async fn test_live_tick_skips_preflight() {
        let gateway = Arc::new(ScriptedGateway::default());
        let mut ticks = HashMap::new();
        ticks.insert("RELIANCE".to_string(), LivePrice::new("RELIANCE", 1004.25));
        let (_tx, rx) = watch::channel(Arc::new(ticks));

        let mut panel = panel(&gateway, wednesday_at(11, 0)).with_live_prices(rx);
        let state = panel.submit(Side::Buy).await.clone();

        assert!(matches!(state, OrderState::Success { .. }));
        assert!(gateway.fetches.lock().is_empty());
        assert_eq!(gateway.trades.lock()[0].intended_price, 1004.25);
    }

    #[tokio::test]
    async fn test_logged_out_user_is_sent_to_login() {
        let gateway = Arc::new(ScriptedGateway::default());
        let mut panel = OrderPanel::new(
            Arc::clone(&gateway) as Arc<dyn OrderGateway>,
            wednesday_at(11, 0),
            TraderSession::default(),
        );
        panel.set_stock("TCS", 3900.0);
        panel.set_quantity(1);

        let state = panel.submit(Side::Buy).await.clone();

        assert!(matches!(
            state,
            OrderState::Idle {
                rejection: Some(OrderFailure::AuthMissing)
            }
        ));
        assert!(panel.login_requested());
        assert!(gateway.fetches.lock().is_empty());
        assert!(gateway.trades.lock().is_empty());
    }

    #[tokio::test]
    async fn test_server_error_then_dismiss() {
        let gateway = Arc::new(ScriptedGateway::default());
        *gateway.trade_status.lock() = Some(ResponseStatus::Error);
        let mut panel = panel(&gateway, saturday());

        let state = panel.submit(Side::Buy).await.clone();
        assert!(matches!(state, OrderState::Error { failure: OrderFailure::Server(_) }));

        let state = panel.dismiss().await.clone();
        assert_eq!(state, OrderState::default());
    }

    fn slow_gateway() -> Arc<ScriptedGateway> {
        let gateway = Arc::new(ScriptedGateway::default());
        *gateway.live_price.lock() = Some(1001.0);
        *gateway.fetch_delay.lock() = Duration::from_millis(200);
        gateway
    }

    /// Start a submit and stop waiting while the price check is in flight
    async fn abandon_submit(panel: &mut OrderPanel) {
        let result = tokio::time::timeout(Duration::from_millis(20), panel.submit(Side::Buy)).await;
        assert!(result.is_err(), "submit finished before the timeout");
        assert_eq!(panel.state().name(), "preflight_fetch");
    }

    #[tokio::test]
    async fn test_resubmit_after_abandoned_submit_replaces_fetch() {
        let gateway = slow_gateway();
        let mut panel = panel(&gateway, wednesday_at(11, 0));
        abandon_submit(&mut panel).await;

        *gateway.fetch_delay.lock() = Duration::ZERO;
        let state = panel.submit(Side::Buy).await.clone();
        assert!(matches!(state, OrderState::Success { .. }));

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(gateway.fetches.lock().len(), 2);
        assert_eq!(gateway.fetches_completed.load(Ordering::SeqCst), 1, "stale fetch was aborted");
        assert_eq!(gateway.trades.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_dismiss_after_abandoned_submit_resets_panel() {
        let gateway = slow_gateway();
        let mut panel = panel(&gateway, wednesday_at(11, 0));
        abandon_submit(&mut panel).await;

        let state = panel.dismiss().await.clone();
        assert_eq!(state, OrderState::default());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(gateway.fetches_completed.load(Ordering::SeqCst), 0);
        assert!(gateway.trades.lock().is_empty());
    }

    #[tokio::test]
    async fn test_explicit_cancel_aborts_fetch() {
        let gateway = slow_gateway();
        let mut panel = panel(&gateway, wednesday_at(11, 0));
        abandon_submit(&mut panel).await;

        let state = panel.cancel().await.clone();
        assert_eq!(state, OrderState::default());
        assert_eq!(panel.quantity(), Some(3), "cancel keeps the form");

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(gateway.fetches_completed.load(Ordering::SeqCst), 0);
        assert!(gateway.trades.lock().is_empty());
    }

    #[tokio::test]
    async fn test_dropping_panel_aborts_fetch() {
        let gateway = slow_gateway();
        let mut panel = panel(&gateway, wednesday_at(11, 0));
        abandon_submit(&mut panel).await;
        assert_eq!(gateway.fetches.lock().len(), 1);

        drop(panel);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(gateway.fetches_completed.load(Ordering::SeqCst), 0);
        assert!(gateway.trades.lock().is_empty());
    }
}
