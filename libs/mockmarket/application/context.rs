//! Application root: owns the shared connection and the REST client

use super::order_panel::{OrderGateway, OrderPanel, TraderSession};
use super::poller::Poller;
use super::realtime::{PriceSubscription, RealtimePrices};
use crate::domain::{MarketClock, SystemClock};
use crate::infrastructure::api::{Movers, NewsItem, Sentiment};
use crate::infrastructure::{MarketApiClient, ShutdownManager, SocketConnector, TerminalConfig};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Everything a screen needs, wired from one [`TerminalConfig`]
///
/// There is exactly one socket connection per context. Clone the `Arc`s it
/// hands out rather than building a second context.
pub struct AppContext {
    config: TerminalConfig,
    api: Arc<MarketApiClient>,
    connector: Arc<SocketConnector>,
    prices: RealtimePrices,
    clock: Arc<dyn MarketClock>,
    shutdown: ShutdownManager,
}

impl AppContext {
    pub fn new(config: TerminalConfig) -> Result<Self> {
        let clock = Arc::new(SystemClock::new(config.session()?));
        Self::with_clock(config, clock)
    }

    /// Same as [`new`](Self::new) with an injected clock
    pub fn with_clock(config: TerminalConfig, clock: Arc<dyn MarketClock>) -> Result<Self> {
        let mut api = MarketApiClient::with_timeout(&config.api.base_url, config.api_timeout())
            .context("Failed to create API client")?;
        if let Some(token) = &config.token {
            api = api.with_token(token.clone());
        }

        let shutdown = ShutdownManager::new();
        let connector =
            Arc::new(SocketConnector::from_config(&config).with_shutdown_flag(shutdown.flag()));
        let prices = RealtimePrices::new(Arc::clone(&connector));

        Ok(Self {
            config,
            api: Arc::new(api),
            connector,
            prices,
            clock,
            shutdown,
        })
    }

    pub fn config(&self) -> &TerminalConfig {
        &self.config
    }

    pub fn api(&self) -> &Arc<MarketApiClient> {
        &self.api
    }

    pub fn connector(&self) -> &Arc<SocketConnector> {
        &self.connector
    }

    pub fn prices(&self) -> &RealtimePrices {
        &self.prices
    }

    pub fn clock(&self) -> &Arc<dyn MarketClock> {
        &self.clock
    }

    pub fn shutdown_manager(&self) -> &ShutdownManager {
        &self.shutdown
    }

    pub fn session(&self) -> TraderSession {
        TraderSession::new(self.config.token.clone(), self.config.user_id.clone())
    }

    /// Order panel for `symbol`, fed by `live` when the stock is being watched
    pub fn order_panel(
        &self,
        symbol: &str,
        displayed_price: f64,
        live: Option<&PriceSubscription>,
    ) -> OrderPanel {
        let gateway: Arc<dyn OrderGateway> = Arc::clone(&self.api) as Arc<dyn OrderGateway>;
        let mut panel = OrderPanel::new(gateway, Arc::clone(&self.clock), self.session())
            .with_thresholds(self.config.thresholds());
        if let Some(subscription) = live {
            panel = panel.with_live_prices(subscription.watch());
        }
        panel.set_stock(symbol, displayed_price);
        panel
    }

    fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.config.polling.max_backoff_secs)
    }

    pub fn poll_movers(&self) -> Poller<Movers> {
        let api = Arc::clone(&self.api);
        Poller::spawn(
            "movers",
            Duration::from_secs(self.config.polling.movers_secs),
            self.max_backoff(),
            self.shutdown.flag(),
            move || {
                let api = Arc::clone(&api);
                async move { api.movers().await }
            },
        )
    }

    /// Market news, or news for one symbol
    pub fn poll_news(&self, symbol: Option<&str>) -> Poller<Vec<NewsItem>> {
        let api = Arc::clone(&self.api);
        let symbol = symbol.map(str::to_string);
        let name = match &symbol {
            Some(s) => format!("news:{}", s),
            None => "news".to_string(),
        };
        Poller::spawn(
            name,
            Duration::from_secs(self.config.polling.news_secs),
            self.max_backoff(),
            self.shutdown.flag(),
            move || {
                let api = Arc::clone(&api);
                let symbol = symbol.clone();
                async move { api.news(symbol.as_deref()).await }
            },
        )
    }

    pub fn poll_sentiment(&self, symbol: &str) -> Poller<Sentiment> {
        let api = Arc::clone(&self.api);
        let symbol = symbol.to_string();
        Poller::spawn(
            format!("sentiment:{}", symbol),
            Duration::from_secs(self.config.polling.sentiment_secs),
            self.max_backoff(),
            self.shutdown.flag(),
            move || {
                let api = Arc::clone(&api);
                let symbol = symbol.clone();
                async move { api.sentiment(&symbol).await }
            },
        )
    }

    /// Stop pollers and close the connection
    pub async fn shutdown(&self) {
        info!("Shutting down terminal context...");
        self.shutdown.trigger();
        self.connector.shutdown().await;
        info!("Terminal context stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::order_flow::OrderState;
    use crate::domain::FixedClock;
    use chrono::{NaiveDate, NaiveTime};

    fn config() -> TerminalConfig {
        let mut config = TerminalConfig::default();
        config.api.base_url = "http://127.0.0.1:9/api".to_string();
        config.socket.url = "ws://127.0.0.1:9/ws".to_string();
        config.token = Some("token".to_string());
        config.user_id = Some("user-1".to_string());
        config
    }

    #[tokio::test]
    async fn test_wires_token_and_session() {
        let ctx = AppContext::new(config()).unwrap();
        assert!(ctx.api().has_token());
        assert!(ctx.session().is_authenticated());
        assert_eq!(ctx.connector().url(), "ws://127.0.0.1:9/ws");
    }

    #[tokio::test]
    async fn test_order_panel_starts_idle_for_stock() {
        let clock = Arc::new(FixedClock::at_ist(
            NaiveDate::from_ymd_opt(2026, 3, 7).unwrap(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        ));
        let ctx = AppContext::with_clock(config(), clock).unwrap();

        let panel = ctx.order_panel("infy", 1500.0, None);
        assert_eq!(panel.stock().unwrap().symbol, "INFY");
        assert_eq!(*panel.state(), OrderState::default());
        assert!(!ctx.clock().is_market_open());
    }

    #[tokio::test]
    async fn test_shutdown_stops_pollers() {
        let ctx = AppContext::new(config()).unwrap();
        let poller = ctx.poll_movers();
        ctx.shutdown().await;

        for _ in 0..100 {
            if !poller.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!poller.is_running());
        assert!(!ctx.shutdown_manager().is_running());
    }

    #[tokio::test]
    async fn test_reopening_connection_keeps_process_running() {
        let ctx = AppContext::new(config()).unwrap();
        let poller = ctx.poll_movers();

        let first = ctx.connector().get_connection().await.unwrap();
        ctx.connector().shutdown().await;
        assert!(first.is_shut_down());
        assert!(ctx.shutdown_manager().is_running());
        assert!(poller.is_running());

        let reopened = ctx.connector().get_connection().await.unwrap();
        assert!(!reopened.is_shut_down());
        assert!(reopened.subscribe_symbols(["TCS"]).is_ok());

        ctx.shutdown().await;
        assert!(reopened.is_shut_down());
    }
}
