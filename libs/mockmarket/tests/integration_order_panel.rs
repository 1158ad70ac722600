//! Order panel driving the real REST client against a mock backend

mod common;

use chrono::{NaiveDate, NaiveTime};
use common::{success, MockHttpServer};
use mockmarket::application::{OrderGateway, OrderPanel, OrderState, TraderSession};
use mockmarket::domain::{FixedClock, MarketClock, OrderFailure, Side};
use mockmarket::infrastructure::MarketApiClient;
use serde_json::json;
use std::sync::Arc;

fn ist(date: (i32, u32, u32), time: (u32, u32)) -> Arc<dyn MarketClock> {
    Arc::new(FixedClock::at_ist(
        NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
        NaiveTime::from_hms_opt(time.0, time.1, 0).unwrap(),
    ))
}

fn panel(server: &MockHttpServer, clock: Arc<dyn MarketClock>) -> OrderPanel {
    let api = MarketApiClient::new(&server.base_url()).unwrap().with_token("token");
    let gateway: Arc<dyn OrderGateway> = Arc::new(api);
    let session = TraderSession::new(Some("token".into()), Some("user-42".into()));

    let mut panel = OrderPanel::new(gateway, clock, session);
    panel.set_stock("RELIANCE", 1000.0);
    panel.set_quantity(2);
    panel
}

fn trades(server: &MockHttpServer) -> usize {
    server
        .requests()
        .iter()
        .filter(|r| r.path() == "/api/order/trade")
        .count()
}

fn live_price(server: &MockHttpServer, price: f64) {
    server.route(
        "GET",
        "/stocks/detail/RELIANCE",
        200,
        success(json!({ "symbol": "RELIANCE", "price": price, "source": "upstox_api" })),
    );
}

fn trade_answer(server: &MockHttpServer, status: &str) {
    server.route(
        "POST",
        "/order/trade",
        200,
        json!({ "status": status, "message": "ok" }),
    );
}

#[tokio::test]
async fn test_open_market_rechecks_price_before_trading() {
    let server = MockHttpServer::start().await;
    live_price(&server, 1001.5);
    trade_answer(&server, "success");

    let mut panel = panel(&server, ist((2026, 3, 4), (10, 30)));
    let state = panel.submit(Side::Buy).await.clone();
    verbose_println!("final state: {:?}", state);

    assert!(matches!(state, OrderState::Success { pending: false, .. }));

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].path(), "/api/stocks/detail/RELIANCE");
    assert_eq!(requests[0].query(), "forceLive=1");
    assert_eq!(requests[1].json()["intended_price"], 1001.5);
    assert_eq!(requests[1].json()["quantity"], 2);
}

#[tokio::test]
async fn test_two_rupee_move_needs_confirmation() {
    let server = MockHttpServer::start().await;
    live_price(&server, 1002.0);
    trade_answer(&server, "success");

    let mut panel = panel(&server, ist((2026, 3, 4), (10, 30)));
    let state = panel.submit(Side::Buy).await.clone();

    assert!(matches!(
        state,
        OrderState::PriceConfirmPending { fetched_price, .. } if fetched_price == 1002.0
    ));
    assert_eq!(trades(&server), 0);

    panel.confirm().await;
    assert_eq!(trades(&server), 1);
    assert_eq!(server.last_request().json()["intended_price"], 1002.0);
}

#[tokio::test]
async fn test_closed_market_trades_at_displayed_price() {
    // Saturday, then a weekday after the close
    for clock in [ist((2026, 3, 7), (11, 0)), ist((2026, 3, 4), (16, 0))] {
        let server = MockHttpServer::start().await;
        trade_answer(&server, "pending");

        let mut panel = panel(&server, clock);
        let state = panel.submit(Side::Sell).await.clone();

        assert!(matches!(state, OrderState::Success { pending: true, .. }));
        let requests = server.requests();
        assert_eq!(requests.len(), 1, "no preflight when closed");
        assert_eq!(requests[0].json()["intended_price"], 1000.0);
        assert_eq!(requests[0].json()["trade_type"], "sell");
    }
}

#[tokio::test]
async fn test_unreachable_live_price_blocks_trade() {
    let server = MockHttpServer::start().await;
    server.route_raw("GET", "/stocks/detail/RELIANCE", 500, "upstream timeout");
    trade_answer(&server, "success");

    let mut panel = panel(&server, ist((2026, 3, 4), (10, 30)));
    let state = panel.submit(Side::Buy).await.clone();

    assert!(matches!(
        state,
        OrderState::Error {
            failure: OrderFailure::PreflightUnavailable(_)
        }
    ));
    assert_eq!(trades(&server), 0);
    assert_eq!(panel.quantity(), Some(2), "form kept for a retry");
}

#[tokio::test]
async fn test_server_rejection_shows_clean_message() {
    let server = MockHttpServer::start().await;
    server.route(
        "POST",
        "/order/trade",
        400,
        json!({ "status": "error", "message": "[E_QTY] QUANTITY_LIMIT: Max 500 shares per order" }),
    );

    let mut panel = panel(&server, ist((2026, 3, 7), (11, 0)));
    let state = panel.submit(Side::Buy).await.clone();

    assert_eq!(
        state.message().as_deref(),
        Some("Max 500 shares per order")
    );
}
