//! Place Order - run the order flow from the command line
//!
//! While the market is open the price is re-checked before trading; a
//! material move asks for confirmation on stdin.
//!
//! Usage:
//!   ./place_order RELIANCE 5 buy

use anyhow::{bail, Context, Result};
use mockmarket::application::OrderState;
use mockmarket::{init_tracing_with_level, AppContext, Side};
use mockmarket_terminal::bin_common::{load_terminal_config, parse_args};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

async fn ask_to_continue(prompt: &str) -> Result<bool> {
    info!("{} [y/N]", prompt);
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Failed to read confirmation")?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_terminal_config()?;
    init_tracing_with_level(&config.log_level);

    let args = parse_args();
    let [symbol, quantity, side] = args.as_slice() else {
        bail!("Usage: place_order <SYMBOL> <QUANTITY> <buy|sell>");
    };
    let quantity: i64 = quantity
        .parse()
        .with_context(|| format!("Quantity '{}' is not a whole number", quantity))?;
    let side: Side = side.parse().map_err(anyhow::Error::msg)?;

    let ctx = AppContext::new(config)?;
    info!(
        "Market is {}",
        if ctx.clock().is_market_open() { "OPEN" } else { "CLOSED" }
    );

    let detail = ctx.api().stock_detail(symbol).await?;
    info!(
        "{} last shown at Rs {:.2} ({:?})",
        detail.symbol, detail.price, detail.source
    );

    let live = match ctx.prices().subscribe([detail.symbol.as_str()]).await {
        Ok(subscription) => Some(subscription),
        Err(e) => {
            warn!("Live prices unavailable: {}", e);
            None
        }
    };

    let mut panel = ctx.order_panel(&detail.symbol, detail.price, live.as_ref());
    panel.set_quantity(quantity);

    let mut state = panel.submit(side).await.clone();
    if let OrderState::PriceConfirmPending { .. } = state {
        let prompt = state.message().unwrap_or_default();
        state = if ask_to_continue(&prompt).await? {
            panel.confirm().await.clone()
        } else {
            panel.decline().await.clone()
        };
    }

    let message = state.message().unwrap_or_default();
    match &state {
        OrderState::Success { pending: true, .. } => info!("Queued: {}", message),
        OrderState::Success { .. } => info!("Done: {}", message),
        OrderState::Idle { rejection: None } => info!("Order cancelled"),
        _ if panel.login_requested() => {
            error!("{} (set MOCKMARKET_TOKEN and MOCKMARKET_USER_ID)", message)
        }
        _ => error!("{}", message),
    }

    drop(live);
    ctx.shutdown().await;
    Ok(())
}
