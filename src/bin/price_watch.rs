//! Price Watch - stream live prices for a set of symbols
//!
//! Prints every price change with its LIVE/CACHED badge. Until the first
//! tick (and after any reconnect) a symbol shows its REST snapshot.
//!
//! Usage:
//!   ./price_watch RELIANCE TCS INFY

use anyhow::Result;
use mockmarket::domain::PriceSnapshot;
use mockmarket::{init_tracing_with_level, AppContext, PriceSubscription};
use mockmarket_terminal::bin_common::{load_terminal_config, parse_args, BinaryRunner, RunConfig};
use std::collections::HashMap;
use tracing::{info, warn};

const DEFAULT_SYMBOLS: [&str; 3] = ["RELIANCE", "TCS", "INFY"];

struct PriceWatch {
    ctx: AppContext,
    symbols: Vec<String>,
    run_config: RunConfig,
    updates: u64,
}

impl PriceWatch {
    async fn snapshots(&self) -> HashMap<String, PriceSnapshot> {
        let mut snapshots = HashMap::new();
        for symbol in &self.symbols {
            match self.ctx.api().stock_detail(symbol).await {
                Ok(detail) => {
                    snapshots.insert(symbol.clone(), detail.snapshot());
                }
                Err(e) => warn!("No snapshot for {}: {}", symbol, e),
            }
        }
        snapshots
    }

    fn print_board(&self, subscription: &PriceSubscription, snapshots: &HashMap<String, PriceSnapshot>) {
        for symbol in &self.symbols {
            let snapshot = snapshots.get(symbol);
            let badge = subscription.badge(symbol, snapshot.and_then(|s| s.source));
            let price = subscription
                .get(symbol)
                .map(|tick| tick.last_traded_price)
                .or_else(|| snapshot.map(|s| s.price));

            match price {
                Some(price) => info!("  {:<12} {:>10.2}  [{}]", symbol, price, badge),
                None => info!("  {:<12} {:>10}  [{}]", symbol, "--", badge),
            }
        }
    }
}

impl BinaryRunner for PriceWatch {
    async fn run(&mut self) -> Result<()> {
        let snapshots = self.snapshots().await;
        let mut subscription = self.ctx.prices().subscribe(&self.symbols).await?;
        let shutdown = self.ctx.shutdown_manager().clone();
        let mut heartbeat = self.run_config.heartbeat();

        self.print_board(&subscription, &snapshots);

        loop {
            tokio::select! {
                alive = subscription.changed() => {
                    if !alive {
                        warn!("Price feed closed");
                        break;
                    }
                    self.updates += 1;
                    self.print_board(&subscription, &snapshots);
                }
                _ = shutdown.wait() => break,
            }

            if heartbeat.tick() {
                if let Some(client) = self.ctx.connector().current().await {
                    let metrics = client.metrics();
                    info!(
                        "Heartbeat: {:?}, {} messages, {} reconnects",
                        metrics.connection_state, metrics.messages_received, metrics.reconnect_count
                    );
                }
            }
        }

        drop(subscription);
        self.ctx.shutdown().await;
        Ok(())
    }

    fn config(&self) -> &RunConfig {
        &self.run_config
    }

    fn stats(&self) -> Option<String> {
        Some(format!("{} price updates received", self.updates))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_terminal_config()?;
    init_tracing_with_level(&config.log_level);
    config.log();

    let args = parse_args();
    let symbols: Vec<String> = if args.is_empty() {
        DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect()
    } else {
        args.iter().map(|s| s.trim().to_uppercase()).collect()
    };

    let ctx = AppContext::new(config)?;
    ctx.shutdown_manager().spawn_signal_handler();

    let mut app = PriceWatch {
        ctx,
        symbols,
        run_config: RunConfig::new("Price Watch").with_heartbeat(60),
        updates: 0,
    };
    app.execute().await
}
