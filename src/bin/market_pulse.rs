//! Market Pulse - poll movers, news and sentiment
//!
//! Each data class refreshes on its own interval and backs off while the
//! backend is failing. Index values stream over the realtime feed.
//!
//! Usage:
//!   ./market_pulse            # movers + market news
//!   ./market_pulse TCS        # plus news and sentiment for TCS

use anyhow::Result;
use mockmarket::infrastructure::api::{Movers, NewsItem, Sentiment};
use mockmarket::{init_tracing_with_level, AppContext, Poller};
use mockmarket_terminal::bin_common::{load_terminal_config, parse_args, BinaryRunner, RunConfig};
use std::sync::Arc;
use tracing::{info, warn};

struct MarketPulse {
    ctx: AppContext,
    symbol: Option<String>,
    run_config: RunConfig,
    refreshes: u64,
}

fn log_movers(movers: &Movers) {
    info!("Top gainers:");
    for m in movers.gainers.iter().take(5) {
        info!("  {:<12} {:>10.2} {:>+7.2}%", m.symbol, m.price, m.change_percent);
    }
    info!("Top losers:");
    for m in movers.losers.iter().take(5) {
        info!("  {:<12} {:>10.2} {:>+7.2}%", m.symbol, m.price, m.change_percent);
    }
}

fn log_news(news: &[NewsItem]) {
    info!("Headlines ({}):", news.len());
    for item in news.iter().take(5) {
        info!("  - {}", item.title);
    }
}

fn log_sentiment(sentiment: &Sentiment) {
    info!(
        "Sentiment {}: {:.2} ({})",
        sentiment.symbol,
        sentiment.score,
        sentiment.label.as_deref().unwrap_or("n/a")
    );
}

impl BinaryRunner for MarketPulse {
    async fn run(&mut self) -> Result<()> {
        let movers = self.ctx.poll_movers();
        let news = self.ctx.poll_news(self.symbol.as_deref());
        let sentiment: Option<Poller<Sentiment>> =
            self.symbol.as_deref().map(|s| self.ctx.poll_sentiment(s));

        let indices = match self.ctx.prices().indices().await {
            Ok(board) => Some(board),
            Err(e) => {
                warn!("Index feed unavailable: {}", e);
                None
            }
        };

        let mut movers_rx = movers.watch();
        let mut news_rx = news.watch();
        let mut sentiment_rx = sentiment.as_ref().map(Poller::watch);
        let shutdown = self.ctx.shutdown_manager().clone();
        let mut heartbeat = self.run_config.heartbeat();

        loop {
            tokio::select! {
                Ok(()) = movers_rx.changed() => {
                    if let Some(m) = movers_rx.borrow_and_update().clone() {
                        log_movers(&m);
                    }
                    self.refreshes += 1;
                }
                Ok(()) = news_rx.changed() => {
                    let latest: Option<Arc<Vec<NewsItem>>> = news_rx.borrow_and_update().clone();
                    if let Some(items) = latest {
                        log_news(&items);
                    }
                    self.refreshes += 1;
                }
                Ok(()) = async {
                    match sentiment_rx.as_mut() {
                        Some(rx) => rx.changed().await,
                        None => std::future::pending().await,
                    }
                } => {
                    if let Some(s) = sentiment_rx.as_mut().and_then(|rx| rx.borrow_and_update().clone()) {
                        log_sentiment(&s);
                    }
                    self.refreshes += 1;
                }
                _ = shutdown.wait() => break,
            }

            if heartbeat.tick() {
                if let Some(board) = &indices {
                    for (name, quote) in board.snapshot().iter() {
                        info!("  {:<12} {:>10.2} {:>+7.2}%", name, quote.value, quote.change_percent);
                    }
                }
                info!(
                    "Heartbeat: failures movers={} news={}",
                    movers.failures(),
                    news.failures()
                );
            }
        }

        self.ctx.shutdown().await;
        Ok(())
    }

    fn config(&self) -> &RunConfig {
        &self.run_config
    }

    fn stats(&self) -> Option<String> {
        Some(format!("{} refreshes", self.refreshes))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_terminal_config()?;
    init_tracing_with_level(&config.log_level);
    config.log();

    let symbol = parse_args().first().map(|s| s.trim().to_uppercase());

    let ctx = AppContext::new(config)?;
    ctx.shutdown_manager().spawn_signal_handler();

    let mut app = MarketPulse {
        ctx,
        symbol,
        run_config: RunConfig::new("Market Pulse").with_heartbeat(60),
        refreshes: 0,
    };
    app.execute().await
}
