//! Live price subscriptions
//!
//! A [`PriceSubscription`] watches a set of symbols over the shared
//! connection and publishes `symbol -> LivePrice` through a `watch` channel.
//! The published map is copy-on-write: a batch that touches none of the
//! watched symbols leaves the very same `Arc` in place and wakes nobody.
//!
//! Any connection reset (drop or reconnect) clears the map. Prices held
//! from before the reset are no longer known to be live, so the badge falls
//! back to the REST snapshot until a fresh batch arrives.

use crate::domain::{badge_for, IndexQuote, LivePrice, PriceBadge, PriceSource};
use crate::infrastructure::SocketConnector;
use marketsockets::{Listener, ListenerHandle, SocketClient, SocketEvent};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, OnceCell};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Batched price ticks
pub const PRICE_EVENT: &str = "price_update_batch";

/// Batched index values
pub const INDEX_EVENT: &str = "index_update_batch";

pub type PriceMap = HashMap<String, LivePrice>;
pub type IndexMap = HashMap<String, IndexQuote>;

/// Entry point for realtime data; cheap to clone
#[derive(Clone)]
pub struct RealtimePrices {
    connector: Arc<SocketConnector>,
    indices: Arc<OnceCell<Arc<IndexBoard>>>,
}

impl RealtimePrices {
    pub fn new(connector: Arc<SocketConnector>) -> Self {
        Self {
            connector,
            indices: Arc::new(OnceCell::new()),
        }
    }

    /// Watch `symbols` for live ticks
    ///
    /// Symbols are trimmed and uppercased; blanks are dropped.
    pub async fn subscribe<I, S>(&self, symbols: I) -> marketsockets::Result<PriceSubscription>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let client = self.connector.get_connection().await?;
        PriceSubscription::start(client, normalize(symbols))
    }

    /// Shared index board, started on first use
    pub async fn indices(&self) -> marketsockets::Result<Arc<IndexBoard>> {
        let board = self
            .indices
            .get_or_try_init(|| async {
                let client = self.connector.get_connection().await?;
                Ok::<_, marketsockets::SocketError>(Arc::new(IndexBoard::start(&client)))
            })
            .await?;
        Ok(Arc::clone(board))
    }

    pub fn connector(&self) -> &Arc<SocketConnector> {
        &self.connector
    }
}

fn normalize<I, S>(symbols: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    symbols
        .into_iter()
        .map(|s| s.as_ref().trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Upsert ticks for watched symbols; true if the map changed
///
/// Only clones the map (via `Arc::make_mut`) when a watched symbol is hit.
pub(crate) fn apply_ticks(
    map: &mut Arc<PriceMap>,
    symbols: &HashSet<String>,
    ticks: Vec<LivePrice>,
) -> bool {
    let mut modified = false;
    for tick in ticks {
        if symbols.contains(&tick.symbol) {
            Arc::make_mut(map).insert(tick.symbol.clone(), tick);
            modified = true;
        }
    }
    modified
}

fn clear(map: &mut Arc<PriceMap>) -> bool {
    if map.is_empty() {
        return false;
    }
    *map = Arc::new(PriceMap::new());
    true
}

fn retain_symbols(map: &mut Arc<PriceMap>, symbols: &HashSet<String>) -> bool {
    if map.keys().all(|symbol| symbols.contains(symbol)) {
        return false;
    }
    Arc::make_mut(map).retain(|symbol, _| symbols.contains(symbol));
    true
}

struct Feed {
    listener: ListenerHandle,
    task: JoinHandle<()>,
}

impl Feed {
    fn close(self) {
        self.listener.close();
        self.task.abort();
    }
}

/// Live prices for a set of symbols
///
/// Dropping the subscription unregisters its listener and releases its
/// symbols on the connection.
pub struct PriceSubscription {
    client: Arc<SocketClient>,
    symbols: HashSet<String>,
    tx: Arc<watch::Sender<Arc<PriceMap>>>,
    rx: watch::Receiver<Arc<PriceMap>>,
    generation: Arc<AtomicU64>,
    feed: Option<Feed>,
}

impl PriceSubscription {
    fn start(client: Arc<SocketClient>, symbols: HashSet<String>) -> marketsockets::Result<Self> {
        let (tx, rx) = watch::channel(Arc::new(PriceMap::new()));
        let mut subscription = Self {
            client,
            symbols,
            tx: Arc::new(tx),
            rx,
            generation: Arc::new(AtomicU64::new(0)),
            feed: None,
        };
        subscription.attach()?;
        Ok(subscription)
    }

    fn attach(&mut self) -> marketsockets::Result<()> {
        // Listen before subscribing so the first batch cannot slip past
        let listener = self.client.on(PRICE_EVENT);
        let handle = listener.handle();
        self.client.subscribe_symbols(&self.symbols)?;

        let generation = self.generation.load(Ordering::Acquire);
        let task = tokio::spawn(pump_prices(
            listener,
            self.symbols.clone(),
            Arc::clone(&self.tx),
            Arc::clone(&self.generation),
            generation,
        ));

        debug!("[Prices] Watching {} symbols", self.symbols.len());
        self.feed = Some(Feed {
            listener: handle,
            task,
        });
        Ok(())
    }

    /// Replace the watched set
    ///
    /// Prices for symbols no longer watched are dropped from the map.
    /// Symbols in both sets stay subscribed on the server throughout.
    pub fn set_symbols<I, S>(&mut self, symbols: I) -> marketsockets::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let next = normalize(symbols);
        if next == self.symbols {
            return Ok(());
        }

        if let Some(feed) = self.feed.take() {
            feed.close();
        }
        // Writes from the old feed are rejected from here on
        self.generation.fetch_add(1, Ordering::AcqRel);

        let previous = std::mem::replace(&mut self.symbols, next);
        let keep = self.symbols.clone();
        self.tx.send_if_modified(|map| retain_symbols(map, &keep));

        let attached = self.attach();
        if let Err(e) = self.client.unsubscribe_symbols(&previous) {
            debug!("[Prices] Unsubscribe of replaced symbols not sent: {}", e);
        }
        attached
    }

    /// Watched symbols, sorted
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.symbols.iter().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn is_watching(&self, symbol: &str) -> bool {
        self.symbols.contains(&symbol.trim().to_uppercase())
    }

    /// Receiver that wakes on every change to the map
    pub fn watch(&self) -> watch::Receiver<Arc<PriceMap>> {
        self.rx.clone()
    }

    pub fn snapshot(&self) -> Arc<PriceMap> {
        Arc::clone(&self.rx.borrow())
    }

    pub fn get(&self, symbol: &str) -> Option<LivePrice> {
        self.rx.borrow().get(&symbol.trim().to_uppercase()).cloned()
    }

    /// LIVE if a tick arrived since the last connection reset, else by snapshot source
    pub fn badge(&self, symbol: &str, snapshot_source: Option<PriceSource>) -> PriceBadge {
        badge_for(self.get(symbol).as_ref(), snapshot_source)
    }

    /// Wait for the next change; false once the feed is gone
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

impl Drop for PriceSubscription {
    fn drop(&mut self) {
        if let Some(feed) = self.feed.take() {
            feed.close();
            if let Err(e) = self.client.unsubscribe_symbols(&self.symbols) {
                debug!("[Prices] Unsubscribe on drop not sent: {}", e);
            }
        }
    }
}

async fn pump_prices(
    mut listener: Listener,
    symbols: HashSet<String>,
    tx: Arc<watch::Sender<Arc<PriceMap>>>,
    generation: Arc<AtomicU64>,
    own_generation: u64,
) {
    let current = || generation.load(Ordering::Acquire) == own_generation;

    while let Some(event) = listener.recv().await {
        match event {
            SocketEvent::Message { data, .. } => {
                let ticks = LivePrice::parse_batch(&data);
                tx.send_if_modified(|map| current() && apply_ticks(map, &symbols, ticks));
            }
            SocketEvent::Connected { epoch } => {
                if tx.send_if_modified(|map| current() && clear(map)) {
                    info!("[Prices] Reconnected (epoch {}), waiting for fresh ticks", epoch);
                }
            }
            SocketEvent::Disconnected => {
                if tx.send_if_modified(|map| current() && clear(map)) {
                    info!("[Prices] Feed lost, live prices invalidated");
                }
            }
        }
    }
}

/// Latest value per market index
pub struct IndexBoard {
    rx: watch::Receiver<Arc<IndexMap>>,
    listener: ListenerHandle,
    task: JoinHandle<()>,
}

impl IndexBoard {
    fn start(client: &SocketClient) -> Self {
        let (tx, rx) = watch::channel(Arc::new(IndexMap::new()));
        let mut listener = client.on(INDEX_EVENT);
        let handle = listener.handle();

        let task = tokio::spawn(async move {
            while let Some(event) = listener.recv().await {
                let SocketEvent::Message { data, .. } = event else {
                    continue;
                };
                let quotes = IndexQuote::parse_batch(&data);
                if quotes.is_empty() {
                    continue;
                }
                tx.send_modify(|map| {
                    let map = Arc::make_mut(map);
                    for quote in quotes {
                        map.insert(quote.index.clone(), quote);
                    }
                });
            }
        });

        Self {
            rx,
            listener: handle,
            task,
        }
    }

    pub fn get(&self, index: &str) -> Option<IndexQuote> {
        self.rx.borrow().get(&index.trim().to_uppercase()).cloned()
    }

    pub fn snapshot(&self) -> Arc<IndexMap> {
        Arc::clone(&self.rx.borrow())
    }

    pub fn watch(&self) -> watch::Receiver<Arc<IndexMap>> {
        self.rx.clone()
    }
}

impl Drop for IndexBoard {
    fn drop(&mut self) {
        self.listener.close();
        self.task.abort();
    }
}
