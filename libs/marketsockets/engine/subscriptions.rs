use parking_lot::Mutex;
use std::collections::HashMap;

/// Reference-counted symbol subscriptions
///
/// Several consumers may watch the same symbol over one connection. The
/// server only hears `subscribe` for a symbol's first watcher and
/// `unsubscribe` after its last one leaves. Symbols are uppercased.
#[derive(Debug, Default)]
pub struct SymbolSubscriptions {
    counts: Mutex<HashMap<String, usize>>,
}

impl SymbolSubscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one watcher per symbol; returns symbols that had no watcher before
    pub fn acquire<I, S>(&self, symbols: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut counts = self.counts.lock();
        let mut added = Vec::new();
        for symbol in symbols {
            let symbol = symbol.as_ref().trim().to_uppercase();
            if symbol.is_empty() {
                continue;
            }
            let count = counts.entry(symbol.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                added.push(symbol);
            }
        }
        added
    }

    /// Remove one watcher per symbol; returns symbols with no watcher left
    pub fn release<I, S>(&self, symbols: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut counts = self.counts.lock();
        let mut removed = Vec::new();
        for symbol in symbols {
            let symbol = symbol.as_ref().trim().to_uppercase();
            if let Some(count) = counts.get_mut(&symbol) {
                *count -= 1;
                if *count == 0 {
                    counts.remove(&symbol);
                    removed.push(symbol);
                }
            }
        }
        removed
    }

    /// Every symbol with at least one watcher, sorted
    pub fn active(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.counts.lock().keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn is_empty(&self) -> bool {
        self.counts.lock().is_empty()
    }
}
