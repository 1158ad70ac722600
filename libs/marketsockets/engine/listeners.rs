//! Per-event listener registry
//!
//! Every consumer that calls [`SocketClient::on`](crate::SocketClient::on)
//! gets its own unbounded channel. The client task dispatches each decoded
//! frame to the listeners registered for that frame's event name, in the
//! order frames arrive. Lifecycle changes (connect/disconnect) go to every
//! listener so consumers can invalidate state that predates a reconnect.
//!
//! Dropping a [`Listener`] unregisters it, which keeps the listener count
//! equal to the number of live consumers.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::debug;

/// What a listener receives
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    /// A decoded frame for the event this listener registered for
    Message { event: String, data: Value },
    /// The client (re)connected; `epoch` increases with each connection
    Connected { epoch: u64 },
    /// The connection dropped; the client will retry per its strategy
    Disconnected,
}

type ListenerSlot = (u64, UnboundedSender<SocketEvent>);

/// Registry of event listeners, keyed by event name
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<String, Vec<ListenerSlot>>>,
}

impl ListenerRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a listener for `event`
    pub fn register(self: &Arc<Self>, event: impl Into<String>) -> Listener {
        let event = event.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = unbounded_channel();

        self.listeners
            .lock()
            .entry(event.clone())
            .or_default()
            .push((id, tx));

        debug!("[Socket] Listener {} registered for '{}'", id, event);

        Listener {
            id,
            event,
            registry: Arc::downgrade(self),
            rx,
        }
    }

    fn unregister(&self, event: &str, id: u64) {
        let mut listeners = self.listeners.lock();
        let Some(slots) = listeners.get_mut(event) else {
            return;
        };
        let before = slots.len();
        slots.retain(|(slot_id, _)| *slot_id != id);
        let removed = slots.len() != before;
        if slots.is_empty() {
            listeners.remove(event);
        }
        if removed {
            debug!("[Socket] Listener {} removed from '{}'", id, event);
        }
    }

    /// Deliver a frame to the listeners of `event`
    ///
    /// Returns how many listeners received it.
    pub fn dispatch(&self, event: &str, data: &Value) -> usize {
        let listeners = self.listeners.lock();
        let Some(slots) = listeners.get(event) else {
            return 0;
        };

        slots
            .iter()
            .filter(|(_, tx)| {
                tx.send(SocketEvent::Message {
                    event: event.to_string(),
                    data: data.clone(),
                })
                .is_ok()
            })
            .count()
    }

    /// Deliver a lifecycle event to every listener
    pub fn broadcast(&self, event: SocketEvent) {
        let listeners = self.listeners.lock();
        for (_, tx) in listeners.values().flatten() {
            let _ = tx.send(event.clone());
        }
    }

    /// Number of listeners registered for `event`
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.lock().get(event).map_or(0, Vec::len)
    }

    /// Number of listeners across all events
    pub fn total_listeners(&self) -> usize {
        self.listeners.lock().values().map(Vec::len).sum()
    }
}

/// A registered listener; unregisters itself on drop
#[derive(Debug)]
pub struct Listener {
    id: u64,
    event: String,
    registry: Weak<ListenerRegistry>,
    rx: UnboundedReceiver<SocketEvent>,
}

impl Listener {
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Wait for the next event; `None` once the client is gone
    pub async fn recv(&mut self) -> Option<SocketEvent> {
        self.rx.recv().await
    }

    /// Take the next event if one is queued
    pub fn try_recv(&mut self) -> Option<SocketEvent> {
        self.rx.try_recv().ok()
    }

    /// Handle that can unregister this listener from another owner
    ///
    /// Useful when the listener itself was moved into a task: closing the
    /// handle removes the registration immediately and `recv` then yields
    /// `None` once queued events are drained.
    pub fn handle(&self) -> ListenerHandle {
        ListenerHandle {
            id: self.id,
            event: self.event.clone(),
            registry: self.registry.clone(),
        }
    }
}

/// Detached unregistration handle for a [`Listener`]
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    id: u64,
    event: String,
    registry: Weak<ListenerRegistry>,
}

impl ListenerHandle {
    /// Unregister the listener; closing twice is a no-op
    pub fn close(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(&self.event, self.id);
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(&self.event, self.id);
        }
    }
}
