//! Process-wide stop signal

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{info, warn};

/// Running flag (`true` until stop) plus a wakeup for sleepers
///
/// The same flag goes to the socket client and every poller, so Ctrl+C
/// stops the terminal as a whole.
#[derive(Clone)]
pub struct ShutdownManager {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(true)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Trigger on Ctrl+C
    pub fn spawn_signal_handler(&self) {
        let manager = self.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Ctrl+C received, stopping terminal...");
                    manager.trigger();
                }
                Err(e) => warn!("Cannot listen for Ctrl+C: {}", e),
            }
        });
    }

    pub fn trigger(&self) {
        if self.flag.swap(false, Ordering::AcqRel) {
            info!("Shutdown requested");
        }
        self.notify.notify_waiters();
    }

    pub fn is_running(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// The raw flag, for tasks that only poll it
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Sleep unless stopped first; true if the whole duration passed
    pub async fn interruptible_sleep(&self, duration: Duration) -> bool {
        let stopped = self.notify.notified();
        if !self.is_running() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_running(),
            _ = stopped => false,
        }
    }

    /// Resolve once stopped
    ///
    /// The flag can be cleared directly by a holder of [`flag`](Self::flag)
    /// without a wakeup, so it is re-read on a short period as well.
    pub async fn wait(&self) {
        while self.is_running() {
            let stopped = self.notify.notified();
            if !self.is_running() {
                break;
            }
            let _ = tokio::time::timeout(Duration::from_millis(250), stopped).await;
        }
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}
