//! Periodic refresh of slow-moving data (movers, news, sentiment)
//!
//! A [`Poller`] fetches on a fixed interval and publishes the latest good
//! value. Failures keep the previous value and back off exponentially up to
//! a ceiling; the first success returns to the normal interval.

use marketsockets::{ExponentialBackoff, ReconnectionStrategy};
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const FLAG_POLL: Duration = Duration::from_millis(100);

/// Background fetch loop publishing its latest value
pub struct Poller<T> {
    name: String,
    rx: watch::Receiver<Option<Arc<T>>>,
    failures: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl<T: Send + Sync + 'static> Poller<T> {
    /// Start polling immediately, then every `interval`
    ///
    /// The loop stops when `shutdown_flag` reads `false` or the poller is
    /// dropped.
    pub fn spawn<F, Fut, E>(
        name: impl Into<String>,
        interval: Duration,
        max_backoff: Duration,
        shutdown_flag: Arc<AtomicBool>,
        mut fetch: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let name = name.into();
        let (tx, rx) = watch::channel(None);
        let failures = Arc::new(AtomicU64::new(0));

        let task_name = name.clone();
        let task_failures = Arc::clone(&failures);
        let backoff = ExponentialBackoff::unbounded(interval, max_backoff.max(interval));

        let task = tokio::spawn(async move {
            info!("[Poller] {} started, every {:?}", task_name, interval);
            let mut consecutive = 0usize;

            while shutdown_flag.load(Ordering::Acquire) {
                match fetch().await {
                    Ok(value) => {
                        if consecutive > 0 {
                            info!("[Poller] {} recovered after {} failure(s)", task_name, consecutive);
                        }
                        consecutive = 0;
                        tx.send_replace(Some(Arc::new(value)));
                        debug!("[Poller] {} refreshed", task_name);
                    }
                    Err(e) => {
                        consecutive += 1;
                        task_failures.fetch_add(1, Ordering::Relaxed);
                        warn!("[Poller] {} fetch failed ({}): {}", task_name, consecutive, e);
                    }
                }

                let delay = if consecutive == 0 {
                    interval
                } else {
                    backoff.next_delay(consecutive).unwrap_or(interval)
                };
                if !sleep_while_running(delay, &shutdown_flag).await {
                    break;
                }
            }

            info!("[Poller] {} stopped", task_name);
        });

        Self {
            name,
            rx,
            failures,
            task: Some(task),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last successful value, if any fetch has succeeded yet
    pub fn latest(&self) -> Option<Arc<T>> {
        self.rx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Option<Arc<T>>> {
        self.rx.clone()
    }

    /// Total failed fetches since start
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Sleep in short slices; false if the flag dropped meanwhile
async fn sleep_while_running(duration: Duration, flag: &AtomicBool) -> bool {
    let deadline = tokio::time::Instant::now() + duration;
    loop {
        if !flag.load(Ordering::Acquire) {
            return false;
        }
        let now = tokio::time::Instant::now();
        if now >= deadline {
            return true;
        }
        tokio::time::sleep((deadline - now).min(FLAG_POLL)).await;
    }
}
