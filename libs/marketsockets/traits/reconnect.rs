use std::time::Duration;

/// How long to wait before reconnecting, and when to give up
///
/// `attempt` counts consecutive failures since the last successful
/// connection, starting at 0.
pub trait ReconnectionStrategy: Send + Sync {
    /// `None` stops the client
    fn next_delay(&self, attempt: usize) -> Option<Duration>;

    fn should_reconnect(&self, attempt: usize) -> bool {
        self.next_delay(attempt).is_some()
    }
}

fn within(limit: Option<usize>, attempt: usize) -> bool {
    limit.map_or(true, |max| attempt < max)
}

/// Doubling delay capped at a ceiling
///
/// The doubling saturates, so a feed that stays down for days keeps
/// retrying at the ceiling instead of overflowing.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<usize>,
}

impl ExponentialBackoff {
    pub fn new(initial_delay: Duration, max_delay: Duration, max_attempts: Option<usize>) -> Self {
        Self {
            initial_delay,
            max_delay,
            max_attempts,
        }
    }

    /// Retry forever between `initial_delay` and `max_delay`
    pub fn unbounded(initial_delay: Duration, max_delay: Duration) -> Self {
        Self::new(initial_delay, max_delay, None)
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if !within(self.max_attempts, attempt) {
            return None;
        }
        let doubling = u32::try_from(attempt).unwrap_or(u32::MAX);
        let scaled = self.initial_delay.checked_mul(2u32.checked_pow(doubling).unwrap_or(u32::MAX));
        Some(scaled.map_or(self.max_delay, |d| d.min(self.max_delay)))
    }
}

/// Same delay every time
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<usize>,
}

impl FixedDelay {
    pub fn new(delay: Duration, max_attempts: Option<usize>) -> Self {
        Self { delay, max_attempts }
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        within(self.max_attempts, attempt).then_some(self.delay)
    }
}

/// Stop after the first disconnect
#[derive(Debug, Clone)]
pub struct NeverReconnect;

impl ReconnectionStrategy for NeverReconnect {
    fn next_delay(&self, _attempt: usize) -> Option<Duration> {
        None
    }
}
