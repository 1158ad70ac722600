//! Heartbeat logging for long-running processes

use std::time::{Duration, Instant};

/// Rate-limits periodic status lines ("12 symbols live, 3 reconnects")
pub struct Heartbeat {
    interval: Duration,
    last_beat: Instant,
    beats: u64,
}

impl Heartbeat {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_beat: Instant::now(),
            beats: 0,
        }
    }

    /// Check if enough time has passed since the last beat
    pub fn should_beat(&self) -> bool {
        self.last_beat.elapsed() >= self.interval
    }

    /// Record a beat if one is due; returns whether it was
    pub fn tick(&mut self) -> bool {
        if !self.should_beat() {
            return false;
        }
        self.last_beat = Instant::now();
        self.beats += 1;
        true
    }

    pub fn beats(&self) -> u64 {
        self.beats
    }
}
