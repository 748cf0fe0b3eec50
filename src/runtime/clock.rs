//! Time sources for timestamps and elapsed-time measurement.

use std::{
    cell::Cell,
    time::{Instant, SystemTime, UNIX_EPOCH},
};

use crate::types::TimestampMs;

/// Supplies wall-clock and monotonic readings.
pub trait Clock {
    /// Milliseconds since the Unix epoch, for operation timestamps.
    fn epoch_ms(&self) -> TimestampMs;

    /// Monotonic milliseconds from an arbitrary origin, for execution time.
    fn monotonic_ms(&self) -> f64;
}

/// Real clock backed by [`SystemTime`] and [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Monotonic origin is the moment of construction.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn epoch_ms(&self) -> TimestampMs {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn monotonic_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Hand-driven clock; both readings move together.
#[derive(Debug)]
pub struct ManualClock {
    epoch_ms: Cell<TimestampMs>,
    monotonic_ms: Cell<f64>,
}

impl ManualClock {
    /// Starts at `epoch_ms` with the monotonic reading at zero.
    pub fn new(epoch_ms: TimestampMs) -> Self {
        Self {
            epoch_ms: Cell::new(epoch_ms),
            monotonic_ms: Cell::new(0.0),
        }
    }

    /// Moves both readings forward by `ms`.
    pub fn advance(&self, ms: u64) {
        self.epoch_ms.set(self.epoch_ms.get() + ms);
        self.monotonic_ms.set(self.monotonic_ms.get() + ms as f64);
    }
}

impl Clock for ManualClock {
    fn epoch_ms(&self) -> TimestampMs {
        self.epoch_ms.get()
    }

    fn monotonic_ms(&self) -> f64 {
        self.monotonic_ms.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_both_readings() {
        let clock = ManualClock::new(1_000);
        clock.advance(25);
        assert_eq!(clock.epoch_ms(), 1_025);
        assert_eq!(clock.monotonic_ms(), 25.0);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.monotonic_ms();
        let b = clock.monotonic_ms();
        assert!(b >= a);
        assert!(clock.epoch_ms() > 1_600_000_000_000);
    }
}
