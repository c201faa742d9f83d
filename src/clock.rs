//! Monotonic per-session send/receive sequence assignment.

use session_wire::Coord;

/// A source of wall-clock milliseconds, injectable so tests can pin
/// time without relying on `tokio::time::pause` (which this codebase
/// doesn't use elsewhere -- scenario tests sleep for real instead).
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// The production clock: `chrono::Utc::now()` truncated to milliseconds.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// `(timestamp_ms, sequence)` generator and comparator.
///
/// Ties are broken by sequence, not a finer clock, to avoid depending
/// on sub-millisecond monotonic sources across transports.
#[derive(Debug, Clone, Copy)]
pub struct SequenceClock {
    last: Coord,
}

impl Default for SequenceClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceClock {
    pub fn new() -> Self {
        Self { last: Coord::ZERO }
    }

    /// Returns the most recently assigned or observed coordinate.
    pub fn last(&self) -> Coord {
        self.last
    }

    /// Reads `now` from `clock` and assigns the next coordinate.
    ///
    /// If the wall clock has advanced past `last.timestamp_ms`, the
    /// sequence resets to 0. Otherwise -- including the NTP-skew case
    /// where wall-clock time appears to move *backwards* -- the last
    /// timestamp is reused and the sequence increments, preserving
    /// strict monotonicity rather than replicating the drift-prone
    /// reset-only-on-advance behavior of the original implementation.
    pub fn assign_next(&mut self, clock: &dyn Clock) -> Coord {
        let now = clock.now_millis();
        let next = if now > self.last.timestamp_ms {
            Coord::new(now, 0)
        } else {
            Coord::new(self.last.timestamp_ms, self.last.sequence + 1)
        };
        self.last = next;
        next
    }

    /// Advances the clock to `coord` only if it is strictly greater
    /// under the `(timestamp_ms, sequence)` ordering; otherwise a no-op.
    /// Used for tracking the last-acknowledged inbound coordinate.
    pub fn observe(&mut self, coord: Coord) {
        if coord > self.last {
            self.last = coord;
        }
    }
}
