// session-wire: wire envelope types shared by the delivery engine and
// whatever transport glue emits its messages.
//
// A `Coord` identifies a message within one session. Ordering is
// lexicographic on `(timestamp_ms, sequence)` -- ties are broken by
// sequence rather than a finer clock, so two deliveries created in the
// same millisecond still compare unambiguously.

use serde::{Deserialize, Serialize};

/// A `(timestamp_ms, sequence)` coordinate identifying one message
/// within a session's outbound stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub timestamp_ms: i64,
    pub sequence: u32,
}

impl Coord {
    pub const ZERO: Coord = Coord {
        timestamp_ms: 0,
        sequence: 0,
    };

    pub fn new(timestamp_ms: i64, sequence: u32) -> Self {
        Self {
            timestamp_ms,
            sequence,
        }
    }
}

impl Default for Coord {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Metadata carried alongside every outbound payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub timestamp: i64,
    pub sequence: u32,
}

impl From<Coord> for Metadata {
    fn from(coord: Coord) -> Self {
        Metadata {
            timestamp: coord.timestamp_ms,
            sequence: coord.sequence,
        }
    }
}

/// The wire shape of one outbound message: `{ "metadata": {...}, "data": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub metadata: Metadata,
    pub data: serde_json::Value,
}

/// Which shape the current attachment presents.
///
/// A tagged variant rather than an inheritance hierarchy -- frame and
/// batch transports differ enough in lifecycle (persistent vs.
/// single-shot) that dynamic dispatch across them would hide more than
/// it shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Frame,
    Batch,
}

/// The client's last-seen coordinate, sent with every reconnect.
///
/// Missing parameters are treated as `Coord::ZERO` by whatever layer
/// parses the request, not by this type -- `parse_reconnect` documents
/// that default for callers that want it centralized.
pub fn parse_reconnect(timestamp_ms: Option<i64>, sequence: Option<u32>) -> Coord {
    match (timestamp_ms, sequence) {
        (Some(t), Some(s)) => Coord::new(t, s),
        _ => Coord::ZERO,
    }
}
