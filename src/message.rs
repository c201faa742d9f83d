//! The immutable outbound record a session queues for delivery.

use session_wire::{Coord, Envelope};
use tokio::time::Instant;

/// One outbound payload plus its assigned coordinate and the two
/// independent expiry instants that govern primary delivery vs.
/// best-effort replay.
///
/// Immutable after construction: nothing in [`crate::DualQueue`] or
/// [`crate::Session`] ever mutates a `Message` in place, only moves or
/// drops references to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    payload: serde_json::Value,
    coord: Coord,
    /// Instant after which this message is no longer eligible for
    /// primary delivery.
    strong_deadline: Instant,
    /// Instant after which this message is no longer eligible even
    /// for replay. Always `>= strong_deadline`.
    soft_deadline: Instant,
}

impl Message {
    pub fn new(
        payload: serde_json::Value,
        coord: Coord,
        strong_deadline: Instant,
        soft_deadline: Instant,
    ) -> Self {
        debug_assert!(
            soft_deadline >= strong_deadline,
            "soft_deadline must not precede strong_deadline"
        );
        Self {
            payload,
            coord,
            strong_deadline,
            soft_deadline,
        }
    }

    pub fn coord(&self) -> Coord {
        self.coord
    }

    pub fn strong_deadline(&self) -> Instant {
        self.strong_deadline
    }

    pub fn soft_deadline(&self) -> Instant {
        self.soft_deadline
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Renders the wire envelope for this message.
    pub fn to_envelope(&self) -> Envelope {
        Envelope {
            metadata: self.coord.into(),
            data: self.payload.clone(),
        }
    }
}
