//! Injectable transport sinks.
//!
//! The engine never opens a socket or parses an HTTP request itself --
//! callers hand it a [`FrameSink`] or [`BatchSink`] implementation that
//! wraps whatever real frame-socket or long-poll handle their glue
//! layer owns. `services/session-gateway` shows a concrete `axum`
//! implementation of both.

use crate::error::TransportError;
use futures_util::future::BoxFuture;
use session_wire::Envelope;

/// A persistent, bidirectional frame transport: one envelope per call,
/// plus an idle ping, and the attachment stays open across calls.
pub trait FrameSink: Send + Sync {
    /// Writes a single envelope as one text frame.
    fn write_frame<'a>(&'a self, envelope: Envelope) -> BoxFuture<'a, Result<(), TransportError>>;

    /// Writes a ping control frame whose payload is the decimal ASCII
    /// of `epoch_millis`.
    fn write_ping<'a>(&'a self, epoch_millis: i64) -> BoxFuture<'a, Result<(), TransportError>>;

    /// Whether the underlying channel still reports itself live.
    fn is_active(&self) -> bool;
}

/// A single-shot long-poll transport: one JSON array response per
/// attachment, after which the attachment is necessarily done.
pub trait BatchSink: Send + Sync {
    /// Writes one HTTP response whose body is the JSON array of
    /// `envelopes` (possibly empty), then considers the attachment
    /// terminated.
    fn write_response<'a>(
        &'a self,
        envelopes: Vec<Envelope>,
    ) -> BoxFuture<'a, Result<(), TransportError>>;

    /// Whether the underlying request is still live (e.g. the client
    /// hasn't already disconnected).
    fn is_active(&self) -> bool;
}
