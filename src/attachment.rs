//! The current association between a [`crate::Session`] and a transport.

use crate::transport::{BatchSink, FrameSink};
use std::sync::Arc;

/// Tagged transport attachment state.
///
/// | state | transition trigger | next state |
/// |---|---|---|
/// | `Detached` | `attach_and_replay(Frame, ..)` | `Frame` |
/// | `Detached` | `attach_and_replay(Batch, ..)` | `Batch` (then immediately `Detached` once the one response is sent) |
/// | `Frame` | `flush` emits messages | `Frame` |
/// | `Frame` | `tick` past deadline | `Frame` (ping sent) |
/// | `Frame` | transport close observed | `Detached` |
/// | `Batch` | `tick` past deadline | `Detached` (empty batch sent) |
#[derive(Clone)]
pub enum Attachment {
    Detached,
    Frame(Arc<dyn FrameSink>),
    Batch(Arc<dyn BatchSink>),
}

impl Attachment {
    pub fn is_detached(&self) -> bool {
        matches!(self, Attachment::Detached)
    }

    /// Whether the underlying channel still reports itself live.
    /// A `Detached` attachment is vacuously inactive.
    pub fn is_active(&self) -> bool {
        match self {
            Attachment::Detached => false,
            Attachment::Frame(sink) => sink.is_active(),
            Attachment::Batch(sink) => sink.is_active(),
        }
    }
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Attachment::Detached => write!(f, "Attachment::Detached"),
            Attachment::Frame(_) => write!(f, "Attachment::Frame(..)"),
            Attachment::Batch(_) => write!(f, "Attachment::Batch(..)"),
        }
    }
}
