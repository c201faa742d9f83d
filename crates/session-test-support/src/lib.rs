//! In-memory `FrameSink`/`BatchSink` fakes for exercising `Session`
//! and `Registry` without a real socket or HTTP stack.

use futures_util::future::BoxFuture;
use session_relay::{BatchSink, FrameSink, TransportError};
use session_wire::Envelope;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Records every frame and ping handed to it. `set_active(false)`
/// simulates an observed transport close; `fail_next_write` simulates
/// one write erroring out before succeeding again.
pub struct MockFrameSink {
    frames: Mutex<Vec<Envelope>>,
    pings: Mutex<Vec<i64>>,
    active: AtomicBool,
    fail_next_write: AtomicBool,
}

impl Default for MockFrameSink {
    fn default() -> Self {
        Self {
            frames: Mutex::new(Vec::new()),
            pings: Mutex::new(Vec::new()),
            active: AtomicBool::new(true),
            fail_next_write: AtomicBool::new(false),
        }
    }
}

impl MockFrameSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    pub fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    pub fn frames(&self) -> Vec<Envelope> {
        self.frames.lock().unwrap().clone()
    }

    pub fn ping_count(&self) -> usize {
        self.pings.lock().unwrap().len()
    }
}

impl FrameSink for MockFrameSink {
    fn write_frame<'a>(&'a self, envelope: Envelope) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            if self.fail_next_write.swap(false, Ordering::SeqCst) {
                return Err(TransportError::Write("mock write failure".to_owned()));
            }
            self.frames.lock().unwrap().push(envelope);
            Ok(())
        })
    }

    fn write_ping<'a>(&'a self, epoch_millis: i64) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            self.pings.lock().unwrap().push(epoch_millis);
            Ok(())
        })
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Records the single JSON-array response a `Session` hands to a
/// long-poll attachment.
#[derive(Default)]
pub struct MockBatchSink {
    responses: Mutex<Vec<Vec<Envelope>>>,
}

impl MockBatchSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn responses(&self) -> Vec<Vec<Envelope>> {
        self.responses.lock().unwrap().clone()
    }

    /// The single response, if exactly one has been recorded so far.
    pub fn single_response(&self) -> Option<Vec<Envelope>> {
        let responses = self.responses.lock().unwrap();
        match responses.as_slice() {
            [only] => Some(only.clone()),
            _ => None,
        }
    }
}

impl BatchSink for MockBatchSink {
    fn write_response<'a>(
        &'a self,
        envelopes: Vec<Envelope>,
    ) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            self.responses.lock().unwrap().push(envelopes);
            Ok(())
        })
    }

    fn is_active(&self) -> bool {
        true
    }
}
