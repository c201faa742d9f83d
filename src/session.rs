//! The per-session delivery engine: one `Session` per (user, session id)
//! pair, owning a [`DualQueue`], its send/receive sequence clocks, and
//! its current transport [`Attachment`].

use crate::attachment::Attachment;
use crate::clock::Clock;
use crate::dual_queue::DualQueue;
use serde_json::Value;
use session_wire::Coord;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};

/// `Attachment` plus the liveness deadline callers advance via
/// [`Session::set_deadline`]. Bundled behind one lock since both are
/// read and written together by `attach_and_replay`, `flush`, and `tick`.
struct AttachmentSlot {
    attachment: Attachment,
    deadline: Instant,
}

/// One session's outbound delivery state.
///
/// Every public method is a no-op past `lock_timeout` on its guarding
/// lock rather than blocking indefinitely -- a stuck caller (a wedged
/// transport write, say) degrades the session, not the whole registry.
pub struct Session {
    clock: Arc<dyn Clock>,
    lock_timeout: Duration,
    queue: Mutex<DualQueue>,
    send_clock: Mutex<crate::clock::SequenceClock>,
    receive_clock: Mutex<crate::clock::SequenceClock>,
    attach: Mutex<AttachmentSlot>,
}

impl Session {
    pub fn new(clock: Arc<dyn Clock>, lock_timeout: Duration, max_soft_entries: usize) -> Self {
        Self {
            clock,
            lock_timeout,
            queue: Mutex::new(DualQueue::new(max_soft_entries)),
            send_clock: Mutex::new(crate::clock::SequenceClock::new()),
            receive_clock: Mutex::new(crate::clock::SequenceClock::new()),
            attach: Mutex::new(AttachmentSlot {
                attachment: Attachment::Detached,
                // A freshly created, never-attached session gets a
                // grace period of its own, so it isn't born reapable.
                deadline: Instant::now() + Duration::from_secs(60),
            }),
        }
    }

    /// Assigns the next send coordinate and appends the message to the
    /// queue, all while holding the send-sequence lock so concurrent
    /// enqueuers can never append out of coordinate order.
    pub async fn enqueue(&self, payload: Value, strong_lifetime: Duration, soft_lifetime: Duration) {
        let mut send_clock = match timeout(self.lock_timeout, self.send_clock.lock()).await {
            Ok(guard) => guard,
            Err(_) => {
                tracing::warn!("enqueue: timed out acquiring send-sequence lock, dropping message");
                return;
            }
        };
        let coord = send_clock.assign_next(self.clock.as_ref());
        let now = Instant::now();
        let message = crate::message::Message::new(payload, coord, now + strong_lifetime, now + soft_lifetime);
        self.queue.lock().await.enqueue(message);
    }

    /// Records an inbound coordinate as observed, advancing the
    /// receive-sequence clock if it's newer than the last one seen.
    pub async fn record_receive(&self, coord: Coord) {
        let mut receive_clock = match timeout(self.lock_timeout, self.receive_clock.lock()).await {
            Ok(guard) => guard,
            Err(_) => {
                tracing::warn!("record_receive: timed out acquiring receive-sequence lock");
                return;
            }
        };
        receive_clock.observe(coord);
    }

    /// Expires overdue entries, then drops every queued message at or
    /// before `coord` from both queues -- how a client's reconnect
    /// coordinate acknowledges delivery.
    ///
    /// Only expires the queue; it deliberately does not run the
    /// deadline-driven ping/timeout check in `tick` -- attaching and
    /// immediately skipping must not itself trip an unrelated,
    /// possibly long-stale deadline.
    pub async fn skip(&self, coord: Coord) {
        self.expire_queue().await;
        self.queue.lock().await.skip_up_to(coord);
    }

    async fn expire_queue(&self) {
        self.queue.lock().await.expire(Instant::now());
    }

    /// Attaches a new transport, first skipping past `last_seen`, then
    /// replaying the live soft-queue tail up to the strong head. A
    /// transport that is already inactive by the time the lock is held
    /// is never attached.
    pub async fn attach_and_replay(&self, new_attachment: Attachment, last_seen: Coord) {
        self.skip(last_seen).await;

        let mut slot = match timeout(self.lock_timeout, self.attach.lock()).await {
            Ok(guard) => guard,
            Err(_) => {
                tracing::warn!("attach_and_replay: timed out acquiring attachment lock");
                return;
            }
        };
        if !new_attachment.is_active() {
            return;
        }
        slot.attachment = new_attachment;

        let replay = self.queue.lock().await.replay_soft_before_strong_head();
        match &slot.attachment {
            Attachment::Frame(sink) => {
                for message in &replay {
                    if let Err(error) = sink.write_frame(message.to_envelope()).await {
                        tracing::warn!(%error, "attach_and_replay: frame write failed, detaching");
                        slot.attachment = Attachment::Detached;
                        return;
                    }
                }
            }
            Attachment::Batch(sink) => {
                // A batch attachment gets exactly one response for its
                // whole lifetime, so unlike the frame kind it cannot
                // rely on a follow-up flush to drain the strong queue:
                // this response carries the soft replay tail *and*
                // whatever is currently in the strong queue, in one
                // coord-ordered, non-duplicating batch.
                let drained = self.queue.lock().await.drain_strong();
                let envelopes = replay
                    .iter()
                    .chain(drained.iter())
                    .map(|m| m.to_envelope())
                    .collect();
                if let Err(error) = sink.write_response(envelopes).await {
                    tracing::warn!(%error, "attach_and_replay: batch response failed");
                }
                slot.attachment = Attachment::Detached;
            }
            Attachment::Detached => {}
        }
    }

    /// Drains and delivers every strong message to the currently
    /// attached transport. A no-op if nothing is attached. A batch
    /// attachment is always detached after its one response, win or lose.
    pub async fn flush(&self) {
        self.expire_queue().await;

        let mut slot = match timeout(self.lock_timeout, self.attach.lock()).await {
            Ok(guard) => guard,
            Err(_) => {
                tracing::warn!("flush: timed out acquiring attachment lock");
                return;
            }
        };
        if !slot.attachment.is_active() {
            return;
        }

        match &slot.attachment {
            Attachment::Frame(sink) => {
                let sink = sink.clone();
                let drained = self.queue.lock().await.drain_strong();
                for message in drained {
                    if let Err(error) = sink.write_frame(message.to_envelope()).await {
                        tracing::warn!(%error, "flush: frame write failed, detaching");
                        slot.attachment = Attachment::Detached;
                        return;
                    }
                }
            }
            Attachment::Batch(sink) => {
                let sink = sink.clone();
                let drained = self.queue.lock().await.drain_strong();
                let envelopes = drained.iter().map(|m| m.to_envelope()).collect();
                if let Err(error) = sink.write_response(envelopes).await {
                    tracing::warn!(%error, "flush: batch response failed");
                }
                slot.attachment = Attachment::Detached;
            }
            Attachment::Detached => {}
        }
    }

    /// Expires overdue queue entries, and -- if the attached transport's
    /// deadline has passed -- pings a frame attachment or closes out a
    /// batch attachment with an empty response.
    pub async fn tick(&self) {
        self.expire_queue().await;
        let now = Instant::now();

        let mut slot = match timeout(self.lock_timeout, self.attach.lock()).await {
            Ok(guard) => guard,
            Err(_) => {
                tracing::warn!("tick: timed out acquiring attachment lock");
                return;
            }
        };
        if slot.attachment.is_detached() || slot.deadline >= now {
            return;
        }

        match &slot.attachment {
            Attachment::Frame(sink) => {
                let sink = sink.clone();
                let epoch_millis = self.clock.now_millis();
                if let Err(error) = sink.write_ping(epoch_millis).await {
                    tracing::warn!(%error, "tick: ping failed, detaching");
                    slot.attachment = Attachment::Detached;
                }
            }
            Attachment::Batch(sink) => {
                let sink = sink.clone();
                if let Err(error) = sink.write_response(Vec::new()).await {
                    tracing::warn!(%error, "tick: idle batch close failed");
                }
                slot.attachment = Attachment::Detached;
            }
            Attachment::Detached => {}
        }
    }

    /// Pushes the liveness deadline `after` from now. Callers invoke
    /// this whenever they observe liveness: a new attach, an inbound
    /// message, or a successful flush.
    pub async fn set_deadline(&self, after: Duration) {
        let mut slot = match timeout(self.lock_timeout, self.attach.lock()).await {
            Ok(guard) => guard,
            Err(_) => {
                tracing::warn!("set_deadline: timed out acquiring attachment lock");
                return;
            }
        };
        slot.deadline = Instant::now() + after;
    }

    /// Whether this session has no transport attached, no queued
    /// messages, and its deadline is more than `grace` in the past --
    /// the condition `Registry::reap` removes a session under.
    pub async fn is_reapable(&self, grace: Duration) -> bool {
        let now = Instant::now();
        let detached_and_expired = {
            let slot = self.attach.lock().await;
            slot.attachment.is_detached()
                && slot.deadline <= now
                && now.checked_duration_since(slot.deadline).unwrap_or(Duration::ZERO) >= grace
        };
        detached_and_expired && self.queue.lock().await.is_empty()
    }
}
