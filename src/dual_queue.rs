//! The strong/soft message retention pair backing one [`crate::Session`].

use crate::message::Message;
use session_wire::Coord;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::time::Instant;

/// A soft-queue slot. `message` resolves to the retained [`Message`]
/// while memory allows; `coord` survives reclamation so ordering and
/// the replay stop-rule still work once the referent is gone.
///
/// Real soft/weak references aren't a primitive Rust exposes the way
/// a managed runtime does, so this crate implements the same contract
/// with a size-capped ring sharing storage with the strong queue via
/// `Arc`: the entry vanishes (becomes `None`) once the soft queue is
/// over capacity, independent of either deadline.
#[derive(Debug, Clone)]
struct SoftHolder {
    coord: Coord,
    message: Option<Arc<Message>>,
}

/// A pair of FIFO queues over the same outbound message stream: a
/// *strong* queue of not-yet-delivered messages, and a *soft* queue of
/// recently enqueued messages eligible for best-effort replay.
#[derive(Debug)]
pub struct DualQueue {
    strong: VecDeque<Arc<Message>>,
    soft: VecDeque<SoftHolder>,
    /// Upper bound on the number of live (`Some`) soft holders. Once
    /// exceeded, the oldest live holder is reclaimed first.
    max_soft_entries: usize,
    live_soft_count: usize,
}

impl DualQueue {
    pub fn new(max_soft_entries: usize) -> Self {
        Self {
            strong: VecDeque::new(),
            soft: VecDeque::new(),
            max_soft_entries,
            live_soft_count: 0,
        }
    }

    /// Appends `message` to the strong queue, and a live holder for it
    /// to the soft queue, reclaiming the oldest live soft holder first
    /// if the soft queue is now over capacity.
    pub fn enqueue(&mut self, message: Message) {
        let message = Arc::new(message);
        self.strong.push_back(message.clone());
        self.soft.push_back(SoftHolder {
            coord: message.coord(),
            message: Some(message),
        });
        self.live_soft_count += 1;
        self.reclaim_over_capacity();
    }

    fn reclaim_over_capacity(&mut self) {
        while self.live_soft_count > self.max_soft_entries {
            let Some(slot) = self
                .soft
                .iter_mut()
                .find(|holder| holder.message.is_some())
            else {
                break;
            };
            slot.message = None;
            self.live_soft_count -= 1;
        }
    }

    /// Drops expired entries: strong messages past `strong_deadline`,
    /// and soft holders that are either already reclaimed or past
    /// `soft_deadline`.
    pub fn expire(&mut self, now: Instant) {
        self.strong.retain(|m| m.strong_deadline() >= now);
        let mut reclaimed = 0usize;
        self.soft.retain(|holder| match &holder.message {
            Some(m) if m.soft_deadline() >= now => true,
            Some(_) => {
                reclaimed += 1;
                false
            }
            None => false,
        });
        self.live_soft_count -= reclaimed;
    }

    /// Drops everything with `coord <= given` from both queues. This
    /// is how a client's reconnect coordinate acknowledges delivery.
    pub fn skip_up_to(&mut self, given: Coord) {
        self.strong.retain(|m| m.coord() > given);
        let mut reclaimed = 0usize;
        self.soft.retain(|holder| match &holder.message {
            Some(m) if m.coord() > given => true,
            Some(_) => {
                reclaimed += 1;
                false
            }
            None => false,
        });
        self.live_soft_count -= reclaimed;
    }

    /// Removes and returns every strong message, in enqueue (coord) order.
    pub fn drain_strong(&mut self) -> Vec<Arc<Message>> {
        self.strong.drain(..).collect()
    }

    /// The coordinate of the strong queue's head, if any -- the replay
    /// stop-rule boundary.
    pub fn strong_head_coord(&self) -> Option<Coord> {
        self.strong.front().map(|m| m.coord())
    }

    /// Live soft messages from the head, stopping at (not including)
    /// the first holder whose referent is the strong queue's head.
    /// Does not mutate either queue.
    ///
    /// Once replay reaches the strong head, the messages from there on
    /// will be delivered primarily by the following `flush`, so replay
    /// must not duplicate them.
    pub fn replay_soft_before_strong_head(&self) -> Vec<Arc<Message>> {
        let stop_at = self.strong_head_coord();
        let mut out = Vec::new();
        for holder in &self.soft {
            if Some(holder.coord) == stop_at {
                break;
            }
            if let Some(m) = &holder.message {
                out.push(m.clone());
            }
        }
        out
    }

    /// Whether both queues are empty -- one of the conditions the
    /// `Registry` reaper checks before removing a session.
    pub fn is_empty(&self) -> bool {
        self.strong.is_empty() && self.soft.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn strong_len(&self) -> usize {
        self.strong.len()
    }

    #[cfg(test)]
    pub(crate) fn soft_len(&self) -> usize {
        self.soft.len()
    }

    #[cfg(test)]
    pub(crate) fn live_soft_coords(&self) -> Vec<Coord> {
        self.soft
            .iter()
            .filter_map(|h| h.message.as_ref().map(|_| h.coord))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn msg(now: Instant, coord: Coord, strong_ttl: Duration, soft_ttl: Duration) -> Message {
        Message::new(
            serde_json::json!(format!("{}:{}", coord.timestamp_ms, coord.sequence)),
            coord,
            now + strong_ttl,
            now + soft_ttl,
        )
    }

    #[test]
    fn enqueue_keeps_strong_queue_in_coord_order() {
        let now = Instant::now();
        let mut q = DualQueue::new(100);
        q.enqueue(msg(now, Coord::new(1000, 0), Duration::from_secs(5), Duration::from_secs(5)));
        q.enqueue(msg(now, Coord::new(1000, 1), Duration::from_secs(5), Duration::from_secs(5)));
        q.enqueue(msg(now, Coord::new(1001, 0), Duration::from_secs(5), Duration::from_secs(5)));
        let drained = q.drain_strong();
        let coords: Vec<Coord> = drained.iter().map(|m| m.coord()).collect();
        assert_eq!(
            coords,
            vec![Coord::new(1000, 0), Coord::new(1000, 1), Coord::new(1001, 0)]
        );
    }

    #[test]
    fn skip_drops_both_queues_up_to_and_including_given_coord() {
        // S6 from the original spec's testable-properties section.
        let now = Instant::now();
        let mut q = DualQueue::new(100);
        q.enqueue(msg(now, Coord::new(1000, 0), Duration::from_secs(5), Duration::from_secs(5)));
        q.enqueue(msg(now, Coord::new(1000, 1), Duration::from_secs(5), Duration::from_secs(5)));
        q.enqueue(msg(now, Coord::new(1001, 0), Duration::from_secs(5), Duration::from_secs(5)));

        q.skip_up_to(Coord::new(1000, 1));

        assert_eq!(q.strong_len(), 1);
        assert_eq!(q.strong_head_coord(), Some(Coord::new(1001, 0)));
        assert_eq!(q.live_soft_coords(), vec![Coord::new(1001, 0)]);
    }

    #[test]
    fn skip_is_idempotent() {
        let now = Instant::now();
        let mut q = DualQueue::new(100);
        q.enqueue(msg(now, Coord::new(1000, 0), Duration::from_secs(5), Duration::from_secs(5)));
        q.skip_up_to(Coord::new(1000, 0));
        let after_first = (q.strong_len(), q.soft_len());
        q.skip_up_to(Coord::new(1000, 0));
        assert_eq!((q.strong_len(), q.soft_len()), after_first);
    }

    #[test]
    fn enqueue_then_skip_of_own_coord_leaves_message_absent() {
        let now = Instant::now();
        let mut q = DualQueue::new(100);
        let coord = Coord::new(1000, 0);
        q.enqueue(msg(now, coord, Duration::from_secs(5), Duration::from_secs(5)));
        q.skip_up_to(coord);
        assert_eq!(q.strong_len(), 0);
        assert!(q.live_soft_coords().is_empty());
    }

    #[test]
    fn expire_drops_strong_past_deadline_but_keeps_it_replayable_from_soft() {
        // S3 from the original spec's scenario list.
        let now = Instant::now();
        let mut q = DualQueue::new(100);
        q.enqueue(msg(now, Coord::new(1000, 0), Duration::from_millis(10), Duration::from_secs(1)));

        q.expire(now + Duration::from_millis(20));

        assert_eq!(q.strong_len(), 0, "strong entry must expire");
        assert_eq!(
            q.live_soft_coords(),
            vec![Coord::new(1000, 0)],
            "soft entry must still be live and replayable"
        );
    }

    #[test]
    fn expire_is_idempotent() {
        let now = Instant::now();
        let mut q = DualQueue::new(100);
        q.enqueue(msg(now, Coord::new(1000, 0), Duration::from_millis(10), Duration::from_millis(10)));
        let later = now + Duration::from_millis(50);
        q.expire(later);
        let after_first = (q.strong_len(), q.soft_len());
        q.expire(later);
        assert_eq!((q.strong_len(), q.soft_len()), after_first);
    }

    #[test]
    fn soft_queue_reclaims_oldest_live_entry_once_over_capacity() {
        let now = Instant::now();
        let mut q = DualQueue::new(2);
        q.enqueue(msg(now, Coord::new(1000, 0), Duration::from_secs(5), Duration::from_secs(5)));
        q.enqueue(msg(now, Coord::new(1000, 1), Duration::from_secs(5), Duration::from_secs(5)));
        q.enqueue(msg(now, Coord::new(1000, 2), Duration::from_secs(5), Duration::from_secs(5)));

        // The oldest holder is reclaimed, but the strong queue is untouched.
        assert_eq!(q.strong_len(), 3);
        assert_eq!(
            q.live_soft_coords(),
            vec![Coord::new(1000, 1), Coord::new(1000, 2)]
        );
    }

    #[test]
    fn replay_stops_at_strong_head_and_never_mutates_either_queue() {
        // S2 from the original spec's scenario list.
        let now = Instant::now();
        let mut q = DualQueue::new(100);
        q.enqueue(msg(now, Coord::new(1000, 0), Duration::from_secs(5), Duration::from_secs(5)));
        q.enqueue(msg(now, Coord::new(1000, 1), Duration::from_secs(5), Duration::from_secs(5)));
        q.enqueue(msg(now, Coord::new(1001, 0), Duration::from_secs(5), Duration::from_secs(5)));

        // Simulate: everything already delivered once, then skip up to (1000,0).
        q.skip_up_to(Coord::new(1000, 0));
        // Strong and soft are now both (1000,1) and (1001,0): the stop
        // coordinate is the soft queue's own head, so replay is empty.
        let replay = q.replay_soft_before_strong_head();
        let coords: Vec<Coord> = replay.iter().map(|m| m.coord()).collect();
        assert_eq!(coords, Vec::<Coord>::new(), "replay must stop at the strong head immediately");
        assert_eq!(q.strong_len(), 2, "replay must not mutate the strong queue");
    }

    #[test]
    fn replay_emits_full_live_soft_tail_when_strong_is_empty() {
        let now = Instant::now();
        let mut q = DualQueue::new(100);
        q.enqueue(msg(now, Coord::new(1000, 0), Duration::from_secs(5), Duration::from_secs(5)));
        q.enqueue(msg(now, Coord::new(1000, 1), Duration::from_secs(5), Duration::from_secs(5)));
        q.enqueue(msg(now, Coord::new(1001, 0), Duration::from_secs(5), Duration::from_secs(5)));
        q.drain_strong();

        let replay = q.replay_soft_before_strong_head();
        let coords: Vec<Coord> = replay.iter().map(|m| m.coord()).collect();
        assert_eq!(
            coords,
            vec![Coord::new(1000, 0), Coord::new(1000, 1), Coord::new(1001, 0)]
        );
    }
}
