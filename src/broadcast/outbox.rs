//! Outbox and retry/backoff delivery worker (spec §4.F).
//!
//! Every non-position event is enqueued here before transmission. A
//! delivery worker drains the queue and fans each entry out to its target
//! rooms' current subscribers, retrying on transport failure with
//! exponential backoff up to `CoreConfig::outbox_max_attempts`.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::model::EventEnvelope;

use super::Subscriptions;

pub struct OutboxEntry {
    pub envelope: EventEnvelope,
    pub target_rooms: Vec<crate::model::Room>,
    pub attempts: u32,
    pub next_attempt_at: Instant,
}

/// Bounded FIFO; on overflow the oldest entry is dropped and logged (spec
/// §5: "on overflow the oldest non-position event is dropped").
pub struct Outbox {
    queue: Mutex<VecDeque<OutboxEntry>>,
    capacity: usize,
}

impl Outbox {
    pub fn new(capacity: usize) -> Self {
        Self { queue: Mutex::new(VecDeque::new()), capacity }
    }

    pub fn push(&self, envelope: EventEnvelope, target_rooms: Vec<crate::model::Room>) {
        let mut queue = self.queue.lock().unwrap();
        if queue.len() >= self.capacity {
            let dropped = queue.pop_front();
            if let Some(dropped) = dropped {
                warn!(
                    event_id = %dropped.envelope.event_id,
                    event_type = %dropped.envelope.event_type,
                    "outbox at capacity; dropping oldest queued event"
                );
            }
        }
        queue.push_back(OutboxEntry {
            envelope,
            target_rooms,
            attempts: 0,
            next_attempt_at: Instant::now(),
        });
    }

    fn pop_ready(&self, now: Instant) -> Option<OutboxEntry> {
        let mut queue = self.queue.lock().unwrap();
        let pos = queue.iter().position(|e| e.next_attempt_at <= now)?;
        queue.remove(pos)
    }

    fn requeue(&self, entry: OutboxEntry) {
        self.queue.lock().unwrap().push_back(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().unwrap().is_empty()
    }
}

/// Drains `outbox`, delivering each ready entry to its target rooms' current
/// subscribers. Runs until `shutdown` fires; intended to be spawned as the
/// Hub's one long-lived delivery worker (spec §5).
pub async fn run_delivery_worker(
    outbox: std::sync::Arc<Outbox>,
    subscriptions: std::sync::Arc<Subscriptions>,
    max_attempts: u32,
    base_backoff: Duration,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut tick = tokio::time::interval(Duration::from_millis(20));
    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }

        while let Some(mut entry) = outbox.pop_ready(Instant::now()) {
            let delivered = subscriptions.deliver(&entry.target_rooms, &entry.envelope);
            if delivered {
                debug!(event_id = %entry.envelope.event_id, "event delivered");
                continue;
            }

            entry.attempts += 1;
            if entry.attempts >= max_attempts {
                warn!(
                    event_id = %entry.envelope.event_id,
                    event_type = %entry.envelope.event_type,
                    attempts = entry.attempts,
                    "dropping event after exhausting retry budget"
                );
                continue;
            }
            let backoff = base_backoff * 2u32.pow(entry.attempts.saturating_sub(1));
            entry.next_attempt_at = Instant::now() + backoff;
            outbox.requeue(entry);
        }
    }

    // Bounded drain on shutdown: flush whatever is left, best-effort.
    let deadline = Instant::now() + Duration::from_secs(2);
    while !outbox.is_empty() && Instant::now() < deadline {
        if let Some(entry) = outbox.pop_ready(Instant::now()) {
            subscriptions.deliver(&entry.target_rooms, &entry.envelope);
        } else {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::model::{EventData, EventType, Room};

    fn envelope(seq: u64) -> EventEnvelope {
        EventEnvelope {
            event_id: Uuid::new_v4(),
            event_type: EventType::PlayerError,
            server_seq: seq,
            playlist_seq: None,
            timestamp_ms: 0,
            playlist_id: None,
            data: EventData::PlayerError { kind: "x".into(), message: "x".into() },
            idempotency_key: None,
        }
    }

    /// Spec §8's ambient-stack coverage: pushing past capacity drops the
    /// oldest entry rather than growing unbounded or blocking the publisher.
    #[test]
    fn push_past_capacity_drops_oldest() {
        let outbox = Outbox::new(2);
        outbox.push(envelope(1), vec![Room::Player]);
        outbox.push(envelope(2), vec![Room::Player]);
        outbox.push(envelope(3), vec![Room::Player]);

        let queue = outbox.queue.lock().unwrap();
        assert_eq!(queue.len(), 2);
        let seqs: Vec<u64> = queue.iter().map(|e| e.envelope.server_seq).collect();
        assert_eq!(seqs, vec![2, 3]);
    }
}
