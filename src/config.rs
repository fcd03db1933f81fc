//! Process-wide tunables (spec §3 "Configuration (ambient)", §9 Open Questions).
//!
//! Constructed once at process start and shared by reference (behind an
//! `Arc`) with every component. Loading these values from a file or the
//! environment is the external bootstrap's job; the core only ever consumes
//! an already-built `CoreConfig`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Capacity of the coordinator's command queue.
    pub command_queue_capacity: usize,
    /// Capacity of the non-blocking publish queue from coordinator into the
    /// broadcast hub (spec §5: "bounded queue; on overflow the oldest
    /// non-position event is dropped").
    pub event_queue_capacity: usize,
    /// Position ticker period. Spec requires 5-20 Hz; default is the lower
    /// (slower) bound, 10 Hz.
    pub position_tick_interval: Duration,
    /// Minimum gap between two `position_changed` events for the same
    /// playback session, absent a state transition or integer-second change.
    pub position_emit_threshold: Duration,
    /// How often the NFC sweeper checks for expired `Listening` sessions.
    pub nfc_sweep_interval: Duration,
    /// Idempotency cache entry lifetime.
    pub idempotency_ttl: Duration,
    /// Max idempotency cache entries retained (oldest evicted first).
    pub idempotency_cache_capacity: usize,
    /// Max outbox delivery attempts before an entry is dropped and logged.
    pub outbox_max_attempts: u32,
    /// Base delay for the outbox's exponential backoff.
    pub outbox_base_backoff: Duration,
    /// Deadline applied to commands that don't specify their own.
    pub default_command_timeout: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            command_queue_capacity: 256,
            event_queue_capacity: 1024,
            position_tick_interval: Duration::from_millis(100),
            position_emit_threshold: Duration::from_millis(500),
            nfc_sweep_interval: Duration::from_secs(2),
            idempotency_ttl: Duration::from_secs(10 * 60),
            idempotency_cache_capacity: 4096,
            outbox_max_attempts: 5,
            outbox_base_backoff: Duration::from_millis(100),
            default_command_timeout: Duration::from_secs(5),
        }
    }
}
