//! Component F: Broadcast Hub (spec §4.F).
//!
//! Generalizes the teacher's `system.rs` idle-notification map
//! (`idlers: HashMap<SubSystem, Vec<Sender<SubSystem>>>`) from a fixed set
//! of MPD subsystems to named [`crate::model::Room`]s carrying full
//! [`EventEnvelope`]s, with global and per-playlist sequence counters, an
//! idempotency cache, and an outbox with retry.

pub mod idempotency;
pub mod outbox;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::model::{EventData, EventEnvelope, EventType, PlayerStatus, PlaylistId, PlaylistSummary, Room};

use idempotency::{CachedResult, IdempotencyCache};
use outbox::Outbox;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(pub String);

/// Supplies the full-state payload for a room's snapshot-on-subscribe event
/// (spec §4.F). Implemented by whatever owns playlist/playback state — in
/// this crate, [`crate::core::Core`] hands in a thin adapter over the
/// repository and the coordinator after both are constructed.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn snapshot_playlists(&self) -> Result<Vec<PlaylistSummary>, CoreError>;
    async fn snapshot_playlist(&self, id: &PlaylistId) -> Result<Option<PlaylistSummary>, CoreError>;
    async fn snapshot_player(&self) -> Result<PlayerStatus, CoreError>;
}

/// Subscription map, kept separate from [`BroadcastHub`] so the delivery
/// worker can hold an `Arc` to it without holding the whole hub.
#[derive(Default)]
pub struct Subscriptions {
    by_room: Mutex<HashMap<Room, HashMap<ClientId, mpsc::Sender<EventEnvelope>>>>,
}

impl Subscriptions {
    /// Registers `client_id` for `room` and sends `snapshot` to it in the
    /// same critical section, so no concurrent `deliver` (position events,
    /// outbox drains) can reach the new channel first (spec §4.F/§8: the
    /// snapshot must be the first event a subscriber observes).
    fn add_and_send_snapshot(
        &self,
        room: Room,
        client_id: ClientId,
        tx: mpsc::Sender<EventEnvelope>,
        snapshot: EventEnvelope,
    ) {
        let mut by_room = self.by_room.lock().unwrap();
        let _ = tx.try_send(snapshot);
        by_room.entry(room).or_default().insert(client_id, tx);
    }

    fn remove(&self, room: &Room, client_id: &ClientId) {
        if let Some(clients) = self.by_room.lock().unwrap().get_mut(room) {
            clients.remove(client_id);
        }
    }

    fn remove_client_everywhere(&self, client_id: &ClientId) {
        for clients in self.by_room.lock().unwrap().values_mut() {
            clients.remove(client_id);
        }
    }

    /// Fans `envelope` out to every current subscriber of any room in
    /// `target_rooms`. Returns `true` if every send succeeded (or there were
    /// no subscribers), `false` if at least one subscriber's channel was
    /// full or closed, signalling the outbox should retry.
    fn deliver(&self, target_rooms: &[Room], envelope: &EventEnvelope) -> bool {
        let by_room = self.by_room.lock().unwrap();
        let mut all_ok = true;
        for room in target_rooms {
            let Some(clients) = by_room.get(room) else { continue };
            for tx in clients.values() {
                if tx.try_send(envelope.clone()).is_err() {
                    all_ok = false;
                }
            }
        }
        all_ok
    }
}

pub struct BroadcastHub {
    config: Arc<CoreConfig>,
    server_seq: AtomicU64,
    playlist_seq: Mutex<HashMap<PlaylistId, u64>>,
    subscriptions: Arc<Subscriptions>,
    outbox: Arc<Outbox>,
    idempotency: IdempotencyCache,
    snapshot_source: Mutex<Option<Arc<dyn SnapshotSource>>>,
    shutdown_tx: tokio::sync::watch::Sender<bool>,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
}

impl BroadcastHub {
    pub fn new(config: Arc<CoreConfig>) -> Self {
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        let idempotency =
            IdempotencyCache::new(config.idempotency_ttl, config.idempotency_cache_capacity);
        Self {
            outbox: Arc::new(Outbox::new(config.event_queue_capacity)),
            server_seq: AtomicU64::new(0),
            playlist_seq: Mutex::new(HashMap::new()),
            subscriptions: Arc::new(Subscriptions::default()),
            idempotency,
            snapshot_source: Mutex::new(None),
            shutdown_tx,
            shutdown_rx,
            config,
        }
    }

    /// Wired in once, after the snapshot source (typically the coordinator)
    /// has been constructed. See the Hub/Coordinator acyclic-wiring note in
    /// `core.rs`.
    pub fn set_snapshot_source(&self, source: Arc<dyn SnapshotSource>) {
        *self.snapshot_source.lock().unwrap() = Some(source);
    }

    /// Spawns the outbox delivery worker. Part of `Core::start()`'s one-shot
    /// startup sequence (spec §6 "Process lifecycle").
    pub fn spawn_delivery_worker(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let outbox = Arc::clone(&self.outbox);
        let subscriptions = Arc::clone(&self.subscriptions);
        let max_attempts = self.config.outbox_max_attempts;
        let base_backoff = self.config.outbox_base_backoff;
        let shutdown_rx = self.shutdown_rx.clone();
        tokio::spawn(outbox::run_delivery_worker(
            outbox,
            subscriptions,
            max_attempts,
            base_backoff,
            shutdown_rx,
        ))
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn idempotency(&self) -> &IdempotencyCache {
        &self.idempotency
    }

    pub fn idempotency_get(&self, key: &str) -> Option<CachedResult> {
        self.idempotency.get(key)
    }

    pub fn idempotency_insert(&self, key: String, result: CachedResult) {
        self.idempotency.insert(key, result);
    }

    fn next_server_seq(&self) -> u64 {
        self.server_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn next_playlist_seq(&self, playlist_id: &PlaylistId) -> u64 {
        let mut map = self.playlist_seq.lock().unwrap();
        let seq = map.entry(playlist_id.clone()).or_insert(0);
        *seq += 1;
        *seq
    }

    fn now_ms() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
    }

    /// Assigns sequence numbers, builds the envelope, and routes it either
    /// straight to current subscribers (position events, which bypass
    /// outbox retry per spec §4.F) or into the outbox for durable delivery.
    #[instrument(skip(self, data), fields(event_type = %data.event_type()))]
    pub fn publish(&self, data: EventData, playlist_id: Option<PlaylistId>) -> EventEnvelope {
        let target_rooms = data.target_rooms(playlist_id.as_ref());
        let envelope = EventEnvelope {
            event_id: Uuid::new_v4(),
            event_type: data.event_type(),
            server_seq: self.next_server_seq(),
            playlist_seq: playlist_id.as_ref().map(|id| self.next_playlist_seq(id)),
            timestamp_ms: Self::now_ms(),
            playlist_id,
            data,
            idempotency_key: None,
        };

        if envelope.event_type == EventType::PositionChanged {
            self.subscriptions.deliver(&target_rooms, &envelope);
        } else {
            self.outbox.push(envelope.clone(), target_rooms);
        }
        envelope
    }

    /// Fetches the snapshot and only then records the subscription, sending
    /// the snapshot in the same locked step (spec §4.F, §8 scenario 6: a
    /// subscriber's first event is always its snapshot, and every event
    /// after it has a higher `server_seq`). Building the snapshot before
    /// the client is registered means no `position_changed` or outbox
    /// delivery can reach this client ahead of it. If the snapshot fetch
    /// fails, an empty payload is sent and the failure is logged, but the
    /// subscription still goes through.
    #[instrument(skip(self), fields(room = %room.name()))]
    pub async fn subscribe(&self, client_id: ClientId, room: Room) -> mpsc::Receiver<EventEnvelope> {
        let (tx, rx) = mpsc::channel(self.config.event_queue_capacity.max(1));

        let snapshot_data = self.build_snapshot(&room).await;
        let envelope = EventEnvelope {
            event_id: Uuid::new_v4(),
            event_type: snapshot_data.event_type(),
            server_seq: self.server_seq.load(Ordering::SeqCst),
            playlist_seq: None,
            timestamp_ms: Self::now_ms(),
            playlist_id: match &room {
                Room::Playlist(id) => Some(id.clone()),
                _ => None,
            },
            data: snapshot_data,
            idempotency_key: None,
        };
        self.subscriptions.add_and_send_snapshot(room, client_id, tx, envelope);
        rx
    }

    pub fn unsubscribe(&self, client_id: &ClientId, room: &Room) {
        self.subscriptions.remove(room, client_id);
    }

    pub fn disconnect(&self, client_id: &ClientId) {
        self.subscriptions.remove_client_everywhere(client_id);
    }

    async fn build_snapshot(&self, room: &Room) -> EventData {
        let source = self.snapshot_source.lock().unwrap().clone();
        let Some(source) = source else {
            warn!("no snapshot source wired; sending empty snapshot");
            return Self::empty_snapshot(room);
        };

        // The `nfc` room has no dedicated snapshot payload in the event
        // model (spec §4.F only names `state:playlists`/`state:playlist`/
        // `state:player`); subscribers to it rely on incremental
        // `nfc_*` events only, so it gets the empty placeholder below.
        let result = match room {
            Room::Playlists => source.snapshot_playlists().await.map(|playlists| EventData::StatePlaylists { playlists }),
            Room::Playlist(id) => {
                source.snapshot_playlist(id).await.map(|playlist| EventData::StatePlaylist { playlist })
            }
            Room::Player => source.snapshot_player().await.map(|status| EventData::StatePlayer { status }),
            Room::Nfc => return Self::empty_snapshot(room),
        };

        result.unwrap_or_else(|err| {
            warn!(error = %err, "snapshot fetch failed; sending empty payload");
            Self::empty_snapshot(room)
        })
    }

    fn empty_snapshot(room: &Room) -> EventData {
        match room {
            Room::Playlists => EventData::StatePlaylists { playlists: Vec::new() },
            Room::Playlist(_) => EventData::StatePlaylist { playlist: None },
            Room::Player | Room::Nfc => {
                EventData::StatePlayer { status: PlayerStatus { state: Default::default(), volume: 0 } }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn server_seq_strictly_increases_across_publishes() {
        let hub = BroadcastHub::new(Arc::new(CoreConfig::default()));
        let e1 = hub.publish(EventData::PlayerError { kind: "x".into(), message: "x".into() }, None);
        let e2 = hub.publish(EventData::PlayerError { kind: "x".into(), message: "x".into() }, None);
        assert!(e2.server_seq > e1.server_seq);
    }

    #[tokio::test]
    async fn subscribe_delivers_snapshot_first() {
        let hub = BroadcastHub::new(Arc::new(CoreConfig::default()));
        let mut rx = hub.subscribe(ClientId("c1".into()), Room::Player).await;
        let first = rx.try_recv().expect("snapshot should be queued immediately");
        assert_eq!(first.event_type, EventType::StatePlayer);
    }
}
