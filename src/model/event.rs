use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::error::CoreError;

use super::{PlaybackState, PlaylistId, SessionId, Track};

/// Named channel a client subscribes to. Spec §3 "Subscription" /
/// §4.F "Rooms and subscriptions".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Room {
    Playlists,
    Playlist(PlaylistId),
    Player,
    Nfc,
}

impl Room {
    /// Stable string form, e.g. for log fields or a wire representation
    /// (`"playlist:<id>"`), matching the naming in spec §3.
    pub fn name(&self) -> String {
        match self {
            Room::Playlists => "playlists".to_string(),
            Room::Playlist(id) => format!("playlist:{}", id.0),
            Room::Player => "player".to_string(),
            Room::Nfc => "nfc".to_string(),
        }
    }
}

/// The discriminant carried as `event_type` on every envelope. Separate from
/// `EventData` so that logging/metrics can match on it without destructuring
/// the payload (the teacher's `SubSystem` enum plays this exact role for
/// mpd's idle notifications).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    StatePlaylists,
    StatePlaylist,
    StatePlayer,
    PlayerStateChanged,
    TrackChanged,
    VolumeChanged,
    PositionChanged,
    PlaylistStarted,
    PlaylistEnded,
    NfcAssociated,
    NfcDuplicate,
    NfcTimeout,
    NfcCancelled,
    NfcError,
    PlayerError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "data", rename_all = "snake_case")]
pub enum EventData {
    StatePlaylists { playlists: Vec<PlaylistSummary> },
    StatePlaylist { playlist: Option<PlaylistSummary> },
    StatePlayer { status: PlayerStatus },
    PlayerStateChanged { status: PlayerStatus },
    TrackChanged { playlist_id: PlaylistId, track: Track, track_index: usize },
    VolumeChanged { volume: u8 },
    PositionChanged { playlist_id: PlaylistId, track_index: usize, position_ms: u64 },
    PlaylistStarted { playlist_id: PlaylistId },
    PlaylistEnded { playlist_id: PlaylistId },
    NfcAssociated { session_id: SessionId, playlist_id: PlaylistId, uid: String },
    NfcDuplicate { session_id: SessionId, playlist_id: PlaylistId, conflict_playlist_id: PlaylistId },
    NfcTimeout { session_id: SessionId, playlist_id: PlaylistId },
    NfcCancelled { session_id: SessionId, playlist_id: PlaylistId },
    NfcError { session_id: SessionId, playlist_id: PlaylistId, kind: String, message: String },
    PlayerError { kind: String, message: String },
}

impl EventData {
    pub fn event_type(&self) -> EventType {
        match self {
            EventData::StatePlaylists { .. } => EventType::StatePlaylists,
            EventData::StatePlaylist { .. } => EventType::StatePlaylist,
            EventData::StatePlayer { .. } => EventType::StatePlayer,
            EventData::PlayerStateChanged { .. } => EventType::PlayerStateChanged,
            EventData::TrackChanged { .. } => EventType::TrackChanged,
            EventData::VolumeChanged { .. } => EventType::VolumeChanged,
            EventData::PositionChanged { .. } => EventType::PositionChanged,
            EventData::PlaylistStarted { .. } => EventType::PlaylistStarted,
            EventData::PlaylistEnded { .. } => EventType::PlaylistEnded,
            EventData::NfcAssociated { .. } => EventType::NfcAssociated,
            EventData::NfcDuplicate { .. } => EventType::NfcDuplicate,
            EventData::NfcTimeout { .. } => EventType::NfcTimeout,
            EventData::NfcCancelled { .. } => EventType::NfcCancelled,
            EventData::NfcError { .. } => EventType::NfcError,
            EventData::PlayerError { .. } => EventType::PlayerError,
        }
    }

    /// The rooms this event should be fanned out to. Snapshot variants are
    /// constructed directly by the hub for one room at subscribe time and
    /// don't go through this (they never enter the outbox as a "broadcast
    /// to many"), but sharing the mapping keeps single source of truth.
    pub fn target_rooms(&self, playlist_id: Option<&PlaylistId>) -> Vec<Room> {
        match self {
            EventData::StatePlaylists { .. } => vec![Room::Playlists],
            EventData::StatePlaylist { .. } => playlist_id
                .map(|id| vec![Room::Playlist(id.clone())])
                .unwrap_or_default(),
            EventData::StatePlayer { .. } | EventData::PlayerStateChanged { .. }
            | EventData::TrackChanged { .. } | EventData::VolumeChanged { .. }
            | EventData::PositionChanged { .. } | EventData::PlaylistStarted { .. }
            | EventData::PlaylistEnded { .. } | EventData::PlayerError { .. } => vec![Room::Player],
            EventData::NfcAssociated { .. } | EventData::NfcDuplicate { .. }
            | EventData::NfcTimeout { .. } | EventData::NfcCancelled { .. }
            | EventData::NfcError { .. } => vec![Room::Nfc],
        }
    }
}

/// Spec §3 "Event envelope".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub server_seq: u64,
    pub playlist_seq: Option<u64>,
    pub timestamp_ms: u64,
    pub playlist_id: Option<PlaylistId>,
    pub data: EventData,
    pub idempotency_key: Option<String>,
}

/// Minimal playlist projection used in index/detail snapshots, so the event
/// stream doesn't have to carry every track's full byte-for-byte `Track`
/// for the `playlists` room (only the `playlist:<id>` room needs tracks).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub id: PlaylistId,
    pub title: String,
    pub nfc_tag_uid: Option<String>,
    pub track_count: usize,
    pub tracks: Option<Vec<Track>>,
}

/// Returned by `get_status` and carried in player-room events/snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerStatus {
    pub state: PlaybackState,
    pub volume: u8,
}

impl From<&CoreError> for EventData {
    fn from(err: &CoreError) -> Self {
        EventData::PlayerError {
            kind: err.kind().to_string(),
            message: err.message(),
        }
    }
}
