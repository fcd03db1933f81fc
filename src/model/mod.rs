//! Core data model (spec §3).

mod event;
mod playback_state;
mod playlist;
mod session;
mod track;

pub use event::{EventData, EventEnvelope, EventType, PlayerStatus, PlaylistSummary, Room};
pub use playback_state::{PlaybackState, PlaybackStateKind};
pub use playlist::{NfcTagUid, Playlist, PlaylistId};
pub use session::{AssociationSession, SessionId, SessionState};
pub use track::{Track, TrackId};
