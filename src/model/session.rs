use jiff::{Span, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PlaylistId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Listening,
    Success,
    Duplicate,
    Timeout,
    Cancelled,
    Error,
}

impl SessionState {
    pub fn is_listening(&self) -> bool {
        matches!(self, SessionState::Listening)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_listening()
    }
}

/// A time-bounded operation that binds a tag UID to a playlist on the next
/// detected scan (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationSession {
    pub session_id: SessionId,
    pub playlist_id: PlaylistId,
    pub state: SessionState,
    pub started_at: Timestamp,
    pub timeout_seconds: u64,
    pub detected_tag_uid: Option<String>,
    pub conflict_playlist_id: Option<PlaylistId>,
    pub error_message: Option<String>,
}

impl AssociationSession {
    pub fn new(playlist_id: PlaylistId, timeout_seconds: u64, started_at: Timestamp) -> Self {
        Self {
            session_id: SessionId::new(),
            playlist_id,
            state: SessionState::Listening,
            started_at,
            timeout_seconds,
            detected_tag_uid: None,
            conflict_playlist_id: None,
            error_message: None,
        }
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        let deadline = self.started_at + Span::new().seconds(self.timeout_seconds as i64);
        self.state.is_listening() && deadline < now
    }
}
