use serde::{Deserialize, Serialize};
use strum::Display;

use super::PlaylistId;

/// Sum type for playback: `Stopped`, `Playing`, `Paused`. Transitions are
/// produced exclusively by the Playback Coordinator (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlaybackState {
    Stopped,
    Playing {
        playlist_id: PlaylistId,
        /// zero-based index into the playlist
        track_index: usize,
        position_ms: u64,
    },
    Paused {
        playlist_id: PlaylistId,
        track_index: usize,
        position_ms: u64,
    },
}

impl Default for PlaybackState {
    fn default() -> Self {
        PlaybackState::Stopped
    }
}

/// `strum::Display` kind tag, independent of the payload, used for log
/// fields and the `player_state_changed` event's `kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStateKind {
    Stopped,
    Playing,
    Paused,
}

impl PlaybackState {
    pub fn kind(&self) -> PlaybackStateKind {
        match self {
            PlaybackState::Stopped => PlaybackStateKind::Stopped,
            PlaybackState::Playing { .. } => PlaybackStateKind::Playing,
            PlaybackState::Paused { .. } => PlaybackStateKind::Paused,
        }
    }

    pub fn playlist_id(&self) -> Option<&PlaylistId> {
        match self {
            PlaybackState::Stopped => None,
            PlaybackState::Playing { playlist_id, .. } | PlaybackState::Paused { playlist_id, .. } => {
                Some(playlist_id)
            }
        }
    }

    pub fn track_index(&self) -> Option<usize> {
        match self {
            PlaybackState::Stopped => None,
            PlaybackState::Playing { track_index, .. } | PlaybackState::Paused { track_index, .. } => {
                Some(*track_index)
            }
        }
    }

    pub fn position_ms(&self) -> Option<u64> {
        match self {
            PlaybackState::Stopped => None,
            PlaybackState::Playing { position_ms, .. } | PlaybackState::Paused { position_ms, .. } => {
                Some(*position_ms)
            }
        }
    }
}
