//! Component B: Repository Interface (spec §4.B).
//!
//! The core never touches a database directly; persistence is an external
//! collaborator reached only through this trait.

pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Playlist, PlaylistId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepoError {
    #[error("repository backend error: {0}")]
    Backend(String),
}

impl From<RepoError> for crate::error::CoreError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Backend(m) => crate::error::CoreError::RepositoryError(m),
        }
    }
}

/// Result of [`Repository::update_playlist_nfc`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NfcUpdateOutcome {
    Ok,
    NotFound,
    /// The uid is already bound to a different playlist, named here.
    Conflict(PlaylistId),
}

#[async_trait]
pub trait Repository: Send + Sync {
    async fn find_playlist_by_id(&self, id: &PlaylistId) -> Result<Option<Playlist>, RepoError>;
    async fn find_playlist_by_nfc(&self, uid: &str) -> Result<Option<Playlist>, RepoError>;
    /// Atomic with respect to the uid-uniqueness invariant: no observer may
    /// ever see the same uid bound to two playlists. `uid = None` clears the
    /// binding.
    async fn update_playlist_nfc(
        &self,
        playlist_id: &PlaylistId,
        uid: Option<String>,
    ) -> Result<NfcUpdateOutcome, RepoError>;
}
