//! In-memory `Repository` for tests and the demonstration binary (spec
//! §4.B, §4.I). Guards the same uid-uniqueness invariant a real transactional
//! store would, under a single `Mutex` rather than a database transaction.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::model::{Playlist, PlaylistId};

use super::{NfcUpdateOutcome, RepoError, Repository};

#[derive(Default)]
pub struct MockRepository {
    playlists: Mutex<HashMap<PlaylistId, Playlist>>,
}

impl MockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_playlists(playlists: impl IntoIterator<Item = Playlist>) -> Self {
        let repo = Self::new();
        {
            let mut guard = repo.playlists.lock().unwrap();
            for playlist in playlists {
                guard.insert(playlist.id.clone(), playlist);
            }
        }
        repo
    }

    pub fn insert(&self, playlist: Playlist) {
        self.playlists.lock().unwrap().insert(playlist.id.clone(), playlist);
    }
}

#[async_trait]
impl Repository for MockRepository {
    async fn find_playlist_by_id(&self, id: &PlaylistId) -> Result<Option<Playlist>, RepoError> {
        Ok(self.playlists.lock().unwrap().get(id).cloned())
    }

    async fn find_playlist_by_nfc(&self, uid: &str) -> Result<Option<Playlist>, RepoError> {
        Ok(self
            .playlists
            .lock()
            .unwrap()
            .values()
            .find(|p| p.nfc_tag_uid.as_ref().is_some_and(|u| u.0 == uid))
            .cloned())
    }

    async fn update_playlist_nfc(
        &self,
        playlist_id: &PlaylistId,
        uid: Option<String>,
    ) -> Result<NfcUpdateOutcome, RepoError> {
        let mut guard = self.playlists.lock().unwrap();

        if !guard.contains_key(playlist_id) {
            return Ok(NfcUpdateOutcome::NotFound);
        }

        if let Some(ref uid) = uid {
            if let Some(holder) = guard
                .values()
                .find(|p| p.id != *playlist_id && p.nfc_tag_uid.as_ref().is_some_and(|u| &u.0 == uid))
            {
                return Ok(NfcUpdateOutcome::Conflict(holder.id.clone()));
            }
        }

        let playlist = guard.get_mut(playlist_id).expect("checked above");
        playlist.nfc_tag_uid = uid.map(crate::model::NfcTagUid);
        Ok(NfcUpdateOutcome::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Track;

    fn playlist(id: &str) -> Playlist {
        Playlist::new(id, "Mix", vec![Track::new("t1", 1, "Track 1", "a.mp3", None)])
    }

    #[tokio::test]
    async fn binds_uid_to_playlist() {
        let repo = MockRepository::with_playlists([playlist("p1")]);
        let outcome = repo
            .update_playlist_nfc(&PlaylistId("p1".into()), Some("04a1b2c3".into()))
            .await
            .unwrap();
        assert_eq!(outcome, NfcUpdateOutcome::Ok);

        let found = repo.find_playlist_by_nfc("04a1b2c3").await.unwrap();
        assert_eq!(found.unwrap().id, PlaylistId("p1".into()));
    }

    #[tokio::test]
    async fn rejects_uid_already_bound_elsewhere() {
        let repo = MockRepository::with_playlists([playlist("p1"), playlist("p2")]);
        repo.update_playlist_nfc(&PlaylistId("p1".into()), Some("04a1b2c3".into()))
            .await
            .unwrap();

        let outcome = repo
            .update_playlist_nfc(&PlaylistId("p2".into()), Some("04a1b2c3".into()))
            .await
            .unwrap();
        assert_eq!(outcome, NfcUpdateOutcome::Conflict(PlaylistId("p1".into())));
    }

    #[tokio::test]
    async fn unknown_playlist_is_not_found() {
        let repo = MockRepository::new();
        let outcome = repo
            .update_playlist_nfc(&PlaylistId("ghost".into()), Some("04a1b2c3".into()))
            .await
            .unwrap();
        assert_eq!(outcome, NfcUpdateOutcome::NotFound);
    }
}
