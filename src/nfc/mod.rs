//! Component E: NFC Association Service (spec §4.E).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use jiff::Timestamp;
use tracing::{instrument, warn};

use crate::broadcast::BroadcastHub;
use crate::config::CoreConfig;
use crate::coordinator::PlaybackCoordinator;
use crate::error::{CoreError, Result};
use crate::hardware::NfcHardware;
use crate::model::{AssociationSession, EventData, PlaylistId, SessionId, SessionState};
use crate::repository::{NfcUpdateOutcome, Repository};

pub struct NfcStatus {
    pub sessions: Vec<AssociationSession>,
    pub hardware_available: bool,
}

pub struct NfcAssociationService {
    repository: Arc<dyn Repository>,
    coordinator: PlaybackCoordinator,
    hub: Arc<BroadcastHub>,
    hardware: Arc<dyn NfcHardware>,
    sessions: Mutex<HashMap<SessionId, AssociationSession>>,
}

impl NfcAssociationService {
    /// Subscribes to the hardware's `tag_detected` callback immediately,
    /// once, at construction (spec §4.E) — not per-session.
    pub fn new(
        repository: Arc<dyn Repository>,
        coordinator: PlaybackCoordinator,
        hub: Arc<BroadcastHub>,
        hardware: Arc<dyn NfcHardware>,
    ) -> Arc<Self> {
        let service = Arc::new(Self {
            repository,
            coordinator,
            hub,
            hardware: Arc::clone(&hardware),
            sessions: Mutex::new(HashMap::new()),
        });

        let wired = Arc::clone(&service);
        hardware.on_tag_detected(Box::new(move |uid| {
            let service = Arc::clone(&wired);
            tokio::spawn(async move {
                service.handle_tag_detected(uid).await;
            });
        }));

        service
    }

    #[instrument(skip(self))]
    pub async fn start_session(&self, playlist_id: PlaylistId, timeout_seconds: u64) -> Result<AssociationSession> {
        self.repository
            .find_playlist_by_id(&playlist_id)
            .await
            .map_err(CoreError::from)?
            .ok_or_else(|| CoreError::NotFound(playlist_id.0.clone()))?;

        let mut sessions = self.sessions.lock().unwrap();
        if sessions.values().any(|s| s.playlist_id == playlist_id && s.state.is_listening()) {
            return Err(CoreError::AlreadyActive(playlist_id));
        }
        let session = AssociationSession::new(playlist_id, timeout_seconds, Timestamp::now());
        sessions.insert(session.session_id, session.clone());
        Ok(session)
    }

    #[instrument(skip(self))]
    pub fn cancel_session(&self, session_id: SessionId) -> Result<()> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions.get_mut(&session_id).ok_or_else(|| CoreError::NotFound(format!("{session_id:?}")))?;
        if !session.state.is_listening() {
            return Ok(());
        }
        session.state = SessionState::Cancelled;
        let playlist_id = session.playlist_id.clone();
        drop(sessions);
        self.hub.publish(EventData::NfcCancelled { session_id, playlist_id: playlist_id.clone() }, Some(playlist_id));
        Ok(())
    }

    pub fn status(&self) -> NfcStatus {
        let sessions = self.sessions.lock().unwrap().values().cloned().collect();
        NfcStatus { sessions, hardware_available: self.hardware.is_available() }
    }

    /// Runs forever, checking for expired `Listening` sessions at
    /// `CoreConfig::nfc_sweep_interval` (spec §4.E). Intended to be spawned
    /// as the service's one long-lived sweeper task.
    pub async fn run_sweeper(self: Arc<Self>, config: Arc<CoreConfig>) {
        let mut ticker = tokio::time::interval(config.nfc_sweep_interval);
        loop {
            ticker.tick().await;
            self.sweep_expired();
        }
    }

    fn sweep_expired(&self) {
        let now = Timestamp::now();
        let expired: Vec<(SessionId, PlaylistId)> = {
            let mut sessions = self.sessions.lock().unwrap();
            let mut out = Vec::new();
            for session in sessions.values_mut() {
                if session.is_expired(now) {
                    session.state = SessionState::Timeout;
                    out.push((session.session_id, session.playlist_id.clone()));
                }
            }
            out
        };
        for (session_id, playlist_id) in expired {
            self.hub.publish(EventData::NfcTimeout { session_id, playlist_id: playlist_id.clone() }, Some(playlist_id));
        }
    }

    #[instrument(skip(self))]
    async fn handle_tag_detected(&self, uid: String) {
        let oldest_listening = {
            let sessions = self.sessions.lock().unwrap();
            sessions
                .values()
                .filter(|s| s.state.is_listening())
                .min_by_key(|s| s.started_at)
                .map(|s| (s.session_id, s.playlist_id.clone()))
        };

        let Some((session_id, playlist_id)) = oldest_listening else {
            // Step 5: no session is listening — forward to the coordinator
            // as ordinary tag-triggered playback. No association event.
            if let Err(err) = self.coordinator.play_by_nfc(uid, None).await {
                warn!(error = %err, "play_by_nfc failed for unassociated or unrecognized tag");
            }
            return;
        };

        match self.repository.update_playlist_nfc(&playlist_id, Some(uid.clone())).await {
            Ok(NfcUpdateOutcome::Ok) => {
                self.set_session_state(session_id, SessionState::Success, |s| {
                    s.detected_tag_uid = Some(uid.clone());
                });
                self.hub.publish(
                    EventData::NfcAssociated { session_id, playlist_id: playlist_id.clone(), uid },
                    Some(playlist_id),
                );
            }
            Ok(NfcUpdateOutcome::Conflict(conflict_playlist_id)) => {
                self.set_session_state(session_id, SessionState::Duplicate, |s| {
                    s.detected_tag_uid = Some(uid.clone());
                    s.conflict_playlist_id = Some(conflict_playlist_id.clone());
                });
                self.hub.publish(
                    EventData::NfcDuplicate { session_id, playlist_id: playlist_id.clone(), conflict_playlist_id },
                    Some(playlist_id),
                );
            }
            Ok(NfcUpdateOutcome::NotFound) => {
                self.fail_session(session_id, playlist_id, "not_found", "playlist no longer exists");
            }
            Err(err) => {
                let core_err = CoreError::from(err);
                self.fail_session(session_id, playlist_id, core_err.kind(), core_err.message());
            }
        }
    }

    fn set_session_state(
        &self,
        session_id: SessionId,
        state: SessionState,
        mutate: impl FnOnce(&mut AssociationSession),
    ) {
        if let Some(session) = self.sessions.lock().unwrap().get_mut(&session_id) {
            session.state = state;
            mutate(session);
        }
    }

    fn fail_session(&self, session_id: SessionId, playlist_id: PlaylistId, kind: &str, message: &str) {
        self.set_session_state(session_id, SessionState::Error, |s| {
            s.error_message = Some(message.to_string());
        });
        self.hub.publish(
            EventData::NfcError {
                session_id,
                playlist_id: playlist_id.clone(),
                kind: kind.to_string(),
                message: message.to_string(),
            },
            Some(playlist_id),
        );
    }
}
