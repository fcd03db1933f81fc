//! Component D: Playback Coordinator (spec §4.D/§5).
//!
//! Single writer to playback state and the audio backend. Generalizes the
//! teacher's `mpd_client::perform_command` match-on-`Command` dispatch, but
//! restructured into a true single-owner actor per §9's re-architecture
//! guidance: the teacher mutates a `Mutex<System>` directly from each
//! connection task, whereas here the worker owns its state outright and is
//! reached only by message, eliminating the class of "engine not running"
//! races named in §9.

pub mod commands;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;
use futures_concurrency::future::Race;
use tokio::sync::{mpsc, oneshot};
use tracing::instrument;

use crate::audio::AudioBackend;
use crate::broadcast::idempotency::CachedResult;
use crate::broadcast::{BroadcastHub, SnapshotSource};
use crate::config::CoreConfig;
use crate::error::{CoreError, Result};
use crate::model::{EventData, PlaybackState, PlayerStatus, Playlist, PlaylistId, PlaylistSummary, Track};
use crate::playlist_manager::PlaylistStateManager;
use crate::repository::Repository;

pub use commands::{Command, ControlAction};

struct Message {
    command: Command,
    idempotency_key: Option<String>,
    reply: Option<oneshot::Sender<Result<PlayerStatus>>>,
}

/// Cheap, cloneable handle to the coordinator's command queue. This is the
/// type other components (NFC service, hardware adapters, the demo binary)
/// hold; the worker state itself never leaves its owning task.
#[derive(Clone)]
pub struct PlaybackCoordinator {
    tx: mpsc::Sender<Message>,
    started: Arc<AtomicBool>,
    shutting_down: Arc<AtomicBool>,
    default_command_timeout: std::time::Duration,
}

impl PlaybackCoordinator {
    /// Constructs the coordinator and spawns its worker task, but does
    /// **not** mark it started — `start()` is the one-shot gate spec §4.D
    /// requires before any state-changing command is accepted.
    pub fn new(
        config: Arc<CoreConfig>,
        repository: Arc<dyn Repository>,
        backend: Arc<dyn AudioBackend>,
        hub: Arc<BroadcastHub>,
    ) -> (Self, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.command_queue_capacity);
        let started = Arc::new(AtomicBool::new(false));
        let shutting_down = Arc::new(AtomicBool::new(false));

        let handle = Self {
            tx: tx.clone(),
            started: Arc::clone(&started),
            shutting_down: Arc::clone(&shutting_down),
            default_command_timeout: config.default_command_timeout,
        };

        let worker = Worker {
            config,
            repository,
            backend: Arc::clone(&backend),
            hub,
            manager: PlaylistStateManager::new(),
            state: PlaybackState::Stopped,
            volume: 100,
            started,
            shutting_down,
            last_position_emit: None,
        };

        // Adapt the backend's track-ended callback into a queue send, per
        // §9's guidance that hardware callbacks are adapted immediately
        // into queue sends rather than mixed ad hoc with async code.
        let ended_tx = tx.clone();
        backend.on_track_ended(Box::new(move || {
            let _ = ended_tx.try_send(Message {
                command: Command::OnTrackEnded,
                idempotency_key: None,
                reply: None,
            });
        }));

        let join = tokio::spawn(worker.run(rx));
        (handle, join)
    }

    /// One-shot startup gate. Idempotent calls beyond the first return
    /// `CoreError::Internal` (spec §6: "calling either twice is a wiring
    /// bug").
    pub fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(CoreError::Internal("coordinator already started".into()));
        }
        Ok(())
    }

    /// Stops accepting new commands (phase 1 of the two-phase shutdown in
    /// spec §5/§6). One-shot, mirrored by `start()`.
    pub fn shutdown(&self) -> Result<()> {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return Err(CoreError::Internal("coordinator already shutting down".into()));
        }
        Ok(())
    }

    async fn send(&self, command: Command, idempotency_key: Option<String>) -> Result<PlayerStatus> {
        let gated = !matches!(command, Command::GetStatus);
        if gated && (!self.started.load(Ordering::SeqCst) || self.shutting_down.load(Ordering::SeqCst)) {
            return Err(CoreError::BackendNotStarted);
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .try_send(Message { command, idempotency_key, reply: Some(reply_tx) })
            .map_err(|_| CoreError::QueueOverflow)?;

        match tokio::time::timeout(self.default_command_timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CoreError::Internal("coordinator worker gone".into())),
            Err(_) => Err(CoreError::Timeout),
        }
    }

    #[instrument(skip(self))]
    pub async fn play(
        &self,
        playlist_id: PlaylistId,
        track_number: Option<u32>,
        idempotency_key: Option<String>,
    ) -> Result<PlayerStatus> {
        self.send(Command::Play { playlist_id, track_number }, idempotency_key).await
    }

    #[instrument(skip(self))]
    pub async fn play_by_nfc(&self, uid: String, idempotency_key: Option<String>) -> Result<PlayerStatus> {
        self.send(Command::PlayByNfc { uid }, idempotency_key).await
    }

    pub async fn control(&self, action: ControlAction, idempotency_key: Option<String>) -> Result<PlayerStatus> {
        self.send(Command::Control(action), idempotency_key).await
    }

    pub async fn seek(&self, position_ms: u64) -> Result<()> {
        self.send(Command::Seek { position_ms }, None).await.map(|_| ())
    }

    pub async fn set_volume(&self, volume: u8) -> Result<()> {
        self.send(Command::SetVolume { volume }, None).await.map(|_| ())
    }

    pub async fn get_status(&self) -> PlayerStatus {
        self.send(Command::GetStatus, None)
            .await
            .expect("get_status is never gated and never fails")
    }

    /// Called by the NFC hardware adapter (see `crate::hardware`); equivalent
    /// to the backend callback path, non-blocking.
    pub fn notify_track_ended(&self) {
        let _ = self.tx.try_send(Message { command: Command::OnTrackEnded, idempotency_key: None, reply: None });
    }
}

/// Adapts the coordinator into the Hub's snapshot source for the `player`
/// room, resolving the acyclic-wiring constraint noted in `broadcast::mod`:
/// the coordinator never holds a reference back to the hub's subscribers,
/// it only publishes into the hub and answers snapshot queries.
pub struct CoordinatorSnapshotSource {
    pub coordinator: PlaybackCoordinator,
    pub repository: Arc<dyn Repository>,
}

#[async_trait]
impl SnapshotSource for CoordinatorSnapshotSource {
    async fn snapshot_playlists(&self) -> Result<Vec<PlaylistSummary>> {
        // The repository interface (§4.B) exposes lookup by id/uid only, no
        // enumeration operation; an index snapshot is therefore always
        // empty until the repository contract grows a `list_playlists`.
        Ok(Vec::new())
    }

    async fn snapshot_playlist(&self, id: &PlaylistId) -> Result<Option<PlaylistSummary>> {
        let playlist = self.repository.find_playlist_by_id(id).await.map_err(CoreError::from)?;
        Ok(playlist.map(|p| PlaylistSummary {
            id: p.id,
            title: p.title,
            nfc_tag_uid: p.nfc_tag_uid.map(|u| u.0),
            track_count: p.tracks.len(),
            tracks: Some(p.tracks),
        }))
    }

    async fn snapshot_player(&self) -> Result<PlayerStatus> {
        Ok(self.coordinator.get_status().await)
    }
}

struct Worker {
    config: Arc<CoreConfig>,
    repository: Arc<dyn Repository>,
    backend: Arc<dyn AudioBackend>,
    hub: Arc<BroadcastHub>,
    manager: PlaylistStateManager,
    state: PlaybackState,
    volume: u8,
    started: Arc<AtomicBool>,
    shutting_down: Arc<AtomicBool>,
    last_position_emit: Option<(Instant, PlaybackState)>,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::Receiver<Message>) {
        enum Wake {
            Command(Option<Message>),
            Tick,
        }

        let mut ticker = tokio::time::interval(self.config.position_tick_interval);
        loop {
            let next_command = rx.recv().map(Wake::Command);
            let next_tick = ticker.tick().map(|_| Wake::Tick);

            match (next_command, next_tick).race().await {
                Wake::Command(Some(msg)) => self.handle(msg).await,
                Wake::Command(None) => break,
                Wake::Tick => self.tick_position().await,
            }
            if self.shutting_down.load(Ordering::SeqCst) {
                break;
            }
        }
        // Phase 2 of the cooperative shutdown (spec §5/§6): close the audio
        // backend once no further commands will be processed.
        self.backend.stop().await;
    }

    fn status(&self) -> PlayerStatus {
        PlayerStatus { state: self.state.clone(), volume: self.volume }
    }

    async fn handle(&mut self, msg: Message) {
        let Message { command, idempotency_key, reply } = msg;

        if let Some(ref key) = idempotency_key {
            if let Some(cached) = self.hub.idempotency_get(key) {
                let result = match cached {
                    CachedResult::Status(status) => Ok(status),
                    CachedResult::Error(err) => Err(err),
                };
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
                return;
            }
        }

        let result = self.execute(command).await;

        if let Some(ref key) = idempotency_key {
            let cached = match &result {
                Ok(status) => CachedResult::Status(status.clone()),
                Err(err) => CachedResult::Error(err.clone()),
            };
            self.hub.idempotency_insert(key.clone(), cached);
        }

        if let Some(reply) = reply {
            let _ = reply.send(result);
        }
    }

    async fn execute(&mut self, command: Command) -> Result<PlayerStatus> {
        match command {
            Command::GetStatus => Ok(self.status()),
            Command::Play { playlist_id, track_number } => self.do_play(playlist_id, track_number).await,
            Command::PlayByNfc { uid } => self.do_play_by_nfc(uid).await,
            Command::Control(ControlAction::Pause) => self.do_pause().await,
            Command::Control(ControlAction::Resume) => self.do_resume().await,
            Command::Control(ControlAction::Stop) => self.do_stop().await,
            Command::Control(ControlAction::Next) => self.do_advance(Advance::Next).await,
            Command::Control(ControlAction::Previous) => self.do_advance(Advance::Previous).await,
            Command::Seek { position_ms } => self.do_seek(position_ms).await,
            Command::SetVolume { volume } => self.do_set_volume(volume).await,
            Command::OnTrackEnded => self.do_advance(Advance::TrackEnded).await,
        }
    }

    async fn do_play(&mut self, playlist_id: PlaylistId, track_number: Option<u32>) -> Result<PlayerStatus> {
        let playlist = self
            .repository
            .find_playlist_by_id(&playlist_id)
            .await
            .map_err(CoreError::from)?
            .ok_or_else(|| CoreError::NotFound(playlist_id.0.clone()))?;
        self.load_and_play(playlist, track_number.unwrap_or(1)).await
    }

    async fn do_play_by_nfc(&mut self, uid: String) -> Result<PlayerStatus> {
        let playlist = self
            .repository
            .find_playlist_by_nfc(&uid)
            .await
            .map_err(CoreError::from)?
            .ok_or_else(|| CoreError::NotFound(format!("no playlist associated with nfc uid {uid}")))?;
        self.load_and_play(playlist, 1).await
    }

    async fn load_and_play(&mut self, playlist: Playlist, track_number: u32) -> Result<PlayerStatus> {
        let track = playlist.track_by_number(track_number).ok_or(CoreError::OutOfRange)?.clone();
        let index = playlist.index_of_number(track_number).expect("checked above");

        self.stop_active_if_any().await;

        if let Err(err) = self.backend.play(&track.file_path, 0).await {
            let err = CoreError::from(err);
            self.hub.publish(EventData::from(&err), None);
            return Err(err);
        }

        let playlist_id = playlist.id.clone();
        self.manager.load(playlist);
        self.manager.goto_track(track_number).ok();
        self.state = PlaybackState::Playing { playlist_id: playlist_id.clone(), track_index: index, position_ms: 0 };

        self.hub.publish(EventData::PlaylistStarted { playlist_id: playlist_id.clone() }, Some(playlist_id.clone()));
        self.hub.publish(EventData::PlayerStateChanged { status: self.status() }, Some(playlist_id.clone()));
        self.hub.publish(
            EventData::TrackChanged { playlist_id: playlist_id.clone(), track, track_index: index },
            Some(playlist_id),
        );
        Ok(self.status())
    }

    /// Cleanly stops whatever is currently loaded, emitting `playlist_ended`
    /// for it first (spec §4.D: "A `play(X)` issued while `Playing(Y)`...
    /// emits `playlist_ended` for Y followed by `playlist_started` for X").
    async fn stop_active_if_any(&mut self) {
        let Some(playlist_id) = self.state.playlist_id().cloned() else { return };
        self.backend.stop().await;
        self.manager.clear();
        self.state = PlaybackState::Stopped;
        self.hub.publish(EventData::PlaylistEnded { playlist_id: playlist_id.clone() }, Some(playlist_id));
    }

    async fn do_pause(&mut self) -> Result<PlayerStatus> {
        let PlaybackState::Playing { playlist_id, track_index, position_ms } = self.state.clone() else {
            return Ok(self.status());
        };
        if let Err(err) = self.backend.pause().await {
            let err = CoreError::from(err);
            self.hub.publish(EventData::from(&err), Some(playlist_id));
            return Err(err);
        }
        self.state = PlaybackState::Paused { playlist_id, track_index, position_ms };
        self.hub.publish(EventData::PlayerStateChanged { status: self.status() }, self.state.playlist_id().cloned());
        Ok(self.status())
    }

    async fn do_resume(&mut self) -> Result<PlayerStatus> {
        let PlaybackState::Paused { playlist_id, track_index, position_ms } = self.state.clone() else {
            return Ok(self.status());
        };
        if let Err(err) = self.backend.resume().await {
            let err = CoreError::from(err);
            self.hub.publish(EventData::from(&err), Some(playlist_id));
            return Err(err);
        }
        self.state = PlaybackState::Playing { playlist_id, track_index, position_ms };
        self.hub.publish(EventData::PlayerStateChanged { status: self.status() }, self.state.playlist_id().cloned());
        Ok(self.status())
    }

    async fn do_stop(&mut self) -> Result<PlayerStatus> {
        if matches!(self.state, PlaybackState::Stopped) {
            return Ok(self.status());
        }
        self.stop_active_if_any().await;
        self.hub.publish(EventData::PlayerStateChanged { status: self.status() }, None);
        Ok(self.status())
    }

    async fn do_advance(&mut self, trigger: Advance) -> Result<PlayerStatus> {
        if matches!(self.state, PlaybackState::Stopped) {
            return Ok(self.status());
        }
        let playlist_id = self.state.playlist_id().cloned().expect("checked non-Stopped above");

        let next_track: Option<Track> = match trigger {
            Advance::Next | Advance::TrackEnded => self.manager.next().cloned(),
            Advance::Previous => self.manager.previous().cloned(),
        };

        match next_track {
            Some(track) => {
                if let Err(err) = self.backend.play(&track.file_path, 0).await {
                    let err = CoreError::from(err);
                    self.hub.publish(EventData::from(&err), Some(playlist_id));
                    return Err(err);
                }
                let (_, _, index) = self.manager.current().expect("just advanced");
                self.state = PlaybackState::Playing { playlist_id: playlist_id.clone(), track_index: index, position_ms: 0 };
                self.hub.publish(
                    EventData::TrackChanged { playlist_id: playlist_id.clone(), track, track_index: index },
                    Some(playlist_id),
                );
                Ok(self.status())
            }
            None => {
                self.backend.stop().await;
                self.manager.clear();
                self.state = PlaybackState::Stopped;
                self.hub.publish(EventData::PlaylistEnded { playlist_id: playlist_id.clone() }, Some(playlist_id.clone()));
                self.hub.publish(EventData::PlayerStateChanged { status: self.status() }, Some(playlist_id));
                Ok(self.status())
            }
        }
    }

    async fn do_seek(&mut self, position_ms: u64) -> Result<PlayerStatus> {
        if matches!(self.state, PlaybackState::Stopped) {
            return Err(CoreError::OutOfRange);
        }
        if let Err(err) = self.backend.seek(position_ms).await {
            let err = CoreError::from(err);
            self.hub.publish(EventData::from(&err), self.state.playlist_id().cloned());
            return Err(err);
        }
        self.state = match self.state.clone() {
            PlaybackState::Playing { playlist_id, track_index, .. } => {
                PlaybackState::Playing { playlist_id, track_index, position_ms }
            }
            PlaybackState::Paused { playlist_id, track_index, .. } => {
                PlaybackState::Paused { playlist_id, track_index, position_ms }
            }
            PlaybackState::Stopped => unreachable!(),
        };
        self.hub.publish(
            EventData::PositionChanged {
                playlist_id: self.state.playlist_id().cloned().expect("non-stopped"),
                track_index: self.state.track_index().expect("non-stopped"),
                position_ms,
            },
            self.state.playlist_id().cloned(),
        );
        Ok(self.status())
    }

    async fn do_set_volume(&mut self, volume: u8) -> Result<PlayerStatus> {
        let volume = volume.min(100);
        if let Err(err) = self.backend.set_volume(volume).await {
            let err = CoreError::from(err);
            self.hub.publish(EventData::from(&err), self.state.playlist_id().cloned());
            return Err(err);
        }
        self.volume = volume;
        self.hub.publish(EventData::VolumeChanged { volume }, self.state.playlist_id().cloned());
        Ok(self.status())
    }

    async fn tick_position(&mut self) {
        let PlaybackState::Playing { playlist_id, track_index, .. } = self.state.clone() else { return };
        let Some(position_ms) = self.backend.get_position().await else { return };

        self.state = PlaybackState::Playing { playlist_id: playlist_id.clone(), track_index, position_ms };

        let should_emit = match &self.last_position_emit {
            None => true,
            Some((last_at, last_state)) => {
                last_at.elapsed() >= self.config.position_emit_threshold
                    || last_state.kind() != self.state.kind()
                    || crossed_integer_second(last_state.position_ms(), Some(position_ms))
            }
        };
        if !should_emit {
            return;
        }
        self.last_position_emit = Some((Instant::now(), self.state.clone()));
        self.hub.publish(
            EventData::PositionChanged { playlist_id: playlist_id.clone(), track_index, position_ms },
            Some(playlist_id),
        );
    }
}

enum Advance {
    Next,
    Previous,
    TrackEnded,
}

fn crossed_integer_second(prev: Option<u64>, next: Option<u64>) -> bool {
    match (prev, next) {
        (Some(p), Some(n)) => p / 1000 != n / 1000,
        _ => true,
    }
}
