//! Top-level process wiring (spec §6 "Process lifecycle (ambient)").
//!
//! `Core` replaces the source's lazy module-level singletons (per §9's
//! re-architecture guidance) with one value, constructed once, that owns
//! every long-lived task. The Hub and the Coordinator would otherwise form
//! a cycle (Coordinator publishes into the Hub; the Hub needs a snapshot
//! source that reads the Coordinator's state) — broken here by wiring the
//! snapshot source in after both exist, exactly as `set_snapshot_source`'s
//! doc comment describes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::audio::AudioBackend;
use crate::broadcast::{BroadcastHub, ClientId};
use crate::config::CoreConfig;
use crate::coordinator::{CoordinatorSnapshotSource, PlaybackCoordinator};
use crate::error::{CoreError, Result};
use crate::hardware::{wire_buttons, GpioHardware, NfcHardware};
use crate::model::{AssociationSession, EventEnvelope, PlayerStatus, PlaylistId, Room, SessionId};
use crate::nfc::{NfcAssociationService, NfcStatus};
use crate::repository::Repository;

pub use crate::coordinator::ControlAction;

pub struct Core {
    config: Arc<CoreConfig>,
    hub: Arc<BroadcastHub>,
    coordinator: PlaybackCoordinator,
    nfc: Arc<NfcAssociationService>,
    started: AtomicBool,
    shut_down: AtomicBool,
    coordinator_join: Mutex<Option<JoinHandle<()>>>,
    outbox_join: Mutex<Option<JoinHandle<()>>>,
    sweeper_join: Mutex<Option<JoinHandle<()>>>,
}

impl Core {
    pub fn new(
        config: CoreConfig,
        repository: Arc<dyn Repository>,
        backend: Arc<dyn AudioBackend>,
        nfc_hardware: Arc<dyn NfcHardware>,
        gpio_hardware: Option<Arc<dyn GpioHardware>>,
    ) -> Arc<Self> {
        let config = Arc::new(config);
        let hub = Arc::new(BroadcastHub::new(Arc::clone(&config)));

        let (coordinator, coordinator_join) =
            PlaybackCoordinator::new(Arc::clone(&config), Arc::clone(&repository), backend, Arc::clone(&hub));

        hub.set_snapshot_source(Arc::new(CoordinatorSnapshotSource {
            coordinator: coordinator.clone(),
            repository: Arc::clone(&repository),
        }));

        let nfc = NfcAssociationService::new(repository, coordinator.clone(), Arc::clone(&hub), nfc_hardware);

        if let Some(gpio) = gpio_hardware {
            wire_buttons(gpio.as_ref(), coordinator.clone());
        }

        Arc::new(Self {
            config,
            hub,
            coordinator,
            nfc,
            started: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            coordinator_join: Mutex::new(Some(coordinator_join)),
            outbox_join: Mutex::new(None),
            sweeper_join: Mutex::new(None),
        })
    }

    /// One-shot startup: starts the coordinator, the outbox delivery
    /// worker, and the NFC sweeper. Calling this twice is a wiring bug
    /// (spec §6).
    pub fn start(self: &Arc<Self>) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(CoreError::Internal("core already started".into()));
        }
        self.coordinator.start()?;

        *self.outbox_join.lock().unwrap() = Some(self.hub.spawn_delivery_worker());
        *self.sweeper_join.lock().unwrap() =
            Some(tokio::spawn(Arc::clone(&self.nfc).run_sweeper(Arc::clone(&self.config))));
        Ok(())
    }

    /// One-shot two-phase cooperative shutdown (spec §5/§6): stop accepting
    /// new commands, drain the outbox with a bounded wait, then let the
    /// coordinator worker close the backend; the sweeper is aborted last
    /// since it holds no state worth draining.
    pub async fn shutdown(self: &Arc<Self>) -> Result<()> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Err(CoreError::Internal("core already shut down".into()));
        }
        self.coordinator.shutdown()?;

        self.hub.shutdown();
        if let Some(join) = self.outbox_join.lock().unwrap().take() {
            let _ = tokio::time::timeout(Duration::from_secs(3), join).await;
        }

        if let Some(join) = self.coordinator_join.lock().unwrap().take() {
            let _ = tokio::time::timeout(self.config.default_command_timeout, join).await;
        }

        if let Some(join) = self.sweeper_join.lock().unwrap().take() {
            join.abort();
        }
        Ok(())
    }

    // -- Command interface (spec §6) --

    pub async fn play_playlist(
        &self,
        playlist_id: PlaylistId,
        track_number: Option<u32>,
        idempotency_key: Option<String>,
    ) -> Result<PlayerStatus> {
        self.coordinator.play(playlist_id, track_number, idempotency_key).await
    }

    pub async fn control(&self, action: ControlAction, idempotency_key: Option<String>) -> Result<PlayerStatus> {
        self.coordinator.control(action, idempotency_key).await
    }

    pub async fn seek(&self, position_ms: u64) -> Result<()> {
        self.coordinator.seek(position_ms).await
    }

    pub async fn set_volume(&self, volume: u8) -> Result<()> {
        self.coordinator.set_volume(volume).await
    }

    pub async fn get_status(&self) -> PlayerStatus {
        self.coordinator.get_status().await
    }

    pub async fn start_nfc_association(
        &self,
        playlist_id: PlaylistId,
        timeout_seconds: u64,
    ) -> Result<AssociationSession> {
        self.nfc.start_session(playlist_id, timeout_seconds).await
    }

    pub fn cancel_nfc_association(&self, session_id: SessionId) -> Result<()> {
        self.nfc.cancel_session(session_id)
    }

    pub fn get_nfc_status(&self) -> NfcStatus {
        self.nfc.status()
    }

    // -- Event interface (spec §6) --

    pub async fn subscribe(&self, client_id: ClientId, room: Room) -> tokio::sync::mpsc::Receiver<EventEnvelope> {
        self.hub.subscribe(client_id, room).await
    }

    pub fn unsubscribe(&self, client_id: &ClientId, room: &Room) {
        self.hub.unsubscribe(client_id, room)
    }

    pub fn disconnect(&self, client_id: &ClientId) {
        self.hub.disconnect(client_id)
    }
}
