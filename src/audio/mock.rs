//! In-memory `AudioBackend` for tests and the demonstration binary (spec
//! §4.I "Test Harness"). Durations/positions are whatever the test sets;
//! nothing is played for real.

use std::sync::Mutex;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};

use super::{AudioBackend, AudioError, TrackEndedCallback};

struct MockState {
    current_path: Option<Utf8PathBuf>,
    position_ms: u64,
    playing: bool,
    volume: u8,
    fail_next_play: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            current_path: None,
            position_ms: 0,
            playing: false,
            volume: 100,
            fail_next_play: false,
        }
    }
}

/// A deterministic, hand-cranked stand-in for real playback hardware.
/// Positions only move when a test calls [`MockAudioBackend::advance`], and
/// "natural" track completion only happens when a test calls
/// [`MockAudioBackend::simulate_track_ended`] — this mirrors the teacher's
/// `periodic_access` completion hook in `player.rs`, but under direct test
/// control instead of wall-clock timing.
pub struct MockAudioBackend {
    state: Mutex<MockState>,
    on_ended: Mutex<Option<TrackEndedCallback>>,
}

impl Default for MockAudioBackend {
    fn default() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            on_ended: Mutex::new(None),
        }
    }
}

impl MockAudioBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `play`/`resume` call fail with `HardwareUnavailable`,
    /// to exercise spec §4.D's "Backend errors on `play` or `resume` leave
    /// state unchanged" failure path.
    pub fn fail_next_play(&self) {
        self.state.lock().unwrap().fail_next_play = true;
    }

    pub fn advance(&self, ms: u64) {
        let mut state = self.state.lock().unwrap();
        if state.playing {
            state.position_ms += ms;
        }
    }

    /// Invokes the registered `on_track_ended` callback, as real hardware
    /// would when a file finishes decoding.
    pub fn simulate_track_ended(&self) {
        if let Some(cb) = self.on_ended.lock().unwrap().as_ref() {
            cb();
        }
    }

    pub fn current_path(&self) -> Option<Utf8PathBuf> {
        self.state.lock().unwrap().current_path.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().unwrap().playing
    }
}

#[async_trait]
impl AudioBackend for MockAudioBackend {
    async fn play(&self, file_path: &Utf8Path, start_position_ms: u64) -> Result<(), AudioError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_play {
            state.fail_next_play = false;
            return Err(AudioError::HardwareUnavailable("simulated failure".into()));
        }
        state.current_path = Some(file_path.to_owned());
        state.position_ms = start_position_ms;
        state.playing = true;
        Ok(())
    }

    async fn pause(&self) -> Result<(), AudioError> {
        self.state.lock().unwrap().playing = false;
        Ok(())
    }

    async fn resume(&self) -> Result<(), AudioError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_play {
            state.fail_next_play = false;
            return Err(AudioError::HardwareUnavailable("simulated failure".into()));
        }
        state.playing = true;
        Ok(())
    }

    async fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.playing = false;
        state.current_path = None;
        state.position_ms = 0;
    }

    async fn seek(&self, position_ms: u64) -> Result<(), AudioError> {
        self.state.lock().unwrap().position_ms = position_ms;
        Ok(())
    }

    async fn get_position(&self) -> Option<u64> {
        Some(self.state.lock().unwrap().position_ms)
    }

    async fn get_duration(&self) -> Option<u64> {
        None
    }

    async fn set_volume(&self, volume: u8) -> Result<(), AudioError> {
        self.state.lock().unwrap().volume = volume.min(100);
        Ok(())
    }

    fn on_track_ended(&self, callback: TrackEndedCallback) {
        *self.on_ended.lock().unwrap() = Some(callback);
    }
}
