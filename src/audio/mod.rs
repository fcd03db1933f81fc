//! Component A: Audio Backend Interface (spec §4.A).
//!
//! The core consumes playback hardware only through this trait. Exactly one
//! implementation is wired in per process lifetime (spec §4.A: "The core
//! accepts at most one backend implementation per process lifetime").

pub mod mock;
#[cfg(feature = "rodio-backend")]
pub mod rodio_backend;

use async_trait::async_trait;
use camino::Utf8Path;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AudioError {
    #[error("audio hardware unavailable: {0}")]
    HardwareUnavailable(String),
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("decode error: {0}")]
    DecodeError(String),
    #[error("audio backend not started")]
    BackendNotStarted,
}

impl From<AudioError> for crate::error::CoreError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::HardwareUnavailable(m) => crate::error::CoreError::HardwareUnavailable(m),
            AudioError::FileNotFound(m) => crate::error::CoreError::NotFound(m),
            AudioError::DecodeError(m) => crate::error::CoreError::HardwareUnavailable(m),
            AudioError::BackendNotStarted => crate::error::CoreError::BackendNotStarted,
        }
    }
}

/// Invoked by the backend exactly once when the currently loaded file
/// completes naturally (not due to `stop`).
pub type TrackEndedCallback = Box<dyn Fn() + Send + Sync>;

#[async_trait]
pub trait AudioBackend: Send + Sync {
    async fn play(&self, file_path: &Utf8Path, start_position_ms: u64) -> Result<(), AudioError>;
    async fn pause(&self) -> Result<(), AudioError>;
    async fn resume(&self) -> Result<(), AudioError>;
    /// Stop never fails: it's always safe to ask the backend to go idle.
    async fn stop(&self);
    async fn seek(&self, position_ms: u64) -> Result<(), AudioError>;
    /// `None` means unknown, not an error.
    async fn get_position(&self) -> Option<u64>;
    async fn get_duration(&self) -> Option<u64>;
    async fn set_volume(&self, volume: u8) -> Result<(), AudioError>;
    /// Registers the single track-ended callback. Called once at wiring
    /// time by the coordinator; implementations only need to support one
    /// registered callback at a time.
    fn on_track_ended(&self, callback: TrackEndedCallback);
}
