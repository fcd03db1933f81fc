//! Real `AudioBackend` adapter over `rodio`, generalized from the teacher's
//! `player.rs` (`speakers::SpeakersBuilder` + `OutputStream` + `mixer().add()`).
//!
//! This branch of `rodio` has no `Sink`: a source handed to `mixer().add()`
//! plays until its iterator yields `None` and cannot be paused, seeked, or
//! volume-adjusted from outside. The teacher works around the "stop" half of
//! that with `pls_stop: Arc<AtomicBool>` plus `.stoppable().periodic_access(...)`
//! — a source that checks a shared flag on every sample and ends itself when
//! it is set. This adapter generalizes the same gate to also cover pause
//! (hold the flag, emit silence, keep the inner decoder un-advanced) and
//! volume (multiply every sample by a shared factor), and reuses "make the
//! source end itself" for `seek` by decoding the file again from the target
//! offset and swapping it into the mixer. Position is tracked by wall clock
//! rather than queried from the source, since nothing handed to `mixer()`
//! can be asked its position after the fact.
//!
//! The teacher's own `pause`/`unpause` are left as empty stubs with a
//! `self._stream.???` comment; that gap is exactly what the gate below
//! fills in.

use std::fs::File;
use std::io::BufReader;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use rodio::{speakers::SpeakersBuilder, Decoder, OutputStream, Sample, Source};

use super::{AudioBackend, AudioError, TrackEndedCallback};

const DURATION_UNKNOWN: u64 = u64::MAX;
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// State shared between the backend handle, the background poller, and
/// whichever `GatedSource` is currently loaded in the mixer.
struct Shared {
    generation: AtomicU64,
    ended_generation: AtomicU64,
    notified_generation: AtomicU64,
    paused: AtomicBool,
    volume_bits: AtomicU32,
    on_ended: Mutex<Option<TrackEndedCallback>>,
}

impl Shared {
    fn volume(&self) -> f32 {
        f32::from_bits(self.volume_bits.load(Ordering::Relaxed))
    }
}

/// Wraps a decoded source with a generation check (supersedes the teacher's
/// single `pls_stop` flag with "is a newer play/seek/stop in effect"), a
/// pause gate, and live volume scaling.
struct GatedSource<S> {
    inner: S,
    shared: Arc<Shared>,
    generation: u64,
}

impl<S: Iterator<Item = Sample>> Iterator for GatedSource<S> {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        if self.shared.generation.load(Ordering::SeqCst) != self.generation {
            return None;
        }
        if self.shared.paused.load(Ordering::SeqCst) {
            return Some(0.0);
        }
        match self.inner.next() {
            Some(sample) => Some(sample * self.shared.volume()),
            None => {
                self.shared.ended_generation.store(self.generation, Ordering::SeqCst);
                None
            }
        }
    }
}

impl<S: Source<Item = Sample>> Source for GatedSource<S> {
    fn current_span_len(&self) -> Option<usize> {
        self.inner.current_span_len()
    }

    fn channels(&self) -> rodio::ChannelCount {
        self.inner.channels()
    }

    fn sample_rate(&self) -> rodio::SampleRate {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }
}

struct Clock {
    base_position_ms: u64,
    resumed_at: Option<Instant>,
}

impl Clock {
    fn position_ms(&self) -> u64 {
        match self.resumed_at {
            Some(at) => self.base_position_ms + at.elapsed().as_millis() as u64,
            None => self.base_position_ms,
        }
    }
}

pub struct RodioAudioBackend {
    // Kept alive for the process lifetime; dropping it tears down the output
    // device.
    stream: OutputStream,
    shared: Arc<Shared>,
    current_path: Mutex<Option<Utf8PathBuf>>,
    clock: Mutex<Clock>,
    known_duration_ms: AtomicU64,
}

impl RodioAudioBackend {
    pub fn try_new() -> Result<Self, AudioError> {
        let stream = SpeakersBuilder::new()
            .default_device()
            .map_err(|e| AudioError::HardwareUnavailable(e.to_string()))?
            .default_config()
            .map_err(|e| AudioError::HardwareUnavailable(e.to_string()))?
            .open_stream()
            .map_err(|e| AudioError::HardwareUnavailable(e.to_string()))?;

        let shared = Arc::new(Shared {
            generation: AtomicU64::new(0),
            ended_generation: AtomicU64::new(0),
            notified_generation: AtomicU64::new(0),
            paused: AtomicBool::new(false),
            volume_bits: AtomicU32::new(1.0f32.to_bits()),
            on_ended: Mutex::new(None),
        });

        let poller = Arc::clone(&shared);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(POLL_INTERVAL);
            loop {
                ticker.tick().await;
                let ended = poller.ended_generation.load(Ordering::SeqCst);
                let current = poller.generation.load(Ordering::SeqCst);
                let already_notified = poller.notified_generation.load(Ordering::SeqCst) == ended;
                if ended != 0 && ended == current && !already_notified {
                    poller.notified_generation.store(ended, Ordering::SeqCst);
                    if let Some(cb) = poller.on_ended.lock().unwrap().as_ref() {
                        cb();
                    }
                }
            }
        });

        Ok(Self {
            stream,
            shared,
            current_path: Mutex::new(None),
            clock: Mutex::new(Clock { base_position_ms: 0, resumed_at: None }),
            known_duration_ms: AtomicU64::new(DURATION_UNKNOWN),
        })
    }

    /// Decodes `file_path` from `start_position_ms`, bumps the generation
    /// (ending whatever source is currently in the mixer on its next sample),
    /// and adds the new source. Shared by `play` and `seek`.
    fn load(&self, file_path: &Utf8Path, start_position_ms: u64, paused: bool) -> Result<(), AudioError> {
        let file = File::open(file_path.as_std_path())
            .map_err(|_| AudioError::FileNotFound(file_path.to_string()))?;
        let decoder = Decoder::try_from(BufReader::new(file))
            .map_err(|e| AudioError::DecodeError(e.to_string()))?;

        self.known_duration_ms.store(
            decoder.total_duration().map(|d| d.as_millis() as u64).unwrap_or(DURATION_UNKNOWN),
            Ordering::SeqCst,
        );

        let decoder = decoder.skip_duration(Duration::from_millis(start_position_ms));

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.paused.store(paused, Ordering::SeqCst);
        *self.current_path.lock().unwrap() = Some(file_path.to_owned());
        *self.clock.lock().unwrap() = Clock {
            base_position_ms: start_position_ms,
            resumed_at: if paused { None } else { Some(Instant::now()) },
        };

        let gated = GatedSource { inner: decoder, shared: Arc::clone(&self.shared), generation };
        self.stream.mixer().add(gated);
        Ok(())
    }
}

#[async_trait]
impl AudioBackend for RodioAudioBackend {
    async fn play(&self, file_path: &Utf8Path, start_position_ms: u64) -> Result<(), AudioError> {
        self.load(file_path, start_position_ms, false)
    }

    async fn pause(&self) -> Result<(), AudioError> {
        if self.current_path.lock().unwrap().is_none() {
            return Err(AudioError::BackendNotStarted);
        }
        let mut clock = self.clock.lock().unwrap();
        clock.base_position_ms = clock.position_ms();
        clock.resumed_at = None;
        self.shared.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&self) -> Result<(), AudioError> {
        if self.current_path.lock().unwrap().is_none() {
            return Err(AudioError::BackendNotStarted);
        }
        let mut clock = self.clock.lock().unwrap();
        clock.resumed_at = Some(Instant::now());
        self.shared.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        *self.current_path.lock().unwrap() = None;
        *self.clock.lock().unwrap() = Clock { base_position_ms: 0, resumed_at: None };
    }

    async fn seek(&self, position_ms: u64) -> Result<(), AudioError> {
        let path = self.current_path.lock().unwrap().clone().ok_or(AudioError::BackendNotStarted)?;
        let paused = self.shared.paused.load(Ordering::SeqCst);
        self.load(&path, position_ms, paused)
    }

    async fn get_position(&self) -> Option<u64> {
        if self.current_path.lock().unwrap().is_none() {
            return None;
        }
        Some(self.clock.lock().unwrap().position_ms())
    }

    async fn get_duration(&self) -> Option<u64> {
        match self.known_duration_ms.load(Ordering::SeqCst) {
            DURATION_UNKNOWN => None,
            ms => Some(ms),
        }
    }

    async fn set_volume(&self, volume: u8) -> Result<(), AudioError> {
        let factor = volume.min(100) as f32 / 100.0;
        self.shared.volume_bits.store(factor.to_bits(), Ordering::SeqCst);
        Ok(())
    }

    fn on_track_ended(&self, callback: TrackEndedCallback) {
        *self.shared.on_ended.lock().unwrap() = Some(callback);
    }
}
