use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrackId(pub String);

/// One playable audio file with a 1-based number within its playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    /// 1-based, unique within the owning playlist.
    pub track_number: u32,
    pub title: String,
    /// A resource identifier the audio backend can load. Not interpreted by
    /// the core; it is handed to `AudioBackend::play` unchanged.
    pub file_path: Utf8PathBuf,
    /// May be unknown at load time.
    pub duration_ms: Option<u64>,
}

impl Track {
    pub fn new(
        id: impl Into<String>,
        track_number: u32,
        title: impl Into<String>,
        file_path: impl Into<Utf8PathBuf>,
        duration_ms: Option<u64>,
    ) -> Self {
        assert!(track_number >= 1, "track_number must be >= 1");
        Self {
            id: TrackId(id.into()),
            track_number,
            title: title.into(),
            file_path: file_path.into(),
            duration_ms,
        }
    }
}
