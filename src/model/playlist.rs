use serde::{Deserialize, Serialize};

use super::track::Track;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlaylistId(pub String);

/// A lowercase hex string uniquely identifying a physical NFC tag, unique
/// across all playlists when set (enforced by the repository, not here).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NfcTagUid(pub String);

impl NfcTagUid {
    /// Spec §6: hardware callback UIDs are hex strings of length >= 8.
    pub fn is_well_formed(uid: &str) -> bool {
        uid.len() >= 8 && uid.chars().all(|c| c.is_ascii_hexdigit())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: PlaylistId,
    pub title: String,
    pub nfc_tag_uid: Option<NfcTagUid>,
    pub tracks: Vec<Track>,
}

impl Playlist {
    pub fn new(id: impl Into<String>, title: impl Into<String>, tracks: Vec<Track>) -> Self {
        Self {
            id: PlaylistId(id.into()),
            title: title.into(),
            nfc_tag_uid: None,
            tracks,
        }
    }

    /// Track numbers are unique within a playlist; violating this is a bug
    /// in whoever constructed the playlist (ingestion, out of scope), not a
    /// runtime condition the core recovers from.
    pub fn track_numbers_are_unique(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.tracks.iter().all(|t| seen.insert(t.track_number))
    }

    pub fn track_by_number(&self, number: u32) -> Option<&Track> {
        self.tracks.iter().find(|t| t.track_number == number)
    }

    pub fn index_of_number(&self, number: u32) -> Option<usize> {
        self.tracks.iter().position(|t| t.track_number == number)
    }

    /// Renumbers tracks to a contiguous 1-based sequence in their current
    /// order. Spec §3: "within a playlist, numbers form a contiguous
    /// sequence starting at 1 after any `normalize_track_numbers`
    /// operation."
    pub fn normalize_track_numbers(&mut self) {
        for (idx, track) in self.tracks.iter_mut().enumerate() {
            track.track_number = (idx + 1) as u32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(n: u32) -> Track {
        Track::new(format!("t{n}"), n, format!("Track {n}"), "a.mp3", None)
    }

    #[test]
    fn normalize_renumbers_contiguously() {
        let mut pl = Playlist::new("p1", "Mix", vec![track(5), track(9), track(1)]);
        pl.normalize_track_numbers();
        let numbers: Vec<_> = pl.tracks.iter().map(|t| t.track_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn detects_duplicate_track_numbers() {
        let pl = Playlist::new("p1", "Mix", vec![track(1), track(1)]);
        assert!(!pl.track_numbers_are_unique());
    }

    #[test]
    fn well_formed_uid_requires_length_and_hex() {
        assert!(NfcTagUid::is_well_formed("04a1b2c3"));
        assert!(!NfcTagUid::is_well_formed("04a1"));
        assert!(!NfcTagUid::is_well_formed("zzzzzzzz"));
    }
}
