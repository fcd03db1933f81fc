//! Component C: Playlist State Manager (spec §4.C).
//!
//! Pure in-memory bookkeeping: the current playlist and a zero-based track
//! index. No I/O, no locking of its own — it is mutated only from the
//! Playback Coordinator's single worker (spec §5), the same way the
//! teacher's `system.rs` indexes into `playing` only from within
//! `perform_command`.

use crate::model::{Playlist, Track};

#[derive(Debug, Default)]
pub struct PlaylistStateManager {
    current: Option<Playlist>,
    index: usize,
}

impl PlaylistStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, playlist: Playlist) {
        self.current = Some(playlist);
        self.index = 0;
    }

    /// Maps a 1-based track number to an index; out-of-range requests are
    /// rejected without mutating state.
    pub fn goto_track(&mut self, number: u32) -> Result<&Track, GotoError> {
        let playlist = self.current.as_ref().ok_or(GotoError::NoPlaylist)?;
        let index = playlist.index_of_number(number).ok_or(GotoError::OutOfRange)?;
        self.index = index;
        Ok(&self.current.as_ref().unwrap().tracks[index])
    }

    /// Advances to the next track. Does **not** wrap at the end: returns
    /// `None` and leaves the index unchanged once the last track has been
    /// reached (spec §3/§9 decision: stop, never wrap).
    pub fn next(&mut self) -> Option<&Track> {
        let playlist = self.current.as_ref()?;
        if self.index + 1 >= playlist.tracks.len() {
            return None;
        }
        self.index += 1;
        self.current.as_ref().unwrap().tracks.get(self.index)
    }

    /// Steps back one track; `None` at the first track (does not wrap).
    pub fn previous(&mut self) -> Option<&Track> {
        let _playlist = self.current.as_ref()?;
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        self.current.as_ref().unwrap().tracks.get(self.index)
    }

    pub fn current(&self) -> Option<(&Playlist, &Track, usize)> {
        let playlist = self.current.as_ref()?;
        let track = playlist.tracks.get(self.index)?;
        Some((playlist, track, self.index))
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.index = 0;
    }

    pub fn is_loaded(&self) -> bool {
        self.current.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GotoError {
    #[error("no playlist loaded")]
    NoPlaylist,
    #[error("track number out of range")]
    OutOfRange,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Track;

    fn playlist() -> Playlist {
        Playlist::new(
            "p1",
            "Mix",
            vec![
                Track::new("t1", 1, "One", "a.mp3", Some(100)),
                Track::new("t2", 2, "Two", "b.mp3", Some(100)),
                Track::new("t3", 3, "Three", "c.mp3", Some(100)),
            ],
        )
    }

    #[test]
    fn next_advances_and_stops_at_end() {
        let mut mgr = PlaylistStateManager::new();
        mgr.load(playlist());
        assert_eq!(mgr.current().unwrap().2, 0);
        assert!(mgr.next().is_some());
        assert_eq!(mgr.current().unwrap().2, 1);
        assert!(mgr.next().is_some());
        assert_eq!(mgr.current().unwrap().2, 2);
        assert!(mgr.next().is_none());
        // Index unchanged after the failed advance.
        assert_eq!(mgr.current().unwrap().2, 2);
    }

    #[test]
    fn previous_does_not_wrap_below_zero() {
        let mut mgr = PlaylistStateManager::new();
        mgr.load(playlist());
        assert!(mgr.previous().is_none());
        assert_eq!(mgr.current().unwrap().2, 0);
    }

    #[test]
    fn goto_track_rejects_out_of_range_without_mutating() {
        let mut mgr = PlaylistStateManager::new();
        mgr.load(playlist());
        mgr.goto_track(2).unwrap();
        assert_eq!(mgr.current().unwrap().2, 1);
        assert_eq!(mgr.goto_track(99).unwrap_err(), GotoError::OutOfRange);
        assert_eq!(mgr.current().unwrap().2, 1);
    }

    #[test]
    fn current_reports_the_exact_track_struct() {
        let mut mgr = PlaylistStateManager::new();
        mgr.load(playlist());
        let (_, track, _) = mgr.current().unwrap();
        pretty_assertions::assert_eq!(track, &Track::new("t1", 1, "One", "a.mp3", Some(100)));
    }
}
