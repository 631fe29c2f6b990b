// tracks + patterns, kept in lockstep: every pattern has exactly one row per track

use tracing::debug;

use crate::error::StoreError;
use crate::pipeline::project::{empty_row, Cell, Pattern, ProjectSnapshot, Row, Track};
use crate::shared::STEPS_PER_PATTERN;

#[derive(Clone, Debug, PartialEq)]
pub enum ToggleOutcome {
    Cleared,
    // the caller should audition this sound right away
    Set { preview: Cell },
}

#[derive(Clone, Debug, PartialEq)]
pub struct PatternStore {
    tracks: Vec<Track>,
    patterns: Vec<Pattern>,
    current: usize,
}

impl PatternStore {
    pub fn new(num_tracks: usize) -> Self {
        let num_tracks = num_tracks.max(1);
        Self {
            tracks: (0..num_tracks).map(Track::numbered).collect(),
            patterns: vec![Pattern::with_rows(num_tracks)],
            current: 0,
        }
    }

    /// Rebuild from a saved snapshot, refusing anything that breaks the row/track invariant.
    pub fn from_snapshot(snap: &ProjectSnapshot) -> Result<Self, StoreError> {
        let mut patterns = snap.patterns.clone();
        if patterns.is_empty() {
            patterns.push(Pattern::with_rows(snap.tracks.len()));
        }
        let store = Self {
            tracks: snap.tracks.clone(),
            current: snap.current_pattern.min(patterns.len() - 1),
            patterns,
        };
        store.verify()?;
        Ok(store)
    }

    // copies the grid into `snap`; transport fields are the caller's
    pub fn fill_snapshot(&self, snap: &mut ProjectSnapshot) {
        snap.patterns = self.patterns.clone();
        snap.tracks = self.tracks.clone();
        snap.current_pattern = self.current;
    }

    pub fn verify(&self) -> Result<(), StoreError> {
        if self.tracks.is_empty() {
            return Err(StoreError::InvariantViolation { pattern: 0, rows: 0, tracks: 0 });
        }
        for (i, p) in self.patterns.iter().enumerate() {
            if p.rows.len() != self.tracks.len() {
                return Err(StoreError::InvariantViolation {
                    pattern: i,
                    rows: p.rows.len(),
                    tracks: self.tracks.len(),
                });
            }
            let partial = p.rows.iter().flatten().flatten().any(|c| c.sound_name.is_empty());
            if partial {
                return Err(StoreError::EmptySoundName);
            }
        }
        Ok(())
    }

    // -- accessors --

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn num_patterns(&self) -> usize {
        self.patterns.len()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_pattern(&self) -> &Pattern {
        &self.patterns[self.current]
    }

    pub fn cell(&self, track: usize, step: usize) -> Option<&Cell> {
        self.current_pattern().rows.get(track)?.get(step)?.as_ref()
    }

    // -- tracks --

    pub fn add_track(&mut self) -> usize {
        let n = self.tracks.len();
        self.tracks.push(Track::numbered(n));
        for p in &mut self.patterns {
            p.rows.push(empty_row());
        }
        debug!(track = n, "track added");
        self.check();
        n
    }

    /// Returns false when nothing was removed (last track, or bad index).
    pub fn remove_track(&mut self, index: usize) -> bool {
        if self.tracks.len() <= 1 || index >= self.tracks.len() {
            return false;
        }
        self.tracks.remove(index);
        for p in &mut self.patterns {
            p.rows.remove(index);
        }
        debug!(track = index, "track removed");
        self.check();
        true
    }

    pub fn clear_track(&mut self, index: usize) -> Result<(), StoreError> {
        self.track_index(index)?;
        let current = self.current;
        self.patterns[current].rows[index] = empty_row();
        self.check();
        Ok(())
    }

    pub fn toggle_mute(&mut self, index: usize) -> Result<bool, StoreError> {
        let track = self.track_mut(index)?;
        track.muted = !track.muted;
        Ok(track.muted)
    }

    pub fn set_track_volume(&mut self, index: usize, volume: f32) -> Result<f32, StoreError> {
        let track = self.track_mut(index)?;
        track.volume = volume.clamp(0.0, 1.0);
        Ok(track.volume)
    }

    pub fn rename_track(&mut self, index: usize, name: &str) -> Result<(), StoreError> {
        let track = self.track_mut(index)?;
        track.name = name.to_string();
        Ok(())
    }

    // -- cells --

    pub fn toggle_cell(
        &mut self,
        track: usize,
        step: usize,
        selection: Option<&Cell>,
    ) -> Result<ToggleOutcome, StoreError> {
        self.track_index(track)?;
        if step >= STEPS_PER_PATTERN {
            return Err(StoreError::StepOutOfRange(step));
        }
        if selection.is_some_and(|c| c.sound_name.is_empty()) {
            return Err(StoreError::EmptySoundName);
        }

        let current = self.current;
        let slot = &mut self.patterns[current].rows[track][step];
        let outcome = match selection {
            None => {
                *slot = None;
                ToggleOutcome::Cleared
            }
            Some(sel) if slot.as_ref().is_some_and(|c| c.sound_name == sel.sound_name) => {
                *slot = None;
                ToggleOutcome::Cleared
            }
            Some(sel) => {
                *slot = Some(sel.clone());
                ToggleOutcome::Set { preview: sel.clone() }
            }
        };
        self.check();
        Ok(outcome)
    }

    // -- patterns --

    pub fn add_pattern(&mut self) -> usize {
        self.patterns.push(Pattern::with_rows(self.tracks.len()));
        self.current = self.patterns.len() - 1;
        debug!(pattern = self.current, "pattern added");
        self.check();
        self.current
    }

    pub fn switch_pattern(&mut self, index: usize) -> Result<(), StoreError> {
        if index >= self.patterns.len() {
            return Err(StoreError::PatternOutOfRange { index, len: self.patterns.len() });
        }
        self.current = index;
        Ok(())
    }

    // a row of the current pattern, or None if it doesn't exist (tolerated by the clock)
    pub fn row(&self, track: usize) -> Option<&Row> {
        self.current_pattern().rows.get(track)
    }

    fn track_index(&self, index: usize) -> Result<usize, StoreError> {
        if index < self.tracks.len() {
            Ok(index)
        } else {
            Err(StoreError::TrackOutOfRange { index, len: self.tracks.len() })
        }
    }

    fn track_mut(&mut self, index: usize) -> Result<&mut Track, StoreError> {
        let len = self.tracks.len();
        self.tracks
            .get_mut(index)
            .ok_or(StoreError::TrackOutOfRange { index, len })
    }

    #[inline]
    fn check(&self) {
        debug_assert!(self.verify().is_ok(), "store invariant broken: {:?}", self.verify());
    }

    #[cfg(test)]
    pub(crate) fn patterns_mut(&mut self) -> &mut Vec<Pattern> {
        &mut self.patterns
    }
}

impl Default for PatternStore {
    fn default() -> Self {
        Self::new(8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kick() -> Cell {
        Cell::synth("808 Kick")
    }

    #[test]
    fn rows_follow_tracks_in_any_order() {
        let mut store = PatternStore::new(2);
        store.add_pattern();
        store.add_track();
        store.add_pattern();
        assert!(store.remove_track(0));
        store.add_track();
        assert_eq!(store.verify(), Ok(()));
        assert_eq!(store.num_patterns(), 3);
        assert_eq!(store.tracks().len(), 3);
    }

    #[test]
    fn last_track_cannot_be_removed() {
        let mut store = PatternStore::new(1);
        let before = store.clone();
        assert!(!store.remove_track(0));
        assert_eq!(store, before);
    }

    #[test]
    fn double_toggle_clears() {
        let mut store = PatternStore::new(4);
        let first = store.toggle_cell(1, 3, Some(&kick())).unwrap();
        assert_eq!(first, ToggleOutcome::Set { preview: kick() });
        assert_eq!(store.toggle_cell(1, 3, Some(&kick())).unwrap(), ToggleOutcome::Cleared);
        assert_eq!(store.cell(1, 3), None);
    }

    #[test]
    fn toggle_with_other_sound_replaces() {
        let mut store = PatternStore::new(1);
        store.toggle_cell(0, 0, Some(&kick())).unwrap();
        store.toggle_cell(0, 0, Some(&Cell::synth("Clap"))).unwrap();
        assert_eq!(store.cell(0, 0), Some(&Cell::synth("Clap")));
        store.toggle_cell(0, 0, None).unwrap();
        assert_eq!(store.cell(0, 0), None);
    }

    #[test]
    fn out_of_range_is_an_error() {
        let mut store = PatternStore::new(2);
        assert_eq!(
            store.toggle_cell(5, 0, Some(&kick())),
            Err(StoreError::TrackOutOfRange { index: 5, len: 2 })
        );
        assert_eq!(store.toggle_cell(0, 16, None), Err(StoreError::StepOutOfRange(16)));
        assert_eq!(
            store.switch_pattern(3),
            Err(StoreError::PatternOutOfRange { index: 3, len: 1 })
        );
        assert_eq!(
            store.toggle_cell(0, 0, Some(&Cell::synth(""))),
            Err(StoreError::EmptySoundName)
        );
    }

    #[test]
    fn add_pattern_becomes_current_and_switch_keeps_cells() {
        let mut store = PatternStore::new(2);
        store.toggle_cell(0, 0, Some(&kick())).unwrap();
        assert_eq!(store.add_pattern(), 1);
        assert!(store.current_pattern().is_empty());
        store.switch_pattern(0).unwrap();
        assert_eq!(store.cell(0, 0), Some(&kick()));
    }

    #[test]
    fn track_edits_clamp_and_clear() {
        let mut store = PatternStore::new(2);
        assert_eq!(store.set_track_volume(1, 1.7), Ok(1.0));
        assert_eq!(store.toggle_mute(1), Ok(true));
        store.rename_track(1, "Hats").unwrap();
        assert_eq!(store.track(1).map(|t| t.name.as_str()), Some("Hats"));

        store.toggle_cell(1, 2, Some(&kick())).unwrap();
        store.clear_track(1).unwrap();
        assert!(store.current_pattern().is_empty());
    }

    #[test]
    fn rehydration_rejects_mismatched_rows() {
        let mut snap = ProjectSnapshot {
            patterns: vec![Pattern::with_rows(3)],
            tracks: (0..2).map(Track::numbered).collect(),
            tempo: 120,
            swing: 0,
            master_volume: 0.7,
            current_pattern: 0,
            exported_at: None,
        };
        assert_eq!(
            PatternStore::from_snapshot(&snap),
            Err(StoreError::InvariantViolation { pattern: 0, rows: 3, tracks: 2 })
        );
        snap.patterns = vec![Pattern::with_rows(2)];
        snap.current_pattern = 9;
        let store = PatternStore::from_snapshot(&snap).unwrap();
        assert_eq!(store.current_index(), 0);
    }
}
