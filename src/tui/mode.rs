use crate::shared::{DisplayState, STEPS_PER_PATTERN};

// state local to the tui: where the cursor is, and the name being typed
// while a track rename prompt is open.
// track/pattern counts are synced from DisplayState every loop so the
// cursor never points past the grid
#[derive(Clone, Debug, Default)]
pub struct TuiState {
    pub cursor_track: usize,
    pub cursor_step: usize,
    pub num_tracks: usize,
    pub num_patterns: usize,
    pub naming: Option<String>,
}

impl TuiState {
    pub fn sync(&mut self, ds: &DisplayState) {
        self.num_tracks = ds.tracks.len();
        self.num_patterns = ds.num_patterns;
        self.cursor_track = self.cursor_track.min(self.num_tracks.saturating_sub(1));
        self.cursor_step = self.cursor_step.min(STEPS_PER_PATTERN - 1);
    }

    pub fn prompt(&self) -> Option<String> {
        self.naming
            .as_ref()
            .map(|name| format!("name track {}: {name}_", self.cursor_track + 1))
    }

    // wraps around both edges
    pub fn move_cursor(&mut self, d_track: i32, d_step: i32) {
        let tracks = self.num_tracks.max(1) as i32;
        let steps = STEPS_PER_PATTERN as i32;
        self.cursor_track = (self.cursor_track as i32 + d_track).rem_euclid(tracks) as usize;
        self.cursor_step = (self.cursor_step as i32 + d_step).rem_euclid(steps) as usize;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_wraps() {
        let mut ts = TuiState { num_tracks: 3, ..TuiState::default() };
        ts.move_cursor(-1, -1);
        assert_eq!((ts.cursor_track, ts.cursor_step), (2, 15));
        ts.move_cursor(1, 1);
        assert_eq!((ts.cursor_track, ts.cursor_step), (0, 0));
    }

    #[test]
    fn prompt_shows_the_typed_name() {
        let mut ts = TuiState { num_tracks: 3, cursor_track: 2, ..TuiState::default() };
        assert_eq!(ts.prompt(), None);
        ts.naming = Some("Perc".into());
        assert_eq!(ts.prompt().as_deref(), Some("name track 3: Perc_"));
    }
}
