use std::time::Duration;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crate::shared::InputEvent;
use super::mode::TuiState;

const VOLUME_NUDGE: f32 = 0.05;
const SWING_NUDGE: i32 = 5;

// poll for a key from the terminal and resolve it against the cursor into
// semantic input events for the session
pub fn poll_input(timeout: Duration, ts: &mut TuiState) -> anyhow::Result<Vec<InputEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }

    if let Event::Key(key) = event::read()? {
        if key.kind != KeyEventKind::Press {
            return Ok(vec![]);
        }
        return Ok(handle_key(key.code, ts));
    }
    Ok(vec![])
}

pub fn handle_key(code: KeyCode, ts: &mut TuiState) -> Vec<InputEvent> {
    let (track, step) = (ts.cursor_track, ts.cursor_step);

    // an open name prompt swallows every key
    if let Some(name) = ts.naming.as_mut() {
        match code {
            KeyCode::Char(c) => name.push(c),
            KeyCode::Backspace => {
                name.pop();
            }
            KeyCode::Esc => ts.naming = None,
            KeyCode::Enter => {
                let name = ts.naming.take().unwrap_or_default();
                let name = name.trim();
                if !name.is_empty() {
                    return vec![InputEvent::RenameTrack { track, name: name.to_string() }];
                }
            }
            _ => {}
        }
        return vec![];
    }

    match code {
        KeyCode::Esc | KeyCode::Char('q') => vec![InputEvent::Quit],

        // transport
        KeyCode::Char(' ') => vec![InputEvent::TogglePlay],
        KeyCode::Char('.') => vec![InputEvent::Stop],
        KeyCode::Char(',') => vec![InputEvent::Rewind],

        // cursor stays on this side
        KeyCode::Up => { ts.move_cursor(-1, 0); vec![] }
        KeyCode::Down => { ts.move_cursor(1, 0); vec![] }
        KeyCode::Left => { ts.move_cursor(0, -1); vec![] }
        KeyCode::Right => { ts.move_cursor(0, 1); vec![] }

        // grid
        KeyCode::Enter => vec![InputEvent::ToggleCell { track, step }],
        KeyCode::Backspace | KeyCode::Delete => vec![InputEvent::ClearCell { track, step }],

        // palette
        KeyCode::Char('[') => vec![InputEvent::PrevSound],
        KeyCode::Char(']') => vec![InputEvent::NextSound],
        KeyCode::Char('0') => vec![InputEvent::ClearSelection],

        // track under the cursor
        KeyCode::Char('m') => vec![InputEvent::ToggleMute(track)],
        KeyCode::Char('-') => vec![InputEvent::AdjustTrackVolume { track, delta: -VOLUME_NUDGE }],
        KeyCode::Char('=') => vec![InputEvent::AdjustTrackVolume { track, delta: VOLUME_NUDGE }],
        KeyCode::Char('a') => vec![InputEvent::AddTrack],
        KeyCode::Char('x') => vec![InputEvent::RemoveTrack(track)],
        KeyCode::Char('c') => vec![InputEvent::ClearTrack(track)],
        KeyCode::Char('n') => {
            ts.naming = Some(String::new());
            vec![]
        }

        // live params, lowercase = down and shifted = up
        KeyCode::Char('t') => vec![InputEvent::AdjustTempo(-1)],
        KeyCode::Char('T') => vec![InputEvent::AdjustTempo(1)],
        KeyCode::Char('w') => vec![InputEvent::AdjustSwing(-SWING_NUDGE)],
        KeyCode::Char('W') => vec![InputEvent::AdjustSwing(SWING_NUDGE)],
        KeyCode::Char('v') => vec![InputEvent::AdjustMasterVolume(-VOLUME_NUDGE)],
        KeyCode::Char('V') => vec![InputEvent::AdjustMasterVolume(VOLUME_NUDGE)],
        KeyCode::Char('o') => vec![InputEvent::AdjustOutputLevel(-VOLUME_NUDGE)],
        KeyCode::Char('O') => vec![InputEvent::AdjustOutputLevel(VOLUME_NUDGE)],

        // patterns
        KeyCode::Char('p') => vec![InputEvent::AddPattern],
        KeyCode::Tab => vec![InputEvent::NextPattern],
        KeyCode::Char(c @ '1'..='9') => {
            let index = c as usize - '1' as usize;
            if index < ts.num_patterns { vec![InputEvent::SelectPattern(index)] } else { vec![] }
        }
        KeyCode::Char('S') => vec![InputEvent::SavePattern],

        KeyCode::Char('b') => vec![InputEvent::ToggleRecord],
        KeyCode::Char('r') => vec![InputEvent::ToggleMicRecord],

        // saved beats
        KeyCode::Char('B') => vec![InputEvent::ToggleBeats],
        KeyCode::Char('{') => vec![InputEvent::PrevBeat],
        KeyCode::Char('}') => vec![InputEvent::NextBeat],
        KeyCode::Char('P') => vec![InputEvent::PlayBeat],
        KeyCode::Char('D') => vec![InputEvent::DeleteBeat],

        KeyCode::Char('R') => vec![InputEvent::RestartAudio],

        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> TuiState {
        TuiState { cursor_track: 1, cursor_step: 3, num_tracks: 4, num_patterns: 2, naming: None }
    }

    #[test]
    fn grid_keys_carry_the_cursor() {
        let mut ts = state();
        assert_eq!(handle_key(KeyCode::Enter, &mut ts), vec![InputEvent::ToggleCell { track: 1, step: 3 }]);
        assert!(handle_key(KeyCode::Right, &mut ts).is_empty());
        assert_eq!(handle_key(KeyCode::Delete, &mut ts), vec![InputEvent::ClearCell { track: 1, step: 4 }]);
        assert_eq!(handle_key(KeyCode::Char('m'), &mut ts), vec![InputEvent::ToggleMute(1)]);
    }

    #[test]
    fn pattern_digits_ignore_missing_patterns() {
        let mut ts = state();
        assert_eq!(handle_key(KeyCode::Char('2'), &mut ts), vec![InputEvent::SelectPattern(1)]);
        assert!(handle_key(KeyCode::Char('3'), &mut ts).is_empty());
    }

    #[test]
    fn name_prompt_types_instead_of_acting() {
        let mut ts = state();
        assert!(handle_key(KeyCode::Char('n'), &mut ts).is_empty());
        for c in "Kq x".chars() {
            assert!(handle_key(KeyCode::Char(c), &mut ts).is_empty(), "{c} must not act");
        }
        handle_key(KeyCode::Backspace, &mut ts);
        assert_eq!(
            handle_key(KeyCode::Enter, &mut ts),
            vec![InputEvent::RenameTrack { track: 1, name: "Kq".into() }]
        );
        assert!(ts.naming.is_none());
        assert_eq!(handle_key(KeyCode::Char('q'), &mut ts), vec![InputEvent::Quit]);
    }

    #[test]
    fn escape_drops_the_prompt() {
        let mut ts = state();
        handle_key(KeyCode::Char('n'), &mut ts);
        handle_key(KeyCode::Char('z'), &mut ts);
        assert!(handle_key(KeyCode::Esc, &mut ts).is_empty());
        assert!(ts.naming.is_none());
    }
}
