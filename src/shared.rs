// The contract between the session and the TUI.
//
// The session owns every bit of sequencer state; each frame the TUI asks it
// for a `DisplayState` and draws exactly that. Keys are resolved by the TUI
// into semantic `InputEvent`s (it knows where the cursor is), and the session
// applies them.
//
// Keys:
//   Space         //  TogglePlay
//   .             //  Stop
//   ,             //  Rewind
//   arrows        //  move the cursor (TUI only)
//   Enter         //  ToggleCell(cursor) with the selected sound
//   Backspace/Del //  ClearCell(cursor)
//   [ / ]         //  PrevSound / NextSound
//   0             //  ClearSelection
//   m             //  ToggleMute(cursor track)
//   - / =         //  AdjustTrackVolume(cursor track, -/+0.05)
//   t / T         //  AdjustTempo(-/+1)
//   w / W         //  AdjustSwing(-/+5)
//   v / V         //  AdjustMasterVolume(-/+0.05)
//   o / O         //  AdjustOutputLevel(-/+0.05), speakers only
//   a / x / c     //  AddTrack / RemoveTrack(cursor) / ClearTrack(cursor)
//   n             //  name the cursor track (TUI prompt, Enter -> RenameTrack)
//   p             //  AddPattern
//   1-9, Tab      //  SelectPattern(n) / NextPattern
//   b             //  ToggleRecord
//   r             //  ToggleMicRecord
//   B             //  ToggleBeats
//   { / }         //  PrevBeat / NextBeat
//   P / D         //  PlayBeat / DeleteBeat
//   R             //  RestartAudio
//   S             //  SavePattern
//   Esc, q        //  Quit

use crate::pipeline::transport::PlayState;

pub const STEPS_PER_PATTERN: usize = 16;

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    // transport
    TogglePlay,
    Stop,
    Rewind,

    // grid, with the cursor already resolved
    ToggleCell { track: usize, step: usize },
    ClearCell { track: usize, step: usize },

    // sound palette
    NextSound,
    PrevSound,
    ClearSelection,

    // tracks
    ToggleMute(usize),
    AdjustTrackVolume { track: usize, delta: f32 },
    AddTrack,
    RemoveTrack(usize),
    ClearTrack(usize),
    RenameTrack { track: usize, name: String },

    // patterns
    AddPattern,
    SelectPattern(usize),
    NextPattern,
    SavePattern,

    // live parameters
    AdjustTempo(i32),
    AdjustSwing(i32),
    AdjustMasterVolume(f32),
    AdjustOutputLevel(f32),

    // recording
    ToggleRecord,
    ToggleMicRecord,

    // saved beats
    ToggleBeats,
    NextBeat,
    PrevBeat,
    PlayBeat,
    DeleteBeat,

    RestartAudio,
    Quit,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrackView {
    pub name: String,
    pub muted: bool,
    pub volume: f32,
    pub cells: [Option<String>; STEPS_PER_PATTERN], // short labels
}

#[derive(Clone, Debug, PartialEq)]
pub struct DisplayState {
    pub tracks: Vec<TrackView>,
    pub play_state: PlayState,
    pub current_step: u8,
    pub tempo: u32,
    pub swing: u8,
    pub master_volume: f32,
    pub output_level: f32,
    pub pattern: usize,
    pub num_patterns: usize,
    pub palette: Vec<String>,
    pub selected_sound: Option<usize>, // index into palette
    pub recording: bool,
    pub mic_recording: bool,
    pub beats_open: bool,
    pub beats: Vec<String>, // one label per saved beat
    pub selected_beat: Option<usize>,
    pub status: String, // last message worth showing, errors included
}

impl DisplayState {
    pub fn playing(&self) -> bool {
        self.play_state == PlayState::Playing
    }

    pub fn selected_name(&self) -> Option<&str> {
        self.selected_sound
            .and_then(|i| self.palette.get(i))
            .map(String::as_str)
    }
}
