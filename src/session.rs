// One running drum machine: the grid, the clock, the audio graph and the
// recorder, driven from a single event-loop thread.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use crossbeam_channel::Receiver;
use tracing::{debug, info, warn};

use crate::audio_api::{AudioBackend, AudioSink, InputBackend};
use crate::config::Settings;
use crate::error::{RecorderError, StoreError};
use crate::loader::AssetStore;
use crate::pipeline::mic::MicRecorder;
use crate::pipeline::persistence::{BeatEntry, BeatStore, PatternSink};
use crate::pipeline::project::{Cell, ProjectSnapshot};
use crate::pipeline::recorder::{Recorder, Recording};
use crate::pipeline::router::OutputRouter;
use crate::pipeline::sample_player::SamplePlayer;
use crate::pipeline::sound::{resolve, SoundLibrary, SoundSource};
use crate::pipeline::store::{PatternStore, ToggleOutcome};
use crate::pipeline::synth_engine;
use crate::pipeline::transport::{Clock, TransportClock, TransportEvent, TransportState};
use crate::shared::{DisplayState, InputEvent, TrackView};

pub struct Session {
    store: PatternStore,
    transport: TransportClock,
    router: OutputRouter,
    samples: SamplePlayer,
    assets: Arc<dyn AssetStore>,
    recorder: Recorder,
    mic: Option<MicRecorder>,
    library: SoundLibrary,
    selected: Option<usize>,
    pattern_sink: Option<Box<dyn PatternSink>>,
    beat_store: Option<Box<dyn BeatStore>>,
    // beats get their own player: their files live outside the sample root
    beat_player: Option<SamplePlayer>,
    beats: Vec<BeatEntry>,
    selected_beat: Option<usize>,
    beats_open: bool,
    status: String,
}

impl Session {
    pub fn new(
        settings: &Settings,
        backend: Box<dyn AudioBackend>,
        assets: Arc<dyn AssetStore>,
        clock: Box<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let state = TransportState {
            tempo: settings.tempo,
            swing: settings.swing,
            master_volume: settings.master_volume,
            ..TransportState::default()
        };
        Self::assemble(settings, PatternStore::new(settings.default_tracks), state, backend, assets, clock)
    }

    /// Restore a saved project. Blobs that break the row/track invariant are refused.
    pub fn from_snapshot(
        settings: &Settings,
        snapshot: &ProjectSnapshot,
        backend: Box<dyn AudioBackend>,
        assets: Arc<dyn AssetStore>,
        clock: Box<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let store = PatternStore::from_snapshot(snapshot)?;
        let state = TransportState {
            tempo: snapshot.tempo,
            swing: snapshot.swing,
            master_volume: snapshot.master_volume,
            ..TransportState::default()
        };
        Self::assemble(settings, store, state, backend, assets, clock)
    }

    fn assemble(
        settings: &Settings,
        store: PatternStore,
        state: TransportState,
        backend: Box<dyn AudioBackend>,
        assets: Arc<dyn AssetStore>,
        clock: Box<dyn Clock>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            store,
            transport: TransportClock::with_state(clock, state),
            router: OutputRouter::new(backend),
            samples: SamplePlayer::new(Arc::clone(&assets))?,
            assets,
            recorder: Recorder::new(settings.recording_formats.clone()),
            mic: None,
            library: SoundLibrary::with_presets(),
            selected: Some(0),
            pattern_sink: None,
            beat_store: None,
            beat_player: None,
            beats: Vec::new(),
            selected_beat: None,
            beats_open: false,
            status: String::new(),
        })
    }

    pub fn with_pattern_sink(mut self, sink: Box<dyn PatternSink>) -> Self {
        self.pattern_sink = Some(sink);
        self
    }

    pub fn with_beat_store(mut self, store: Box<dyn BeatStore>) -> Self {
        self.beat_store = Some(store);
        if let Err(e) = self.refresh_beats() {
            warn!(error = %format!("{e:#}"), "could not read the beats library");
        }
        self
    }

    pub fn with_mic_input(mut self, input: Box<dyn InputBackend>) -> Self {
        self.mic = Some(MicRecorder::new(input));
        self
    }

    // -- accessors --

    pub fn store(&self) -> &PatternStore {
        &self.store
    }

    pub fn transport(&self) -> &TransportState {
        self.transport.state()
    }

    pub fn router(&self) -> &OutputRouter {
        &self.router
    }

    pub fn library(&self) -> &SoundLibrary {
        &self.library
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn subscribe(&mut self) -> Receiver<TransportEvent> {
        self.transport.subscribe()
    }

    pub fn until_next_step(&self) -> Option<Duration> {
        self.transport.until_next_step()
    }

    fn set_status(&mut self, msg: impl Into<String>) {
        self.status = msg.into();
    }

    // -- output graph --

    // user interactions bring the audio up; failure is reported, not fatal
    fn ensure_output(&mut self) -> bool {
        match self.router.init() {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "audio output unavailable");
                self.set_status(format!("no audio: {e}"));
                false
            }
        }
    }

    /// Tear the output down and open it again. A take in progress is closed
    /// first, since its tap goes away with the old graph, and handed back.
    pub fn reinitialize_output(&mut self) -> anyhow::Result<Option<Recording>> {
        let take = if self.recorder.is_recording() {
            match self.recorder.stop(&self.router) {
                Ok(recording) => Some(recording),
                Err(RecorderError::NothingRecorded) => None,
                Err(e) => return Err(e).context("closing the take before restarting audio"),
            }
        } else {
            None
        };
        self.router.reinitialize()?;
        self.samples.forget_registered();
        if let Some(player) = self.beat_player.as_mut() {
            player.forget_registered();
        }
        info!(kept_take = take.is_some(), "audio output restarted");
        Ok(take)
    }

    // speaker level only, the tap stays pre-fader
    pub fn set_output_level(&mut self, level: f32) -> f32 {
        self.router.set_master_volume(level);
        self.router.master_volume()
    }

    pub fn output_level(&self) -> f32 {
        self.router.master_volume()
    }

    // -- transport --

    pub fn play(&mut self) {
        self.ensure_output();
        self.transport.play();
    }

    pub fn pause(&mut self) {
        self.transport.pause();
    }

    pub fn toggle_play(&mut self) {
        if self.transport.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn stop(&mut self) {
        self.transport.stop();
        self.samples.cancel_pending();
    }

    pub fn rewind(&mut self) {
        self.transport.rewind();
    }

    pub fn set_tempo(&mut self, tempo: u32) -> u32 {
        self.transport.set_tempo(tempo)
    }

    pub fn set_swing(&mut self, swing: u8) -> u8 {
        self.transport.set_swing(swing)
    }

    // applies to voices triggered from now on
    pub fn set_master_volume(&mut self, volume: f32) -> f32 {
        self.transport.set_master_volume(volume)
    }

    /// Fire whatever steps are due, land finished sample fetches, and pull
    /// recorded audio off the tap. Call this often.
    pub fn tick(&mut self) -> usize {
        let master = self.transport.state().master_volume;
        let Self { transport, store, router, samples, .. } = self;
        let fired = transport.advance(|step| {
            if let Some(sink) = router.sink() {
                trigger_step(store, sink, samples, master, step);
            }
        });

        if let Some(sink) = self.router.sink() {
            self.samples.pump(sink);
            if let Some(player) = self.beat_player.as_mut() {
                player.pump(sink);
            }
        }
        self.recorder.collect(&self.router);
        if let Some(mic) = self.mic.as_mut() {
            mic.collect();
        }
        fired
    }

    // wait for outstanding sample fetches (headless rendering, tests)
    pub fn settle_samples(&mut self, timeout: Duration) -> bool {
        let Some(sink) = self.router.sink() else { return true };
        let samples = self.samples.pump_until_idle(sink, timeout);
        let beats = self
            .beat_player
            .as_mut()
            .is_none_or(|player| player.pump_until_idle(sink, timeout));
        samples && beats
    }

    // -- grid edits --

    pub fn toggle_cell(
        &mut self,
        track: usize,
        step: usize,
        selection: Option<&Cell>,
    ) -> Result<ToggleOutcome, StoreError> {
        let outcome = self.store.toggle_cell(track, step, selection)?;
        if let ToggleOutcome::Set { preview } = &outcome {
            self.preview(track, preview);
        }
        Ok(outcome)
    }

    fn preview(&mut self, track: usize, cell: &Cell) {
        let Some(t) = self.store.track(track) else { return };
        if t.muted {
            return;
        }
        let volume = t.volume;
        if !self.ensure_output() {
            return;
        }
        let master = self.transport.state().master_volume;
        if let Some(sink) = self.router.sink() {
            voice(sink, &mut self.samples, cell, volume, master);
        }
    }

    pub fn add_track(&mut self) -> usize {
        self.store.add_track()
    }

    pub fn remove_track(&mut self, index: usize) -> bool {
        self.store.remove_track(index)
    }

    pub fn clear_track(&mut self, index: usize) -> Result<(), StoreError> {
        self.store.clear_track(index)
    }

    pub fn toggle_mute(&mut self, index: usize) -> Result<bool, StoreError> {
        self.store.toggle_mute(index)
    }

    pub fn set_track_volume(&mut self, index: usize, volume: f32) -> Result<f32, StoreError> {
        self.store.set_track_volume(index, volume)
    }

    pub fn rename_track(&mut self, index: usize, name: &str) -> Result<(), StoreError> {
        self.store.rename_track(index, name)
    }

    pub fn add_pattern(&mut self) -> usize {
        self.store.add_pattern()
    }

    // the clock keeps going; the next step reads the new pattern
    pub fn switch_pattern(&mut self, index: usize) -> Result<(), StoreError> {
        self.store.switch_pattern(index)
    }

    // -- sound selection --

    pub fn selected_sound(&self) -> Option<&Cell> {
        self.selected.and_then(|i| self.library.get(i))
    }

    pub fn select_sound(&mut self, index: Option<usize>) {
        self.selected = index.filter(|&i| i < self.library.len());
    }

    fn cycle_sound(&mut self, forward: bool) {
        let len = self.library.len();
        if len == 0 {
            self.selected = None;
            return;
        }
        self.selected = Some(match (self.selected, forward) {
            (None, true) => 0,
            (None, false) => len - 1,
            (Some(i), true) => (i + 1) % len,
            (Some(i), false) => (i + len - 1) % len,
        });
    }

    // generated sounds join the palette like uploads and become the selection
    pub fn add_generated_sound(&mut self, name: &str, file_path: &str) {
        self.library.add_generated(name, file_path);
        self.samples.forget(file_path);
        self.selected = Some(self.library.len() - 1);
    }

    // files found under the sample root; earlier misses get another chance
    pub fn add_samples<P: AsRef<Path>>(&mut self, asset_root: &Path, files: &[P]) {
        self.library.add_samples(asset_root, files);
        self.samples.retry_failed();
    }

    // -- recording --

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    // does not bring the audio up; record needs a graph that already exists
    pub fn start_recording(&mut self) -> Result<(), RecorderError> {
        self.recorder.start(&self.router)
    }

    pub fn stop_recording(&mut self) -> Result<Recording, RecorderError> {
        let recording = self.recorder.stop(&self.router)?;
        info!(
            secs = recording.duration_secs(),
            mime = recording.mime_type,
            dropped = recording.dropped_frames,
            "recording finished"
        );
        Ok(recording)
    }

    pub fn save_recording(&mut self, name: &str, recording: &Recording) -> anyhow::Result<BeatEntry> {
        let store = self.beat_store.as_ref().context("no place to save beats")?;
        let entry = store.persist_beat(name, &recording.bytes, recording.mime_type, self.transport.state().tempo)?;
        if let Some(player) = self.beat_player.as_mut() {
            player.forget(&entry.file);
        }
        self.refresh_beats()?;
        Ok(entry)
    }

    fn toggle_record(&mut self) {
        if !self.recorder.is_recording() {
            match self.start_recording() {
                Ok(()) => self.set_status("recording"),
                Err(e) => self.set_status(e.to_string()),
            }
            return;
        }
        match self.stop_recording() {
            Ok(recording) => self.keep_take(&recording),
            Err(e) => self.set_status(e.to_string()),
        }
    }

    fn keep_take(&mut self, recording: &Recording) {
        let name = format!("beat-{}", unix_now());
        match self.save_recording(&name, recording) {
            Ok(_) => self.set_status(format!("saved {name} ({:.1}s)", recording.duration_secs())),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "could not save beat");
                self.set_status(format!("recorded {:.1}s, not saved: {e}", recording.duration_secs()));
            }
        }
    }

    // -- microphone --

    pub fn is_mic_recording(&self) -> bool {
        self.mic.as_ref().is_some_and(MicRecorder::is_recording)
    }

    pub fn start_mic_recording(&mut self) -> Result<(), RecorderError> {
        self.mic
            .as_mut()
            .ok_or_else(|| RecorderError::NoInput("no input device configured".into()))?
            .start()
    }

    /// Finish the mic take, store it with the other samples and select it.
    pub fn stop_mic_recording(&mut self) -> anyhow::Result<Cell> {
        let format = self.recorder.format();
        let mic = self.mic.as_mut().ok_or(RecorderError::NotRecording)?;
        let take = mic.stop(format)?;

        let name = format!("mic-{}", unix_now_millis());
        let path = format!("recordings/{name}.wav");
        self.assets
            .store_sample(&path, &take.bytes)
            .with_context(|| format!("storing {path}"))?;
        self.add_generated_sound(&name, &path);
        info!(name, secs = take.duration_secs(), "mic take added to the palette");
        Ok(Cell::sample(name, path))
    }

    fn toggle_mic_record(&mut self) {
        if !self.is_mic_recording() {
            match self.start_mic_recording() {
                Ok(()) => self.set_status("recording mic"),
                Err(e) => self.set_status(e.to_string()),
            }
            return;
        }
        match self.stop_mic_recording() {
            Ok(cell) => self.set_status(format!("added {} to the palette", cell.sound_name)),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "mic take lost");
                self.set_status(format!("mic: {e}"));
            }
        }
    }

    // -- beats library --

    pub fn beats(&self) -> &[BeatEntry] {
        &self.beats
    }

    pub fn selected_beat(&self) -> Option<usize> {
        self.selected_beat
    }

    pub fn refresh_beats(&mut self) -> anyhow::Result<()> {
        let store = self.beat_store.as_ref().context("no beats library")?;
        self.beats = store.list_beats()?;
        self.selected_beat = match self.beats.len() {
            0 => None,
            n => Some(self.selected_beat.unwrap_or(0).min(n - 1)),
        };
        Ok(())
    }

    fn cycle_beat(&mut self, forward: bool) {
        let len = self.beats.len();
        if len == 0 {
            return;
        }
        self.selected_beat = Some(match (self.selected_beat, forward) {
            (None, _) => 0,
            (Some(i), true) => (i + 1) % len,
            (Some(i), false) => (i + len - 1) % len,
        });
    }

    /// Play a saved beat once through the shared bus, at the master volume.
    pub fn play_beat(&mut self, index: usize) -> anyhow::Result<()> {
        let entry = self.beats.get(index).cloned().with_context(|| format!("no beat #{}", index + 1))?;
        if self.beat_player.is_none() {
            let store = self.beat_store.as_ref().context("no beats library")?;
            self.beat_player = Some(SamplePlayer::new(store.beat_assets())?);
        }
        self.router.init()?;
        let master = self.transport.state().master_volume;
        if let (Some(sink), Some(player)) = (self.router.sink(), self.beat_player.as_mut()) {
            player.play(sink, &entry.file, master);
        }
        info!(beat = %entry.name, "playing beat");
        Ok(())
    }

    pub fn delete_beat(&mut self, index: usize) -> anyhow::Result<BeatEntry> {
        let entry = self.beats.get(index).cloned().with_context(|| format!("no beat #{}", index + 1))?;
        let store = self.beat_store.as_ref().context("no beats library")?;
        store.delete_beat(&entry.file)?;
        if let Some(player) = self.beat_player.as_mut() {
            player.forget(&entry.file);
        }
        self.refresh_beats()?;
        Ok(entry)
    }

    fn beats_action(&mut self, action: impl FnOnce(&mut Self, usize) -> anyhow::Result<String>) {
        let Some(index) = self.selected_beat else {
            self.set_status("no beat selected");
            return;
        };
        match action(self, index) {
            Ok(msg) => self.set_status(msg),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "beats library");
                self.set_status(format!("{e}"));
            }
        }
    }

    // -- persistence --

    pub fn snapshot(&self) -> ProjectSnapshot {
        let state = self.transport.state();
        let mut snap = ProjectSnapshot {
            patterns: Vec::new(),
            tracks: Vec::new(),
            tempo: state.tempo,
            swing: state.swing,
            master_volume: state.master_volume,
            current_pattern: 0,
            exported_at: None,
        };
        self.store.fill_snapshot(&mut snap);
        snap
    }

    pub fn save_pattern(&self, name: &str) -> anyhow::Result<()> {
        let sink = self
            .pattern_sink
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no place to save patterns"))?;
        let snap = ProjectSnapshot { exported_at: Some(unix_now()), ..self.snapshot() };
        sink.save_pattern(name, &snap.to_json()?)
    }

    // -- ui --

    /// Apply one UI event. Returns false once the user asked to quit.
    pub fn handle_input(&mut self, event: InputEvent) -> bool {
        debug!(?event, "input");
        let result: Result<(), StoreError> = match event {
            InputEvent::Quit => return false,

            InputEvent::TogglePlay => {
                self.toggle_play();
                Ok(())
            }
            InputEvent::Stop => {
                self.stop();
                Ok(())
            }
            InputEvent::Rewind => {
                self.rewind();
                Ok(())
            }

            InputEvent::ToggleCell { track, step } => {
                let selection = self.selected_sound().cloned();
                self.toggle_cell(track, step, selection.as_ref()).map(|_| ())
            }
            InputEvent::ClearCell { track, step } => self.toggle_cell(track, step, None).map(|_| ()),

            InputEvent::NextSound => {
                self.cycle_sound(true);
                Ok(())
            }
            InputEvent::PrevSound => {
                self.cycle_sound(false);
                Ok(())
            }
            InputEvent::ClearSelection => {
                self.select_sound(None);
                Ok(())
            }

            InputEvent::ToggleMute(track) => self.toggle_mute(track).map(|_| ()),
            InputEvent::AdjustTrackVolume { track, delta } => {
                let current = self.store.track(track).map_or(0.0, |t| t.volume);
                self.set_track_volume(track, current + delta).map(|_| ())
            }
            InputEvent::AddTrack => {
                self.add_track();
                Ok(())
            }
            InputEvent::RemoveTrack(track) => {
                if !self.remove_track(track) {
                    self.set_status("can't remove the last track");
                }
                Ok(())
            }
            InputEvent::ClearTrack(track) => self.clear_track(track),
            InputEvent::RenameTrack { track, name } => self.rename_track(track, &name),

            InputEvent::AddPattern => {
                self.add_pattern();
                Ok(())
            }
            InputEvent::SelectPattern(index) => self.switch_pattern(index),
            InputEvent::NextPattern => {
                let next = (self.store.current_index() + 1) % self.store.num_patterns();
                self.switch_pattern(next)
            }
            InputEvent::SavePattern => {
                let name = format!("pattern-{}", self.store.current_index() + 1);
                match self.save_pattern(&name) {
                    Ok(()) => self.set_status(format!("saved {name}")),
                    Err(e) => self.set_status(format!("save failed: {e}")),
                }
                Ok(())
            }

            InputEvent::AdjustTempo(delta) => {
                let tempo = (self.transport.state().tempo as i64 + delta as i64).max(0) as u32;
                self.set_tempo(tempo);
                Ok(())
            }
            InputEvent::AdjustSwing(delta) => {
                let swing = (self.transport.state().swing as i32 + delta).clamp(0, u8::MAX as i32) as u8;
                self.set_swing(swing);
                Ok(())
            }
            InputEvent::AdjustMasterVolume(delta) => {
                let volume = self.transport.state().master_volume + delta;
                self.set_master_volume(volume);
                Ok(())
            }
            InputEvent::AdjustOutputLevel(delta) => {
                let level = self.set_output_level(self.output_level() + delta);
                self.set_status(format!("output {:.0}%", level * 100.0));
                Ok(())
            }
            InputEvent::RestartAudio => {
                match self.reinitialize_output() {
                    Ok(Some(take)) => self.keep_take(&take),
                    Ok(None) => self.set_status("audio restarted"),
                    Err(e) => {
                        warn!(error = %format!("{e:#}"), "audio restart failed");
                        self.set_status(format!("audio restart failed: {e}"));
                    }
                }
                Ok(())
            }

            InputEvent::ToggleRecord => {
                self.toggle_record();
                Ok(())
            }
            InputEvent::ToggleMicRecord => {
                self.toggle_mic_record();
                Ok(())
            }

            InputEvent::ToggleBeats => {
                self.beats_open = !self.beats_open;
                if self.beats_open {
                    if let Err(e) = self.refresh_beats() {
                        self.set_status(format!("{e}"));
                    }
                }
                Ok(())
            }
            InputEvent::NextBeat => {
                self.cycle_beat(true);
                Ok(())
            }
            InputEvent::PrevBeat => {
                self.cycle_beat(false);
                Ok(())
            }
            InputEvent::PlayBeat => {
                self.beats_action(|s, i| s.play_beat(i).map(|()| format!("playing {}", s.beats[i].name)));
                Ok(())
            }
            InputEvent::DeleteBeat => {
                self.beats_action(|s, i| s.delete_beat(i).map(|b| format!("deleted {}", b.name)));
                Ok(())
            }
        };

        if let Err(e) = result {
            self.set_status(e.to_string());
        }
        true
    }

    pub fn display_state(&self) -> DisplayState {
        let pattern = self.store.current_pattern();
        let tracks = self
            .store
            .tracks()
            .iter()
            .enumerate()
            .map(|(i, t)| TrackView {
                name: t.name.clone(),
                muted: t.muted,
                volume: t.volume,
                cells: std::array::from_fn(|step| {
                    pattern
                        .rows
                        .get(i)
                        .and_then(|row| row[step].as_ref())
                        .map(Cell::abbrev)
                }),
            })
            .collect();

        let state = self.transport.state();
        DisplayState {
            tracks,
            play_state: state.play_state,
            current_step: state.current_step,
            tempo: state.tempo,
            swing: state.swing,
            master_volume: state.master_volume,
            pattern: self.store.current_index(),
            num_patterns: self.store.num_patterns(),
            output_level: self.router.master_volume(),
            palette: self.library.entries.iter().map(|c| c.sound_name.clone()).collect(),
            selected_sound: self.selected,
            recording: self.recorder.is_recording(),
            mic_recording: self.is_mic_recording(),
            beats_open: self.beats_open,
            beats: self
                .beats
                .iter()
                .map(|b| format!("{}  {} bpm  {:.1}s", b.name, b.tempo, b.duration))
                .collect(),
            selected_beat: self.selected_beat,
            status: self.status.clone(),
        }
    }
}

// every non-empty, unmuted cell of `step`; rows the pattern lacks are skipped
fn trigger_step(store: &PatternStore, sink: &dyn AudioSink, samples: &mut SamplePlayer, master: f32, step: u8) {
    for (index, track) in store.tracks().iter().enumerate() {
        let Some(row) = store.row(index) else {
            debug!(track = index, "no row for track this tick");
            continue;
        };
        let Some(cell) = row.get(step as usize).and_then(Option::as_ref) else { continue };
        if track.muted {
            continue;
        }
        voice(sink, samples, cell, track.volume, master);
    }
}

fn voice(sink: &dyn AudioSink, samples: &mut SamplePlayer, cell: &Cell, track_volume: f32, master: f32) {
    match resolve(cell) {
        SoundSource::Synthesized(recipe) => {
            synth_engine::trigger(sink, recipe, track_volume, master);
        }
        SoundSource::Sampled(path) => samples.play(sink, &path, master),
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn unix_now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
