use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::audio_api::{AudioCommand, TapBlock, TapWriter, TAP_BLOCK};

use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;
use super::sample_id::SampleId;
#[cfg(test)]
use super::sample_id::VoiceId;
use super::synth::SynthVoice;
use super::voice::SampleVoice;

pub const MAX_VOICES: usize = 64; // hard cap, oldest voice gets stolen past this
pub const MAX_BLOCK: usize = 4096;

enum ActiveVoice {
    Synth(SynthVoice),
    Sample(SampleVoice),
}

impl ActiveVoice {
    #[cfg(test)]
    fn id(&self) -> VoiceId {
        match self {
            ActiveVoice::Synth(v) => v.id,
            ActiveVoice::Sample(v) => v.id,
        }
    }

    fn render_into(&mut self, bus: &mut [StereoFrame]) -> bool {
        match self {
            ActiveVoice::Synth(v) => v.render_into(bus),
            ActiveVoice::Sample(v) => v.render_into(bus),
        }
    }
}

// Render side of the output router: every voice sums into one bus, the bus
// goes out through the master gain and, while recording, into the tap.
pub struct Engine {
    sample_rate: f32,
    samples: HashMap<SampleId, Arc<SampleBuffer>>,
    voices: Vec<ActiveVoice>,
    bus: Vec<StereoFrame>,
    master_gain: f32,
    tap: TapWriter,
    tap_active: bool,
}

impl Engine {
    pub fn new(sample_rate: u32, tap: Sender<TapBlock>) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            samples: HashMap::new(),
            voices: Vec::with_capacity(MAX_VOICES),
            bus: vec![StereoFrame::zero(); MAX_BLOCK],
            master_gain: 1.0,
            tap: TapWriter::new(tap),
            tap_active: false,
        }
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::RegisterSample { id, buffer } => {
                self.samples.insert(id, buffer);
            }
            AudioCommand::PlaySample { voice, sample, gain } => {
                // unknown ids are dropped; the loader always registers first
                if let Some(buffer) = self.samples.get(&sample) {
                    let v = SampleVoice::new(voice, Arc::clone(buffer), gain);
                    self.push_voice(ActiveVoice::Sample(v));
                }
            }
            AudioCommand::PlaySynth { voice, params } => {
                let v = SynthVoice::new(voice, &params, self.sample_rate);
                self.push_voice(ActiveVoice::Synth(v));
            }
            AudioCommand::SetMasterGain(gain) => {
                self.master_gain = gain.clamp(0.0, 1.0);
            }
            AudioCommand::SetTapActive(active) => {
                if !active && self.tap.dropped() > 0 {
                    // an empty block still carries the count of a lost tail
                    self.tap.send(TapBlock::empty(false));
                }
                self.tap.reset();
                self.tap_active = active;
            }
        }
    }

    fn push_voice(&mut self, voice: ActiveVoice) {
        if self.voices.len() >= MAX_VOICES {
            // voices are pushed in trigger order, so index 0 is the oldest
            self.voices.remove(0);
        }
        self.voices.push(voice);
    }

    pub fn render_block(&mut self, out: &mut [StereoFrame]) {
        for chunk in out.chunks_mut(MAX_BLOCK) {
            self.render_chunk(chunk);
        }
    }

    fn render_chunk(&mut self, out: &mut [StereoFrame]) {
        let n = out.len();
        let bus = &mut self.bus[..n];
        bus.fill(StereoFrame::zero());

        let voiced = !self.voices.is_empty();
        self.voices.retain_mut(|v| v.render_into(bus));

        // every block goes to the recorder, silence included, so a take
        // keeps the gaps between hits
        if self.tap_active {
            for piece in bus.chunks(TAP_BLOCK) {
                self.tap.send(TapBlock::from_frames(piece, voiced));
            }
        }

        for (o, b) in out.iter_mut().zip(bus.iter()) {
            *o = b.scaled(self.master_gain);
        }
    }

    #[cfg(test)]
    fn voice_ids(&self) -> Vec<VoiceId> {
        self.voices.iter().map(ActiveVoice::id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sample_id::{next_sample_id, next_voice_id};
    use crate::audio::synth::{EnvelopeShape, SynthParams, Waveform};

    fn synth(duration: f32) -> AudioCommand {
        AudioCommand::PlaySynth {
            voice: next_voice_id(),
            params: SynthParams {
                waveform: Waveform::Sine,
                frequency: 220.0,
                filter_cutoff: 2_000.0,
                envelope: EnvelopeShape::fitted(duration, 0.7),
            },
        }
    }

    #[test]
    fn tap_mirrors_silent_blocks_too() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut engine = Engine::new(8_000, tx);
        let mut out = vec![StereoFrame::zero(); 256];
        engine.render_block(&mut out);
        assert!(rx.try_recv().is_err(), "tap is off until recording starts");

        engine.handle_cmd(AudioCommand::SetTapActive(true));
        engine.render_block(&mut out);
        let silent = rx.try_recv().expect("silent block");
        assert_eq!(silent.len(), 256);
        assert!(!silent.voiced);

        engine.handle_cmd(synth(0.1));
        engine.render_block(&mut out);
        let sounding = rx.try_recv().expect("voiced block");
        assert!(sounding.voiced);
        assert!(sounding.frames().iter().any(|f| f.peak() > 0.0));
    }

    #[test]
    fn long_renders_are_split_into_tap_blocks() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut engine = Engine::new(8_000, tx);
        engine.handle_cmd(AudioCommand::SetTapActive(true));
        let mut out = vec![StereoFrame::zero(); 1_000];
        engine.render_block(&mut out);
        let lens: Vec<usize> = rx.try_iter().map(|b| b.len()).collect();
        assert_eq!(lens, vec![TAP_BLOCK, 1_000 - TAP_BLOCK]);
    }

    #[test]
    fn overflowed_tail_is_reported_when_the_tap_closes() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut engine = Engine::new(8_000, tx);
        engine.handle_cmd(AudioCommand::SetTapActive(true));
        let mut out = vec![StereoFrame::zero(); 300];
        engine.render_block(&mut out);
        engine.render_block(&mut out); // queue full, lost
        assert_eq!(rx.try_recv().unwrap().dropped_before, 0);

        engine.handle_cmd(AudioCommand::SetTapActive(false));
        let tail = rx.try_recv().unwrap();
        assert!(tail.is_empty());
        assert_eq!(tail.dropped_before, 300);
    }

    #[test]
    fn master_gain_scales_speakers_not_tap() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut engine = Engine::new(8_000, tx);
        engine.handle_cmd(AudioCommand::SetTapActive(true));
        engine.handle_cmd(AudioCommand::SetMasterGain(0.0));
        engine.handle_cmd(synth(0.2));

        let mut out = vec![StereoFrame::zero(); 512];
        engine.render_block(&mut out);
        assert!(out.iter().all(|f| f.peak() == 0.0));
        let block = rx.try_recv().unwrap();
        assert!(block.frames().iter().any(|f| f.peak() > 0.0));
    }

    #[test]
    fn finished_voices_are_released() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut engine = Engine::new(8_000, tx);
        engine.handle_cmd(synth(0.01));
        assert_eq!(engine.active_voices(), 1);
        let mut out = vec![StereoFrame::zero(); 200];
        engine.render_block(&mut out);
        assert_eq!(engine.active_voices(), 0);
    }

    #[test]
    fn sample_needs_registration() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut engine = Engine::new(8_000, tx);
        let id = next_sample_id();
        engine.handle_cmd(AudioCommand::PlaySample { voice: next_voice_id(), sample: id, gain: 1.0 });
        assert_eq!(engine.active_voices(), 0);

        let buffer = Arc::new(SampleBuffer { data: vec![StereoFrame::mono(0.25); 64] });
        engine.handle_cmd(AudioCommand::RegisterSample { id, buffer });
        engine.handle_cmd(AudioCommand::PlaySample { voice: next_voice_id(), sample: id, gain: 1.0 });
        assert_eq!(engine.active_voices(), 1);
    }

    #[test]
    fn oldest_voice_is_stolen_at_the_cap() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut engine = Engine::new(8_000, tx);
        for _ in 0..MAX_VOICES {
            engine.handle_cmd(synth(1.0));
        }
        let first = engine.voice_ids()[0];
        engine.handle_cmd(synth(1.0));
        assert_eq!(engine.active_voices(), MAX_VOICES);
        assert!(!engine.voice_ids().contains(&first));
    }
}
