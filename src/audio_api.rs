// The only way the control side talks to the audio thread.
use std::sync::Arc;

use crossbeam_channel::Sender;

pub use crate::audio::{SampleBuffer, SampleId, StereoFrame, SynthParams, VoiceId};

#[derive(Clone, Debug)]
pub enum AudioCommand {
    // The engine can't decode files (would stall the callback), so the
    // loader hands it a ready buffer first and triggers by id afterwards
    RegisterSample { id: SampleId, buffer: Arc<SampleBuffer> },

    PlaySample { voice: VoiceId, sample: SampleId, gain: f32 },
    PlaySynth { voice: VoiceId, params: SynthParams },

    // listening-path gain after the fan-out point
    SetMasterGain(f32),
    // start/stop mirroring the bus into the recording tap
    SetTapActive(bool),
}

pub const TAP_BLOCK: usize = 512; // frames

/// A fixed-size block of captured audio: the bus mirrored to the recorder,
/// or microphone input. Travels by value, so producers on the audio thread
/// never touch the heap.
#[derive(Clone, Copy, Debug)]
pub struct TapBlock {
    frames: [StereoFrame; TAP_BLOCK],
    len: usize,
    /// at least one voice was rendered into this block
    pub voiced: bool,
    /// frames lost to a full queue right before this block
    pub dropped_before: u32,
}

impl TapBlock {
    pub fn empty(voiced: bool) -> Self {
        Self {
            frames: [StereoFrame::zero(); TAP_BLOCK],
            len: 0,
            voiced,
            dropped_before: 0,
        }
    }

    // anything past TAP_BLOCK frames is cut off
    pub fn from_frames(frames: &[StereoFrame], voiced: bool) -> Self {
        let mut block = Self::empty(voiced);
        let n = frames.len().min(TAP_BLOCK);
        block.frames[..n].copy_from_slice(&frames[..n]);
        block.len = n;
        block
    }

    // false once the block is full
    pub fn push(&mut self, frame: StereoFrame) -> bool {
        if self.is_full() {
            return false;
        }
        self.frames[self.len] = frame;
        self.len += 1;
        true
    }

    pub fn frames(&self) -> &[StereoFrame] {
        &self.frames[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == TAP_BLOCK
    }
}

/// Producer end of a tap queue. Never blocks: when the queue is full the
/// block is dropped and its length is stamped onto the next one that fits,
/// so the consumer can keep the timeline intact.
pub struct TapWriter {
    tx: Sender<TapBlock>,
    dropped: u32,
}

impl TapWriter {
    pub fn new(tx: Sender<TapBlock>) -> Self {
        Self { tx, dropped: 0 }
    }

    pub fn send(&mut self, mut block: TapBlock) {
        block.dropped_before = self.dropped;
        let len = block.len() as u32;
        match self.tx.try_send(block) {
            Ok(()) => self.dropped = 0,
            Err(_) => self.dropped = self.dropped.saturating_add(len),
        }
    }

    // frames waiting to be reported
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub fn reset(&mut self) {
        self.dropped = 0;
    }
}

// Anything that accepts commands for a running engine: the cpal handle or
// the offline renderer.
pub trait AudioSink {
    fn send(&self, cmd: AudioCommand);
    fn sample_rate(&self) -> u32;
}

// Starts an engine whose bus is mirrored into `tap`.
pub trait AudioBackend {
    fn open(&mut self, tap: Sender<TapBlock>) -> anyhow::Result<Box<dyn AudioSink>>;
}

// A running capture. Dropping it stops the device.
pub trait InputStream {
    fn sample_rate(&self) -> u32;
}

// Opens the microphone, delivering what it hears into `tx`.
pub trait InputBackend {
    fn open_input(&mut self, tx: Sender<TapBlock>) -> anyhow::Result<Box<dyn InputStream>>;
}
