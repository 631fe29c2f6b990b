use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use tracing::{error, info};

use crate::audio_api::{
    AudioBackend, AudioCommand, AudioSink, InputBackend, InputStream, TapBlock, TapWriter,
};

mod engine;
mod frame;
mod sample_buffer;
mod sample_id;
mod synth;
mod voice;

pub use engine::{Engine, MAX_VOICES};
pub use frame::StereoFrame;
pub use sample_buffer::SampleBuffer;
pub use sample_id::{next_sample_id, next_voice_id, SampleId, VoiceId};
pub use synth::{EnvelopeShape, SynthParams, Waveform};

#[cfg(test)]
pub(crate) use sample_buffer::fixtures;

const COMMAND_QUEUE: usize = 1024;

// ── Device output ─────────────────────────────────────────────────

pub struct AudioHandle {
    tx: Sender<AudioCommand>,
    sample_rate: u32,
    _output_stream: cpal::Stream,
}

impl AudioSink for AudioHandle {
    fn send(&self, cmd: AudioCommand) {
        // a full queue means the callback has stalled; dropping beats blocking the clock
        let _ = self.tx.try_send(cmd);
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

// Default output device through cpal
#[derive(Default)]
pub struct CpalBackend;

impl AudioBackend for CpalBackend {
    fn open(&mut self, tap: Sender<TapBlock>) -> anyhow::Result<Box<dyn AudioSink>> {
        Ok(Box::new(start_audio(tap)?))
    }
}

pub fn start_audio(tap: Sender<TapBlock>) -> anyhow::Result<AudioHandle> {
    let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(COMMAND_QUEUE);

    let host = cpal::default_host();
    let device = host.default_output_device().context("no default output device")?;
    let config = device.default_output_config().context("no default output config")?;

    let sample_rate: u32 = config.sample_rate();
    let channels = config.channels() as usize;

    match config.sample_format() {
        cpal::SampleFormat::F32 => {
            let engine = Engine::new(sample_rate, tap);
            let output_stream = build_output_stream_f32(&device, &config.into(), rx, engine, channels)?;
            output_stream.play().context("failed to play output stream")?;
            info!(sample_rate, channels, "audio output started");

            Ok(AudioHandle {
                tx,
                sample_rate,
                _output_stream: output_stream,
            })
        }
        other => anyhow::bail!("unsupported sample format {other:?} (only f32 supported for now)"),
    }
}

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<AudioCommand>,
    mut engine: Engine,
    channels: usize,
) -> anyhow::Result<cpal::Stream> {
    let mut scratch: Vec<StereoFrame> = vec![StereoFrame::zero(); 4096];

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info| {
            while let Ok(cmd) = rx.try_recv() {
                engine.handle_cmd(cmd);
            }

            let n_frames = data.len() / channels.max(1);
            if scratch.len() < n_frames {
                scratch.resize(n_frames, StereoFrame::zero());
            }
            let frames = &mut scratch[..n_frames];
            engine.render_block(frames);

            for (out, frame) in data.chunks_exact_mut(channels.max(1)).zip(frames.iter()) {
                for (ch, sample) in out.iter_mut().enumerate() {
                    *sample = match ch {
                        0 => frame.left,
                        1 => frame.right,
                        _ => 0.0,
                    };
                }
            }
        },
        |err| error!("audio output stream error: {err}"),
        None,
    )?;

    Ok(stream)
}

// ── Device input ──────────────────────────────────────────────────

struct MicStream {
    sample_rate: u32,
    _stream: cpal::Stream,
}

impl InputStream for MicStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

// Default input device through cpal, opened only while a mic take runs
#[derive(Default)]
pub struct CpalInput;

impl InputBackend for CpalInput {
    fn open_input(&mut self, tx: Sender<TapBlock>) -> anyhow::Result<Box<dyn InputStream>> {
        let host = cpal::default_host();
        let device = host.default_input_device().context("no default input device")?;
        let config = device.default_input_config().context("no default input config")?;
        if config.sample_format() != cpal::SampleFormat::F32 {
            anyhow::bail!("unsupported input format {:?} (only f32 supported for now)", config.sample_format());
        }

        let sample_rate: u32 = config.sample_rate();
        let channels = (config.channels() as usize).max(1);
        let mut writer = TapWriter::new(tx);

        let stream = device.build_input_stream(
            &config.into(),
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                let mut block = TapBlock::empty(true);
                for c in data.chunks_exact(channels) {
                    block.push(StereoFrame {
                        left: c[0],
                        right: if channels > 1 { c[1] } else { c[0] },
                    });
                    if block.is_full() {
                        writer.send(block);
                        block = TapBlock::empty(true);
                    }
                }
                if !block.is_empty() {
                    writer.send(block);
                }
            },
            |err| error!("audio input stream error: {err}"),
            None,
        )?;
        stream.play().context("failed to start input stream")?;
        info!(sample_rate, channels, "microphone open");

        Ok(Box::new(MicStream {
            sample_rate,
            _stream: stream,
        }))
    }
}

// ── Offline rendering ─────────────────────────────────────────────

// Engine driven by hand instead of a device callback; used headless and in tests.
pub struct OfflineBackend {
    sample_rate: u32,
    shared: Rc<RefCell<OfflineState>>,
}

struct OfflineState {
    engine: Option<Engine>,
    log: Vec<AudioCommand>,
    opened: usize,
}

impl OfflineBackend {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            shared: Rc::new(RefCell::new(OfflineState {
                engine: None,
                log: Vec::new(),
                opened: 0,
            })),
        }
    }

    pub fn renderer(&self) -> OfflineRenderer {
        OfflineRenderer {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl AudioBackend for OfflineBackend {
    fn open(&mut self, tap: Sender<TapBlock>) -> anyhow::Result<Box<dyn AudioSink>> {
        let mut state = self.shared.borrow_mut();
        state.engine = Some(Engine::new(self.sample_rate, tap));
        state.opened += 1;
        Ok(Box::new(OfflineSink {
            sample_rate: self.sample_rate,
            shared: Rc::clone(&self.shared),
        }))
    }
}

struct OfflineSink {
    sample_rate: u32,
    shared: Rc<RefCell<OfflineState>>,
}

impl AudioSink for OfflineSink {
    fn send(&self, cmd: AudioCommand) {
        let mut state = self.shared.borrow_mut();
        state.log.push(cmd.clone());
        if let Some(engine) = state.engine.as_mut() {
            engine.handle_cmd(cmd);
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

// Pulls audio out of an offline engine and exposes what was sent to it.
#[derive(Clone)]
pub struct OfflineRenderer {
    shared: Rc<RefCell<OfflineState>>,
}

impl OfflineRenderer {
    pub fn render(&self, frames: usize) -> Vec<StereoFrame> {
        let mut out = vec![StereoFrame::zero(); frames];
        if let Some(engine) = self.shared.borrow_mut().engine.as_mut() {
            engine.render_block(&mut out);
        }
        out
    }

    pub fn take_commands(&self) -> Vec<AudioCommand> {
        std::mem::take(&mut self.shared.borrow_mut().log)
    }

    pub fn active_voices(&self) -> usize {
        self.shared
            .borrow()
            .engine
            .as_ref()
            .map_or(0, Engine::active_voices)
    }

    pub fn master_gain(&self) -> Option<f32> {
        self.shared.borrow().engine.as_ref().map(Engine::master_gain)
    }

    // how many times an engine was built; the router must only do it once
    pub fn times_opened(&self) -> usize {
        self.shared.borrow().opened
    }
}

// ── Offline input ─────────────────────────────────────────────────

// Stand-in microphone: frames pushed through `OfflineMic::feed` arrive as if
// a device had captured them, but only while a capture is open.
pub struct OfflineInput {
    sample_rate: u32,
    writer: Rc<RefCell<Option<TapWriter>>>,
}

impl OfflineInput {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            writer: Rc::new(RefCell::new(None)),
        }
    }

    pub fn mic(&self) -> OfflineMic {
        OfflineMic {
            writer: Rc::clone(&self.writer),
        }
    }
}

impl InputBackend for OfflineInput {
    fn open_input(&mut self, tx: Sender<TapBlock>) -> anyhow::Result<Box<dyn InputStream>> {
        *self.writer.borrow_mut() = Some(TapWriter::new(tx));
        Ok(Box::new(OfflineInputStream {
            sample_rate: self.sample_rate,
            writer: Rc::clone(&self.writer),
        }))
    }
}

struct OfflineInputStream {
    sample_rate: u32,
    writer: Rc<RefCell<Option<TapWriter>>>,
}

impl InputStream for OfflineInputStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for OfflineInputStream {
    fn drop(&mut self) {
        self.writer.borrow_mut().take();
    }
}

#[derive(Clone)]
pub struct OfflineMic {
    writer: Rc<RefCell<Option<TapWriter>>>,
}

impl OfflineMic {
    // false when nothing is listening
    pub fn feed(&self, frames: &[StereoFrame]) -> bool {
        let mut writer = self.writer.borrow_mut();
        let Some(writer) = writer.as_mut() else {
            return false;
        };
        for piece in frames.chunks(crate::audio_api::TAP_BLOCK) {
            writer.send(TapBlock::from_frames(piece, true));
        }
        true
    }
}
