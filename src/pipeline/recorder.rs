// Captures the recording tap into an encoded WAV.

use std::io::Cursor;

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::audio::StereoFrame;
use crate::audio_api::{AudioCommand, TapBlock};
use crate::error::RecorderError;
use crate::pipeline::router::OutputRouter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingFormat {
    WavFloat32,
    WavPcm16,
}

impl RecordingFormat {
    pub const PREFERENCE: [RecordingFormat; 2] = [RecordingFormat::WavFloat32, RecordingFormat::WavPcm16];

    pub fn mime_type(self) -> &'static str {
        match self {
            RecordingFormat::WavFloat32 => "audio/wav;codecs=3",
            RecordingFormat::WavPcm16 => "audio/wav;codecs=1",
        }
    }

    // hound writes both; kept as a hook for encoders that might not be
    pub fn is_supported(self) -> bool {
        true
    }

    fn wav_spec(self, sample_rate: u32) -> hound::WavSpec {
        let (bits_per_sample, sample_format) = match self {
            RecordingFormat::WavFloat32 => (32, hound::SampleFormat::Float),
            RecordingFormat::WavPcm16 => (16, hound::SampleFormat::Int),
        };
        hound::WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample,
            sample_format,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Recording {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub sample_rate: u32,
    pub frames: usize,
    pub dropped_frames: usize, // overflowed the tap, written as silence
}

impl Recording {
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames as f32 / self.sample_rate as f32
    }
}

/// Frames gathered from a tap queue for one take.
pub(crate) struct Capture {
    frames: Vec<StereoFrame>,
    sample_rate: u32,
    voiced: bool,
    dropped: usize,
}

impl Capture {
    pub(crate) fn new(sample_rate: u32) -> Self {
        Self {
            frames: Vec::new(),
            sample_rate,
            voiced: false,
            dropped: 0,
        }
    }

    pub(crate) fn absorb(&mut self, block: TapBlock) {
        if block.dropped_before > 0 {
            // lost blocks become silence so later hits stay in time
            let lost = block.dropped_before as usize;
            self.dropped += lost;
            self.frames.resize(self.frames.len() + lost, StereoFrame::zero());
        }
        self.voiced |= block.voiced;
        self.frames.extend_from_slice(block.frames());
    }

    pub(crate) fn drain(&mut self, tap: &Receiver<TapBlock>) {
        for block in tap.try_iter() {
            self.absorb(block);
        }
    }

    pub(crate) fn finish(self, format: RecordingFormat) -> Result<Recording, RecorderError> {
        if !self.voiced || self.frames.is_empty() {
            return Err(RecorderError::NothingRecorded);
        }
        if self.dropped > 0 {
            warn!(dropped = self.dropped, "tap queue overflowed, gaps filled with silence");
        }
        let bytes = encode(format, self.sample_rate, &self.frames)?;
        debug!(frames = self.frames.len(), bytes = bytes.len(), mime = format.mime_type(), "recording encoded");
        Ok(Recording {
            bytes,
            mime_type: format.mime_type(),
            sample_rate: self.sample_rate,
            frames: self.frames.len(),
            dropped_frames: self.dropped,
        })
    }
}

pub struct Recorder {
    formats: Vec<RecordingFormat>,
    capture: Option<Capture>,
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new(RecordingFormat::PREFERENCE.to_vec())
    }
}

impl Recorder {
    pub fn new(formats: Vec<RecordingFormat>) -> Self {
        Self { formats, capture: None }
    }

    pub fn is_recording(&self) -> bool {
        self.capture.is_some()
    }

    pub fn format(&self) -> RecordingFormat {
        self.formats
            .iter()
            .copied()
            .find(|f| f.is_supported())
            .unwrap_or(RecordingFormat::WavPcm16)
    }

    pub fn start(&mut self, router: &OutputRouter) -> Result<(), RecorderError> {
        if self.is_recording() {
            return Ok(());
        }
        let (Some(sink), Some(tap)) = (router.sink(), router.tap()) else {
            return Err(RecorderError::Unavailable);
        };
        // leftovers from an earlier take
        for _ in tap.try_iter() {}
        sink.send(AudioCommand::SetTapActive(true));
        self.capture = Some(Capture::new(sink.sample_rate()));
        info!("recording started");
        Ok(())
    }

    /// Move whatever the tap has produced into the current take.
    pub fn collect(&mut self, router: &OutputRouter) {
        if let (Some(capture), Some(tap)) = (self.capture.as_mut(), router.tap()) {
            capture.drain(tap);
        }
    }

    pub fn stop(&mut self, router: &OutputRouter) -> Result<Recording, RecorderError> {
        if !self.is_recording() {
            return Err(RecorderError::NotRecording);
        }
        if let Some(sink) = router.sink() {
            sink.send(AudioCommand::SetTapActive(false));
        }
        self.collect(router);
        let capture = self.capture.take().ok_or(RecorderError::NotRecording)?;
        capture.finish(self.format())
    }
}

fn encode(format: RecordingFormat, sample_rate: u32, frames: &[StereoFrame]) -> Result<Vec<u8>, RecorderError> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, format.wav_spec(sample_rate))?;
        for frame in frames {
            for s in [frame.left, frame.right] {
                match format {
                    RecordingFormat::WavFloat32 => writer.write_sample(s)?,
                    RecordingFormat::WavPcm16 => {
                        writer.write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?
                    }
                }
            }
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}
