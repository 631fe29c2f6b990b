use std::sync::Arc;

use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;
use super::sample_id::VoiceId;

// One-shot playback of a decoded sample at a fixed linear gain
#[derive(Clone, Debug)]
pub struct SampleVoice {
    pub id: VoiceId,
    buffer: Arc<SampleBuffer>,
    pos: usize,
    gain: f32,
}

impl SampleVoice {
    pub fn new(id: VoiceId, buffer: Arc<SampleBuffer>, gain: f32) -> Self {
        Self {
            id,
            buffer,
            pos: 0,
            gain: gain.clamp(0.0, 1.0),
        }
    }

    pub fn is_active(&self) -> bool {
        self.pos < self.buffer.data.len()
    }

    // mixes the next frames into the bus; false once the sample has played out
    pub fn render_into(&mut self, out: &mut [StereoFrame]) -> bool {
        let remaining = &self.buffer.data[self.pos.min(self.buffer.data.len())..];
        let n = remaining.len().min(out.len());
        for (frame, sample) in out.iter_mut().zip(&remaining[..n]) {
            frame.accumulate(sample.scaled(self.gain));
        }
        self.pos += n;
        self.is_active()
    }
}
