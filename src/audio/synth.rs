// Synth voice DSP: oscillator -> lowpass -> envelope gain.
//
// Everything in here runs inside the audio callback, so no allocation
// after construction.

use std::f32::consts::{PI, TAU};

use serde::{Deserialize, Serialize};

use super::frame::StereoFrame;
use super::sample_id::VoiceId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    // phase is in [0, 1)
    #[inline]
    fn sample(self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => (phase * TAU).sin(),
            Waveform::Square => {
                if phase < 0.5 { 1.0 } else { -1.0 }
            }
            Waveform::Sawtooth => 2.0 * phase - 1.0,
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        }
    }
}

/// Piecewise-linear amplitude envelope spanning a voice's whole lifetime.
///
/// 0 -> peak over `attack`, peak -> peak * sustain over `decay`, hold, then
/// down to 0 over `release`, which ends exactly at `duration`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnvelopeShape {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
    pub duration: f32,
    pub peak: f32,
}

impl EnvelopeShape {
    pub const ATTACK: f32 = 0.01;
    pub const DECAY: f32 = 0.1;
    pub const SUSTAIN: f32 = 0.5;
    pub const RELEASE: f32 = 0.2;

    /// Default windows, shrunk proportionally when they don't fit in `duration`.
    pub fn fitted(duration: f32, peak: f32) -> Self {
        let duration = duration.max(0.0);
        let windows = Self::ATTACK + Self::DECAY + Self::RELEASE;
        let scale = if windows > duration { duration / windows } else { 1.0 };
        Self {
            attack: Self::ATTACK * scale,
            decay: Self::DECAY * scale,
            sustain: Self::SUSTAIN,
            release: Self::RELEASE * scale,
            duration,
            peak,
        }
    }

    pub fn level_at(&self, t: f32) -> f32 {
        if t <= 0.0 || t >= self.duration {
            return 0.0;
        }
        let held = self.peak * self.sustain;
        let release_start = self.duration - self.release;
        if t < self.attack {
            self.peak * t / self.attack
        } else if t < self.attack + self.decay {
            let progress = (t - self.attack) / self.decay;
            self.peak - (self.peak - held) * progress
        } else if t < release_start {
            held
        } else {
            held * (self.duration - t) / self.release
        }
    }
}

// Topology-preserving state-variable lowpass (two trapezoidal integrators).
#[derive(Clone, Debug)]
struct LowPass {
    ic1eq: f32,
    ic2eq: f32,
    g: f32,
    k: f32,
}

impl LowPass {
    fn new(cutoff_hz: f32, sample_rate: f32) -> Self {
        // keep the prewarp finite near nyquist
        let cutoff = cutoff_hz.clamp(10.0, sample_rate * 0.49);
        Self {
            ic1eq: 0.0,
            ic2eq: 0.0,
            g: (PI * cutoff / sample_rate).tan(),
            k: std::f32::consts::SQRT_2,
        }
    }

    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        let h = 1.0 / (1.0 + self.g * (self.g + self.k));
        let v3 = x - self.ic2eq;
        let v1 = h * (self.ic1eq + self.g * v3);
        let v2 = self.ic2eq + self.g * v1;
        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;
        v2
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SynthParams {
    pub waveform: Waveform,
    pub frequency: f32,
    pub filter_cutoff: f32,
    pub envelope: EnvelopeShape,
}

#[derive(Clone, Debug)]
pub struct SynthVoice {
    pub id: VoiceId,
    waveform: Waveform,
    phase: f32,
    phase_inc: f32,
    filter: LowPass,
    envelope: EnvelopeShape,
    sample_rate: f32,
    elapsed: u64,
    total: u64,
}

impl SynthVoice {
    pub fn new(id: VoiceId, params: &SynthParams, sample_rate: f32) -> Self {
        let total = (params.envelope.duration * sample_rate).round().max(0.0) as u64;
        Self {
            id,
            waveform: params.waveform,
            phase: 0.0,
            phase_inc: params.frequency / sample_rate,
            filter: LowPass::new(params.filter_cutoff, sample_rate),
            envelope: params.envelope,
            sample_rate,
            elapsed: 0,
            total,
        }
    }

    pub fn is_active(&self) -> bool {
        self.elapsed < self.total
    }

    // adds this voice into the bus; returns false once the voice has run out
    pub fn render_into(&mut self, out: &mut [StereoFrame]) -> bool {
        for frame in out.iter_mut() {
            if self.elapsed >= self.total {
                break;
            }
            let t = self.elapsed as f32 / self.sample_rate;
            let raw = self.waveform.sample(self.phase);
            // near nyquist the filter overshoots square/saw edges; the
            // envelope alone sets the level, so keep its input at unit range
            let filtered = self.filter.process(raw).clamp(-1.0, 1.0);
            let gain = self.envelope.level_at(t);
            frame.accumulate(StereoFrame::mono(filtered * gain));

            self.phase += self.phase_inc;
            if self.phase >= 1.0 {
                self.phase -= self.phase.floor();
            }
            self.elapsed += 1;
        }
        self.is_active()
    }
}
