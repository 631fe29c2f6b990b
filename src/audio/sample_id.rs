use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SAMPLE: AtomicU64 = AtomicU64::new(0);
static NEXT_VOICE: AtomicU64 = AtomicU64::new(0);

// handle for a decoded buffer registered with the engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SampleId(pub u64);

// handle for one triggered voice, synth or sample
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VoiceId(pub u64);

// atomic counters so the loader thread can mint ids too
pub fn next_sample_id() -> SampleId {
    SampleId(NEXT_SAMPLE.fetch_add(1, Ordering::Relaxed))
}

pub fn next_voice_id() -> VoiceId {
    VoiceId(NEXT_VOICE.fetch_add(1, Ordering::Relaxed))
}
