// Control side of the output graph. The audio backend is opened lazily on the
// first user interaction and then kept for the life of the session.

use anyhow::Context;
use crossbeam_channel::Receiver;
use tracing::info;

use crate::audio_api::{AudioBackend, AudioCommand, AudioSink, TapBlock};

pub const TAP_QUEUE: usize = 1024; // blocks, not frames

pub struct OutputRouter {
    backend: Box<dyn AudioBackend>,
    sink: Option<Box<dyn AudioSink>>,
    tap: Option<Receiver<TapBlock>>,
    master_gain: f32,
}

impl OutputRouter {
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        Self {
            backend,
            sink: None,
            tap: None,
            master_gain: 1.0,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.sink.is_some()
    }

    /// Build the graph if it doesn't exist yet. Calling again is a no-op.
    pub fn init(&mut self) -> anyhow::Result<&dyn AudioSink> {
        if self.sink.is_none() {
            let (tap_tx, tap_rx) = crossbeam_channel::bounded(TAP_QUEUE);
            let sink = self.backend.open(tap_tx).context("failed to open audio output")?;
            sink.send(AudioCommand::SetMasterGain(self.master_gain));
            info!(sample_rate = sink.sample_rate(), "output router ready");
            self.sink = Some(sink);
            self.tap = Some(tap_rx);
        }
        self.sink()
            .context("output router has no sink after init")
    }

    pub fn reinitialize(&mut self) -> anyhow::Result<()> {
        self.sink = None;
        self.tap = None;
        self.init()?;
        Ok(())
    }

    pub fn sink(&self) -> Option<&dyn AudioSink> {
        self.sink.as_deref()
    }

    pub fn tap(&self) -> Option<&Receiver<TapBlock>> {
        self.tap.as_ref()
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.sink.as_ref().map(|s| s.sample_rate())
    }

    pub fn master_volume(&self) -> f32 {
        self.master_gain
    }

    // voices already sounding keep going, only the level changes
    pub fn set_master_volume(&mut self, gain: f32) {
        self.master_gain = gain.clamp(0.0, 1.0);
        if let Some(sink) = &self.sink {
            sink.send(AudioCommand::SetMasterGain(self.master_gain));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::OfflineBackend;

    #[test]
    fn init_is_lazy_and_idempotent() {
        let backend = OfflineBackend::new(8_000);
        let renderer = backend.renderer();
        let mut router = OutputRouter::new(Box::new(backend));
        assert!(!router.is_initialized());
        assert_eq!(renderer.times_opened(), 0);

        router.init().unwrap();
        router.init().unwrap();
        assert_eq!(renderer.times_opened(), 1);
        assert_eq!(router.sample_rate(), Some(8_000));

        router.reinitialize().unwrap();
        assert_eq!(renderer.times_opened(), 2);
    }

    #[test]
    fn master_volume_survives_init() {
        let backend = OfflineBackend::new(8_000);
        let renderer = backend.renderer();
        let mut router = OutputRouter::new(Box::new(backend));
        router.set_master_volume(1.5);
        assert_eq!(router.master_volume(), 1.0);
        router.set_master_volume(0.25);
        router.init().unwrap();
        assert_eq!(renderer.master_gain(), Some(0.25));
        router.set_master_volume(0.5);
        assert_eq!(renderer.master_gain(), Some(0.5));
    }
}
