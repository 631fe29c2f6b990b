// Microphone takes that become new sounds in the palette.
//
// The device is only open while a take runs. Blocks arrive on the same kind
// of bounded queue the output tap uses and are encoded with the recorder's
// format when the take stops.

use crossbeam_channel::Receiver;
use tracing::info;

use crate::audio_api::{InputBackend, InputStream, TapBlock};
use crate::error::RecorderError;
use crate::pipeline::recorder::{Capture, Recording, RecordingFormat};
use crate::pipeline::router::TAP_QUEUE;

struct LiveTake {
    stream: Box<dyn InputStream>,
    rx: Receiver<TapBlock>,
    capture: Capture,
}

pub struct MicRecorder {
    input: Box<dyn InputBackend>,
    live: Option<LiveTake>,
}

impl MicRecorder {
    pub fn new(input: Box<dyn InputBackend>) -> Self {
        Self { input, live: None }
    }

    pub fn is_recording(&self) -> bool {
        self.live.is_some()
    }

    pub fn start(&mut self) -> Result<(), RecorderError> {
        if self.is_recording() {
            return Ok(());
        }
        let (tx, rx) = crossbeam_channel::bounded(TAP_QUEUE);
        let stream = self
            .input
            .open_input(tx)
            .map_err(|e| RecorderError::NoInput(format!("{e:#}")))?;
        let capture = Capture::new(stream.sample_rate());
        info!(sample_rate = stream.sample_rate(), "mic recording started");
        self.live = Some(LiveTake { stream, rx, capture });
        Ok(())
    }

    pub fn collect(&mut self) {
        if let Some(take) = self.live.as_mut() {
            take.capture.drain(&take.rx);
        }
    }

    pub fn stop(&mut self, format: RecordingFormat) -> Result<Recording, RecorderError> {
        let LiveTake { stream, rx, mut capture } = self.live.take().ok_or(RecorderError::NotRecording)?;
        // close the device first so nothing lands after the final drain
        drop(stream);
        capture.drain(&rx);
        capture.finish(format)
    }
}
