// Plays stored samples once through the shared bus.
//
// Decoded buffers are cached by path and registered with the engine the first
// time they arrive; later plays of the same path are a single PlaySample.
// Paths that failed stay failed until `forget`/`retry_failed`, so a missing
// file costs one fetch and one warning, not one per bar.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::audio::{next_sample_id, next_voice_id, SampleId};
use crate::audio_api::{AudioCommand, AudioSink};
use crate::loader::{AssetStore, Loaded, SampleLoader};

struct PendingPlay {
    path: String,
    gain: f32,
    generation: u64,
}

pub struct SamplePlayer {
    loader: SampleLoader,
    cache: HashMap<String, SampleId>,
    failed: HashSet<String>,
    in_flight: HashSet<String>,
    pending: Vec<PendingPlay>,
    generation: u64,
}

impl SamplePlayer {
    pub fn new(assets: Arc<dyn AssetStore>) -> anyhow::Result<Self> {
        Ok(Self {
            loader: SampleLoader::spawn(assets)?,
            cache: HashMap::new(),
            failed: HashSet::new(),
            in_flight: HashSet::new(),
            pending: Vec::new(),
            generation: 0,
        })
    }

    /// Play `path` once at `master_volume`. Returns immediately; uncached
    /// samples sound when their fetch completes (see `pump`).
    pub fn play(&mut self, sink: &dyn AudioSink, path: &str, master_volume: f32) {
        let gain = master_volume.clamp(0.0, 1.0);
        if let Some(&sample) = self.cache.get(path) {
            sink.send(AudioCommand::PlaySample { voice: next_voice_id(), sample, gain });
            return;
        }
        if self.failed.contains(path) {
            debug!(path, "skipping sample that failed to load");
            return;
        }

        self.pending.push(PendingPlay {
            path: path.to_string(),
            gain,
            generation: self.generation,
        });
        if self.in_flight.insert(path.to_string()) {
            debug!(path, "fetching sample");
            self.loader.request(path, sink.sample_rate());
        }
    }

    // plays queued before this call are dropped when their fetch lands
    pub fn cancel_pending(&mut self) {
        self.generation += 1;
    }

    // the engine was rebuilt, so nothing is registered with it anymore
    pub fn forget_registered(&mut self) {
        self.cache.clear();
    }

    // the file behind `path` changed; fetch it again next time
    pub fn forget(&mut self, path: &str) {
        self.cache.remove(path);
        self.failed.remove(path);
    }

    // new files may have appeared
    pub fn retry_failed(&mut self) {
        self.failed.clear();
    }

    pub fn has_failed(&self, path: &str) -> bool {
        self.failed.contains(path)
    }

    pub fn is_cached(&self, path: &str) -> bool {
        self.cache.contains_key(path)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Drain finished fetches without blocking. Returns how many landed.
    pub fn pump(&mut self, sink: &dyn AudioSink) -> usize {
        let mut n = 0;
        while let Some(loaded) = self.loader.try_completed() {
            self.complete(sink, loaded);
            n += 1;
        }
        n
    }

    // blocks until every outstanding fetch has landed or `timeout` passes
    pub fn pump_until_idle(&mut self, sink: &dyn AudioSink, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.in_flight.is_empty() {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return false;
            }
            match self.loader.wait_completed(left) {
                Some(loaded) => self.complete(sink, loaded),
                None => return false,
            }
        }
        true
    }

    fn complete(&mut self, sink: &dyn AudioSink, loaded: Loaded) {
        let Loaded { path, result } = loaded;
        self.in_flight.remove(&path);

        let (waiting, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|p| p.path == path);
        self.pending = rest;

        match result {
            Ok(buffer) => {
                let id = next_sample_id();
                sink.send(AudioCommand::RegisterSample { id, buffer: Arc::new(buffer) });
                self.cache.insert(path.clone(), id);

                for play in waiting {
                    if play.generation != self.generation {
                        // stopped since the request; keep the buffer, skip the sound
                        continue;
                    }
                    sink.send(AudioCommand::PlaySample {
                        voice: next_voice_id(),
                        sample: id,
                        gain: play.gain,
                    });
                }
            }
            Err(err) => {
                warn!(path, error = %err, "sample playback failed");
                self.failed.insert(path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::fixtures::wav_bytes;
    use crate::audio::OfflineBackend;
    use crate::audio_api::AudioBackend;
    use crate::loader::MemoryAssetStore;

    fn setup() -> (SamplePlayer, Box<dyn AudioSink>, crate::audio::OfflineRenderer) {
        let store = Arc::new(MemoryAssetStore::new());
        store.insert("snare.wav", wav_bytes(8_000, &[2000; 400]));
        let player = SamplePlayer::new(store).unwrap();
        let mut backend = OfflineBackend::new(8_000);
        let (tap, _rx) = crossbeam_channel::unbounded();
        let sink = backend.open(tap).unwrap();
        (player, sink, backend.renderer())
    }

    fn plays(cmds: &[AudioCommand]) -> usize {
        cmds.iter().filter(|c| matches!(c, AudioCommand::PlaySample { .. })).count()
    }

    fn registrations(cmds: &[AudioCommand]) -> usize {
        cmds.iter().filter(|c| matches!(c, AudioCommand::RegisterSample { .. })).count()
    }

    #[test]
    fn concurrent_plays_share_one_fetch() {
        let (mut player, sink, renderer) = setup();
        player.play(sink.as_ref(), "snare.wav", 0.7);
        player.play(sink.as_ref(), "snare.wav", 0.7);
        assert_eq!(player.in_flight(), 1);
        assert!(player.pump_until_idle(sink.as_ref(), Duration::from_secs(5)));

        let cmds = renderer.take_commands();
        assert_eq!(registrations(&cmds), 1);
        assert_eq!(plays(&cmds), 2);

        player.play(sink.as_ref(), "snare.wav", 0.7);
        let cmds = renderer.take_commands();
        assert_eq!((registrations(&cmds), plays(&cmds)), (0, 1));
    }

    #[test]
    fn stop_cancels_plays_but_keeps_the_buffer() {
        let (mut player, sink, renderer) = setup();
        player.play(sink.as_ref(), "snare.wav", 1.0);
        player.cancel_pending();
        assert!(player.pump_until_idle(sink.as_ref(), Duration::from_secs(5)));

        let cmds = renderer.take_commands();
        assert_eq!((registrations(&cmds), plays(&cmds)), (1, 0));
        assert!(player.is_cached("snare.wav"));
    }

    #[test]
    fn missing_samples_are_not_fatal() {
        let (mut player, sink, renderer) = setup();
        player.play(sink.as_ref(), "gone.wav", 1.0);
        assert!(player.pump_until_idle(sink.as_ref(), Duration::from_secs(5)));
        assert!(renderer.take_commands().is_empty());
        assert!(!player.is_cached("gone.wav"));
    }

    #[test]
    fn failed_paths_are_not_fetched_every_bar() {
        let store = Arc::new(MemoryAssetStore::new());
        let mut player = SamplePlayer::new(store.clone()).unwrap();
        let mut backend = OfflineBackend::new(8_000);
        let renderer = backend.renderer();
        let (tap, _rx) = crossbeam_channel::unbounded();
        let sink = backend.open(tap).unwrap();

        player.play(sink.as_ref(), "late.wav", 1.0);
        assert!(player.pump_until_idle(sink.as_ref(), Duration::from_secs(5)));
        assert!(player.has_failed("late.wav"));

        // the file shows up, but the failure is remembered
        store.insert("late.wav", wav_bytes(8_000, &[1000; 100]));
        player.play(sink.as_ref(), "late.wav", 1.0);
        assert_eq!(player.in_flight(), 0);
        assert!(renderer.take_commands().is_empty());

        player.retry_failed();
        player.play(sink.as_ref(), "late.wav", 1.0);
        assert!(player.pump_until_idle(sink.as_ref(), Duration::from_secs(5)));
        assert_eq!(plays(&renderer.take_commands()), 1);

        player.forget("late.wav");
        assert!(!player.is_cached("late.wav"));
    }
}
