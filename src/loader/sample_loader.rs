// Fetching + decoding of stored samples, off the event-loop thread.
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error};

use crate::audio::SampleBuffer;
use crate::error::{AssetError, PlaybackError};

// Where sample bytes come from. Keyed by the `file_path` stored in a cell.
pub trait AssetStore: Send + Sync {
    fn fetch_sample(&self, path: &str) -> Result<Vec<u8>, AssetError>;
    // new sounds (mic takes) are written back under the same keys
    fn store_sample(&self, path: &str, bytes: &[u8]) -> Result<(), AssetError>;
}

// Serves files below a root dir
#[derive(Clone, Debug)]
pub struct DirAssetStore {
    root: PathBuf,
}

impl DirAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, AssetError> {
        let rel = Path::new(path);
        // only plain relative segments, so nothing can climb out of the root
        let clean = rel.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !clean || path.is_empty() {
            return Err(AssetError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

impl AssetStore for DirAssetStore {
    fn fetch_sample(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        let full = self.resolve(path)?;
        match std::fs::read(&full) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AssetError::NotFound(path.to_string())),
            Err(e) => Err(AssetError::Io(e)),
        }
    }

    fn store_sample(&self, path: &str, bytes: &[u8]) -> Result<(), AssetError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&full, bytes)?;
        debug!(path = %full.display(), "sample stored");
        Ok(())
    }
}

// Keeps sample bytes in memory (headless runs, tests, freshly generated sounds).
#[derive(Default)]
pub struct MemoryAssetStore {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<String>, bytes: Vec<u8>) {
        if let Ok(mut files) = self.files.write() {
            files.insert(path.into(), bytes);
        }
    }
}

impl AssetStore for MemoryAssetStore {
    fn fetch_sample(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        self.files
            .read()
            .ok()
            .and_then(|files| files.get(path).cloned())
            .ok_or_else(|| AssetError::NotFound(path.to_string()))
    }

    fn store_sample(&self, path: &str, bytes: &[u8]) -> Result<(), AssetError> {
        self.insert(path, bytes.to_vec());
        Ok(())
    }
}

// Every *.wav below `dir`, sorted so the palette order is stable between runs
pub fn index_wav_in_dir(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    if !dir.is_dir() {
        return Ok(found);
    }
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                // skip our own state dir and other hidden dirs
                let hidden = path
                    .file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with('.'));
                if !hidden {
                    pending.push(path);
                }
            } else if path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
            {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

struct LoadJob {
    path: String,
    target_rate: u32,
}

// A finished fetch+decode, successful or not.
pub struct Loaded {
    pub path: String,
    pub result: Result<SampleBuffer, PlaybackError>,
}

// One background thread that fetches and decodes; results come back in request order.
pub struct SampleLoader {
    jobs: Sender<LoadJob>,
    done: Receiver<Loaded>,
    _worker: JoinHandle<()>,
}

impl SampleLoader {
    pub fn spawn(store: Arc<dyn AssetStore>) -> anyhow::Result<Self> {
        let (jobs, job_rx) = crossbeam_channel::unbounded::<LoadJob>();
        let (done_tx, done) = crossbeam_channel::unbounded::<Loaded>();

        let worker = thread::Builder::new()
            .name("sample-loader".into())
            .spawn(move || {
                // exits once the session drops its sender
                for job in job_rx {
                    let result = load(store.as_ref(), &job.path, job.target_rate);
                    if done_tx.send(Loaded { path: job.path, result }).is_err() {
                        break;
                    }
                }
                debug!("sample loader stopped");
            })?;

        Ok(Self {
            jobs,
            done,
            _worker: worker,
        })
    }

    pub fn request(&self, path: &str, target_rate: u32) {
        let job = LoadJob {
            path: path.to_string(),
            target_rate,
        };
        if self.jobs.send(job).is_err() {
            error!(path, "sample loader thread is gone");
        }
    }

    pub fn try_completed(&self) -> Option<Loaded> {
        self.done.try_recv().ok()
    }

    pub fn wait_completed(&self, timeout: Duration) -> Option<Loaded> {
        match self.done.recv_timeout(timeout) {
            Ok(loaded) => Some(loaded),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

fn load(store: &dyn AssetStore, path: &str, target_rate: u32) -> Result<SampleBuffer, PlaybackError> {
    let bytes = store
        .fetch_sample(path)
        .map_err(|e| PlaybackError::from_asset(path, e))?;
    SampleBuffer::decode_wav(&bytes, target_rate).map_err(|e| PlaybackError::Decode {
        path: path.to_string(),
        reason: format!("{e:#}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::fixtures::wav_bytes;

    #[test]
    fn dir_store_refuses_to_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirAssetStore::new(dir.path());
        assert!(matches!(store.fetch_sample("../secret.wav"), Err(AssetError::InvalidPath(_))));
        assert!(matches!(store.fetch_sample("/etc/passwd"), Err(AssetError::InvalidPath(_))));
        assert!(matches!(store.fetch_sample("nope.wav"), Err(AssetError::NotFound(_))));
        assert!(matches!(store.store_sample("../out.wav", b"x"), Err(AssetError::InvalidPath(_))));
    }

    #[test]
    fn stored_samples_land_under_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirAssetStore::new(dir.path());
        store.store_sample("recordings/mic-1.wav", b"RIFF").unwrap();
        assert!(dir.path().join("recordings/mic-1.wav").exists());
        assert_eq!(store.fetch_sample("recordings/mic-1.wav").unwrap(), b"RIFF");
    }

    #[test]
    fn indexes_nested_wavs_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("drums")).unwrap();
        std::fs::create_dir_all(dir.path().join(".beatbox/beats")).unwrap();
        std::fs::write(dir.path().join("drums/b.wav"), b"").unwrap();
        std::fs::write(dir.path().join("a.WAV"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        std::fs::write(dir.path().join(".beatbox/beats/take.wav"), b"").unwrap();

        let found = index_wav_in_dir(dir.path()).unwrap();
        assert_eq!(found, vec![dir.path().join("a.WAV"), dir.path().join("drums/b.wav")]);
    }

    #[test]
    fn loader_decodes_and_reports_failures() {
        let store = Arc::new(MemoryAssetStore::new());
        store.insert("kick.wav", wav_bytes(8_000, &[1000; 80]));
        store.insert("broken.wav", b"junk".to_vec());
        let loader = SampleLoader::spawn(store).unwrap();

        loader.request("kick.wav", 8_000);
        loader.request("broken.wav", 8_000);
        loader.request("missing.wav", 8_000);

        let wait = Duration::from_secs(5);
        let kick = loader.wait_completed(wait).unwrap();
        assert_eq!(kick.result.unwrap().len(), 80);
        let broken = loader.wait_completed(wait).unwrap();
        assert!(matches!(broken.result, Err(PlaybackError::Decode { .. })));
        let missing = loader.wait_completed(wait).unwrap();
        assert!(matches!(missing.result, Err(PlaybackError::Missing(_))));
    }
}
