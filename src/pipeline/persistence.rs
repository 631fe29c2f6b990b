// Saved state lives next to the user's samples:
//
//   <project>/.beatbox/project.json        autosave, written on quit
//   <project>/.beatbox/patterns/<name>.json
//   <project>/.beatbox/beats/<name>.wav    + beats.json index
//   <project>/.beatbox/config.json         optional settings
//   <project>/.beatbox/beatbox.log
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::loader::{AssetStore, DirAssetStore};
use crate::pipeline::project::ProjectSnapshot;

const BEATBOX_DIR: &str = ".beatbox";
const PROJECT_FILE: &str = "project.json";
const BEATS_INDEX: &str = "beats.json";

// Named pattern saves
pub trait PatternSink {
    fn save_pattern(&self, name: &str, blob: &str) -> anyhow::Result<()>;
}

/// The library of finished recordings.
pub trait BeatStore {
    fn persist_beat(&self, name: &str, bytes: &[u8], mime_type: &str, tempo: u32) -> anyhow::Result<BeatEntry>;
    fn list_beats(&self) -> anyhow::Result<Vec<BeatEntry>>;
    // false when no beat has that file
    fn delete_beat(&self, file: &str) -> anyhow::Result<bool>;
    // serves `BeatEntry::file` paths to the sample player
    fn beat_assets(&self) -> Arc<dyn AssetStore>;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeatEntry {
    pub name: String,
    pub file: String,
    pub mime_type: String,
    pub tempo: u32,
    pub duration: f32, // seconds
}

#[derive(Clone, Debug)]
pub struct ProjectDir {
    root: PathBuf,
}

impl ProjectDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(BEATBOX_DIR)
    }

    pub fn project_file(&self) -> PathBuf {
        self.state_dir().join(PROJECT_FILE)
    }

    pub fn config_file(&self) -> PathBuf {
        self.state_dir().join("config.json")
    }

    pub fn log_file(&self) -> PathBuf {
        self.state_dir().join("beatbox.log")
    }

    pub fn patterns_dir(&self) -> PathBuf {
        self.state_dir().join("patterns")
    }

    pub fn beats_dir(&self) -> PathBuf {
        self.state_dir().join("beats")
    }

    // None when there's nothing saved yet or the blob is unreadable
    pub fn load_project(&self) -> Option<ProjectSnapshot> {
        let path = self.project_file();
        let data = std::fs::read_to_string(&path).ok()?;
        match ProjectSnapshot::from_json(&data) {
            Ok(snap) => Some(snap),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable project file");
                None
            }
        }
    }

    pub fn save_project(&self, snapshot: &ProjectSnapshot) -> anyhow::Result<()> {
        let path = self.project_file();
        write_creating_dirs(&path, snapshot.to_json()?.as_bytes())?;
        info!(path = %path.display(), "project saved");
        Ok(())
    }

    fn beats_index(&self) -> PathBuf {
        self.beats_dir().join(BEATS_INDEX)
    }

    fn write_beats_index(&self, index: &[BeatEntry]) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(index)?;
        write_creating_dirs(&self.beats_index(), json.as_bytes())
    }
}

impl PatternSink for ProjectDir {
    fn save_pattern(&self, name: &str, blob: &str) -> anyhow::Result<()> {
        let path = self.patterns_dir().join(format!("{}.json", file_stem(name)));
        write_creating_dirs(&path, blob.as_bytes())?;
        info!(path = %path.display(), "pattern saved");
        Ok(())
    }
}

impl BeatStore for ProjectDir {
    fn persist_beat(&self, name: &str, bytes: &[u8], mime_type: &str, tempo: u32) -> anyhow::Result<BeatEntry> {
        let file = format!("{}.wav", file_stem(name));
        write_creating_dirs(&self.beats_dir().join(&file), bytes)?;

        let duration = hound::WavReader::new(Cursor::new(bytes))
            .map(|r| r.duration() as f32 / r.spec().sample_rate.max(1) as f32)
            .unwrap_or(0.0);

        let entry = BeatEntry {
            name: name.to_string(),
            file,
            mime_type: mime_type.to_string(),
            tempo,
            duration,
        };
        let mut index = self.list_beats()?;
        index.retain(|b| b.file != entry.file);
        index.push(entry.clone());
        self.write_beats_index(&index)?;
        info!(name, duration, "beat saved");
        Ok(entry)
    }

    fn list_beats(&self) -> anyhow::Result<Vec<BeatEntry>> {
        let path = self.beats_index();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
    }

    fn delete_beat(&self, file: &str) -> anyhow::Result<bool> {
        let mut index = self.list_beats()?;
        let before = index.len();
        index.retain(|b| b.file != file);
        if index.len() == before {
            return Ok(false);
        }
        self.write_beats_index(&index)?;
        // only names we wrote ourselves ever reach the disk
        let path = self.beats_dir().join(file_stem(file.trim_end_matches(".wav")) + ".wav");
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "beat file was already gone");
            }
            Err(e) => return Err(e).with_context(|| format!("removing {}", path.display())),
        }
        info!(file, "beat deleted");
        Ok(true)
    }

    fn beat_assets(&self) -> Arc<dyn AssetStore> {
        Arc::new(DirAssetStore::new(self.beats_dir()))
    }
}

// keep names usable as file names
fn file_stem(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() { "untitled".to_string() } else { stem }
}

fn write_creating_dirs(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::project::{Pattern, Track};

    fn snapshot() -> ProjectSnapshot {
        ProjectSnapshot {
            patterns: vec![Pattern::with_rows(2)],
            tracks: (0..2).map(Track::numbered).collect(),
            tempo: 96,
            swing: 20,
            master_volume: 0.5,
            current_pattern: 0,
            exported_at: None,
        }
    }

    #[test]
    fn project_roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let project = ProjectDir::new(dir.path());
        assert!(project.load_project().is_none());
        project.save_project(&snapshot()).unwrap();
        assert_eq!(project.load_project(), Some(snapshot()));
    }

    #[test]
    fn corrupt_project_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let project = ProjectDir::new(dir.path());
        write_creating_dirs(&project.project_file(), b"{ nope").unwrap();
        assert!(project.load_project().is_none());
    }

    #[test]
    fn pattern_names_are_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let project = ProjectDir::new(dir.path());
        project.save_pattern("../boom bap", &snapshot().to_json().unwrap()).unwrap();
        let saved = std::fs::read_to_string(project.patterns_dir().join("___boom_bap.json")).unwrap();
        assert_eq!(ProjectSnapshot::from_json(&saved).unwrap().tempo, 96);
    }

    #[test]
    fn beats_are_indexed_once_per_name() {
        let dir = tempfile::tempdir().unwrap();
        let project = ProjectDir::new(dir.path());
        project.persist_beat("take", b"not a wav", "audio/wav;codecs=1", 120).unwrap();
        let entry = project.persist_beat("take", b"not a wav", "audio/wav;codecs=1", 90).unwrap();
        assert_eq!(entry.file, "take.wav");
        let beats = project.list_beats().unwrap();
        assert_eq!(beats, vec![entry]);
        assert_eq!(beats[0].tempo, 90);
        assert_eq!(beats[0].duration, 0.0);
        assert!(project.beats_dir().join("take.wav").exists());
    }

    #[test]
    fn deleted_beats_leave_index_and_disk() {
        let dir = tempfile::tempdir().unwrap();
        let project = ProjectDir::new(dir.path());
        project.persist_beat("one", b"x", "audio/wav;codecs=3", 120).unwrap();
        project.persist_beat("two", b"y", "audio/wav;codecs=3", 120).unwrap();

        assert!(project.delete_beat("one.wav").unwrap());
        assert!(!project.delete_beat("one.wav").unwrap());
        assert!(!project.beats_dir().join("one.wav").exists());
        let left: Vec<String> = project.list_beats().unwrap().into_iter().map(|b| b.name).collect();
        assert_eq!(left, vec!["two"]);
        assert_eq!(project.beat_assets().fetch_sample("two.wav").unwrap(), b"y");
    }
}
