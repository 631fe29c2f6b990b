// user-tweakable settings, read from <project>/.beatbox/config.json if it exists
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::pipeline::recorder::RecordingFormat;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub default_tracks: usize,
    pub tempo: u32,
    pub swing: u8,
    pub master_volume: f32,
    // relative to the project dir unless absolute
    pub samples_dir: PathBuf,
    pub frame_interval_ms: u64, // ui redraw / poll period
    pub recording_formats: Vec<RecordingFormat>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_tracks: 8,
            tempo: 120,
            swing: 0,
            master_volume: 0.7,
            samples_dir: PathBuf::from("."),
            frame_interval_ms: 16, // ~60fps
            recording_formats: RecordingFormat::PREFERENCE.to_vec(),
        }
    }
}

impl Settings {
    // missing file = defaults, broken file = defaults + a warning
    pub fn load(path: &Path) -> Self {
        let Ok(data) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&data) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "bad config, using defaults");
                Self::default()
            }
        }
    }

    pub fn samples_root(&self, project_dir: &Path) -> PathBuf {
        if self.samples_dir.is_absolute() {
            self.samples_dir.clone()
        } else {
            project_dir.join(&self.samples_dir)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"tempo": 90, "recording_formats": ["wav_pcm16"]}"#).unwrap();
        let s = Settings::load(&path);
        assert_eq!(s.tempo, 90);
        assert_eq!(s.default_tracks, 8);
        assert_eq!(s.recording_formats, vec![RecordingFormat::WavPcm16]);
    }

    #[test]
    fn broken_or_missing_config_is_default() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Settings::load(&dir.path().join("nope.json")), Settings::default());
        let path = dir.path().join("config.json");
        std::fs::write(&path, "tempo = 90").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
    }

    #[test]
    fn samples_dir_is_project_relative() {
        let s = Settings { samples_dir: PathBuf::from("samples"), ..Settings::default() };
        assert_eq!(s.samples_root(Path::new("/proj")), PathBuf::from("/proj/samples"));
    }
}
