// the grid data model and the serializable snapshot handed to persistence

use serde::{Deserialize, Serialize}; // serde does json

use crate::shared::STEPS_PER_PATTERN;

// -- DEFINITIONS --
// "track": a horizontal lane with its own mute/volume, shared by every pattern.
// "pattern": one full 16-step arrangement, one row per track.
// "cell": what sits at one (track, step): nothing, a synth preset name, or a sample file.


#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: u32,
    pub name: String,
    pub volume: f32, // 0.0 - 1.0
    pub muted: bool,
    pub color: String, // display only
}

impl Track {
    // deterministic defaults for the n-th track
    pub fn numbered(n: usize) -> Self {
        Self {
            id: n as u32,
            name: format!("Track {}", n + 1),
            volume: 0.8,
            muted: false,
            color: format!("hsl({}, 70%, 50%)", n * 45),
        }
    }
}


#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CellRepr")]
pub struct Cell {
    #[serde(rename = "soundName")]
    pub sound_name: String,
    #[serde(rename = "filePath", default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

// Older saved blobs store either a bare preset name or `{name, filePath}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum CellRepr {
    Name(String),
    Full {
        #[serde(rename = "soundName", alias = "name")]
        sound_name: String,
        #[serde(rename = "filePath", default)]
        file_path: Option<String>,
    },
}

impl From<CellRepr> for Cell {
    fn from(repr: CellRepr) -> Self {
        match repr {
            CellRepr::Name(sound_name) => Cell { sound_name, file_path: None },
            CellRepr::Full { sound_name, file_path } => Cell {
                sound_name,
                // an empty path means "not a sample"
                file_path: file_path.filter(|p| !p.is_empty()),
            },
        }
    }
}

impl Cell {
    pub fn synth(name: impl Into<String>) -> Self {
        Self { sound_name: name.into(), file_path: None }
    }

    pub fn sample(name: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            sound_name: name.into(),
            file_path: Some(file_path.into()),
        }
    }

    // short label for the grid
    pub fn abbrev(&self) -> String {
        self.sound_name.chars().take(3).collect()
    }
}


pub type Row = [Option<Cell>; STEPS_PER_PATTERN];

pub fn empty_row() -> Row {
    std::array::from_fn(|_| None)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pattern {
    pub rows: Vec<Row>,
}

impl Pattern {
    pub fn with_rows(n: usize) -> Self {
        Self {
            rows: (0..n).map(|_| empty_row()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|r| r.iter().all(Option::is_none))
    }
}


// What gets handed to `save_pattern` and read back on load.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSnapshot {
    pub patterns: Vec<Pattern>,
    pub tracks: Vec<Track>,
    pub tempo: u32,
    pub swing: u8,
    pub master_volume: f32,
    #[serde(default)]
    pub current_pattern: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<u64>, // unix seconds, only set on export
}

impl ProjectSnapshot {
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(blob: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(blob)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_blobs_with_bare_names_and_legacy_keys() {
        let mut row = vec![serde_json::Value::Null; STEPS_PER_PATTERN];
        row[0] = serde_json::json!("808 Kick");
        row[4] = serde_json::json!({"name": "clap.wav", "filePath": "uploads/clap.wav"});
        row[8] = serde_json::json!({"name": "Clap", "filePath": null});
        let blob = serde_json::json!({
            "patterns": [[row]],
            "tracks": [{"id": 0, "name": "Track 1", "volume": 0.8, "muted": false, "color": "hsl(0, 70%, 50%)"}],
            "tempo": 120,
            "swing": 10,
            "masterVolume": 0.7
        });

        let snap = ProjectSnapshot::from_json(&blob.to_string()).unwrap();
        let row = &snap.patterns[0].rows[0];
        assert_eq!(row[0], Some(Cell::synth("808 Kick")));
        assert_eq!(row[4], Some(Cell::sample("clap.wav", "uploads/clap.wav")));
        assert_eq!(row[8], Some(Cell::synth("Clap")));
        assert_eq!(snap.current_pattern, 0);
    }

    #[test]
    fn short_rows_are_rejected() {
        let blob = r#"{"patterns":[[[null,null]]],"tracks":[],"tempo":120,"swing":0,"masterVolume":0.7}"#;
        assert!(ProjectSnapshot::from_json(blob).is_err());
    }

    #[test]
    fn default_track_names_and_colors() {
        let t = Track::numbered(2);
        assert_eq!(t.name, "Track 3");
        assert_eq!(t.color, "hsl(90, 70%, 50%)");
        assert_eq!(t.volume, 0.8);
    }
}
