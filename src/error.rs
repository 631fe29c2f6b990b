//! Error taxonomy of the sequencer core.
//!
//! Per-voice failures (`PlaybackError`) are logged and swallowed by the
//! session; recorder and store errors are returned to the caller.

use thiserror::Error;

/// Failure to fetch an asset from the asset store.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("sample not found: {0}")]
    NotFound(String),

    #[error("sample path escapes the asset root: {0}")]
    InvalidPath(String),

    #[error("io error reading sample: {0}")]
    Io(#[from] std::io::Error),
}

/// A single voice could not sound. Never fatal.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("sample missing: {0}")]
    Missing(String),

    #[error("failed to decode {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("failed to fetch {path}: {source}")]
    Fetch {
        path: String,
        #[source]
        source: AssetError,
    },
}

impl PlaybackError {
    pub fn from_asset(path: &str, err: AssetError) -> Self {
        match err {
            AssetError::NotFound(_) => PlaybackError::Missing(path.to_string()),
            other => PlaybackError::Fetch {
                path: path.to_string(),
                source: other,
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("recording tap is not available; the audio output has not been started")]
    Unavailable,

    #[error("nothing was recorded; play some steps while recording")]
    NothingRecorded,

    #[error("recorder is not running")]
    NotRecording,

    #[error("microphone unavailable: {0}")]
    NoInput(String),

    #[error("failed to encode recording: {0}")]
    Encode(#[from] hound::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("track index {index} out of range ({len} tracks)")]
    TrackOutOfRange { index: usize, len: usize },

    #[error("step index {0} out of range")]
    StepOutOfRange(usize),

    #[error("pattern index {index} out of range ({len} patterns)")]
    PatternOutOfRange { index: usize, len: usize },

    #[error("cell has an empty sound name")]
    EmptySoundName,

    #[error("pattern {pattern} has {rows} rows but there are {tracks} tracks")]
    InvariantViolation {
        pattern: usize,
        rows: usize,
        tracks: usize,
    },
}
