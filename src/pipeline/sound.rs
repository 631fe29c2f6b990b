//! Sound sources: the built-in synth presets and the cell → source resolver.

use std::path::Path;

use crate::audio::Waveform;
use crate::pipeline::project::Cell;

/// A parametric drum/tone recipe. Read-only, process-wide.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SynthRecipe {
    pub name: &'static str,
    pub waveform: Waveform,
    pub frequency: f32,
    pub duration: f32, // seconds, including the release tail
    pub filter_cutoff: f32,
    pub base_volume: f32,
}

const fn recipe(
    name: &'static str,
    waveform: Waveform,
    frequency: f32,
    duration: f32,
    filter_cutoff: f32,
) -> SynthRecipe {
    SynthRecipe {
        name,
        waveform,
        frequency,
        duration,
        filter_cutoff,
        base_volume: 0.7,
    }
}

pub static PRESETS: [SynthRecipe; 12] = [
    recipe("808 Kick", Waveform::Sine, 60.0, 0.3, 200.0),
    recipe("Acoustic Kick", Waveform::Triangle, 80.0, 0.2, 300.0),
    recipe("Sub Kick", Waveform::Sine, 40.0, 0.4, 150.0),
    recipe("Punchy Kick", Waveform::Square, 70.0, 0.15, 400.0),
    recipe("Acoustic Snare", Waveform::Square, 200.0, 0.1, 2000.0),
    recipe("808 Snare", Waveform::Square, 150.0, 0.08, 1500.0),
    recipe("Clap", Waveform::Square, 300.0, 0.05, 3000.0),
    recipe("Rim Shot", Waveform::Triangle, 250.0, 0.03, 2500.0),
    recipe("Closed Hat", Waveform::Square, 8000.0, 0.02, 10000.0),
    recipe("Open Hat", Waveform::Square, 6000.0, 0.15, 8000.0),
    recipe("Sub Bass", Waveform::Sine, 80.0, 0.5, 300.0),
    recipe("Lead Synth", Waveform::Sawtooth, 440.0, 0.3, 2000.0),
];

/// Unknown names play this instead of failing.
pub static FALLBACK: &SynthRecipe = &PRESETS[0];

pub fn preset(name: &str) -> Option<&'static SynthRecipe> {
    PRESETS.iter().find(|r| r.name == name)
}

#[derive(Clone, Debug, PartialEq)]
pub enum SoundSource {
    Synthesized(&'static SynthRecipe),
    Sampled(String),
}

/// Decide how a cell is voiced. Never fails.
pub fn resolve(cell: &Cell) -> SoundSource {
    match &cell.file_path {
        Some(path) => SoundSource::Sampled(path.clone()),
        None => SoundSource::Synthesized(preset(&cell.sound_name).unwrap_or(FALLBACK)),
    }
}

// Everything the user can pick from: presets first, then sample files.
#[derive(Clone, Debug, Default)]
pub struct SoundLibrary {
    pub entries: Vec<Cell>,
}

impl SoundLibrary {
    pub fn with_presets() -> Self {
        Self {
            entries: PRESETS.iter().map(|r| Cell::synth(r.name)).collect(),
        }
    }

    // `file_path` values are relative to the asset root so the asset store can serve them
    pub fn add_samples<P: AsRef<Path>>(&mut self, asset_root: &Path, files: &[P]) {
        for file in files {
            let file = file.as_ref();
            let Ok(rel) = file.strip_prefix(asset_root) else { continue };
            let name = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            if name.is_empty() {
                continue;
            }
            let rel = rel.to_string_lossy().replace('\\', "/");
            if self.entries.iter().any(|c| c.file_path.as_deref() == Some(rel.as_str())) {
                continue;
            }
            self.entries.push(Cell::sample(name, rel));
        }
    }

    // a generated sound comes back as (name, path), same as an upload
    pub fn add_generated(&mut self, name: &str, file_path: &str) -> Cell {
        let cell = Cell::sample(name, file_path);
        self.entries.push(cell.clone());
        cell
    }

    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
