// control-side half of a synth voice: turns a recipe plus volumes into a PlaySynth command

use tracing::debug;

use crate::audio::{next_voice_id, EnvelopeShape, SynthParams, VoiceId};
use crate::audio_api::{AudioCommand, AudioSink};
use crate::pipeline::sound::SynthRecipe;

/// Handle to a voice that has been sent to the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoiceHandle {
    pub id: VoiceId,
}

pub fn peak_gain(recipe: &SynthRecipe, track_volume: f32, master_volume: f32) -> f32 {
    recipe.base_volume.clamp(0.0, 1.0) * track_volume.clamp(0.0, 1.0) * master_volume.clamp(0.0, 1.0)
}

pub fn params_for(recipe: &SynthRecipe, track_volume: f32, master_volume: f32) -> SynthParams {
    SynthParams {
        waveform: recipe.waveform,
        frequency: recipe.frequency,
        filter_cutoff: recipe.filter_cutoff,
        envelope: EnvelopeShape::fitted(recipe.duration, peak_gain(recipe, track_volume, master_volume)),
    }
}

// The voice stops itself once `recipe.duration` has elapsed.
pub fn trigger(
    sink: &dyn AudioSink,
    recipe: &SynthRecipe,
    track_volume: f32,
    master_volume: f32,
) -> VoiceHandle {
    let id = next_voice_id();
    let params = params_for(recipe, track_volume, master_volume);
    debug!(sound = recipe.name, peak = params.envelope.peak, "synth trigger");
    sink.send(AudioCommand::PlaySynth { voice: id, params });
    VoiceHandle { id }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::sound::preset;

    #[test]
    fn peak_is_product_of_clamped_volumes() {
        let kick = preset("808 Kick").unwrap();
        let p = params_for(kick, 0.5, 0.7);
        assert!((p.envelope.peak - 0.7 * 0.5 * 0.7).abs() < 1e-6);
        assert!((peak_gain(kick, 3.0, -1.0)).abs() < 1e-6);
        assert!((peak_gain(kick, 3.0, 1.0) - 0.7).abs() < 1e-6);
    }

    #[test]
    fn short_recipes_shrink_their_envelope() {
        let hat = preset("Closed Hat").unwrap();
        let p = params_for(hat, 1.0, 1.0);
        let env = p.envelope;
        assert!((env.attack + env.decay + env.release - hat.duration).abs() < 1e-6);
        assert_eq!(env.duration, hat.duration);
        assert_eq!(p.filter_cutoff, 10_000.0);
    }
}
