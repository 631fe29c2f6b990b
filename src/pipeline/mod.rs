pub mod mic;
pub mod persistence;
pub mod project;
pub mod recorder;
pub mod router;
pub mod sample_player;
pub mod sound;
pub mod store;
pub mod synth_engine;
pub mod transport;
