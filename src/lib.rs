//! beatbox: a 16-step drum machine.
//!
//! The [`session::Session`] owns the grid, the step clock, the output graph
//! and the recorder; `main.rs` wraps it in a terminal UI. Everything here
//! also runs headless against [`audio::OfflineBackend`].

pub mod audio;
pub mod audio_api;
pub mod config;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod session;
pub mod shared;
pub mod tui;

pub use config::Settings;
pub use session::Session;
