//! stemsplit core - decoding, fan-out playback engine and controller
//!
//! One decoded clip is played through N gain-controlled channels that start
//! and stop together. The [`controller::PlaybackController`] lives on the UI
//! thread; the [`engine::FanoutEngine`] runs inside the audio callback.

pub mod audio;
pub mod audio_file;
pub mod config;
pub mod controller;
pub mod engine;
pub mod types;

pub use types::*;
