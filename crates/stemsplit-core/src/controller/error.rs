//! Controller error types

use thiserror::Error;

use crate::audio_file::DecodeError;

/// Errors surfaced to the mixer UI by the playback controller
///
/// None of these are fatal: the UI shows the message in its status line and
/// the controller stays in the state it was in before the call.
#[derive(Error, Debug)]
pub enum ControllerError {
    /// The supplied bytes could not be decoded
    #[error("Could not decode audio: {0}")]
    Decode(#[from] DecodeError),

    /// Play requested before any audio was loaded
    #[error("No audio loaded")]
    NoAudioLoaded,

    /// Channel index outside the configured channel list
    #[error("Invalid channel {index} (mixer has {count} channels)")]
    InvalidChannel { index: usize, count: usize },

    /// The engine command queue is full
    #[error("Audio engine is busy, try again")]
    EngineBusy,
}

/// Result type for controller operations
pub type ControllerResult<T> = Result<T, ControllerError>;
