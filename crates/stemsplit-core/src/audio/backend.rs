//! What the UI gets back from opening the audio output

use std::sync::Arc;

use crate::engine::{EngineCommand, PlaybackAtomics};

use super::config::AudioConfig;
use super::cpal_backend::AudioHandle;
use super::error::AudioResult;

/// A running output stream plus the UI's ends of the engine links
pub struct AudioSystemResult {
    /// Owns the stream; audio stops when it is dropped
    pub handle: AudioHandle,
    pub command_sender: CommandSender,
    pub atomics: Arc<PlaybackAtomics>,
    /// Rate the stream opened at; clips must be decoded to it
    pub sample_rate: u32,
}

/// UI end of the engine command queue
///
/// Never blocks. A full queue hands the command back to the caller.
pub struct CommandSender {
    pub(crate) producer: rtrb::Producer<EngineCommand>,
}

impl CommandSender {
    pub fn send(&mut self, cmd: EngineCommand) -> Result<(), EngineCommand> {
        match self.producer.push(cmd) {
            Ok(()) => Ok(()),
            Err(rtrb::PushError::Full(rejected)) => Err(rejected),
        }
    }
}

/// Open the configured output and start the engine on its callback
pub fn start_audio_system(config: &AudioConfig) -> AudioResult<AudioSystemResult> {
    super::cpal_backend::start_audio_system(config)
}
