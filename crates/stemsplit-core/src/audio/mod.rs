//! Audio output for the mixer
//!
//! Opens an output device through CPAL and runs the fan-out engine on the
//! device's callback thread.
//!
//! - **UI Thread**: Sends commands via lock-free ringbuffer
//! - **Audio Thread**: Owns the FanoutEngine exclusively, processes commands
//! - **Atomics**: UI reads playback state via relaxed atomics (no locks)
//!
//! ```ignore
//! use stemsplit_core::audio::{AudioConfig, start_audio_system};
//!
//! let result = start_audio_system(&AudioConfig::default())?;
//! let controller = PlaybackController::new(
//!     channels,
//!     result.command_sender,
//!     result.atomics,
//!     result.sample_rate,
//! );
//! ```

mod backend;
mod config;
mod cpal_backend;
mod device;
mod error;

pub use config::{AudioConfig, BufferSize, DeviceId, DEFAULT_SAMPLE_RATE, MAX_BUFFER_SIZE, MIN_BUFFER_SIZE};

pub use backend::{start_audio_system, AudioSystemResult, CommandSender};
pub use cpal_backend::AudioHandle;

pub use device::{get_output_devices, AudioDevice};

pub use error::{AudioError, AudioResult};
