//! Playback fan-out controller
//!
//! The UI-thread owner of the mixer state. It holds the decoded clip and the
//! persistent gain stage of every channel, and turns "play" into a single
//! engine command carrying one playback handle per channel so that all
//! channels start in the same render quantum.
//!
//! ```ignore
//! use stemsplit_core::controller::PlaybackController;
//!
//! let mut controller = PlaybackController::new(channels, sender, atomics, sample_rate);
//! controller.load_file(&path)?;
//! controller.set_channel_volume(2, 0.0)?;
//! controller.toggle_playback()?; // Playing
//! ```

mod error;
mod playback;

pub use error::{ControllerError, ControllerResult};
pub use playback::{Channel, PlaybackController, SessionEvent};
