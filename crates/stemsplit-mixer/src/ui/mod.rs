//! UI module for the stem mixer
//!
//! Built with iced. The app owns the playback controller and turns every
//! widget event into a controller call.

pub mod app;
pub mod message;
pub mod mixer_view;

pub use app::MixerApp;
pub use message::Message;
