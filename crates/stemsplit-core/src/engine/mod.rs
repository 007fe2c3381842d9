//! Fan-out engine
//!
//! The audio-thread side of the mixer:
//! - Command queue carrying whole playback sessions from the UI
//! - Gain stages and per-channel playback handles
//! - FanoutEngine rendering every live handle into the output
//! - Collector thread for RT-safe deallocation of decoded clips

mod command;
#[allow(clippy::module_inception)]
mod engine;
pub mod gc;
mod handle;

pub use command::*;
pub use engine::*;
pub use handle::*;
