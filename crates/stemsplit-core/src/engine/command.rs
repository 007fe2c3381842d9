//! Lock-free command queue for real-time engine control
//!
//! The UI thread sends commands via a lock-free queue, and the audio
//! thread drains them at the start of every render quantum.
//!
//! # Why Lock-Free?
//!
//! A mutex shared with the audio callback turns any slow UI-side work into
//! an audible dropout. With the `rtrb` SPSC ringbuffer:
//! - **No allocations**: Fixed-size ringbuffer allocated at startup
//! - **Wait-free**: Both push and pop are O(1) and never block
//! - **Single-producer single-consumer**: Exactly the UI→Audio shape we need
//!
//! # Synchronous start
//!
//! A playback session travels as ONE command carrying every channel's handle.
//! The engine installs the whole set between two quanta, so all channels
//! render their first frame into the same output frame.

use super::handle::PlaybackHandle;

/// Identifier of one Stopped→Playing transition
///
/// Ids are handed out by the controller, start at 1 and never repeat, so a
/// stop that arrives after its session already ended is recognised as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Sentinel stored in atomics when no session is installed
    pub const NONE: SessionId = SessionId(0);

    pub fn next(self) -> SessionId {
        SessionId(self.0 + 1)
    }
}

/// Everything the engine needs to start a session in one quantum
pub struct SessionStart {
    pub id: SessionId,
    /// One handle per mixer channel, in channel order
    pub handles: Vec<PlaybackHandle>,
}

/// Commands sent from UI thread to audio thread
pub enum EngineCommand {
    /// Install a session and start all of its handles at frame 0
    ///
    /// Boxed so the enum stays pointer-sized in the ringbuffer.
    Start(Box<SessionStart>),
    /// Halt and discard every handle of the given session
    Stop { session: SessionId },
}

impl std::fmt::Debug for EngineCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineCommand::Start(start) => f
                .debug_struct("Start")
                .field("session", &start.id)
                .field("handles", &start.handles.len())
                .finish(),
            EngineCommand::Stop { session } => {
                f.debug_struct("Stop").field("session", session).finish()
            }
        }
    }
}

/// Capacity of the command queue
///
/// The controller sends at most one command per user action, so a small
/// queue already gives seconds of headroom if the audio thread stalls.
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Create a new command channel (producer/consumer pair)
///
/// Returns `(Producer, Consumer)` where:
/// - Producer: Send side, owned by UI thread
/// - Consumer: Receive side, owned by audio thread
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}
