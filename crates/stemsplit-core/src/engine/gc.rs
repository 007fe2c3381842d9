//! RT-safe garbage collection for decoded clips
//!
//! A global `basedrop` collector defers the deallocation of decoded audio.
//! When the last `Shared<DecodedAudio>` is dropped on the audio thread (a
//! session retiring at the end of the clip, or a stop command) the pointer is
//! only enqueued; the memory is released later on the collector thread.
//!
//! ```ignore
//! use basedrop::Shared;
//! use crate::engine::gc::gc_handle;
//!
//! let audio = Shared::new(&gc_handle(), decoded);
//! let for_handle = audio.clone(); // same as Arc
//! ```

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

/// Spawn the collector thread and return a handle to it
fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("stemsplit-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, so it is created and kept on this thread
            let mut collector = Collector::new();
            tx.send(collector.handle()).expect("Failed to send GC handle");

            log::debug!("Clip collector thread started");

            loop {
                collector.collect();
                thread::sleep(Duration::from_millis(100));
            }
        })
        .expect("Failed to spawn clip GC thread");

    rx.recv().expect("Failed to receive GC handle")
}

/// Handle for creating `Shared<T>` allocations
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}
