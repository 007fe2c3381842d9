//! Fan-out engine - renders every live channel of a playback session
//!
//! Owned exclusively by the audio thread. The UI side never touches it
//! directly: it pushes [`EngineCommand`]s through the lock-free queue and reads
//! back state from [`PlaybackAtomics`].

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use super::command::{EngineCommand, SessionId, SessionStart};
use crate::types::{Sample, StereoBuffer, MAX_CHANNELS};

/// Lock-free engine state for UI access
///
/// Written by the audio thread once per render quantum, read by the UI on its
/// tick. All accesses are relaxed; every field is a standalone snapshot.
pub struct PlaybackAtomics {
    /// Session currently installed in the engine (0 = none)
    pub active_session: AtomicU64,
    /// Last session that ran to the end of the clip (0 = none)
    pub finished_session: AtomicU64,
    /// Number of handles the engine is rendering
    pub live_handles: AtomicUsize,
    /// Playhead of the active session in frames
    pub position: AtomicU64,
    /// Peak level each channel contributed in the last quantum (f32 bits)
    pub channel_peaks: [AtomicU32; MAX_CHANNELS],
    /// Peak of the master output after clipping (f32 bits)
    pub master_peak: AtomicU32,
}

impl PlaybackAtomics {
    pub fn new() -> Self {
        Self {
            active_session: AtomicU64::new(0),
            finished_session: AtomicU64::new(0),
            live_handles: AtomicUsize::new(0),
            position: AtomicU64::new(0),
            channel_peaks: std::array::from_fn(|_| AtomicU32::new(0)),
            master_peak: AtomicU32::new(0),
        }
    }

    #[inline]
    pub fn active_session(&self) -> SessionId {
        SessionId(self.active_session.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn finished_session(&self) -> SessionId {
        SessionId(self.finished_session.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn live_handles(&self) -> usize {
        self.live_handles.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    /// Last peak of a channel, 0.0 for out-of-range indices
    #[inline]
    pub fn channel_peak(&self, channel: usize) -> f32 {
        self.channel_peaks
            .get(channel)
            .map(|p| f32::from_bits(p.load(Ordering::Relaxed)))
            .unwrap_or(0.0)
    }

    #[inline]
    pub fn master_peak(&self) -> f32 {
        f32::from_bits(self.master_peak.load(Ordering::Relaxed))
    }

    fn clear_meters(&self) {
        for peak in &self.channel_peaks {
            peak.store(0, Ordering::Relaxed);
        }
        self.master_peak.store(0, Ordering::Relaxed);
    }
}

impl Default for PlaybackAtomics {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for FanoutEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// The audio-thread half of the mixer
pub struct FanoutEngine {
    session: Option<Box<SessionStart>>,
    atomics: Arc<PlaybackAtomics>,
}

impl FanoutEngine {
    pub fn new() -> Self {
        Self {
            session: None,
            atomics: Arc::new(PlaybackAtomics::new()),
        }
    }

    /// Shared state for the UI side (clone before moving the engine)
    pub fn atomics(&self) -> Arc<PlaybackAtomics> {
        self.atomics.clone()
    }

    /// Id of the installed session, if any
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Drain all pending commands (call at the start of every quantum)
    pub fn process_commands(&mut self, rx: &mut rtrb::Consumer<EngineCommand>) {
        while let Ok(cmd) = rx.pop() {
            self.handle_command(cmd);
        }
    }

    pub fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::Start(start) => {
                self.atomics.active_session.store(start.id.0, Ordering::Relaxed);
                self.atomics.live_handles.store(start.handles.len(), Ordering::Relaxed);
                self.atomics.position.store(0, Ordering::Relaxed);
                self.session = Some(start);
            }
            EngineCommand::Stop { session } => {
                if self.session_id() == Some(session) {
                    self.session = None;
                    self.publish_idle();
                }
            }
        }
    }

    /// Render one quantum into `output`
    ///
    /// `output.len()` is the quantum size; the buffer is overwritten.
    pub fn process(&mut self, output: &mut StereoBuffer) {
        output.fill_silence();

        let Some(session) = self.session.as_mut() else {
            self.atomics.clear_meters();
            return;
        };

        let out = output.as_mut_slice();
        let mut finished = true;
        let mut position = 0;
        for handle in session.handles.iter_mut() {
            let peak = handle.render_into(out);
            if let Some(meter) = self.atomics.channel_peaks.get(handle.channel()) {
                meter.store(peak.to_bits(), Ordering::Relaxed);
            }
            finished &= handle.is_finished();
            position = position.max(handle.position());
        }
        self.atomics.position.store(position as u64, Ordering::Relaxed);

        let mut master: Sample = 0.0;
        for sample in out.iter_mut() {
            *sample = sample.clamp_unit();
            master = master.max(sample.peak());
        }
        self.atomics.master_peak.store(master.to_bits(), Ordering::Relaxed);

        if finished {
            let id = session.id;
            self.session = None;
            self.atomics.finished_session.store(id.0, Ordering::Relaxed);
            self.publish_idle();
        }
    }

    fn publish_idle(&self) {
        self.atomics.active_session.store(SessionId::NONE.0, Ordering::Relaxed);
        self.atomics.live_handles.store(0, Ordering::Relaxed);
        self.atomics.position.store(0, Ordering::Relaxed);
        self.atomics.clear_meters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_file::DecodedAudio;
    use crate::engine::gc::gc_handle;
    use crate::engine::handle::{GainStage, PlaybackHandle};
    use crate::types::StereoSample;
    use basedrop::Shared;

    fn session(id: u64, frames: usize, gains: &[f32]) -> Box<SessionStart> {
        let audio = Shared::new(
            &gc_handle(),
            DecodedAudio::from_buffer(
                StereoBuffer::from_vec(vec![StereoSample::mono(0.5); frames]),
                48000,
            ),
        );
        let handles = gains
            .iter()
            .enumerate()
            .map(|(i, &g)| PlaybackHandle::new(i, audio.clone(), Arc::new(GainStage::new(g))))
            .collect();
        Box::new(SessionStart { id: SessionId(id), handles })
    }

    #[test]
    fn test_process_empty_engine() {
        let mut engine = FanoutEngine::new();
        let mut out = StereoBuffer::silence(64);
        out[0] = StereoSample::mono(0.9);
        engine.process(&mut out);
        assert_eq!(out.peak(), 0.0);
        assert_eq!(engine.atomics().live_handles(), 0);
    }

    #[test]
    fn test_start_renders_all_channels() {
        let mut engine = FanoutEngine::new();
        let atomics = engine.atomics();
        engine.handle_command(EngineCommand::Start(session(1, 1000, &[1.0, 0.0, 0.5])));

        assert_eq!(atomics.active_session(), SessionId(1));
        assert_eq!(atomics.live_handles(), 3);

        let mut out = StereoBuffer::silence(128);
        engine.process(&mut out);

        assert!((atomics.channel_peak(0) - 0.5).abs() < 1e-6);
        assert_eq!(atomics.channel_peak(1), 0.0);
        assert!((atomics.channel_peak(2) - 0.25).abs() < 1e-6);
        assert!((out[0].left - 0.75).abs() < 1e-6);
        assert_eq!(atomics.position(), 128);
    }

    #[test]
    fn test_master_is_clipped() {
        let mut engine = FanoutEngine::new();
        engine.handle_command(EngineCommand::Start(session(1, 100, &[1.0; 4])));

        let mut out = StereoBuffer::silence(32);
        engine.process(&mut out);
        assert_eq!(out.peak(), 1.0);
        assert_eq!(engine.atomics().master_peak(), 1.0);
    }

    #[test]
    fn test_stop_matches_session_id() {
        let mut engine = FanoutEngine::new();
        let atomics = engine.atomics();
        engine.handle_command(EngineCommand::Start(session(2, 1000, &[1.0, 1.0])));

        // Stale stop is ignored
        engine.handle_command(EngineCommand::Stop { session: SessionId(1) });
        assert_eq!(atomics.live_handles(), 2);

        engine.handle_command(EngineCommand::Stop { session: SessionId(2) });
        assert_eq!(atomics.live_handles(), 0);
        assert_eq!(atomics.active_session(), SessionId::NONE);
        assert_eq!(atomics.finished_session(), SessionId::NONE);

        let mut out = StereoBuffer::silence(32);
        engine.process(&mut out);
        assert_eq!(out.peak(), 0.0);
    }

    #[test]
    fn test_session_retires_at_end_of_clip() {
        let mut engine = FanoutEngine::new();
        let atomics = engine.atomics();
        engine.handle_command(EngineCommand::Start(session(5, 100, &[1.0, 1.0])));

        let mut out = StereoBuffer::silence(64);
        engine.process(&mut out);
        assert_eq!(atomics.live_handles(), 2);

        engine.process(&mut out);
        assert_eq!(atomics.live_handles(), 0);
        assert_eq!(atomics.finished_session(), SessionId(5));
        assert!(engine.session_id().is_none());
        // Tail of the clip still reached the output
        assert!(out[35].left > 0.0);
        assert_eq!(out[36], StereoSample::silence());
    }

    #[test]
    fn test_process_commands_drains_queue() {
        let (mut tx, mut rx) = crate::engine::command_channel();
        let mut engine = FanoutEngine::new();

        tx.push(EngineCommand::Start(session(1, 100, &[1.0]))).unwrap();
        tx.push(EngineCommand::Stop { session: SessionId(1) }).unwrap();
        tx.push(EngineCommand::Start(session(2, 100, &[1.0, 1.0]))).unwrap();

        engine.process_commands(&mut rx);
        assert_eq!(engine.session_id(), Some(SessionId(2)));
        assert_eq!(engine.atomics().live_handles(), 2);
    }
}
