//! PlaybackController - channels, clip and session lifecycle

use std::path::Path;
use std::sync::Arc;

use basedrop::Shared;

use super::error::{ControllerError, ControllerResult};
use crate::audio::CommandSender;
use crate::audio_file::{decode_audio, AudioInfo, DecodeError, DecodedAudio};
use crate::engine::gc::gc_handle;
use crate::engine::{
    command_channel, EngineCommand, FanoutEngine, GainStage, PlaybackAtomics, PlaybackHandle,
    SessionId, SessionStart,
};
use crate::types::{ChannelSpec, PlaybackState, MAX_CHANNELS};

/// One mixer row: its static description and its persistent gain stage
#[derive(Debug)]
pub struct Channel {
    spec: ChannelSpec,
    gain: Arc<GainStage>,
}

impl Channel {
    fn new(spec: ChannelSpec) -> Self {
        let gain = Arc::new(GainStage::new(spec.default_volume));
        Self { spec, gain }
    }

    pub fn spec(&self) -> &ChannelSpec {
        &self.spec
    }

    /// Current gain level (0.0 - 1.0)
    pub fn volume(&self) -> f32 {
        self.gain.level()
    }
}

/// Transitions the controller reports from [`PlaybackController::sync`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session played to the end of the clip and was retired
    Ended { session: SessionId },
}

/// Bookkeeping for the session the controller last started
#[derive(Debug, Clone, Copy)]
struct ActiveSession {
    id: SessionId,
    handles: usize,
}

/// Owns the clip and the channels; drives the engine through its command queue
///
/// Invariant: while a session is recorded the engine was sent exactly one
/// handle per channel for it, and none otherwise.
pub struct PlaybackController {
    /// `None` when running without an audio device
    commands: Option<CommandSender>,
    atomics: Arc<PlaybackAtomics>,
    channels: Vec<Channel>,
    audio: Option<Shared<DecodedAudio>>,
    session: Option<ActiveSession>,
    last_session: SessionId,
    sample_rate: u32,
}

impl PlaybackController {
    /// Controller connected to a running engine
    pub fn new(
        channels: Vec<ChannelSpec>,
        commands: CommandSender,
        atomics: Arc<PlaybackAtomics>,
        sample_rate: u32,
    ) -> Self {
        Self::build(channels, Some(commands), atomics, sample_rate)
    }

    /// Controller with no audio output
    ///
    /// Loading, volumes and the play/stop state machine behave as usual; the
    /// handles are simply never rendered.
    pub fn disconnected(channels: Vec<ChannelSpec>, sample_rate: u32) -> Self {
        Self::build(channels, None, Arc::new(PlaybackAtomics::new()), sample_rate)
    }

    /// Controller paired with an engine the caller renders by hand
    ///
    /// Used for offline rendering and tests: call
    /// `engine.process_commands(&mut rx)` and `engine.process(..)` to advance.
    pub fn offline(
        channels: Vec<ChannelSpec>,
        sample_rate: u32,
    ) -> (Self, FanoutEngine, rtrb::Consumer<EngineCommand>) {
        let (producer, consumer) = command_channel();
        let engine = FanoutEngine::new();
        let controller = Self::new(
            channels,
            CommandSender { producer },
            engine.atomics(),
            sample_rate,
        );
        (controller, engine, consumer)
    }

    fn build(
        mut channels: Vec<ChannelSpec>,
        commands: Option<CommandSender>,
        atomics: Arc<PlaybackAtomics>,
        sample_rate: u32,
    ) -> Self {
        if channels.len() > MAX_CHANNELS {
            log::warn!(
                "{} channels configured, only the first {} are used",
                channels.len(),
                MAX_CHANNELS
            );
            channels.truncate(MAX_CHANNELS);
        }

        Self {
            commands,
            atomics,
            channels: channels.into_iter().map(Channel::new).collect(),
            audio: None,
            session: None,
            last_session: SessionId::NONE,
            sample_rate,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Audio loading
    // ─────────────────────────────────────────────────────────────────────

    /// Decode raw encoded bytes and make them the current clip
    ///
    /// On failure the previous clip and the playback state are untouched.
    pub fn load_audio(&mut self, raw_bytes: Vec<u8>) -> ControllerResult<AudioInfo> {
        self.load_with_hint(raw_bytes, None)
    }

    /// Read a file and load it, using the extension as a format hint
    pub fn load_file(&mut self, path: &Path) -> ControllerResult<AudioInfo> {
        let bytes = std::fs::read(path).map_err(DecodeError::Io)?;
        let hint = path.extension().and_then(|e| e.to_str());
        log::info!("Loading {}", path.display());
        self.load_with_hint(bytes, hint)
    }

    fn load_with_hint(&mut self, raw_bytes: Vec<u8>, hint: Option<&str>) -> ControllerResult<AudioInfo> {
        let decoded = decode_audio(raw_bytes, hint, self.sample_rate)?;
        self.install_audio(decoded)
    }

    /// Replace the current clip with audio decoded elsewhere
    ///
    /// A playing session is stopped first.
    pub fn install_audio(&mut self, decoded: DecodedAudio) -> ControllerResult<AudioInfo> {
        if decoded.sample_rate() != self.sample_rate {
            log::warn!(
                "Installed audio is at {} Hz but output runs at {} Hz",
                decoded.sample_rate(),
                self.sample_rate
            );
        }

        self.stop_session()?;

        let info = decoded.info();
        self.audio = Some(Shared::new(&gc_handle(), decoded));
        log::info!(
            "Audio loaded: {} frames ({:.2}s, source {} Hz, {} ch)",
            info.frames,
            info.duration_seconds,
            info.source_sample_rate,
            info.source_channels
        );
        Ok(info)
    }

    /// Drop the current clip, stopping playback first
    pub fn unload_audio(&mut self) -> ControllerResult<()> {
        self.stop_session()?;
        self.audio = None;
        Ok(())
    }

    pub fn audio_info(&self) -> Option<AudioInfo> {
        self.audio.as_ref().map(|a| a.info())
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Channels
    // ─────────────────────────────────────────────────────────────────────

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Set a channel's gain, returning the clamped level applied
    ///
    /// Reaches a playing channel at the next render quantum.
    pub fn set_channel_volume(&mut self, index: usize, level: f32) -> ControllerResult<f32> {
        let count = self.channels.len();
        let channel = self
            .channels
            .get(index)
            .ok_or(ControllerError::InvalidChannel { index, count })?;
        Ok(channel.gain.set(level))
    }

    pub fn channel_volume(&self, index: usize) -> Option<f32> {
        self.channels.get(index).map(Channel::volume)
    }

    /// Restore every channel to its configured default level
    pub fn reset_volumes(&mut self) {
        for channel in &self.channels {
            channel.gain.set(channel.spec.default_volume);
        }
    }

    /// Level the channel contributed to the last rendered quantum
    pub fn channel_peak(&self, index: usize) -> f32 {
        self.atomics.channel_peak(index)
    }

    /// Peak of the clipped mix in the last rendered quantum
    pub fn master_peak(&self) -> f32 {
        self.atomics.master_peak()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────────────

    pub fn playback_state(&self) -> PlaybackState {
        if self.session.is_some() {
            PlaybackState::Playing
        } else {
            PlaybackState::Stopped
        }
    }

    /// Number of playback handles of the current session (0 or N)
    pub fn live_handles(&self) -> usize {
        self.session.map(|s| s.handles).unwrap_or(0)
    }

    /// Playhead of the running session in seconds
    pub fn position_seconds(&self) -> f64 {
        if self.session.is_none() || self.sample_rate == 0 {
            return 0.0;
        }
        self.atomics.position() as f64 / self.sample_rate as f64
    }

    /// Rate clips must be decoded at to play at the right speed
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Flip between Stopped and Playing
    ///
    /// Starting creates one handle per channel, all bound to the same clip,
    /// and hands them to the engine in one command. Stopping discards them.
    pub fn toggle_playback(&mut self) -> ControllerResult<PlaybackState> {
        if self.session.is_some() {
            self.stop_session()?;
            return Ok(PlaybackState::Stopped);
        }

        let audio = self.audio.as_ref().ok_or(ControllerError::NoAudioLoaded)?;
        let id = self.last_session.next();
        let handles: Vec<PlaybackHandle> = self
            .channels
            .iter()
            .enumerate()
            .map(|(index, channel)| PlaybackHandle::new(index, audio.clone(), channel.gain.clone()))
            .collect();
        let count = handles.len();

        self.send(EngineCommand::Start(Box::new(SessionStart { id, handles })))?;

        self.last_session = id;
        self.session = Some(ActiveSession { id, handles: count });
        log::info!("Playback started ({} channels, session {})", count, id.0);
        Ok(PlaybackState::Playing)
    }

    /// Reconcile with the engine; call once per UI tick
    ///
    /// Returns [`SessionEvent::Ended`] when the current session reached the
    /// end of the clip, after which the controller is Stopped.
    pub fn sync(&mut self) -> Option<SessionEvent> {
        let active = self.session?;
        if self.atomics.finished_session() != active.id {
            return None;
        }
        self.session = None;
        log::info!("Playback reached end of clip (session {})", active.id.0);
        Some(SessionEvent::Ended { session: active.id })
    }

    fn stop_session(&mut self) -> ControllerResult<()> {
        let Some(active) = self.session else {
            return Ok(());
        };
        self.send(EngineCommand::Stop { session: active.id })?;
        self.session = None;
        log::info!("Playback stopped (session {})", active.id.0);
        Ok(())
    }

    fn send(&mut self, cmd: EngineCommand) -> ControllerResult<()> {
        match self.commands.as_mut() {
            Some(sender) => sender.send(cmd).map_err(|rejected| {
                log::warn!("Engine command queue full, dropped {:?}", rejected);
                ControllerError::EngineBusy
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_file::fixtures::sine_wav;
    use crate::engine::COMMAND_QUEUE_CAPACITY;
    use crate::types::{default_channels, StereoBuffer, StereoSample};

    const RATE: u32 = 48000;

    fn offline() -> (PlaybackController, FanoutEngine, rtrb::Consumer<EngineCommand>) {
        PlaybackController::offline(default_channels(), RATE)
    }

    /// Drain commands and render one quantum
    fn render(engine: &mut FanoutEngine, rx: &mut rtrb::Consumer<EngineCommand>, frames: usize) -> StereoBuffer {
        let mut out = StereoBuffer::silence(frames);
        engine.process_commands(rx);
        engine.process(&mut out);
        out
    }

    fn volumes(controller: &PlaybackController) -> Vec<f32> {
        controller.channels().iter().map(Channel::volume).collect()
    }

    #[test]
    fn test_load_then_play() {
        let (mut controller, _engine, _rx) = offline();

        let info = controller.load_audio(sine_wav(RATE, 2, 2.0, 0.5)).unwrap();
        assert_eq!(info.frames, 96000);
        assert_eq!(controller.playback_state(), PlaybackState::Stopped);

        assert_eq!(controller.toggle_playback().unwrap(), PlaybackState::Playing);
        assert_eq!(controller.live_handles(), 6);
    }

    #[test]
    fn test_malformed_input_keeps_previous_audio() {
        let (mut controller, _engine, _rx) = offline();
        let first = controller.load_audio(sine_wav(RATE, 1, 0.5, 0.5)).unwrap();

        let result = controller.load_audio(b"definitely not audio".to_vec());
        assert!(matches!(result, Err(ControllerError::Decode(_))));
        assert_eq!(controller.audio_info(), Some(first));
    }

    #[test]
    fn test_malformed_input_without_previous_audio() {
        let (mut controller, _engine, _rx) = offline();
        assert!(controller.load_audio(Vec::new()).is_err());
        assert!(!controller.has_audio());
    }

    #[test]
    fn test_toggle_without_audio() {
        let (mut controller, mut engine, mut rx) = offline();

        for _ in 0..2 {
            assert!(matches!(
                controller.toggle_playback(),
                Err(ControllerError::NoAudioLoaded)
            ));
            assert_eq!(controller.playback_state(), PlaybackState::Stopped);
            assert_eq!(controller.live_handles(), 0);
        }

        render(&mut engine, &mut rx, 64);
        assert_eq!(engine.atomics().live_handles(), 0);
    }

    #[test]
    fn test_live_handles_zero_or_n() {
        let (mut controller, mut engine, mut rx) = offline();
        controller.load_audio(sine_wav(RATE, 2, 1.0, 0.5)).unwrap();
        let n = controller.channels().len();

        for _ in 0..4 {
            controller.toggle_playback().unwrap();
            render(&mut engine, &mut rx, 256);
            let expected = if controller.playback_state().is_playing() { n } else { 0 };
            assert_eq!(controller.live_handles(), expected);
            assert_eq!(engine.atomics().live_handles(), expected);
        }
    }

    #[test]
    fn test_volume_idempotent_and_persistent() {
        let (mut controller, _engine, _rx) = offline();
        controller.load_audio(sine_wav(RATE, 2, 1.0, 0.5)).unwrap();

        controller.set_channel_volume(1, 0.3).unwrap();
        controller.set_channel_volume(1, 0.3).unwrap();
        assert_eq!(controller.channel_volume(1), Some(0.3));

        controller.toggle_playback().unwrap();
        controller.toggle_playback().unwrap();
        controller.toggle_playback().unwrap();
        assert_eq!(controller.channel_volume(1), Some(0.3));
    }

    #[test]
    fn test_volume_is_clamped() {
        let (mut controller, _engine, _rx) = offline();
        assert_eq!(controller.set_channel_volume(0, 1.5).unwrap(), 1.0);
        assert_eq!(controller.set_channel_volume(0, -2.0).unwrap(), 0.0);
        assert_eq!(controller.set_channel_volume(0, f32::NAN).unwrap(), 0.0);
    }

    #[test]
    fn test_muted_channel_is_silent_while_others_play() {
        let (mut controller, mut engine, mut rx) = offline();
        controller.load_audio(sine_wav(RATE, 2, 2.0, 0.5)).unwrap();
        controller.set_channel_volume(2, 0.0).unwrap();

        assert_eq!(controller.toggle_playback().unwrap(), PlaybackState::Playing);
        let out = render(&mut engine, &mut rx, 1024);

        let atomics = engine.atomics();
        assert_eq!(atomics.live_handles(), 6);
        for channel in 0..6 {
            let peak = controller.channel_peak(channel);
            if channel == 2 {
                assert_eq!(peak, 0.0);
            } else {
                assert!(peak > 0.1, "channel {} peak {}", channel, peak);
            }
        }
        assert!(out.peak() > 0.0);

        let before = volumes(&controller);
        assert_eq!(controller.toggle_playback().unwrap(), PlaybackState::Stopped);
        render(&mut engine, &mut rx, 1024);
        assert_eq!(atomics.live_handles(), 0);
        assert_eq!(controller.live_handles(), 0);
        assert_eq!(volumes(&controller), before);
    }

    #[test]
    fn test_volume_change_reaches_next_quantum() {
        let (mut controller, mut engine, mut rx) = offline();
        let clip = StereoBuffer::from_vec(vec![StereoSample::mono(0.5); RATE as usize]);
        controller
            .install_audio(DecodedAudio::from_buffer(clip, RATE))
            .unwrap();
        for channel in 1..6 {
            controller.set_channel_volume(channel, 0.0).unwrap();
        }
        controller.toggle_playback().unwrap();

        let first = render(&mut engine, &mut rx, 256);
        assert!((controller.channel_peak(0) - 0.5).abs() < 1e-6);
        assert!((controller.master_peak() - 0.5).abs() < 1e-6);
        assert!((first[255].left - 0.5).abs() < 1e-6);

        // No command is sent; the handle reads the shared gain each quantum
        assert_eq!(controller.set_channel_volume(0, 0.2).unwrap(), 0.2);
        let second = render(&mut engine, &mut rx, 256);
        assert!((controller.channel_peak(0) - 0.1).abs() < 1e-6);
        assert!((controller.master_peak() - 0.1).abs() < 1e-6);
        assert!(second.as_slice().iter().all(|s| (s.left - 0.1).abs() < 1e-6));
        assert_eq!(controller.playback_state(), PlaybackState::Playing);
        assert_eq!(engine.atomics().position(), 512);
    }

    #[test]
    fn test_all_channels_start_on_the_same_frame() {
        let (mut controller, mut engine, mut rx) = offline();
        controller.load_audio(sine_wav(RATE, 2, 0.5, 0.5)).unwrap();
        for channel in 1..6 {
            controller.set_channel_volume(channel, 0.0).unwrap();
        }

        // One channel alone gives the clip itself; six in phase give six times it
        controller.toggle_playback().unwrap();
        let solo = render(&mut engine, &mut rx, 512);
        controller.toggle_playback().unwrap();

        controller.reset_volumes();
        for channel in 0..6 {
            controller.set_channel_volume(channel, 0.1).unwrap();
        }
        controller.toggle_playback().unwrap();
        let all = render(&mut engine, &mut rx, 512);

        for frame in 0..512 {
            assert!((all[frame].left - solo[frame].left * 0.6).abs() < 1e-4);
        }
    }

    #[test]
    fn test_invalid_channel() {
        let (mut controller, _engine, _rx) = offline();
        let before = volumes(&controller);

        let result = controller.set_channel_volume(99, 0.5);
        assert!(matches!(
            result,
            Err(ControllerError::InvalidChannel { index: 99, count: 6 })
        ));
        assert_eq!(volumes(&controller), before);
        assert_eq!(controller.channel_volume(99), None);
    }

    #[test]
    fn test_reset_volumes() {
        let mut channels = default_channels();
        channels[0].default_volume = 0.8;
        let (mut controller, _engine, _rx) = PlaybackController::offline(channels, RATE);

        controller.set_channel_volume(0, 0.1).unwrap();
        controller.set_channel_volume(3, 0.2).unwrap();
        controller.reset_volumes();
        assert_eq!(controller.channel_volume(0), Some(0.8));
        assert_eq!(controller.channel_volume(3), Some(1.0));
    }

    #[test]
    fn test_clip_end_stops_playback() {
        let (mut controller, mut engine, mut rx) = offline();
        // 0.01s = 480 frames
        controller.load_audio(sine_wav(RATE, 2, 0.01, 0.5)).unwrap();
        controller.toggle_playback().unwrap();

        render(&mut engine, &mut rx, 256);
        assert_eq!(controller.sync(), None);
        assert!(controller.playback_state().is_playing());

        render(&mut engine, &mut rx, 256);
        assert_eq!(
            controller.sync(),
            Some(SessionEvent::Ended { session: SessionId(1) })
        );
        assert_eq!(controller.playback_state(), PlaybackState::Stopped);
        assert_eq!(controller.live_handles(), 0);

        // Play again restarts from the beginning
        controller.toggle_playback().unwrap();
        render(&mut engine, &mut rx, 128);
        assert_eq!(engine.atomics().position(), 128);
    }

    #[test]
    fn test_stop_after_clip_end_is_ignored_by_engine() {
        let (mut controller, mut engine, mut rx) = offline();
        controller.load_audio(sine_wav(RATE, 2, 0.01, 0.5)).unwrap();
        controller.toggle_playback().unwrap();
        render(&mut engine, &mut rx, 1024);
        assert_eq!(engine.atomics().finished_session(), SessionId(1));

        // User hits stop before the UI tick observed the end
        assert_eq!(controller.toggle_playback().unwrap(), PlaybackState::Stopped);
        assert_eq!(controller.toggle_playback().unwrap(), PlaybackState::Playing);

        render(&mut engine, &mut rx, 64);
        assert_eq!(engine.session_id(), Some(SessionId(2)));
        assert_eq!(engine.atomics().live_handles(), 6);
        assert_eq!(controller.sync(), None);
    }

    #[test]
    fn test_load_while_playing_stops_first() {
        let (mut controller, mut engine, mut rx) = offline();
        controller.load_audio(sine_wav(RATE, 2, 1.0, 0.5)).unwrap();
        controller.toggle_playback().unwrap();
        render(&mut engine, &mut rx, 256);

        let info = controller.load_audio(sine_wav(RATE, 1, 0.5, 0.25)).unwrap();
        assert_eq!(info.frames, 24000);
        assert_eq!(controller.playback_state(), PlaybackState::Stopped);

        render(&mut engine, &mut rx, 256);
        assert_eq!(engine.atomics().live_handles(), 0);
    }

    #[test]
    fn test_failed_load_while_playing_keeps_playing() {
        let (mut controller, _engine, _rx) = offline();
        controller.load_audio(sine_wav(RATE, 2, 1.0, 0.5)).unwrap();
        controller.toggle_playback().unwrap();

        assert!(controller.load_audio(b"junk".to_vec()).is_err());
        assert!(controller.playback_state().is_playing());
    }

    #[test]
    fn test_full_queue_reports_busy() {
        let (mut controller, _engine, _rx) = offline();
        controller.load_audio(sine_wav(RATE, 2, 0.1, 0.5)).unwrap();

        // Engine never drains: every toggle occupies one slot
        for _ in 0..COMMAND_QUEUE_CAPACITY {
            controller.toggle_playback().unwrap();
        }
        assert_eq!(controller.playback_state(), PlaybackState::Stopped);

        assert!(matches!(
            controller.toggle_playback(),
            Err(ControllerError::EngineBusy)
        ));
        assert_eq!(controller.playback_state(), PlaybackState::Stopped);
        assert_eq!(controller.live_handles(), 0);
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        std::fs::write(&path, sine_wav(RATE, 2, 0.25, 0.5)).unwrap();

        let mut controller = PlaybackController::disconnected(default_channels(), RATE);
        assert_eq!(controller.load_file(&path).unwrap().frames, 12000);

        let missing = controller.load_file(&dir.path().join("missing.mp3"));
        assert!(matches!(missing, Err(ControllerError::Decode(DecodeError::Io(_)))));
    }

    #[test]
    fn test_disconnected_state_machine() {
        let mut controller = PlaybackController::disconnected(default_channels(), RATE);
        controller.load_audio(sine_wav(RATE, 2, 0.1, 0.5)).unwrap();

        assert_eq!(controller.toggle_playback().unwrap(), PlaybackState::Playing);
        assert_eq!(controller.live_handles(), 6);
        assert_eq!(controller.sync(), None);

        controller.unload_audio().unwrap();
        assert_eq!(controller.playback_state(), PlaybackState::Stopped);
        assert!(matches!(
            controller.toggle_playback(),
            Err(ControllerError::NoAudioLoaded)
        ));
    }
}
