//! Gain stages and per-channel playback handles
//!
//! A [`GainStage`] is the persistent volume control of one mixer channel. It
//! outlives playback sessions and is shared between the controller (which
//! writes it from the slider) and the channel's live [`PlaybackHandle`]
//! (which reads it once per render quantum on the audio thread).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use basedrop::Shared;

use crate::audio_file::DecodedAudio;
use crate::types::{Sample, StereoSample};

/// Lock-free gain level in [0.0, 1.0]
///
/// Stored as `f32` bits in an `AtomicU32`; relaxed ordering is enough because
/// each stage has a single writer and the value stands alone.
#[derive(Debug)]
pub struct GainStage {
    bits: AtomicU32,
}

impl GainStage {
    pub fn new(level: f32) -> Self {
        Self {
            bits: AtomicU32::new(Self::clamp(level).to_bits()),
        }
    }

    /// Clamp into [0.0, 1.0]; NaN counts as silence
    #[inline]
    pub fn clamp(level: f32) -> f32 {
        if level.is_nan() {
            0.0
        } else {
            level.clamp(0.0, 1.0)
        }
    }

    /// Store a new level, returning the clamped value actually applied
    #[inline]
    pub fn set(&self, level: f32) -> f32 {
        let level = Self::clamp(level);
        self.bits.store(level.to_bits(), Ordering::Relaxed);
        level
    }

    #[inline]
    pub fn level(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

impl Default for GainStage {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// One channel's live playback of the shared clip
///
/// Created on the UI thread when a session starts, moved to the audio thread
/// inside the start command, dropped when the session stops or runs out.
pub struct PlaybackHandle {
    channel: usize,
    audio: Shared<DecodedAudio>,
    gain: Arc<GainStage>,
    position: usize,
}

impl PlaybackHandle {
    pub fn new(channel: usize, audio: Shared<DecodedAudio>, gain: Arc<GainStage>) -> Self {
        Self {
            channel,
            audio,
            gain,
            position: 0,
        }
    }

    /// Mixer channel this handle feeds
    #[inline]
    pub fn channel(&self) -> usize {
        self.channel
    }

    /// Next frame to be rendered
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// True once every frame of the clip has been rendered
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.position >= self.audio.frames()
    }

    /// Mix the next `out.len()` frames, scaled by the channel gain, into `out`
    ///
    /// The gain is sampled once for the whole quantum, so a slider move takes
    /// effect at the next quantum boundary. Returns the peak level this
    /// channel contributed, used for the row meters.
    pub fn render_into(&mut self, out: &mut [StereoSample]) -> Sample {
        let source = self.audio.samples().as_slice();
        let remaining = source.len().saturating_sub(self.position);
        let n = remaining.min(out.len());
        if n == 0 {
            return 0.0;
        }

        let gain = self.gain.level();
        let mut peak: Sample = 0.0;
        for (dst, src) in out[..n]
            .iter_mut()
            .zip(&source[self.position..self.position + n])
        {
            let scaled = *src * gain;
            peak = peak.max(scaled.peak());
            *dst += scaled;
        }

        self.position += n;
        peak
    }
}
