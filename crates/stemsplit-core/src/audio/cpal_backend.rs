//! CPAL audio backend implementation
//!
//! Opens one stereo output stream and drives the [`FanoutEngine`] from its
//! callback.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │     UI Thread    │───push()───────────►│   Command Queue     │
//! │   (~33ms tick)   │                     │  (lock-free SPSC)   │
//! └──────────────────┘                     └──────────┬──────────┘
//!         ▲                                           │
//!         │ Relaxed atomics                           │ pop()
//!         │                                           ▼
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │ PlaybackAtomics  │◄────────────────────│  CPAL Audio Thread  │
//! │   (lock-free)    │     sync writes     │ (owns FanoutEngine) │
//! └──────────────────┘                     └─────────────────────┘
//! ```

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, Stream, StreamConfig, SupportedStreamConfig};

use super::backend::{AudioSystemResult, CommandSender};
use super::config::{AudioConfig, BufferSize, DEFAULT_SAMPLE_RATE, MAX_BUFFER_SIZE, MIN_BUFFER_SIZE};
use super::device::{find_device_by_id, get_cpal_default_device};
use super::error::{AudioError, AudioResult};
use crate::engine::{command_channel, EngineCommand, FanoutEngine};
use crate::types::StereoBuffer;

/// Keeps the output stream running; drop it to silence the device
pub struct AudioHandle {
    _stream: Stream,
}

/// Open the output, move a fresh engine into its callback and start it
pub fn start_audio_system(config: &AudioConfig) -> AudioResult<AudioSystemResult> {
    let device = match &config.device {
        Some(id) => find_device_by_id(id)?,
        None => get_cpal_default_device()?,
    };
    log::info!(
        "Opening output device {}",
        device.name().unwrap_or_else(|_| String::from("<unnamed>"))
    );

    let requested_rate = config.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);
    let supported = pick_output_config(&device, requested_rate)?;
    let sample_rate = supported.sample_rate().0;

    let stream_config = StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: stream_buffer_size(config.buffer_size),
    };

    match stream_config.buffer_size {
        CpalBufferSize::Fixed(frames) => log::info!(
            "Output: {} ch @ {} Hz, {} frames per period ({:.1} ms)",
            stream_config.channels,
            sample_rate,
            frames,
            frames as f32 * 1000.0 / sample_rate as f32
        ),
        CpalBufferSize::Default => log::info!(
            "Output: {} ch @ {} Hz, period chosen by the host",
            stream_config.channels,
            sample_rate
        ),
    }

    let engine = FanoutEngine::new();
    let atomics = engine.atomics();
    let (command_tx, command_rx) = command_channel();

    let stream = build_output_stream(
        &device,
        &stream_config,
        AudioCallbackState::new(engine, command_rx),
    )?;
    stream
        .play()
        .map_err(|e| AudioError::PlayStream(e.to_string()))?;

    Ok(AudioSystemResult {
        handle: AudioHandle { _stream: stream },
        command_sender: CommandSender { producer: command_tx },
        atomics,
        sample_rate,
    })
}

/// Period size handed to CPAL for the configured preference
fn stream_buffer_size(requested: BufferSize) -> CpalBufferSize {
    match requested {
        BufferSize::Default => CpalBufferSize::Default,
        BufferSize::Fixed(frames) => {
            CpalBufferSize::Fixed(frames.clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE as u32))
        }
    }
}

/// State owned by the output callback
struct AudioCallbackState {
    /// The engine (owned exclusively by audio thread)
    engine: FanoutEngine,
    /// Command receiver from UI
    command_rx: rtrb::Consumer<EngineCommand>,
    /// Pre-allocated render buffer
    buffer: StereoBuffer,
}

impl AudioCallbackState {
    fn new(engine: FanoutEngine, command_rx: rtrb::Consumer<EngineCommand>) -> Self {
        Self {
            engine,
            command_rx,
            buffer: StereoBuffer::with_capacity(MAX_BUFFER_SIZE),
        }
    }

    /// Render into an interleaved device buffer with `channels` channels
    ///
    /// Devices may hand out blocks larger than the pre-allocated buffer, so
    /// the block is rendered in chunks of at most `MAX_BUFFER_SIZE` frames.
    fn render(&mut self, data: &mut [f32], channels: usize) {
        self.engine.process_commands(&mut self.command_rx);

        for block in data.chunks_mut(MAX_BUFFER_SIZE * channels) {
            let n_frames = block.len() / channels;
            self.buffer.set_len_from_capacity(n_frames);
            self.engine.process(&mut self.buffer);

            for (frame, sample) in block.chunks_mut(channels).zip(self.buffer.as_slice()) {
                frame[0] = sample.left;
                if channels > 1 {
                    frame[1] = sample.right;
                }
                for ch in frame.iter_mut().skip(2) {
                    *ch = 0.0;
                }
            }
        }
    }
}

/// Choose an f32 configuration, preferring stereo and `requested_rate`
///
/// Falls back to the range's maximum rate when no stereo f32 range covers
/// the requested one.
fn pick_output_config(device: &cpal::Device, requested_rate: u32) -> AudioResult<SupportedStreamConfig> {
    let ranges: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::Query(e.to_string()))?
        .collect();

    let covers = |range: &cpal::SupportedStreamConfigRange| {
        (range.min_sample_rate().0..=range.max_sample_rate().0).contains(&requested_rate)
    };

    let Some(range) = ranges
        .iter()
        .filter(|r| r.sample_format() == SampleFormat::F32)
        .max_by_key(|r| (r.channels() >= 2, covers(r)))
    else {
        return Err(AudioError::UnsupportedFormat(
            ranges
                .first()
                .map(|r| r.sample_format().to_string())
                .unwrap_or_else(|| String::from("(none offered)")),
        ));
    };

    if covers(range) {
        return Ok(range.clone().with_sample_rate(cpal::SampleRate(requested_rate)));
    }

    let fallback = range.clone().with_max_sample_rate();
    log::warn!(
        "Output device cannot run at {} Hz, using {} Hz; clips will be resampled",
        requested_rate,
        fallback.sample_rate().0
    );
    Ok(fallback)
}

/// Build the output stream; the callback owns the engine
fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut state: AudioCallbackState,
) -> AudioResult<Stream> {
    let channels = (config.channels as usize).max(1);

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                state.render(data, channels);
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None, // No timeout (blocking)
        )
        .map_err(|e| AudioError::BuildStream(e.to_string()))
}
