//! Audio file decoding
//!
//! Turns the raw bytes of a user-selected file into [`DecodedAudio`]: one
//! immutable stereo buffer at the output sample rate, shared read-only by
//! every mixer channel for the lifetime of a playback session.
//!
//! Decoding goes through symphonia's format detection and codec registry, so any
//! container/codec pair enabled in the crate features is accepted. Mono
//! sources are duplicated to both sides, sources with more than two channels
//! keep the first two, and a rate mismatch is fixed with rubato's sinc
//! resampler.

use std::io::Cursor;
use std::path::Path;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use crate::types::{Sample, StereoBuffer};

/// File extensions the file picker offers, lowercase.
///
/// Each one maps to a container reader and codec enabled in this crate's
/// symphonia features.
pub const SUPPORTED_EXTENSIONS: [&str; 8] = ["wav", "aiff", "aif", "flac", "mp3", "ogg", "m4a", "aac"];

/// Errors produced while turning encoded bytes into samples
#[derive(Error, Debug)]
pub enum DecodeError {
    /// No format reader recognised the data
    #[error("Unsupported or malformed audio data: {0}")]
    Unsupported(String),

    /// The container has no decodable audio track
    #[error("No audio track found")]
    NoAudioTrack,

    /// The codec could not be instantiated or failed fatally
    #[error("Codec error: {0}")]
    Codec(String),

    /// Decoding finished without producing a single frame
    #[error("File contains no audio frames")]
    Empty,

    /// Sample rate conversion failed
    #[error("Resampling failed: {0}")]
    Resample(String),

    /// The file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for decoding
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Decoded, immutable stereo audio ready for playback
#[derive(Clone)]
pub struct DecodedAudio {
    samples: StereoBuffer,
    /// Rate of `samples` (the output device rate)
    sample_rate: u32,
    /// Rate of the encoded source before conversion
    source_sample_rate: u32,
    /// Channel count of the encoded source
    source_channels: u16,
}

impl DecodedAudio {
    /// Wrap already-decoded stereo samples
    pub fn from_buffer(samples: StereoBuffer, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            source_sample_rate: sample_rate,
            source_channels: 2,
        }
    }

    /// Stereo samples at [`Self::sample_rate`]
    #[inline]
    pub fn samples(&self) -> &StereoBuffer {
        &self.samples
    }

    /// Number of stereo frames
    #[inline]
    pub fn frames(&self) -> usize {
        self.samples.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.duration_seconds(self.sample_rate)
    }

    /// Summary for the UI and logs
    pub fn info(&self) -> AudioInfo {
        AudioInfo {
            frames: self.frames(),
            sample_rate: self.sample_rate,
            source_sample_rate: self.source_sample_rate,
            source_channels: self.source_channels,
            duration_seconds: self.duration_seconds(),
        }
    }
}

impl std::fmt::Debug for DecodedAudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedAudio")
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate)
            .field("source_sample_rate", &self.source_sample_rate)
            .field("source_channels", &self.source_channels)
            .finish()
    }
}

/// Lightweight description of the loaded clip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioInfo {
    pub frames: usize,
    pub sample_rate: u32,
    pub source_sample_rate: u32,
    pub source_channels: u16,
    pub duration_seconds: f64,
}

/// Decode encoded audio bytes into stereo samples at `target_sample_rate`
///
/// `hint` is an optional file extension ("mp3", "wav", ...) that lets the
/// format detection try the likely reader first; it works without one.
pub fn decode_audio(
    bytes: Vec<u8>,
    hint: Option<&str>,
    target_sample_rate: u32,
) -> DecodeResult<DecodedAudio> {
    let byte_len = bytes.len();
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut format_hint = Hint::new();
    if let Some(ext) = hint {
        format_hint.with_extension(ext);
    }

    let detected = symphonia::default::get_probe()
        .format(&format_hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;

    let mut format = detected.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudioTrack)?;

    let track_id = track.id;
    let mut source_rate = track.codec_params.sample_rate;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Codec(e.to_string()))?;

    let mut left: Vec<Sample> = Vec::new();
    let mut right: Vec<Sample> = Vec::new();
    let mut source_channels: u16 = 0;
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => {
                log::warn!("decode_audio: error reading packet, stopping: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("decode_audio: skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(DecodeError::Codec(e.to_string())),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();
        if channels == 0 {
            continue;
        }
        source_channels = channels as u16;
        source_rate.get_or_insert(spec.rate);

        // Packets may grow (e.g. variable frame sizes), so reallocate when needed
        let needed = decoded.capacity() as u64;
        if sample_buf.as_ref().map_or(true, |b| (b.capacity() as u64) < needed * channels as u64) {
            sample_buf = Some(SampleBuffer::new(needed, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            for frame in buf.samples().chunks_exact(channels) {
                left.push(frame[0]);
                right.push(if channels > 1 { frame[1] } else { frame[0] });
            }
        }
    }

    if left.is_empty() {
        return Err(DecodeError::Empty);
    }

    let source_rate = source_rate.ok_or_else(|| DecodeError::Codec("Unknown sample rate".to_string()))?;

    log::info!(
        "decode_audio: {} bytes -> {} frames, {} ch @ {}Hz",
        byte_len,
        left.len(),
        source_channels,
        source_rate
    );

    let (left, right) = if source_rate != target_sample_rate {
        resample_stereo(left, right, source_rate, target_sample_rate)?
    } else {
        (left, right)
    };

    if left.is_empty() {
        return Err(DecodeError::Empty);
    }

    Ok(DecodedAudio {
        samples: StereoBuffer::from_channels(&left, &right),
        sample_rate: target_sample_rate,
        source_sample_rate: source_rate,
        source_channels,
    })
}

/// Read a file from disk and decode it, using its extension as format hint
pub fn decode_file(path: &Path, target_sample_rate: u32) -> DecodeResult<DecodedAudio> {
    let bytes = std::fs::read(path)?;
    let ext = path.extension().and_then(|e| e.to_str());
    decode_audio(bytes, ext, target_sample_rate)
}

/// Convert both channels from `source_rate` to `target_rate` in one pass
///
/// The sinc filter delays its output by half its length, so that many
/// leading frames are dropped and the held-back tail is flushed with a
/// zero-input call. The result is aligned with the input and
/// `len * target / source` frames long.
fn resample_stereo(
    left: Vec<Sample>,
    right: Vec<Sample>,
    source_rate: u32,
    target_rate: u32,
) -> DecodeResult<(Vec<Sample>, Vec<Sample>)> {
    log::info!("Resampling from {} Hz to {} Hz", source_rate, target_rate);

    let ratio = target_rate as f64 / source_rate as f64;
    let expected_frames = (left.len() as f64 * ratio).round() as usize;

    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<Sample>::new(ratio, 2.0, params, left.len(), 2)
        .map_err(|e| DecodeError::Resample(e.to_string()))?;
    let delay = resampler.output_delay();

    let waves_in = vec![left, right];
    let mut waves_out = resampler
        .process(&waves_in, None)
        .map_err(|e| DecodeError::Resample(e.to_string()))?;
    let tail = resampler
        .process_partial(None::<&[Vec<Sample>]>, None)
        .map_err(|e| DecodeError::Resample(e.to_string()))?;

    for (wave, rest) in waves_out.iter_mut().zip(tail) {
        wave.extend(rest);
        wave.drain(..delay.min(wave.len()));
        wave.truncate(expected_frames);
    }

    let mut waves_out = waves_out.into_iter();
    let left = waves_out.next().unwrap_or_default();
    let right = waves_out.next().unwrap_or_default();
    Ok((left, right))
}

/// In-memory PCM fixtures for tests across the crate
#[cfg(test)]
pub(crate) mod fixtures {
    use std::io::Cursor;

    /// 16-bit samples of a 440 Hz tone, one per frame
    fn sine_pcm(sample_rate: u32, seconds: f32, amplitude: f32) -> Vec<i16> {
        let frames = (sample_rate as f32 * seconds).round() as usize;
        (0..frames)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                let value = (t * 440.0 * std::f32::consts::TAU).sin() * amplitude;
                (value * i16::MAX as f32) as i16
            })
            .collect()
    }

    /// A sine tone encoded as 16-bit PCM WAV
    pub(crate) fn sine_wav(sample_rate: u32, channels: u16, seconds: f32, amplitude: f32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut bytes = Vec::new();
        {
            let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec).unwrap();
            for pcm in sine_pcm(sample_rate, seconds, amplitude) {
                for _ in 0..channels {
                    writer.write_sample(pcm).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        bytes
    }

    /// The same tone as [`sine_wav`] in a big-endian AIFF container
    pub(crate) fn sine_aiff(sample_rate: u32, channels: u16, seconds: f32, amplitude: f32) -> Vec<u8> {
        let pcm = sine_pcm(sample_rate, seconds, amplitude);
        let data_len = (pcm.len() * channels as usize * 2) as u32;

        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"FORM");
        bytes.extend_from_slice(&(4 + 26 + 16 + data_len).to_be_bytes());
        bytes.extend_from_slice(b"AIFF");

        bytes.extend_from_slice(b"COMM");
        bytes.extend_from_slice(&18u32.to_be_bytes());
        bytes.extend_from_slice(&channels.to_be_bytes());
        bytes.extend_from_slice(&(pcm.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&16u16.to_be_bytes());
        bytes.extend_from_slice(&extended_rate(sample_rate));

        bytes.extend_from_slice(b"SSND");
        bytes.extend_from_slice(&(8 + data_len).to_be_bytes());
        bytes.extend_from_slice(&[0; 8]); // offset, block size
        for sample in pcm {
            for _ in 0..channels {
                bytes.extend_from_slice(&sample.to_be_bytes());
            }
        }
        bytes
    }

    /// A positive integer as an 80-bit IEEE extended float (AIFF rate field)
    fn extended_rate(rate: u32) -> [u8; 10] {
        let exponent = 31 - rate.leading_zeros();
        let mut out = [0u8; 10];
        out[..2].copy_from_slice(&((16383 + exponent) as u16).to_be_bytes());
        out[2..].copy_from_slice(&((rate as u64) << (63 - exponent)).to_be_bytes());
        out
    }
}
