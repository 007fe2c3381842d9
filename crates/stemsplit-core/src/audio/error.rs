use thiserror::Error;

/// Why the output stream could not be opened
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("no audio output device is available on any host")]
    NoDevices,

    #[error("the default host reports no default output device")]
    NoDefaultDevice,

    #[error("output device {0} is not connected")]
    DeviceNotFound(String),

    /// Querying the device's supported configurations failed
    #[error("cannot query output device: {0}")]
    Query(String),

    #[error("cannot open output stream: {0}")]
    BuildStream(String),

    #[error("output stream refused to start: {0}")]
    PlayStream(String),

    /// The device only offers non-f32 output
    #[error("sample format {0} is not supported")]
    UnsupportedFormat(String),
}

pub type AudioResult<T> = Result<T, AudioError>;
