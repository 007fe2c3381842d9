//! Messages for the mixer application

use std::path::PathBuf;

use stemsplit_core::audio_file::DecodedAudio;

#[derive(Debug, Clone)]
pub enum Message {
    /// Periodic UI refresh (meters, end-of-clip detection)
    Tick,
    /// Open the file picker
    OpenFile,
    /// File picker closed (None = cancelled)
    FileChosen(Option<PathBuf>),
    /// Background decode finished
    AudioDecoded(PathBuf, Result<DecodedAudio, String>),
    /// Channel slider moved
    SetChannelVolume(usize, f32),
    /// Play All / Stop All button
    TogglePlayback,
    /// Return every slider to its default
    ResetVolumes,
}
