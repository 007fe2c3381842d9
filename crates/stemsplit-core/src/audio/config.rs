//! Output stream preferences
//!
//! What the user asks of the output device. These are requests, not
//! guarantees: `start_audio_system` reports the rate it actually opened.

use serde::{Deserialize, Serialize};

/// Largest block the render callback prepares for without allocating.
/// Bigger device blocks are rendered in several passes.
pub const MAX_BUFFER_SIZE: usize = 8192;

/// Smallest fixed period accepted from the config file
pub const MIN_BUFFER_SIZE: u32 = 64;

/// Rate asked of the device when the config names none.
///
/// A device that cannot run at this rate opens at its own maximum, and clips
/// are decoded to match it.
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Period size of the output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BufferSize {
    /// Leave the period to the audio host
    #[default]
    Default,
    /// Ask for this many frames per callback, clamped to
    /// `MIN_BUFFER_SIZE..=MAX_BUFFER_SIZE`
    Fixed(u32),
}

/// Output device name plus the host it was listed under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    pub name: String,
    /// Host name as shown in the device list ("ALSA", "CoreAudio", ...).
    /// Without one every host is searched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    pub fn with_host(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: Some(host.to_string()),
        }
    }

    /// "[host] name", or just the name
    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

/// The `audio:` section of the mixer config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Unset means the default output of the default host
    pub device: Option<DeviceId>,
    pub buffer_size: BufferSize,
    /// Unset means `DEFAULT_SAMPLE_RATE`
    pub sample_rate: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_label() {
        assert_eq!(DeviceId::with_host("pulse", "ALSA").display_label(), "[ALSA] pulse");
        let any_host = DeviceId {
            name: String::from("pulse"),
            host: None,
        };
        assert_eq!(any_host.display_label(), "pulse");
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: AudioConfig = serde_yaml::from_str("sample_rate: 44100\n").unwrap();
        assert_eq!(config.sample_rate, Some(44100));
        assert_eq!(config.buffer_size, BufferSize::Default);
        assert!(config.device.is_none());
    }

    #[test]
    fn test_fixed_buffer_size_from_yaml() {
        let config: AudioConfig = serde_yaml::from_str(
            "buffer_size: !Fixed 256\ndevice:\n  name: pulse\n  host: ALSA\n",
        )
        .unwrap();
        assert_eq!(config.buffer_size, BufferSize::Fixed(256));
        assert_eq!(config.device, Some(DeviceId::with_host("pulse", "ALSA")));
    }
}
