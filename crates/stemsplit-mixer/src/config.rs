//! Mixer configuration
//!
//! Stored as YAML in the user's config directory.
//! Default location: ~/.config/stemsplit/config.yaml
//!
//! ```yaml
//! audio:
//!   device: null
//!   buffer_size: Default
//!   sample_rate: 48000
//! channels:
//!   - label: Drums
//!     icon: "🥁"
//!     default_volume: 1.0
//! ```

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use stemsplit_core::audio::AudioConfig;
use stemsplit_core::{default_channels, ChannelSpec};

const CONFIG_FILENAME: &str = "config.yaml";

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Output device, buffer size and sample rate preferences
    pub audio: AudioConfig,
    /// Mixer rows, top to bottom
    pub channels: Vec<ChannelSpec>,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            channels: default_channels(),
        }
    }
}

impl MixerConfig {
    /// Channels to build the mixer with; an empty list means the stock six
    pub fn channel_specs(&self) -> Vec<ChannelSpec> {
        if self.channels.is_empty() {
            log::warn!("Config lists no channels, using the default layout");
            return default_channels();
        }
        self.channels.clone()
    }
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    stemsplit_core::config::default_config_path(CONFIG_FILENAME)
}

/// Load the mixer config, falling back to defaults
pub fn load_config(path: &Path) -> MixerConfig {
    stemsplit_core::config::load_config(path)
}

/// Write the mixer config
pub fn save_config(config: &MixerConfig, path: &Path) -> Result<()> {
    stemsplit_core::config::save_config(config, path)
}
