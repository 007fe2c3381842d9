//! Standard configuration locations

use std::path::PathBuf;

/// Directory holding stemsplit's configuration
///
/// `$XDG_CONFIG_HOME/stemsplit` on Linux (usually `~/.config/stemsplit`), the
/// platform equivalent elsewhere, or `./stemsplit` if none can be determined.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stemsplit")
}

/// Path of a named config file inside [`config_dir`]
pub fn default_config_path(filename: &str) -> PathBuf {
    config_dir().join(filename)
}
