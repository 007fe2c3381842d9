//! Configuration file helpers
//!
//! Generic YAML load/save plus the standard location of stemsplit's
//! configuration directory. Application-specific config structs live in the
//! binaries and go through these helpers.
//!
//! ```ignore
//! use stemsplit_core::config::{default_config_path, load_config, save_config};
//!
//! let path = default_config_path("config.yaml");
//! let config: MixerConfig = load_config(&path);
//! save_config(&config, &path)?;
//! ```

mod io;
mod paths;

pub use io::{load_config, save_config};
pub use paths::{config_dir, default_config_path};
