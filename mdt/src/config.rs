//! Configuration for the mdt CLI.
//!
//! An optional TOML file supplies defaults the command line can override:
//!
//! ```toml
//! default_opt_level = 2
//!
//! [vm]
//! max_frames = 2048
//! ```
//!
//! The default location is `<config dir>/mdt/config.toml`; a missing file
//! simply yields defaults, while an explicitly requested file must exist.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MdtError, Result};

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Optimisation level used when `--opt-level` is not given.
    #[serde(default = "default_opt_level")]
    pub default_opt_level: u8,

    #[serde(default)]
    pub vm: VmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VmConfig {
    /// Call-frame depth limit. The `MD_VM_STACK` environment variable
    /// still wins over this.
    #[serde(default = "default_max_frames")]
    pub max_frames: usize,
}

fn default_opt_level() -> u8 {
    2
}

fn default_max_frames() -> usize {
    1024
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_opt_level: default_opt_level(),
            vm: VmConfig::default(),
        }
    }
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_frames: default_max_frames(),
        }
    }
}

impl Config {
    /// Load configuration. An explicit path must exist and parse; the
    /// default path is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Config> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => return Ok(Config::default()),
            },
        };

        if !path.exists() {
            if required {
                return Err(MdtError::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            return Ok(Config::default());
        }

        let text = std::fs::read_to_string(&path).map_err(|source| MdtError::File {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text)
            .map_err(|err| MdtError::Config(format!("{}: {err}", path.display())))
    }

    fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mdt").join(CONFIG_FILE_NAME))
    }
}
