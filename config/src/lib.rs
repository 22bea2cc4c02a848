//! Configuration file model for the Infinite Craft client.
//!
//! The file lives at `~/.infinite-craft/config.toml` by default. Every field is
//! optional; the client resolves missing values to its defaults.
//!
//! ```toml
//! [client]
//! api_url = "https://neal.fun"
//! rate_limit = 400
//! manual_control = false
//! timeout_seconds = 30
//! nothing_policy = "empty"
//!
//! [client.headers]
//! "User-Agent" = "my-crafter/1.0"
//!
//! [storage]
//! discoveries = "~/.infinite-craft/discoveries.json"
//! make_file = true
//! reset = false
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

// Default value function for serde (bool::default() is false, so only true needs a fn)
pub(crate) const fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CraftConfig {
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub storage: StorageSection,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientSection {
    /// Base URL of the game. Default: `https://neal.fun`.
    pub api_url: Option<String>,
    /// Requests per rolling minute. `0` disables throttling. Default: 400.
    pub rate_limit: Option<u32>,
    /// Leave session start/stop to explicit calls instead of scope entry/exit.
    #[serde(default)]
    pub manual_control: bool,
    /// Whole-request timeout. Default: 30.
    pub timeout_seconds: Option<u32>,
    /// What a failed pairing yields. Default: an empty element.
    pub nothing_policy: Option<NothingPolicy>,
    /// Force debug-level logging.
    #[serde(default)]
    pub debug: bool,
    /// Extra request headers, merged over the built-in set.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageSection {
    /// Discoveries JSON path; `~` and `${VAR}` are expanded. Default: `discoveries.json`.
    pub discoveries: Option<String>,
    /// Text encoding of the discoveries file. Only `utf-8` is supported.
    pub encoding: Option<String>,
    /// JSON indentation width. Default: 2.
    pub indent: Option<u8>,
    /// Create (and seed) the discoveries file when missing. Default: true.
    #[serde(default = "default_true")]
    pub make_file: bool,
    /// Reseed the discoveries file when the client is constructed.
    #[serde(default)]
    pub reset: bool,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            discoveries: None,
            encoding: None,
            indent: None,
            make_file: true,
            reset: false,
        }
    }
}

/// What `pair_or_none` hands back when the endpoint answers with the "Nothing" sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NothingPolicy {
    /// An element with every field unset.
    #[default]
    Empty,
    /// No element at all.
    Absent,
}

impl NothingPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Absent => "absent",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

impl CraftConfig {
    /// Load the config from the default location. `Ok(None)` if there is none.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path).map(Some),
            _ => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| {
            tracing::warn!("Failed to read config at {:?}: {}", path, source);
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        Self::parse(&content).map_err(|source| {
            tracing::warn!("Failed to parse config at {:?}: {}", path, source);
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".infinite-craft").join("config.toml"))
}
