//! CLI configuration.
//!
//! Layered, lowest precedence first:
//! - JSON file: `$XDG_CONFIG_HOME/shelfdrop/config.json` (or `--config`)
//! - Environment: `SHELFDROP_URL`, `SHELFDROP_KEY`
//! - Command-line flags

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shelfdrop_uploader::UploaderConfig;
use tracing::{debug, warn};

pub const ENV_URL: &str = "SHELFDROP_URL";
pub const ENV_KEY: &str = "SHELFDROP_KEY";

/// Contents of `config.json`.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CliConfig {
    /// Storage base URL.
    pub base_url: String,
    /// Bearer credential.
    pub credential: String,
    /// Chunk size, retry delays and cache-control.
    #[serde(flatten)]
    pub uploader: UploaderConfig,
}

impl CliConfig {
    /// Loads the config file at `path`, or at the default location.
    ///
    /// A missing file yields defaults; an unparsable one is logged and
    /// ignored.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        match serde_json::from_str(&content) {
            Ok(config) => {
                debug!(path = %path.display(), "loaded config");
                Ok(config)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to parse config, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Applies endpoint and credential overrides from the environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_URL).filter(|v| !v.is_empty()) {
            self.base_url = url;
        }
        if let Some(key) = lookup(ENV_KEY).filter(|v| !v.is_empty()) {
            self.credential = key;
        }
    }

    /// Applies explicit command-line overrides.
    pub fn apply_flags(&mut self, url: Option<String>, key: Option<String>, chunk_size: Option<u64>) {
        if let Some(url) = url {
            self.base_url = url;
        }
        if let Some(key) = key {
            self.credential = key;
        }
        if let Some(size) = chunk_size {
            self.uploader.chunk_size = size;
        }
    }
}

/// Returns `<config dir>/shelfdrop/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("shelfdrop").join("config.json"))
}

/// Returns the platform-specific config directory.
fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }
}
