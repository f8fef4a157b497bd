//! Client configuration.
//!
//! Settings are read from a TOML file. Every field is optional, so a missing
//! file or an empty one yields the defaults.

mod paths;

pub use paths::ConfigPaths;

use std::{fs, io::ErrorKind, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::services::DleynaError;

/// Settings for connecting to and querying the dLeyna daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// D-Bus address to connect to instead of the session bus
    pub address: Option<String>,

    /// How long the command-line tool waits for a reply, in milliseconds
    pub timeout_ms: Option<u64>,

    /// Properties requested when browsing or searching
    pub filter: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: None,
            timeout_ms: None,
            filter: vec![String::from("*")],
        }
    }
}

impl ClientConfig {
    /// Load the configuration from the default location
    ///
    /// # Errors
    /// Returns error if the config directory cannot be determined or the file is invalid
    pub fn load() -> Result<Self, DleynaError> {
        let path = ConfigPaths::main_config()?;
        Self::load_from(&path)
    }

    /// Load the configuration from `path`, using defaults if it does not exist
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is not valid TOML for this schema
    pub fn load_from(path: &Path) -> Result<Self, DleynaError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No config file at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        toml::from_str(&content).map_err(|e| {
            DleynaError::Config(format!("Failed to parse TOML at {}: {e}", path.display()))
        })
    }

    /// Reply timeout, if one is configured
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}
