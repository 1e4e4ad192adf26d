//! Config file loading
//!
//! `brickline.toml` in the working directory, or the file named with
//! `--config`. Every section is optional.

use std::path::Path;

use brickline_core::LinkConfig;
use brickline_protocol::OutputPort;
use serde::Deserialize;

use crate::args::{parse_output_port, ArgsError};

/// Looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "brickline.toml";

/// Settings for the `sync` command
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Output port letters of the motor pair
    pub ports: [String; 2],
    pub power: i8,
    pub duration_ms: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ports: ["b".to_string(), "c".to_string()],
            power: 100,
            duration_ms: 2_000,
        }
    }
}

impl SyncConfig {
    pub fn output_ports(&self) -> Result<[OutputPort; 2], ArgsError> {
        Ok([
            parse_output_port(&self.ports[0])?,
            parse_output_port(&self.ports[1])?,
        ])
    }
}

/// Whole config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub link: LinkConfig,
    pub sync: SyncConfig,
}

impl Config {
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load `path`, or the default file if it exists
    ///
    /// An explicit path must exist; a missing default file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let (path, required) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_FILE), false),
        };

        match std::fs::read_to_string(path) {
            Ok(text) => {
                log::debug!("loading config from {}", path.display());
                Ok(Self::parse(&text)?)
            }
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(format!("{}: {}", path.display(), e).into()),
        }
    }
}
