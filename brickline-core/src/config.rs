//! Link configuration types
//!
//! Where to find the brick and how to talk to it. Loaded from a TOML file
//! by the host tool when the `serde` feature is enabled.

use heapless::{String, Vec};

use brickline_hal::StreamConfig;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum device path length
pub const MAX_PATH_LEN: usize = 64;

/// Maximum candidate paths the locator will try
pub const MAX_CANDIDATES: usize = 8;

/// Device path
pub type DevicePath = String<MAX_PATH_LEN>;

/// Paths probed when no device is configured
pub const DEFAULT_CANDIDATES: &[&str] = &["/dev/rfcomm0", "/dev/rfcomm1", "/dev/ttyACM0"];

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Path longer than [`MAX_PATH_LEN`]
    PathTooLong,
    /// More than [`MAX_CANDIDATES`] candidate paths
    TooManyCandidates,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConfigError::PathTooLong => write!(f, "device path exceeds {} bytes", MAX_PATH_LEN),
            ConfigError::TooManyCandidates => {
                write!(f, "more than {} candidate paths", MAX_CANDIDATES)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

fn device_path(path: &str) -> Result<DevicePath, ConfigError> {
    let mut out = String::new();
    out.push_str(path).map_err(|_| ConfigError::PathTooLong)?;
    Ok(out)
}

/// How to reach the brick
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LinkConfig {
    /// Fixed device; skips the locator when set
    pub device: Option<DevicePath>,
    /// Paths the locator probes, in order
    pub candidates: Vec<DevicePath, MAX_CANDIDATES>,
    /// Check the brick answers before running a command on a fixed device
    pub probe_on_connect: bool,
    /// Serial line settings
    pub serial: StreamConfig,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            device: None,
            candidates: DEFAULT_CANDIDATES
                .iter()
                .filter_map(|path| device_path(path).ok())
                .take(MAX_CANDIDATES)
                .collect(),
            probe_on_connect: false,
            serial: StreamConfig::default(),
        }
    }
}

impl LinkConfig {
    /// Use a fixed device
    pub fn set_device(&mut self, path: &str) -> Result<(), ConfigError> {
        self.device = Some(device_path(path)?);
        Ok(())
    }

    /// Append a path for the locator to try
    pub fn add_candidate(&mut self, path: &str) -> Result<(), ConfigError> {
        self.candidates
            .push(device_path(path)?)
            .map_err(|_| ConfigError::TooManyCandidates)
    }

    /// Paths to try, in order: the fixed device alone if set, otherwise the
    /// candidates
    pub fn search_paths(&self) -> impl Iterator<Item = &str> {
        let fixed = self.device.as_deref();
        let candidates = self
            .candidates
            .iter()
            .map(|p| p.as_str())
            .filter(move |_| fixed.is_none());
        fixed.into_iter().chain(candidates)
    }
}
