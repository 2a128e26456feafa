// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as JSON at `<config_dir>/camera-pipeline/config.json`. A missing
//! file yields defaults; a malformed one is reported so the caller can decide
//! whether to fall back.

use crate::backends::camera::types::{CaptureConfig, ChromaOrder, DropPolicy};
use crate::bridge::BridgeKind;
use crate::constants::pipeline;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory name under the platform config directory
pub const CONFIG_DIR_NAME: &str = "camera-pipeline";
pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capture width in pixels
    pub width: u32,
    /// Capture height in pixels
    pub height: u32,
    /// Frames held by the acquisition queue
    pub queue_depth: usize,
    pub drop_policy: DropPolicy,
    pub chroma_order: ChromaOrder,
    /// Processing routine applied to every frame
    pub bridge: BridgeKind,
    /// V4L2 device path; the first camera when unset
    pub device: Option<String>,
    /// Where snapshots are written; Downloads when unset
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            width: pipeline::DEFAULT_WIDTH,
            height: pipeline::DEFAULT_HEIGHT,
            queue_depth: pipeline::DEFAULT_QUEUE_DEPTH,
            drop_policy: DropPolicy::default(),
            chroma_order: ChromaOrder::default(),
            bridge: BridgeKind::default(),
            device: None,
            snapshot_dir: None,
        }
    }
}

impl Config {
    /// Default config file location
    pub fn path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load from the default location
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        info!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    /// Save to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Save to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), "Config saved");
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject odd or zero dimensions and unusable queue depths
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.to_capture_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Capture parameters for the session
    pub fn to_capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            width: self.width,
            height: self.height,
            queue_depth: self.queue_depth,
            drop_policy: self.drop_policy,
            chroma_order: self.chroma_order,
        }
    }

    /// Configured snapshot directory or the platform default
    pub fn snapshot_dir(&self) -> PathBuf {
        self.snapshot_dir
            .clone()
            .unwrap_or_else(crate::storage::default_snapshot_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{ "bridge": "Color" }"#).unwrap();
        assert_eq!(config.bridge, BridgeKind::Color);
        assert_eq!(config.width, pipeline::DEFAULT_WIDTH);
        assert_eq!(config.queue_depth, pipeline::DEFAULT_QUEUE_DEPTH);
    }

    #[test]
    fn test_validate_rejects_odd_width() {
        let config = Config {
            width: 641,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_capture_config_mirrors_fields() {
        let config = Config {
            width: 320,
            height: 240,
            queue_depth: 4,
            drop_policy: DropPolicy::DropNewest,
            chroma_order: ChromaOrder::Nv12,
            ..Default::default()
        };
        let capture = config.to_capture_config();
        assert_eq!((capture.width, capture.height), (320, 240));
        assert_eq!(capture.queue_depth, 4);
        assert_eq!(capture.drop_policy, DropPolicy::DropNewest);
        assert_eq!(capture.chroma_order, ChromaOrder::Nv12);
    }
}
