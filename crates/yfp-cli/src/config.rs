//! Config file handling

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use yfp_client::ClientConfig;

/// Contents of a `yfp` TOML config file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub client: ClientConfig,
    pub stream: StreamSettings,
}

/// Streaming cadence
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// Capture ticks per second
    pub fps: u32,
    /// Send every N-th tick
    pub stride: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self { fps: 30, stride: 3 }
    }
}

impl FileConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}
