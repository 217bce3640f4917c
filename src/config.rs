//! Configuration loaded from a JSON file; every field has a default.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config '{path}': {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Map image options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub width: u32,
    pub height: u32,
    pub point_radius: u32,
    /// Outline CSV (`group,lon,lat`); the blank frame is drawn when unset.
    pub base_map: Option<PathBuf>,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 800,
            point_radius: 2,
            base_map: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FarsConfig {
    /// Directory holding the `accident_<year>.csv.bz2` files.
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub map: MapConfig,
}

impl Default for FarsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            output_dir: PathBuf::from("."),
            map: MapConfig::default(),
        }
    }
}

impl FarsConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    /// Default image path for a state map.
    pub fn map_output(&self, state: i64, year: i64) -> PathBuf {
        self.output_dir.join(format!("state_{}_{}.png", state, year))
    }
}
