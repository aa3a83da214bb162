//! Run configuration.
//!
//! Every field has a default, so an empty JSON object or a partial file is a
//! valid configuration. Command line flags are applied on top afterwards.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use skyproc::image_proc::{DaoFindConfig, PhotometryConfig, SigmaClipConfig};
use skyproc::viz::RenderConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub background: SigmaClipConfig,
    pub detection: DaoFindConfig,
    pub photometry: PhotometryConfig,
    pub render: RenderConfig,
    /// Write the annotated figure next to the input
    pub save_figure: bool,
    /// Number of rows shown in console tables
    pub preview_rows: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            background: SigmaClipConfig::default(),
            detection: DaoFindConfig::default(),
            photometry: PhotometryConfig::default(),
            render: RenderConfig::default(),
            save_figure: true,
            preview_rows: 10,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
