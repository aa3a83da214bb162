use thiserror::Error;

use crate::config::ConfigError;
use skyproc::image_proc::DetectionError;
use skyproc::viz::VizError;
use skyproc::LoadError;

/// Failure of a pipeline run. Coordinate errors are not listed: they are
/// reported and the run continues.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to load FITS file: {0}")]
    Load(#[from] LoadError),

    #[error("invalid detection settings: {0}")]
    Detection(#[from] DetectionError),

    #[error("failed to render figure: {0}")]
    Render(#[from] VizError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PipelineError {
    /// True when no stage after loading ran.
    pub fn is_load_failure(&self) -> bool {
        matches!(self, PipelineError::Load(_))
    }
}
