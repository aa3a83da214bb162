//! Point source detection for astronomical images
//!
//! [`find_sources`] runs starfield's DAOFIND matched filter with a
//! noise-relative threshold built from [`DaoFindConfig`]. Every detection is
//! exposed through the [`PointSource`] trait so photometry and rendering do
//! not depend on the finder.

pub mod config;
pub mod finder;

pub use config::DaoFindConfig;
pub use finder::{find_sources, DetectedSource, SourceTable};

use thiserror::Error;

/// Invalid star finder configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
    #[error("FWHM must be positive and finite, got {0}")]
    InvalidFwhm(f64),
    #[error("axis ratio must be in (0, 1], got {0}")]
    InvalidRatio(f64),
    #[error("sigma radius must be positive and finite, got {0}")]
    InvalidSigmaRadius(f64),
    #[error("detection threshold must be non-negative and finite, got {0}")]
    InvalidThreshold(f64),
    #[error("star finder setup failed: {0}")]
    Finder(String),
}

/// A detected point source with a centroid and a flux estimate.
pub trait PointSource {
    /// 1-based identifier in detection order
    fn id(&self) -> usize;

    /// Centroid as (x, y) in 0-based pixel coordinates
    fn centroid(&self) -> (f64, f64);

    fn flux(&self) -> f64;

    /// Instrumental magnitude, NaN for non-positive flux
    fn mag(&self) -> f64 {
        let flux = self.flux();
        if flux > 0.0 {
            -2.5 * flux.log10()
        } else {
            f64::NAN
        }
    }
}

/// Centroids of a source list, in list order.
pub fn centroids<S: PointSource>(sources: &[S]) -> Vec<(f64, f64)> {
    sources.iter().map(PointSource::centroid).collect()
}
