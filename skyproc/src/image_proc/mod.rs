//! Image processing for astronomical frames.
//!
//! The stages run in order: [`background`] sanitizes the frame and removes a
//! sigma-clipped sky level, [`detection`] finds point sources in the result,
//! and [`aperture_photometry`] sums flux around each of them.

pub mod aperture_photometry;
pub mod background;
pub mod detection;
pub mod stats;

pub use aperture_photometry::{
    aperture_photometry, ApertureMethod, CircularAperture, PhotometryConfig, PhotometryRow,
    PhotometryTable,
};
pub use background::{preprocess, sigma_clipped_stats, BackgroundStats, SigmaClipConfig};
pub use detection::{find_sources, DaoFindConfig, DetectedSource, DetectionError, PointSource};
