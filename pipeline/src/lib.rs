//! Single-file FITS processing.
//!
//! [`run`] loads one image, subtracts its background, finds point sources,
//! measures aperture photometry, analyses the WCS and renders an annotated
//! figure. Only a load failure stops the run early. A missing or broken WCS
//! is reported in [`RunReport::coordinates`] and the remaining stages still
//! run.

pub mod config;
pub mod errors;
pub mod output;
pub mod stages;

pub use config::{ConfigError, PipelineConfig};
pub use errors::PipelineError;
pub use output::sources_output_path;

use log::info;
use std::path::{Path, PathBuf};

use skyproc::image_proc::{BackgroundStats, DetectedSource, PhotometryTable};
use skyproc::wcs::{CoordinateError, FieldCoordinates};
use skyproc::ImageSize;

/// Everything a run produced.
#[derive(Debug)]
pub struct RunReport {
    pub size: ImageSize,
    pub background: BackgroundStats,
    /// Non-finite samples replaced before statistics
    pub replaced: usize,
    pub sources: Vec<DetectedSource>,
    /// Present only when at least one source was found
    pub photometry: Option<PhotometryTable>,
    pub coordinates: Result<FieldCoordinates, CoordinateError>,
    pub figure_path: Option<PathBuf>,
}

/// Process `input`, writing the figure to `output` when given.
pub fn run(
    input: &Path,
    output: Option<&Path>,
    config: &PipelineConfig,
) -> Result<RunReport, PipelineError> {
    info!("Processing {}", input.display());

    let image = stages::load_stage(input)?;
    let processed = stages::preprocess_stage(&image.data, config);
    let sources = stages::detect_stage(&processed, config)?;

    let photometry =
        (!sources.is_empty()).then(|| stages::photometry_stage(&processed, &sources, config));

    let coordinates = stages::coordinate_stage(&image);
    let figure_path = stages::render_stage(&processed, &sources, output, config)?;

    Ok(RunReport {
        size: image.size(),
        background: processed.stats,
        replaced: processed.replaced,
        sources,
        photometry,
        coordinates,
        figure_path,
    })
}

/// [`run`] with the output path derived from the input and the config's
/// `save_figure` switch.
pub fn process_file(input: &Path, config: &PipelineConfig) -> Result<RunReport, PipelineError> {
    let output = config.save_figure.then(|| sources_output_path(input));
    run(input, output.as_deref(), config)
}
