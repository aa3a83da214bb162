//! The individual pipeline stages.
//!
//! Each stage does its work through `skyproc` and prints its section of the
//! console report. Progress and non-fatal conditions go through `log`.

use log::{info, warn};
use ndarray::Array2;
use std::path::{Path, PathBuf};

use skyproc::image_proc::background::Preprocessed;
use skyproc::image_proc::detection::{centroids, SourceTable};
use skyproc::image_proc::{
    aperture_photometry, find_sources, preprocess, DetectedSource, PhotometryTable,
};
use skyproc::viz::{render_sources, show_figure};
use skyproc::wcs::{analyze_field, CoordinateError, FieldCoordinates};
use skyproc::{load_fits, FitsImage, LoadError};

use crate::config::PipelineConfig;
use crate::errors::PipelineError;

/// Open the file and print its structure and the descriptive header cards.
pub fn load_stage(path: &Path) -> Result<FitsImage, LoadError> {
    let image = load_fits(path)?;

    println!("FITS file information:");
    print!("{}", image.summary());

    let size = image.size();
    println!();
    println!("Image dimensions: {} x {} pixels", size.width, size.height);

    let metadata = &image.metadata;
    if let Some(telescope) = metadata.telescope() {
        println!("Telescope: {telescope}");
    }
    if let Some(instrument) = metadata.instrument() {
        println!("Instrument: {instrument}");
    }
    if let Some(filter) = metadata.filter() {
        println!("Filter: {filter}");
    }
    if let Some(exposure) = metadata.exposure_time() {
        println!("Exposure time: {exposure} s");
    }

    Ok(image)
}

/// Sanitize the frame and subtract the sigma-clipped median.
pub fn preprocess_stage(data: &Array2<f64>, config: &PipelineConfig) -> Preprocessed {
    let result = preprocess(data, &config.background);
    let stats = &result.stats;
    println!();
    println!(
        "Background statistics: mean={:.2}, median={:.2}, std={:.2}",
        stats.mean, stats.median, stats.std
    );
    info!(
        "Sigma clipping kept {} of {} pixels",
        stats.n_used, stats.n_total
    );
    result
}

/// Run DAOFIND at `threshold_sigma` times the background noise.
pub fn detect_stage(
    processed: &Preprocessed,
    config: &PipelineConfig,
) -> Result<Vec<DetectedSource>, PipelineError> {
    let sources = find_sources(&processed.image, &config.detection, processed.noise())?;

    println!();
    if sources.is_empty() {
        println!("No sources detected");
    } else {
        println!("Detected {} sources", sources.len());
        print!("{}", SourceTable::new(&sources, config.preview_rows));
    }
    Ok(sources)
}

/// Aperture sums on the processed image, one row per source.
pub fn photometry_stage(
    processed: &Preprocessed,
    sources: &[DetectedSource],
    config: &PipelineConfig,
) -> PhotometryTable {
    let table = aperture_photometry(&processed.image.view(), sources, &config.photometry);
    println!();
    println!("Photometry results:");
    print!("{}", table.preview(config.preview_rows));
    table
}

/// Centre coordinate and diagonal field of view. Failures are reported and
/// returned, never propagated.
pub fn coordinate_stage(image: &FitsImage) -> Result<FieldCoordinates, CoordinateError> {
    match analyze_field(&image.metadata, image.size()) {
        Ok((wcs, field)) => {
            println!();
            println!("WCS information:");
            println!("{wcs}");

            println!();
            println!("Image centre coordinate: {}", field.center.to_hmsdms());
            println!("Right ascension: {:.6} deg", field.center.ra);
            println!("Declination: {:.6} deg", field.center.dec);

            println!();
            println!(
                "Diagonal field of view: {:.2} deg ({:.2} arcmin)",
                field.diagonal.degrees(),
                field.diagonal.arcminutes()
            );
            println!(
                "Pixel scale: {:.3} arcsec/pixel",
                field.pixel_scale.arcseconds()
            );
            Ok(field)
        }
        Err(e) => {
            println!();
            println!("Error analysing WCS information: {e}");
            warn!("Coordinate analysis skipped: {e}");
            Err(e)
        }
    }
}

/// Draw the processed image with markers, save it when `output` is set and
/// open it in a window when `render.show` is on.
pub fn render_stage(
    processed: &Preprocessed,
    sources: &[DetectedSource],
    output: Option<&Path>,
    config: &PipelineConfig,
) -> Result<Option<PathBuf>, PipelineError> {
    let positions = centroids(sources);
    let figure = render_sources(&processed.image.view(), &positions, &config.render)?;
    info!(
        "Rendered {}x{} figure with {} marker(s)",
        figure.width,
        figure.height,
        positions.len()
    );

    let saved = match output {
        Some(path) => {
            figure.save_png(path)?;
            println!();
            println!("Image saved to: {}", path.display());
            Some(path.to_path_buf())
        }
        None => None,
    };

    if config.render.show {
        // A missing display leaves the saved figure as the only output
        if let Err(e) = show_figure(&figure, &config.render.title) {
            warn!("Figure not shown: {e}");
        }
    }
    Ok(saved)
}
