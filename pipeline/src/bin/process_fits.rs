//! Process one FITS image: background subtraction, source detection,
//! aperture photometry, WCS analysis and an annotated PNG.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --bin process_fits -- data/m42.fits
//!
//! # Stricter detection and a custom aperture
//! cargo run --release --bin process_fits -- data/m42.fits --threshold 8 --aperture-radius 4
//!
//! # Settings from a JSON file, no figure written or shown
//! cargo run --release --bin process_fits -- data/m42.fits --config run.json --no-save --no-show
//!
//! # With the figure window
//! cargo run --release --features sdl2 --bin process_fits -- data/m42.fits
//! ```
//!
//! The figure is written to `<input_dir>/<input_stem>_sources.png` unless
//! `--output` names another path, and then shown in a window until it is
//! closed. Builds without the `sdl2` feature log a warning instead. The exit code is non-zero when the file
//! cannot be loaded or a later stage fails; a missing WCS is not a failure.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use pipeline::{run, sources_output_path, PipelineConfig, PipelineError};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Detect and measure point sources in a FITS image",
    long_about = None
)]
struct Args {
    /// Path to the FITS file
    fits_file: PathBuf,

    /// JSON file with pipeline settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Detection threshold in units of the background standard deviation
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Star finder kernel FWHM in pixels
    #[arg(long)]
    fwhm: Option<f64>,

    /// Photometry aperture radius in pixels
    #[arg(long)]
    aperture_radius: Option<f64>,

    /// Figure output path instead of <input_stem>_sources.png
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Figure resolution in dots per inch
    #[arg(long)]
    dpi: Option<u32>,

    /// Do not write the figure
    #[arg(long, default_value_t = false)]
    no_save: bool,

    /// Open the figure in a window (default without --config)
    #[arg(long, overrides_with = "no_show")]
    show: bool,

    /// Do not open the figure window
    #[arg(long, overrides_with = "show")]
    no_show: bool,
}

impl Args {
    fn pipeline_config(&self) -> Result<PipelineConfig, PipelineError> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => {
                let mut config = PipelineConfig::default();
                config.render.show = true;
                config
            }
        };

        if let Some(threshold) = self.threshold {
            config.detection.threshold_sigma = threshold;
        }
        if let Some(fwhm) = self.fwhm {
            config.detection.fwhm = fwhm;
        }
        if let Some(radius) = self.aperture_radius {
            config.photometry.radius = radius;
        }
        if let Some(dpi) = self.dpi {
            config.render.dpi = dpi;
        }
        if self.no_save {
            config.save_figure = false;
        }
        if self.show {
            config.render.show = true;
        }
        if self.no_show {
            config.render.show = false;
        }
        Ok(config)
    }

    fn output_path(&self, config: &PipelineConfig) -> Option<PathBuf> {
        if !config.save_figure {
            return None;
        }
        Some(
            self.output
                .clone()
                .unwrap_or_else(|| sources_output_path(&self.fits_file)),
        )
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    println!("Processing file: {}", args.fits_file.display());

    let result = args.pipeline_config().and_then(|config| {
        let output = args.output_path(&config);
        run(&args.fits_file, output.as_deref(), &config)
    });

    match result {
        Ok(report) => {
            log::info!(
                "Done: {} source(s), figure {}",
                report.sources.len(),
                report
                    .figure_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "not saved".to_string())
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
