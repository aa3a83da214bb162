//! DAOFIND source detection on background-subtracted frames.
//!
//! Detection itself is done by starfield's [`DAOStarFinder`]; this module
//! orders its output by decreasing flux, numbers it from 1 and exposes each
//! detection through [`PointSource`].

use log::debug;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use starfield::image::starfinders::{DAOStarFinder, StellarSource};
use std::fmt;

use super::{DaoFindConfig, DetectionError, PointSource};

/// A source found by [`find_sources`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedSource {
    pub id: usize,
    pub x_centroid: f64,
    pub y_centroid: f64,
    pub flux: f64,
}

impl DetectedSource {
    fn from_stellar(star: &dyn StellarSource) -> Self {
        let (x_centroid, y_centroid) = star.get_centroid();
        Self {
            id: 0,
            x_centroid,
            y_centroid,
            flux: star.flux(),
        }
    }
}

impl PointSource for DetectedSource {
    fn id(&self) -> usize {
        self.id
    }

    fn centroid(&self) -> (f64, f64) {
        (self.x_centroid, self.y_centroid)
    }

    fn flux(&self) -> f64 {
        self.flux
    }
}

/// Find point sources in a background-subtracted image.
///
/// The absolute threshold is `config.threshold_sigma * noise`. Results are
/// sorted by decreasing flux and numbered from 1.
pub fn find_sources(
    image: &Array2<f64>,
    config: &DaoFindConfig,
    noise: f64,
) -> Result<Vec<DetectedSource>, DetectionError> {
    let finder_config = config.finder_config(noise)?;
    debug!(
        "DAOFIND fwhm {:.2}, threshold {:.6}",
        finder_config.fwhm, finder_config.threshold
    );

    let finder = DAOStarFinder::new(finder_config)
        .map_err(|e| DetectionError::Finder(e.to_string()))?;

    let mut sources: Vec<DetectedSource> = finder
        .find_stars(image, None)
        .iter()
        .map(|star| DetectedSource::from_stellar(star))
        .collect();

    sources.sort_by(|a, b| {
        b.flux
            .total_cmp(&a.flux)
            .then(a.y_centroid.total_cmp(&b.y_centroid))
            .then(a.x_centroid.total_cmp(&b.x_centroid))
    });
    if let Some(n) = config.brightest {
        sources.truncate(n);
    }
    for (i, source) in sources.iter_mut().enumerate() {
        source.id = i + 1;
    }
    Ok(sources)
}

/// Tabular preview of the first rows of a source list.
pub struct SourceTable<'a> {
    pub sources: &'a [DetectedSource],
    pub max_rows: usize,
}

impl<'a> SourceTable<'a> {
    pub fn new(sources: &'a [DetectedSource], max_rows: usize) -> Self {
        Self { sources, max_rows }
    }
}

impl fmt::Display for SourceTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>4} {:>10} {:>10} {:>12} {:>9}",
            "id", "xcentroid", "ycentroid", "flux", "mag"
        )?;
        for s in self.sources.iter().take(self.max_rows) {
            writeln!(
                f,
                "{:>4} {:>10.4} {:>10.4} {:>12.4} {:>9.4}",
                s.id,
                s.x_centroid,
                s.y_centroid,
                s.flux,
                s.mag()
            )?;
        }
        if self.sources.len() > self.max_rows {
            writeln!(f, "... {} more row(s)", self.sources.len() - self.max_rows)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_helpers::synthetic::{add_gaussian_noise, add_gaussian_star};

    fn detect(image: &Array2<f64>, noise: f64) -> Vec<DetectedSource> {
        find_sources(image, &DaoFindConfig::default(), noise).unwrap()
    }

    #[test]
    fn test_single_star_near_centre() {
        let mut image = Array2::zeros((100, 100));
        add_gaussian_star(&mut image, 50.0, 50.0, 500.0, 3.0);

        let stars = detect(&image, 1.0);

        assert_eq!(stars.len(), 1);
        let star = &stars[0];
        assert_eq!(star.id, 1);
        assert!((star.x_centroid - 50.0).abs() < 0.5, "x {}", star.x_centroid);
        assert!((star.y_centroid - 50.0).abs() < 0.5, "y {}", star.y_centroid);
        assert!(star.flux > 0.0);
        assert!(star.mag().is_finite());
    }

    #[test]
    fn test_sorted_by_flux_with_sequential_ids() {
        let mut image = Array2::zeros((80, 80));
        add_gaussian_star(&mut image, 15.0, 15.0, 200.0, 3.0);
        add_gaussian_star(&mut image, 60.0, 25.0, 900.0, 3.0);
        add_gaussian_star(&mut image, 40.0, 65.0, 450.0, 3.0);

        let stars = detect(&image, 1.0);

        assert_eq!(stars.len(), 3);
        assert_eq!(
            stars.iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(stars.windows(2).all(|w| w[0].flux >= w[1].flux));
        assert!((stars[0].x_centroid - 60.0).abs() < 0.5);
        assert!((stars[2].x_centroid - 15.0).abs() < 0.5);
    }

    #[test]
    fn test_brightest_truncates_after_sorting() {
        let mut image = Array2::zeros((80, 80));
        add_gaussian_star(&mut image, 15.0, 15.0, 200.0, 3.0);
        add_gaussian_star(&mut image, 60.0, 25.0, 900.0, 3.0);

        let config = DaoFindConfig {
            brightest: Some(1),
            ..Default::default()
        };
        let stars = find_sources(&image, &config, 1.0).unwrap();
        assert_eq!(stars.len(), 1);
        assert_eq!(stars[0].id, 1);
        assert!((stars[0].x_centroid - 60.0).abs() < 0.5);
    }

    #[test]
    fn test_flat_image_has_no_sources() {
        let image = Array2::zeros((32, 32));
        assert!(detect(&image, 0.0).is_empty());
    }

    #[test]
    fn test_raising_threshold_never_adds_sources() {
        let mut image = Array2::zeros((128, 128));
        add_gaussian_noise(&mut image, 2.0, 7);
        for &(x, y, amp) in &[
            (20.0, 30.0, 40.0),
            (70.0, 90.0, 15.0),
            (100.0, 20.0, 120.0),
            (50.0, 60.0, 8.0),
        ] {
            add_gaussian_star(&mut image, x, y, amp, 3.0);
        }

        let counts: Vec<usize> = [2.0, 3.0, 5.0, 10.0, 20.0, 50.0]
            .iter()
            .map(|&threshold_sigma| {
                let config = DaoFindConfig {
                    threshold_sigma,
                    ..Default::default()
                };
                find_sources(&image, &config, 2.0).unwrap().len()
            })
            .collect();

        assert!(
            counts.windows(2).all(|w| w[0] >= w[1]),
            "counts not monotonic: {counts:?}"
        );
        assert!(counts[0] >= 1);
    }

    #[test]
    fn test_invalid_fwhm_is_an_error() {
        let image = Array2::zeros((16, 16));
        let config = DaoFindConfig {
            fwhm: 0.0,
            ..Default::default()
        };
        assert_eq!(
            find_sources(&image, &config, 1.0).unwrap_err(),
            DetectionError::InvalidFwhm(0.0)
        );
    }

    #[test]
    fn test_source_table_preview() {
        let sources: Vec<DetectedSource> = (1..=4)
            .map(|id| DetectedSource {
                id,
                x_centroid: 10.0 * id as f64,
                y_centroid: 40.0,
                flux: 1000.0 / id as f64,
            })
            .collect();

        let text = SourceTable::new(&sources, 2).to_string();
        assert!(text.contains("xcentroid"));
        assert!(text.contains("... 2 more row(s)"));
        assert_eq!(text.lines().count(), 4);
        assert!(text.lines().nth(1).unwrap().contains("-7.5000"));
    }
}
