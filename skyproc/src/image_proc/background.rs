//! Sky background estimation and removal.
//!
//! The background is the sigma-clipped median of the whole frame. Clipping
//! iterates around the median, rejecting samples further than `sigma`
//! standard deviations (population std of the surviving samples) until no
//! sample is rejected or the iteration limit is reached.

use log::{debug, warn};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::stats::{mean_and_std, median};

/// Sigma clipping parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigmaClipConfig {
    /// Rejection threshold in standard deviations, applied on both sides
    pub sigma: f64,
    /// Iteration limit, `None` iterates until convergence
    pub max_iters: Option<usize>,
}

impl Default for SigmaClipConfig {
    fn default() -> Self {
        Self {
            sigma: 3.0,
            max_iters: Some(5),
        }
    }
}

/// Statistics of the samples that survived clipping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackgroundStats {
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    /// Samples remaining after clipping
    pub n_used: usize,
    /// Finite samples offered to the clipper
    pub n_total: usize,
}

impl BackgroundStats {
    fn empty() -> Self {
        Self {
            mean: 0.0,
            median: 0.0,
            std: 0.0,
            n_used: 0,
            n_total: 0,
        }
    }
}

impl fmt::Display for BackgroundStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mean={:.6}, median={:.6}, std={:.6}",
            self.mean, self.median, self.std
        )
    }
}

/// Replace every NaN or infinite sample with `0.0`.
///
/// Returns the number of replaced samples. Finite samples are untouched.
pub fn sanitize_non_finite(image: &mut Array2<f64>) -> usize {
    let mut replaced = 0;
    image.map_inplace(|v| {
        if !v.is_finite() {
            *v = 0.0;
            replaced += 1;
        }
    });
    replaced
}

/// Sigma-clipped mean, median and standard deviation of an image.
///
/// Non-finite samples are ignored. An image without finite samples yields
/// all-zero statistics.
pub fn sigma_clipped_stats(image: &ArrayView2<f64>, config: &SigmaClipConfig) -> BackgroundStats {
    let mut kept: Vec<f64> = image.iter().copied().filter(|v| v.is_finite()).collect();
    let n_total = kept.len();
    if n_total == 0 {
        return BackgroundStats::empty();
    }

    let mut scratch = Vec::with_capacity(n_total);
    let mut iteration = 0;
    loop {
        if config.max_iters.is_some_and(|max| iteration >= max) {
            break;
        }

        scratch.clear();
        scratch.extend_from_slice(&kept);
        let Some(center) = median(&mut scratch) else {
            break;
        };
        let Some((_, std)) = mean_and_std(&kept) else {
            break;
        };

        let limit = config.sigma * std;
        let before = kept.len();
        kept.retain(|v| (v - center).abs() <= limit);
        iteration += 1;

        debug!(
            "sigma clip iteration {}: center={:.6} std={:.6} kept {}/{}",
            iteration,
            center,
            std,
            kept.len(),
            before
        );

        if kept.len() == before || kept.is_empty() {
            break;
        }
    }

    if kept.is_empty() {
        return BackgroundStats {
            n_total,
            ..BackgroundStats::empty()
        };
    }

    let (mean, std) = mean_and_std(&kept).unwrap_or((0.0, 0.0));
    let n_used = kept.len();
    let center = median(&mut kept).unwrap_or(0.0);

    BackgroundStats {
        mean,
        median: center,
        std,
        n_used,
        n_total,
    }
}

/// Subtract a constant level from every pixel.
pub fn subtract_background(image: &ArrayView2<f64>, level: f64) -> Array2<f64> {
    image.mapv(|v| v - level)
}

/// Result of [`preprocess`]
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// Background-subtracted image
    pub image: Array2<f64>,
    /// Statistics of the sanitized input
    pub stats: BackgroundStats,
    /// Number of non-finite samples replaced with zero
    pub replaced: usize,
}

impl Preprocessed {
    /// Noise scale used for detection thresholds
    pub fn noise(&self) -> f64 {
        self.stats.std
    }
}

/// Sanitize, estimate the background and subtract its median.
pub fn preprocess(image: &Array2<f64>, config: &SigmaClipConfig) -> Preprocessed {
    let mut sanitized = image.clone();
    let replaced = sanitize_non_finite(&mut sanitized);
    if replaced > 0 {
        warn!("Replaced {replaced} non-finite pixel(s) with 0.0");
    }

    let stats = sigma_clipped_stats(&sanitized.view(), config);
    let processed = subtract_background(&sanitized.view(), stats.median);

    Preprocessed {
        image: processed,
        stats,
        replaced,
    }
}
