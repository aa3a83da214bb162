//! DAOFIND settings and their mapping onto the starfield finder.
//!
//! Thresholds are given in units of the background noise and only become
//! absolute once the sigma-clipped std of the frame is known, so the
//! [`DAOStarFinderConfig`] is built per image by [`DaoFindConfig::finder_config`].

use serde::{Deserialize, Serialize};
use starfield::image::starfinders::DAOStarFinderConfig;
use std::ops::RangeInclusive;

use super::DetectionError;

/// Star finder parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaoFindConfig {
    /// Detection threshold in units of the background noise
    pub threshold_sigma: f64,
    /// Kernel FWHM in pixels
    pub fwhm: f64,
    /// Minor to major axis ratio of the kernel
    pub ratio: f64,
    /// Kernel position angle in degrees
    pub theta: f64,
    /// Kernel truncation radius in sigma
    pub sigma_radius: f64,
    /// Accepted sharpness range
    pub sharpness: RangeInclusive<f64>,
    /// Accepted range for both roundness measures
    pub roundness: RangeInclusive<f64>,
    /// Drop peaks closer than half a kernel to the edge
    pub exclude_border: bool,
    /// Keep only the N brightest sources
    pub brightest: Option<usize>,
    /// Reject sources whose peak reaches this value
    pub peakmax: Option<f64>,
    /// Minimum distance between two detections in pixels
    pub min_separation: f64,
}

impl Default for DaoFindConfig {
    fn default() -> Self {
        Self {
            threshold_sigma: 5.0,
            fwhm: 3.0,
            ratio: 1.0,
            theta: 0.0,
            sigma_radius: 1.5,
            sharpness: 0.2..=1.0,
            roundness: -1.0..=1.0,
            exclude_border: false,
            brightest: None,
            peakmax: None,
            min_separation: 1.0,
        }
    }
}

impl DaoFindConfig {
    /// Absolute threshold in data units for a frame with the given noise.
    pub fn absolute_threshold(&self, noise: f64) -> Result<f64, DetectionError> {
        let threshold = self.threshold_sigma * noise;
        if !(threshold.is_finite() && threshold >= 0.0) {
            return Err(DetectionError::InvalidThreshold(threshold));
        }
        // Peaks must sit strictly above the threshold, also on a noiseless frame
        Ok(threshold.max(f64::MIN_POSITIVE))
    }

    /// Finder settings for a frame whose background std is `noise`.
    ///
    /// Brightest-N truncation is left to the caller so it applies after the
    /// final flux ordering.
    pub fn finder_config(&self, noise: f64) -> Result<DAOStarFinderConfig, DetectionError> {
        if !(self.fwhm.is_finite() && self.fwhm > 0.0) {
            return Err(DetectionError::InvalidFwhm(self.fwhm));
        }
        if !(self.ratio > 0.0 && self.ratio <= 1.0) {
            return Err(DetectionError::InvalidRatio(self.ratio));
        }
        if !(self.sigma_radius.is_finite() && self.sigma_radius > 0.0) {
            return Err(DetectionError::InvalidSigmaRadius(self.sigma_radius));
        }

        Ok(DAOStarFinderConfig {
            threshold: self.absolute_threshold(noise)?,
            fwhm: self.fwhm,
            ratio: self.ratio,
            theta: self.theta,
            sigma_radius: self.sigma_radius,
            sharpness: self.sharpness.clone(),
            roundness: self.roundness.clone(),
            exclude_border: self.exclude_border,
            brightest: None,
            peakmax: self.peakmax,
            min_separation: self.min_separation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_scales_with_noise() {
        let config = DaoFindConfig::default();
        let finder = config.finder_config(2.0).unwrap();
        assert_eq!(finder.threshold, 10.0);
        assert_eq!(finder.fwhm, 3.0);
        assert_eq!(finder.sharpness, 0.2..=1.0);
        assert_eq!(finder.roundness, -1.0..=1.0);
        assert!(finder.brightest.is_none());
    }

    #[test]
    fn test_zero_noise_keeps_a_positive_threshold() {
        let threshold = DaoFindConfig::default().absolute_threshold(0.0).unwrap();
        assert!(threshold > 0.0);
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let config = DaoFindConfig::default();
        assert!(matches!(
            config.finder_config(f64::NAN),
            Err(DetectionError::InvalidThreshold(_))
        ));

        let config = DaoFindConfig {
            fwhm: -1.0,
            ..Default::default()
        };
        assert_eq!(
            config.finder_config(1.0).unwrap_err(),
            DetectionError::InvalidFwhm(-1.0)
        );

        let config = DaoFindConfig {
            ratio: 1.5,
            ..Default::default()
        };
        assert_eq!(
            config.finder_config(1.0).unwrap_err(),
            DetectionError::InvalidRatio(1.5)
        );

        let config = DaoFindConfig {
            sigma_radius: 0.0,
            ..Default::default()
        };
        assert_eq!(
            config.finder_config(1.0).unwrap_err(),
            DetectionError::InvalidSigmaRadius(0.0)
        );
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: DaoFindConfig =
            serde_json::from_str(r#"{"threshold_sigma": 8.0}"#).unwrap();
        assert_eq!(config.threshold_sigma, 8.0);
        assert_eq!(config.fwhm, 3.0);
    }
}
