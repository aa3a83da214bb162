//! Mapping of raw pixel values onto the `[0, 1]` display range.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::image_proc::stats::finite_min_max;

/// Curve applied after the linear min/max interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stretch {
    Linear,
    #[default]
    Sqrt,
}

impl Stretch {
    pub fn apply(&self, t: f64) -> f64 {
        match self {
            Stretch::Linear => t,
            Stretch::Sqrt => t.sqrt(),
        }
    }
}

/// Min/max interval followed by a stretch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageNormalize {
    pub vmin: f64,
    pub vmax: f64,
    pub stretch: Stretch,
}

impl ImageNormalize {
    pub fn new(vmin: f64, vmax: f64, stretch: Stretch) -> Self {
        Self {
            vmin,
            vmax,
            stretch,
        }
    }

    /// Interval spanning the finite values of `image`. An image without
    /// finite values gets `[0, 0]`.
    pub fn from_data(image: &ArrayView2<f64>, stretch: Stretch) -> Self {
        let (vmin, vmax) = finite_min_max(image.iter()).unwrap_or((0.0, 0.0));
        Self::new(vmin, vmax, stretch)
    }

    /// Display value in `[0, 1]`. Non-finite input and a zero-width
    /// interval map to 0.
    pub fn normalize(&self, value: f64) -> f64 {
        let span = self.vmax - self.vmin;
        if !value.is_finite() || span <= 0.0 {
            return 0.0;
        }
        let t = ((value - self.vmin) / span).clamp(0.0, 1.0);
        self.stretch.apply(t)
    }
}
