//! Image dimensions and size utilities

use ndarray::{ArrayBase, Ix2, RawData};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Image dimensions structure
///
/// Width follows FITS NAXIS1 and height follows NAXIS2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    /// Image width in pixels (NAXIS1)
    pub width: usize,
    /// Image height in pixels (NAXIS2)
    pub height: usize,
}

impl ImageSize {
    /// Create a new ImageSize
    pub fn from_width_height(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Size of a 2D array, whose shape is (rows, columns) = (height, width).
    pub fn of_array<S: RawData>(array: &ArrayBase<S, Ix2>) -> Self {
        let (height, width) = array.dim();
        Self { width, height }
    }

    /// True when either axis has zero length
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Pixel used as the field reference point: (NAXIS1 / 2, NAXIS2 / 2) with integer division.
    pub fn center_pixel(&self) -> (usize, usize) {
        (self.width / 2, self.height / 2)
    }

    /// Last pixel on the diagonal, (width - 1, height - 1).
    pub fn far_corner(&self) -> (usize, usize) {
        (self.width.saturating_sub(1), self.height.saturating_sub(1))
    }

    /// Convert to tuple (width, height)
    pub fn to_tuple(&self) -> (usize, usize) {
        (self.width, self.height)
    }
}

impl From<(usize, usize)> for ImageSize {
    fn from(dimensions: (usize, usize)) -> Self {
        Self::from_width_height(dimensions.0, dimensions.1)
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_of_array_uses_row_major_shape() {
        let array = Array2::<f64>::zeros((30, 40));
        let size = ImageSize::of_array(&array);
        assert_eq!(size.width, 40);
        assert_eq!(size.height, 30);
    }

    #[test]
    fn test_center_pixel_integer_division() {
        assert_eq!(ImageSize::from_width_height(100, 100).center_pixel(), (50, 50));
        assert_eq!(ImageSize::from_width_height(101, 75).center_pixel(), (50, 37));
    }

    #[test]
    fn test_far_corner_and_display() {
        let size = ImageSize::from((64, 32));
        assert_eq!(size.far_corner(), (63, 31));
        assert_eq!(format!("{size}"), "64x32");
        assert!(!size.is_empty());
        assert!(ImageSize::from_width_height(0, 5).is_empty());
    }
}
