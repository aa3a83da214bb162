//! Synthetic star fields for detection and photometry tests.
//!
//! Stars are circular or elliptical Gaussians evaluated at pixel centres
//! over the whole frame, so a star centred on a pixel is exactly symmetric.
//! Noise comes from a seeded ChaCha8 generator and is reproducible.

use ndarray::Array2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

/// Gaussian sigma for a given FWHM
pub fn fwhm_to_sigma(fwhm: f64) -> f64 {
    fwhm / (2.0 * (2.0 * std::f64::consts::LN_2).sqrt())
}

/// Add a circular Gaussian star with peak `amplitude` at (x, y).
pub fn add_gaussian_star(image: &mut Array2<f64>, x: f64, y: f64, amplitude: f64, fwhm: f64) {
    let sigma = fwhm_to_sigma(fwhm);
    add_elliptical_star(image, x, y, amplitude, sigma, sigma);
}

/// Add an axis-aligned elliptical Gaussian with per-axis sigmas in pixels.
pub fn add_elliptical_star(
    image: &mut Array2<f64>,
    x: f64,
    y: f64,
    amplitude: f64,
    sigma_x: f64,
    sigma_y: f64,
) {
    for ((row, col), pixel) in image.indexed_iter_mut() {
        let dx = col as f64 - x;
        let dy = row as f64 - y;
        let exponent = -(dx * dx / (2.0 * sigma_x * sigma_x) + dy * dy / (2.0 * sigma_y * sigma_y));
        *pixel += amplitude * exponent.exp();
    }
}

/// Add zero-mean Gaussian noise with a fixed seed.
pub fn add_gaussian_noise(image: &mut Array2<f64>, sigma: f64, seed: u64) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let normal = Normal::new(0.0, sigma).expect("noise sigma must be finite and non-negative");
    for pixel in image.iter_mut() {
        *pixel += normal.sample(&mut rng);
    }
}

/// A `height x width` frame at `background` with circular stars given as
/// `(x, y, amplitude)`.
pub fn star_field(
    width: usize,
    height: usize,
    background: f64,
    stars: &[(f64, f64, f64)],
    fwhm: f64,
) -> Array2<f64> {
    let mut image = Array2::from_elem((height, width), background);
    for &(x, y, amplitude) in stars {
        add_gaussian_star(&mut image, x, y, amplitude, fwhm);
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_peak_and_symmetry() {
        let image = star_field(21, 21, 10.0, &[(10.0, 10.0, 1000.0)], 3.0);
        assert_eq!(image[[10, 10]], 1010.0);
        assert_eq!(image[[10, 9]], image[[10, 11]]);
        assert_eq!(image[[9, 10]], image[[11, 10]]);
        assert!(image[[0, 0]] - 10.0 < 1e-12);
    }

    #[test]
    fn test_half_maximum_at_half_fwhm() {
        let mut image = Array2::zeros((1, 11));
        add_gaussian_star(&mut image, 3.0, 0.0, 1.0, 4.0);
        // Two pixels from the centre is exactly half the FWHM
        assert!((image[[0, 5]] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_noise_is_reproducible() {
        let mut a = Array2::zeros((16, 16));
        let mut b = Array2::zeros((16, 16));
        add_gaussian_noise(&mut a, 3.0, 42);
        add_gaussian_noise(&mut b, 3.0, 42);
        assert_eq!(a, b);
        assert!(a.iter().any(|&v| v != 0.0));
    }
}
