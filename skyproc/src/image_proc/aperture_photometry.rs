//! Aperture photometry utilities for astronomical sources.
//!
//! Flux is summed inside a circular aperture around each source. Pixel
//! `(row, col)` covers `[col - 0.5, col + 0.5] x [row - 0.5, row + 0.5]`, and
//! each pixel contributes its value weighted by the fraction of it that lies
//! inside the circle. The weighting is selected by [`ApertureMethod`].

use log::debug;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::detection::PointSource;
use super::stats::median;

/// Pixel weighting used when summing an aperture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ApertureMethod {
    /// Exact geometric overlap of the circle with each pixel
    #[default]
    Exact,
    /// Whole pixel when its centre lies inside the circle
    Center,
    /// Fraction of an `n x n` grid of sub-pixel centres inside the circle
    Subpixel(usize),
}

/// Circular aperture in 0-based pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircularAperture {
    pub x: f64,
    pub y: f64,
    pub r: f64,
}

/// Weighted sum over an aperture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApertureSum {
    pub sum: f64,
    /// Sum of pixel weights that fell on the image
    pub area: f64,
}

/// Integral of `sqrt(r^2 - u^2)` from 0 to `u`.
fn half_chord_integral(u: f64, r: f64) -> f64 {
    let u = u.clamp(-r, r);
    let ratio = (u / r).clamp(-1.0, 1.0);
    0.5 * (u * (r * r - u * u).max(0.0).sqrt() + r * r * ratio.asin())
}

/// Area of the rectangle `[x0, x1] x [y0, y1]` inside a circle of radius `r`
/// centred on the origin.
pub fn pixel_overlap_area(x0: f64, x1: f64, y0: f64, y1: f64, r: f64) -> f64 {
    if r <= 0.0 || x1 <= x0 || y1 <= y0 {
        return 0.0;
    }
    let lo = x0.max(-r);
    let hi = x1.min(r);
    if hi <= lo {
        return 0.0;
    }

    // The chord half-length s(x) crosses y0 or y1 only at these abscissae
    let mut breaks = vec![lo, hi];
    for y in [y0, y1] {
        if y.abs() < r {
            let x = (r * r - y * y).sqrt();
            for b in [-x, x] {
                if b > lo && b < hi {
                    breaks.push(b);
                }
            }
        }
    }
    breaks.sort_by(f64::total_cmp);

    let mut area = 0.0;
    for pair in breaks.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if b - a <= 0.0 {
            continue;
        }
        let mid = 0.5 * (a + b);
        let s = (r * r - mid * mid).max(0.0).sqrt();
        let top_is_circle = s < y1;
        let bottom_is_circle = -s > y0;
        let top = if top_is_circle { s } else { y1 };
        let bottom = if bottom_is_circle { -s } else { y0 };
        if top <= bottom {
            continue;
        }

        let chord = half_chord_integral(b, r) - half_chord_integral(a, r);
        let top_integral = if top_is_circle { chord } else { y1 * (b - a) };
        let bottom_integral = if bottom_is_circle { -chord } else { y0 * (b - a) };
        area += top_integral - bottom_integral;
    }
    area
}

impl CircularAperture {
    pub fn new(x: f64, y: f64, r: f64) -> Self {
        Self { x, y, r }
    }

    /// Analytic area of the circle
    pub fn area(&self) -> f64 {
        std::f64::consts::PI * self.r * self.r
    }

    /// Fraction of pixel `(row, col)` covered by the aperture.
    pub fn pixel_weight(&self, row: usize, col: usize, method: ApertureMethod) -> f64 {
        let dx = col as f64 - self.x;
        let dy = row as f64 - self.y;
        match method {
            ApertureMethod::Exact => {
                pixel_overlap_area(dx - 0.5, dx + 0.5, dy - 0.5, dy + 0.5, self.r)
            }
            ApertureMethod::Center => {
                if dx * dx + dy * dy <= self.r * self.r {
                    1.0
                } else {
                    0.0
                }
            }
            ApertureMethod::Subpixel(n) => {
                let n = n.max(1);
                let step = 1.0 / n as f64;
                let mut inside = 0usize;
                for sy in 0..n {
                    let py = dy - 0.5 + (sy as f64 + 0.5) * step;
                    for sx in 0..n {
                        let px = dx - 0.5 + (sx as f64 + 0.5) * step;
                        if px * px + py * py <= self.r * self.r {
                            inside += 1;
                        }
                    }
                }
                inside as f64 / (n * n) as f64
            }
        }
    }

    /// Weighted sum of the image inside the aperture. Pixels off the image
    /// contribute nothing.
    pub fn sum(&self, image: &ArrayView2<f64>, method: ApertureMethod) -> ApertureSum {
        let (height, width) = image.dim();
        let mut total = ApertureSum { sum: 0.0, area: 0.0 };
        if height == 0 || width == 0 || !(self.r > 0.0) {
            return total;
        }

        let reach = self.r + 0.5;
        let col_min = (self.x - reach).floor().max(0.0) as usize;
        let col_max = ((self.x + reach).ceil().max(0.0) as usize).min(width - 1);
        let row_min = (self.y - reach).floor().max(0.0) as usize;
        let row_max = ((self.y + reach).ceil().max(0.0) as usize).min(height - 1);
        if col_min > col_max || row_min > row_max {
            return total;
        }

        for row in row_min..=row_max {
            for col in col_min..=col_max {
                let weight = self.pixel_weight(row, col, method);
                if weight > 0.0 {
                    total.sum += weight * image[[row, col]];
                    total.area += weight;
                }
            }
        }
        total
    }
}

/// Collect pixels from a circular aperture and background annulus.
///
/// A pixel belongs to a region when its centre falls inside it. Returns
/// `(aperture_pixels, background_pixels)`.
pub fn collect_aperture_pixels(
    image: &ArrayView2<f64>,
    x_center: f64,
    y_center: f64,
    aperture_radius: f64,
    background_inner_radius: f64,
    background_outer_radius: f64,
) -> (Vec<f64>, Vec<f64>) {
    let (height, width) = image.dim();
    let reach = background_outer_radius.max(aperture_radius).ceil() as isize;

    let x_center_int = x_center.round() as isize;
    let y_center_int = y_center.round() as isize;

    let x_min = (x_center_int - reach).max(0) as usize;
    let x_max = (x_center_int + reach + 1).clamp(0, width as isize) as usize;
    let y_min = (y_center_int - reach).max(0) as usize;
    let y_max = (y_center_int + reach + 1).clamp(0, height as isize) as usize;

    let mut aperture_pixels = Vec::new();
    let mut background_pixels = Vec::new();

    for y in y_min..y_max {
        for x in x_min..x_max {
            let dx = x as f64 - x_center;
            let dy = y as f64 - y_center;
            let distance = (dx * dx + dy * dy).sqrt();

            if distance <= aperture_radius {
                aperture_pixels.push(image[[y, x]]);
            } else if distance >= background_inner_radius && distance <= background_outer_radius {
                background_pixels.push(image[[y, x]]);
            }
        }
    }

    (aperture_pixels, background_pixels)
}

/// Inner and outer radius of a local background annulus
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnulusConfig {
    pub inner: f64,
    pub outer: f64,
}

/// Photometry parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotometryConfig {
    /// Aperture radius in pixels
    pub radius: f64,
    pub method: ApertureMethod,
    /// Optional local background annulus
    pub annulus: Option<AnnulusConfig>,
}

impl Default for PhotometryConfig {
    fn default() -> Self {
        Self {
            radius: 5.0,
            method: ApertureMethod::Exact,
            annulus: None,
        }
    }
}

/// Photometry of one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotometryRow {
    /// Identifier of the measured source
    pub id: usize,
    pub x_center: f64,
    pub y_center: f64,
    pub aperture_sum: f64,
    /// Effective aperture area in pixels
    pub area: f64,
    /// Median of the annulus, per pixel
    pub local_background: Option<f64>,
}

impl PhotometryRow {
    /// Aperture sum minus the local background scaled to the aperture area.
    pub fn net_sum(&self) -> f64 {
        match self.local_background {
            Some(bkg) => self.aperture_sum - bkg * self.area,
            None => self.aperture_sum,
        }
    }
}

/// Photometry rows in source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotometryTable {
    pub radius: f64,
    pub method: ApertureMethod,
    pub rows: Vec<PhotometryRow>,
}

impl PhotometryTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn preview(&self, max_rows: usize) -> PhotometryPreview<'_> {
        PhotometryPreview {
            table: self,
            max_rows,
        }
    }
}

/// Sum flux in a circular aperture around every source.
///
/// Row `i` always corresponds to `sources[i]`.
pub fn aperture_photometry<S: PointSource>(
    image: &ArrayView2<f64>,
    sources: &[S],
    config: &PhotometryConfig,
) -> PhotometryTable {
    let rows = sources
        .iter()
        .map(|source| {
            let (x, y) = source.centroid();
            let aperture = CircularAperture::new(x, y, config.radius);
            let ApertureSum { sum, area } = aperture.sum(image, config.method);

            let local_background = config.annulus.and_then(|annulus| {
                let (_, mut background) = collect_aperture_pixels(
                    image,
                    x,
                    y,
                    config.radius,
                    annulus.inner,
                    annulus.outer,
                );
                median(&mut background)
            });

            PhotometryRow {
                id: source.id(),
                x_center: x,
                y_center: y,
                aperture_sum: sum,
                area,
                local_background,
            }
        })
        .collect::<Vec<_>>();

    debug!(
        "Measured {} aperture(s) of radius {} ({:?})",
        rows.len(),
        config.radius,
        config.method
    );

    PhotometryTable {
        radius: config.radius,
        method: config.method,
        rows,
    }
}

/// Tabular preview of the first rows of a [`PhotometryTable`].
pub struct PhotometryPreview<'a> {
    table: &'a PhotometryTable,
    max_rows: usize,
}

impl fmt::Display for PhotometryPreview<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>4} {:>10} {:>10} {:>14}",
            "id", "xcenter", "ycenter", "aperture_sum"
        )?;
        for row in self.table.rows.iter().take(self.max_rows) {
            writeln!(
                f,
                "{:>4} {:>10.4} {:>10.4} {:>14.4}",
                row.id, row.x_center, row.y_center, row.aperture_sum
            )?;
        }
        if self.table.rows.len() > self.max_rows {
            writeln!(f, "... {} more row(s)", self.table.rows.len() - self.max_rows)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;
    use std::f64::consts::PI;

    struct Point {
        id: usize,
        x: f64,
        y: f64,
    }

    impl PointSource for Point {
        fn id(&self) -> usize {
            self.id
        }
        fn centroid(&self) -> (f64, f64) {
            (self.x, self.y)
        }
        fn flux(&self) -> f64 {
            1.0
        }
    }

    #[test]
    fn test_overlap_full_and_empty() {
        // Pixel well inside the circle
        assert_relative_eq!(pixel_overlap_area(-0.5, 0.5, -0.5, 0.5, 5.0), 1.0, epsilon = 1e-12);
        // Pixel well outside
        assert_eq!(pixel_overlap_area(9.5, 10.5, -0.5, 0.5, 5.0), 0.0);
    }

    #[test]
    fn test_overlap_quarter_circle() {
        // Rectangle covering one quadrant of the circle
        let area = pixel_overlap_area(0.0, 3.0, 0.0, 3.0, 2.0);
        assert_relative_eq!(area, PI, epsilon = 1e-12);
    }

    #[test]
    fn test_overlap_tiles_sum_to_circle_area() {
        let r = 3.7;
        let mut total = 0.0;
        for i in -5..=5 {
            for j in -5..=5 {
                let (x, y) = (j as f64 + 0.13, i as f64 - 0.29);
                total += pixel_overlap_area(x - 0.5, x + 0.5, y - 0.5, y + 0.5, r);
            }
        }
        assert_relative_eq!(total, PI * r * r, epsilon = 1e-9);
    }

    #[test]
    fn test_exact_sum_of_constant_image_is_area() {
        let image = Array2::from_elem((40, 40), 2.0);
        let aperture = CircularAperture::new(20.3, 19.6, 5.0);
        let result = aperture.sum(&image.view(), ApertureMethod::Exact);
        assert_relative_eq!(result.area, aperture.area(), epsilon = 1e-9);
        assert_relative_eq!(result.sum, 2.0 * aperture.area(), epsilon = 1e-9);
    }

    #[test]
    fn test_subpixel_converges_to_exact() {
        let image = Array2::from_elem((30, 30), 1.0);
        let aperture = CircularAperture::new(15.2, 14.7, 4.0);
        let exact = aperture.sum(&image.view(), ApertureMethod::Exact).sum;
        let sub = aperture.sum(&image.view(), ApertureMethod::Subpixel(16)).sum;
        assert!((exact - sub).abs() / exact < 0.01);
    }

    #[test]
    fn test_center_method_counts_whole_pixels() {
        let image = Array2::from_elem((20, 20), 1.0);
        let aperture = CircularAperture::new(10.0, 10.0, 1.0);
        let result = aperture.sum(&image.view(), ApertureMethod::Center);
        // Centre plus the four edge neighbours
        assert_eq!(result.sum, 5.0);
    }

    #[test]
    fn test_aperture_clipped_at_edge() {
        let image = Array2::from_elem((20, 20), 1.0);
        let aperture = CircularAperture::new(-0.5, 10.0, 3.0);
        let result = aperture.sum(&image.view(), ApertureMethod::Exact);
        // Half of the circle lies on the image
        assert_relative_eq!(result.sum, 0.5 * aperture.area(), epsilon = 1e-9);
    }

    #[test]
    fn test_photometry_rows_follow_source_order() {
        let mut image = Array2::zeros((50, 50));
        image[[10, 10]] = 100.0;
        image[[40, 30]] = 300.0;
        image[[25, 5]] = 200.0;

        let sources = vec![
            Point { id: 1, x: 30.0, y: 40.0 },
            Point { id: 2, x: 5.0, y: 25.0 },
            Point { id: 3, x: 10.0, y: 10.0 },
        ];
        let table = aperture_photometry(&image.view(), &sources, &PhotometryConfig::default());

        assert_eq!(table.len(), 3);
        for (row, source) in table.rows.iter().zip(&sources) {
            assert_eq!(row.id, source.id);
            assert_eq!((row.x_center, row.y_center), (source.x, source.y));
        }
        assert_relative_eq!(table.rows[0].aperture_sum, 300.0, epsilon = 1e-9);
        assert_relative_eq!(table.rows[1].aperture_sum, 200.0, epsilon = 1e-9);
        assert_relative_eq!(table.rows[2].aperture_sum, 100.0, epsilon = 1e-9);
        assert!(table.rows.iter().all(|r| r.local_background.is_none()));
    }

    #[test]
    fn test_annulus_background() {
        let mut image = Array2::from_elem((60, 60), 4.0);
        image[[30, 30]] = 1004.0;

        let config = PhotometryConfig {
            annulus: Some(AnnulusConfig {
                inner: 8.0,
                outer: 12.0,
            }),
            ..Default::default()
        };
        let sources = vec![Point { id: 1, x: 30.0, y: 30.0 }];
        let table = aperture_photometry(&image.view(), &sources, &config);

        let row = &table.rows[0];
        assert_eq!(row.local_background, Some(4.0));
        assert_relative_eq!(row.net_sum(), 1000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_collect_aperture_pixels_basic() {
        let mut image = Array2::<f64>::zeros((20, 20));
        for i in 0..20 {
            for j in 0..20 {
                let dx = j as f64 - 10.0;
                let dy = i as f64 - 10.0;
                let distance = (dx * dx + dy * dy).sqrt();

                if distance <= 2.0 {
                    image[[i, j]] = 100.0;
                } else if (4.0..=6.0).contains(&distance) {
                    image[[i, j]] = 50.0;
                }
            }
        }

        let (aperture_pixels, background_pixels) =
            collect_aperture_pixels(&image.view(), 10.0, 10.0, 2.0, 4.0, 6.0);

        assert!(!aperture_pixels.is_empty());
        assert!(aperture_pixels.iter().all(|&p| p == 100.0));
        assert!(!background_pixels.is_empty());
        assert!(background_pixels.iter().all(|&p| p == 50.0));
    }

    #[test]
    fn test_preview_truncates() {
        let table = PhotometryTable {
            radius: 5.0,
            method: ApertureMethod::Exact,
            rows: (1..=12)
                .map(|id| PhotometryRow {
                    id,
                    x_center: id as f64,
                    y_center: 0.0,
                    aperture_sum: 1.0,
                    area: 1.0,
                    local_background: None,
                })
                .collect(),
        };
        let text = table.preview(10).to_string();
        assert_eq!(text.lines().count(), 12);
        assert!(text.ends_with("... 2 more row(s)\n"));
    }
}
