//! World Coordinate System support for FITS images.
//!
//! A [`Wcs`] is built from header cards: CTYPEi selects the celestial axes
//! and the zenithal projection, CRPIXi/CRVALi fix the reference point, and
//! the linear part comes from CDi_j, else PCi_j scaled by CDELTi, else
//! CDELTi with CROTA2. Pixel coordinates passed in and out are 0-based;
//! CRPIX stays 1-based as written in the header.

pub mod projection;
pub mod sky;

pub use projection::Projection;
pub use sky::{Angle, SkyCoord};

use log::{debug, warn};
use nalgebra::{Matrix2, Vector2};
use std::fmt;
use thiserror::Error;

use crate::image_size::ImageSize;
use crate::io::fits::ImageMetadata;
use projection::{celestial_to_native, native_to_celestial};

/// Failure to build or evaluate a celestial WCS. Non-fatal to a pipeline run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinateError {
    #[error("missing WCS keyword {0}")]
    MissingKeyword(&'static str),

    #[error("axes '{ctype1}' / '{ctype2}' do not describe a celestial frame")]
    NotCelestial { ctype1: String, ctype2: String },

    #[error("unsupported projection '{0}'")]
    UnsupportedProjection(String),

    #[error("axes use different projections: '{0}' and '{1}'")]
    MismatchedProjection(String, String),

    #[error("linear transform matrix is singular")]
    SingularMatrix,

    #[error("invalid value {value} for {key}")]
    InvalidValue { key: &'static str, value: f64 },

    #[error("point ({x}, {y}) lies outside the projection domain")]
    OutOfDomain { x: f64, y: f64 },
}

/// Celestial axis pairs that can be interpreted as longitude/latitude.
const CELESTIAL_PAIRS: &[(&str, &str)] = &[("RA", "DEC"), ("GLON", "GLAT"), ("ELON", "ELAT")];

/// Split `RA---TAN` into `("RA", "TAN")`. Anything after the code, such as
/// a `-SIP` suffix, is returned separately.
fn parse_ctype(ctype: &str) -> (String, String, String) {
    let ctype = ctype.trim();
    let axis = ctype.get(..4).unwrap_or(ctype).trim_end_matches('-').to_string();
    let code = ctype.get(5..8).unwrap_or("").to_string();
    let suffix = ctype.get(8..).unwrap_or("").trim_start_matches('-').to_string();
    (axis, code, suffix)
}

/// Two-axis celestial WCS with a zenithal projection.
#[derive(Debug, Clone, PartialEq)]
pub struct Wcs {
    pub ctype: [String; 2],
    /// Reference pixel, 1-based as in the header
    pub crpix: [f64; 2],
    /// Reference world coordinates in degrees, in header axis order
    pub crval: [f64; 2],
    /// Pixel offset to intermediate world coordinates, degrees per pixel
    pub cd: Matrix2<f64>,
    /// Native longitude of the celestial pole
    pub lonpole: f64,
    pub projection: Projection,
    /// True when axis 1 is latitude and axis 2 longitude
    pub lat_first: bool,
    pub naxis: Option<ImageSize>,
    cd_inverse: Matrix2<f64>,
}

fn required(metadata: &ImageMetadata, key: &'static str) -> Result<f64, CoordinateError> {
    let value = metadata
        .real(key)
        .ok_or(CoordinateError::MissingKeyword(key))?;
    if !value.is_finite() {
        return Err(CoordinateError::InvalidValue { key, value });
    }
    Ok(value)
}

fn optional(metadata: &ImageMetadata, key: &'static str) -> Result<Option<f64>, CoordinateError> {
    match metadata.real(key) {
        Some(value) if !value.is_finite() => Err(CoordinateError::InvalidValue { key, value }),
        other => Ok(other),
    }
}

impl Wcs {
    /// Build the transform from header cards.
    pub fn from_metadata(metadata: &ImageMetadata) -> Result<Self, CoordinateError> {
        let ctype1 = metadata
            .text("CTYPE1")
            .ok_or(CoordinateError::MissingKeyword("CTYPE1"))?
            .to_string();
        let ctype2 = metadata
            .text("CTYPE2")
            .ok_or(CoordinateError::MissingKeyword("CTYPE2"))?
            .to_string();

        let (axis1, code1, suffix1) = parse_ctype(&ctype1);
        let (axis2, code2, _) = parse_ctype(&ctype2);

        let lat_first = if CELESTIAL_PAIRS
            .iter()
            .any(|&(lon, lat)| axis1 == lon && axis2 == lat)
        {
            false
        } else if CELESTIAL_PAIRS
            .iter()
            .any(|&(lon, lat)| axis1 == lat && axis2 == lon)
        {
            true
        } else {
            return Err(CoordinateError::NotCelestial { ctype1, ctype2 });
        };

        if code1 != code2 {
            return Err(CoordinateError::MismatchedProjection(code1, code2));
        }
        let projection = Projection::from_code(&code1)
            .ok_or_else(|| CoordinateError::UnsupportedProjection(code1.clone()))?;
        if !suffix1.is_empty() {
            warn!("Ignoring '{suffix1}' distortion terms on {ctype1}");
        }

        let crpix = [required(metadata, "CRPIX1")?, required(metadata, "CRPIX2")?];
        let crval = [required(metadata, "CRVAL1")?, required(metadata, "CRVAL2")?];
        let cd = Self::linear_matrix(metadata)?;

        let cd_inverse = cd.try_inverse().ok_or(CoordinateError::SingularMatrix)?;

        let lonpole = optional(metadata, "LONPOLE")?.unwrap_or(180.0);
        let naxis = match (metadata.naxis1(), metadata.naxis2()) {
            (Some(w), Some(h)) => Some(ImageSize::from_width_height(w, h)),
            _ => None,
        };

        debug!(
            "WCS {} projection, CRVAL ({}, {}), CRPIX ({}, {})",
            projection.code(),
            crval[0],
            crval[1],
            crpix[0],
            crpix[1]
        );

        Ok(Self {
            ctype: [ctype1, ctype2],
            crpix,
            crval,
            cd,
            lonpole,
            projection,
            lat_first,
            naxis,
            cd_inverse,
        })
    }

    fn linear_matrix(metadata: &ImageMetadata) -> Result<Matrix2<f64>, CoordinateError> {
        const CD_KEYS: [&str; 4] = ["CD1_1", "CD1_2", "CD2_1", "CD2_2"];
        const PC_KEYS: [&str; 4] = ["PC1_1", "PC1_2", "PC2_1", "PC2_2"];

        if CD_KEYS.iter().any(|k| metadata.contains(k)) {
            let mut m = [0.0; 4];
            for (slot, key) in m.iter_mut().zip(CD_KEYS) {
                *slot = optional(metadata, key)?.unwrap_or(0.0);
            }
            return Ok(Matrix2::new(m[0], m[1], m[2], m[3]));
        }

        let cdelt1 = required(metadata, "CDELT1")?;
        let cdelt2 = required(metadata, "CDELT2")?;

        if PC_KEYS.iter().any(|k| metadata.contains(k)) {
            let identity = [1.0, 0.0, 0.0, 1.0];
            let mut m = [0.0; 4];
            for ((slot, key), default) in m.iter_mut().zip(PC_KEYS).zip(identity) {
                *slot = optional(metadata, key)?.unwrap_or(default);
            }
            return Ok(Matrix2::new(
                cdelt1 * m[0],
                cdelt1 * m[1],
                cdelt2 * m[2],
                cdelt2 * m[3],
            ));
        }

        let crota2 = optional(metadata, "CROTA2")?.unwrap_or(0.0).to_radians();
        let (sin_r, cos_r) = crota2.sin_cos();
        Ok(Matrix2::new(
            cdelt1 * cos_r,
            -cdelt2 * sin_r,
            cdelt1 * sin_r,
            cdelt2 * cos_r,
        ))
    }

    fn reference(&self) -> (f64, f64) {
        if self.lat_first {
            (self.crval[1], self.crval[0])
        } else {
            (self.crval[0], self.crval[1])
        }
    }

    /// Convert a 0-based pixel position to sky coordinates.
    pub fn pixel_to_world(&self, x: f64, y: f64) -> Result<SkyCoord, CoordinateError> {
        let offset = Vector2::new(x + 1.0 - self.crpix[0], y + 1.0 - self.crpix[1]);
        let intermediate = self.cd * offset;
        let (ix, iy) = if self.lat_first {
            (intermediate[1], intermediate[0])
        } else {
            (intermediate[0], intermediate[1])
        };

        let (phi, theta) = self.projection.deproject(ix, iy)?;
        let (lon_p, lat_p) = self.reference();
        let (lon, lat) = native_to_celestial(phi, theta, lon_p, lat_p, self.lonpole);
        Ok(SkyCoord::new(lon, lat))
    }

    /// Convert sky coordinates to a 0-based pixel position.
    pub fn world_to_pixel(&self, coord: &SkyCoord) -> Result<(f64, f64), CoordinateError> {
        let (lon_p, lat_p) = self.reference();
        let (phi, theta) = celestial_to_native(coord.ra, coord.dec, lon_p, lat_p, self.lonpole);
        let (ix, iy) = self.projection.project(phi, theta)?;
        let intermediate = if self.lat_first {
            Vector2::new(iy, ix)
        } else {
            Vector2::new(ix, iy)
        };

        let offset = self.cd_inverse * intermediate;
        Ok((
            offset[0] + self.crpix[0] - 1.0,
            offset[1] + self.crpix[1] - 1.0,
        ))
    }

    /// Approximate pixel scale in arcseconds, from the matrix determinant.
    pub fn pixel_scale_arcsec(&self) -> f64 {
        self.cd.determinant().abs().sqrt() * 3600.0
    }
}

impl fmt::Display for Wcs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "WCS Keywords")?;
        writeln!(f)?;
        writeln!(f, "Number of WCS axes: 2")?;
        writeln!(f, "CTYPE : '{}'  '{}'", self.ctype[0], self.ctype[1])?;
        writeln!(f, "CRVAL : {}  {}", self.crval[0], self.crval[1])?;
        writeln!(f, "CRPIX : {}  {}", self.crpix[0], self.crpix[1])?;
        writeln!(f, "CD1_1 CD1_2  : {:e}  {:e}", self.cd[(0, 0)], self.cd[(0, 1)])?;
        writeln!(f, "CD2_1 CD2_2  : {:e}  {:e}", self.cd[(1, 0)], self.cd[(1, 1)])?;
        match self.naxis {
            Some(size) => write!(f, "NAXIS : {}  {}", size.width, size.height),
            None => write!(f, "NAXIS : 0  0"),
        }
    }
}

/// Field centre and extent of an image.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCoordinates {
    pub size: ImageSize,
    /// Pixel (NAXIS1 / 2, NAXIS2 / 2)
    pub center_pixel: (usize, usize),
    pub center: SkyCoord,
    /// Sky position of pixel (0, 0)
    pub first_corner: SkyCoord,
    /// Sky position of pixel (width - 1, height - 1)
    pub last_corner: SkyCoord,
    /// Great-circle separation of the two corners
    pub diagonal: Angle,
    /// Mean linear size of one pixel on the sky
    pub pixel_scale: Angle,
}

/// Centre coordinate and diagonal field of view.
///
/// Axis lengths come from NAXIS1/NAXIS2 when present and from `data_size`
/// otherwise.
pub fn analyze_field(
    metadata: &ImageMetadata,
    data_size: ImageSize,
) -> Result<(Wcs, FieldCoordinates), CoordinateError> {
    let wcs = Wcs::from_metadata(metadata)?;
    let size = wcs.naxis.unwrap_or(data_size);

    let center_pixel = size.center_pixel();
    let center = wcs.pixel_to_world(center_pixel.0 as f64, center_pixel.1 as f64)?;

    let (far_x, far_y) = size.far_corner();
    let first_corner = wcs.pixel_to_world(0.0, 0.0)?;
    let last_corner = wcs.pixel_to_world(far_x as f64, far_y as f64)?;
    let diagonal = first_corner.separation(&last_corner);
    let pixel_scale = Angle::from_degrees(wcs.pixel_scale_arcsec() / 3600.0);

    Ok((
        wcs,
        FieldCoordinates {
            size,
            center_pixel,
            center,
            first_corner,
            last_corner,
            diagonal,
            pixel_scale,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// 100x100 TAN header, 1 arcsec pixels, reference at the image centre
    fn tan_metadata() -> ImageMetadata {
        let mut metadata = ImageMetadata::new();
        metadata.insert("NAXIS1", 100_i64);
        metadata.insert("NAXIS2", 100_i64);
        metadata.insert("CTYPE1", "RA---TAN");
        metadata.insert("CTYPE2", "DEC--TAN");
        metadata.insert("CRPIX1", 50.5);
        metadata.insert("CRPIX2", 50.5);
        metadata.insert("CRVAL1", 150.0);
        metadata.insert("CRVAL2", 2.0);
        metadata.insert("CD1_1", -1.0 / 3600.0);
        metadata.insert("CD1_2", 0.0);
        metadata.insert("CD2_1", 0.0);
        metadata.insert("CD2_2", 1.0 / 3600.0);
        metadata
    }

    #[test]
    fn test_reference_pixel_maps_to_crval() {
        let wcs = Wcs::from_metadata(&tan_metadata()).unwrap();
        let coord = wcs.pixel_to_world(49.5, 49.5).unwrap();
        assert_relative_eq!(coord.ra, 150.0, epsilon = 1e-10);
        assert_relative_eq!(coord.dec, 2.0, epsilon = 1e-10);
    }

    #[test]
    fn test_axis_directions() {
        let wcs = Wcs::from_metadata(&tan_metadata()).unwrap();
        let east = wcs.pixel_to_world(39.5, 49.5).unwrap();
        let north = wcs.pixel_to_world(49.5, 59.5).unwrap();
        // Negative CD1_1: RA grows towards smaller x
        assert!(east.ra > 150.0);
        assert!(north.dec > 2.0);
        assert_relative_eq!(north.dec - 2.0, 10.0 / 3600.0, epsilon = 1e-9);
    }

    #[test]
    fn test_round_trip_all_projections() {
        for code in ["TAN", "SIN", "ARC", "STG"] {
            let mut metadata = tan_metadata();
            metadata.insert("CTYPE1", format!("RA---{code}").as_str());
            metadata.insert("CTYPE2", format!("DEC--{code}").as_str());
            let wcs = Wcs::from_metadata(&metadata).unwrap();

            for &(x, y) in &[(50.0, 50.0), (0.0, 0.0), (99.0, 12.5)] {
                let coord = wcs.pixel_to_world(x, y).unwrap();
                let (x2, y2) = wcs.world_to_pixel(&coord).unwrap();
                assert_relative_eq!(x, x2, epsilon = 1e-6);
                assert_relative_eq!(y, y2, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_cdelt_crota_matches_cd() {
        let mut metadata = tan_metadata();
        for key in ["CD1_1", "CD1_2", "CD2_1", "CD2_2"] {
            metadata.remove(key);
        }
        metadata.insert("CDELT1", -1.0 / 3600.0);
        metadata.insert("CDELT2", 1.0 / 3600.0);
        metadata.insert("CROTA2", 30.0);

        let wcs = Wcs::from_metadata(&metadata).unwrap();
        let rotation = 30f64.to_radians();
        assert_relative_eq!(wcs.cd[(0, 0)], -rotation.cos() / 3600.0, epsilon = 1e-15);
        assert_relative_eq!(wcs.cd[(0, 1)], -rotation.sin() / 3600.0, epsilon = 1e-15);
        assert_relative_eq!(wcs.pixel_scale_arcsec(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_pc_matrix_scaled_by_cdelt() {
        let mut metadata = ImageMetadata::new();
        metadata.insert("CTYPE1", "RA---TAN");
        metadata.insert("CTYPE2", "DEC--TAN");
        metadata.insert("CRPIX1", 1.0);
        metadata.insert("CRPIX2", 1.0);
        metadata.insert("CRVAL1", 10.0);
        metadata.insert("CRVAL2", 10.0);
        metadata.insert("CDELT1", 2.0 / 3600.0);
        metadata.insert("CDELT2", 3.0 / 3600.0);
        metadata.insert("PC1_2", 0.5);

        let wcs = Wcs::from_metadata(&metadata).unwrap();
        assert_relative_eq!(wcs.cd[(0, 0)], 2.0 / 3600.0);
        assert_relative_eq!(wcs.cd[(0, 1)], 1.0 / 3600.0);
        assert_relative_eq!(wcs.cd[(1, 0)], 0.0);
        assert_relative_eq!(wcs.cd[(1, 1)], 3.0 / 3600.0);
    }

    #[test]
    fn test_swapped_axes() {
        let mut metadata = ImageMetadata::new();
        metadata.insert("CTYPE1", "DEC--TAN");
        metadata.insert("CTYPE2", "RA---TAN");
        metadata.insert("CRPIX1", 10.0);
        metadata.insert("CRPIX2", 10.0);
        metadata.insert("CRVAL1", -30.0);
        metadata.insert("CRVAL2", 200.0);
        metadata.insert("CD1_1", 0.0);
        metadata.insert("CD1_2", 1.0 / 3600.0);
        metadata.insert("CD2_1", 1.0 / 3600.0);
        metadata.insert("CD2_2", 0.0);

        let wcs = Wcs::from_metadata(&metadata).unwrap();
        assert!(wcs.lat_first);
        let coord = wcs.pixel_to_world(9.0, 9.0).unwrap();
        assert_relative_eq!(coord.ra, 200.0, epsilon = 1e-10);
        assert_relative_eq!(coord.dec, -30.0, epsilon = 1e-10);

        let (x, y) = wcs.world_to_pixel(&SkyCoord::new(200.01, -30.005)).unwrap();
        let back = wcs.pixel_to_world(x, y).unwrap();
        assert_relative_eq!(back.ra, 200.01, epsilon = 1e-9);
        assert_relative_eq!(back.dec, -30.005, epsilon = 1e-9);
    }

    #[test]
    fn test_missing_keywords() {
        let empty = ImageMetadata::new();
        assert_eq!(
            Wcs::from_metadata(&empty).unwrap_err(),
            CoordinateError::MissingKeyword("CTYPE1")
        );

        let mut metadata = tan_metadata();
        metadata.remove("CRVAL2");
        assert_eq!(
            Wcs::from_metadata(&metadata).unwrap_err(),
            CoordinateError::MissingKeyword("CRVAL2")
        );
    }

    #[test]
    fn test_non_celestial_and_unsupported() {
        let mut metadata = tan_metadata();
        metadata.insert("CTYPE1", "LINEAR");
        metadata.insert("CTYPE2", "LINEAR");
        assert!(matches!(
            Wcs::from_metadata(&metadata),
            Err(CoordinateError::NotCelestial { .. })
        ));

        let mut metadata = tan_metadata();
        metadata.insert("CTYPE1", "RA---CAR");
        metadata.insert("CTYPE2", "DEC--CAR");
        assert_eq!(
            Wcs::from_metadata(&metadata).unwrap_err(),
            CoordinateError::UnsupportedProjection("CAR".to_string())
        );

        let mut metadata = tan_metadata();
        metadata.insert("CTYPE2", "DEC--SIN");
        assert!(matches!(
            Wcs::from_metadata(&metadata),
            Err(CoordinateError::MismatchedProjection(_, _))
        ));
    }

    #[test]
    fn test_singular_matrix() {
        let mut metadata = tan_metadata();
        metadata.insert("CD2_2", 0.0);
        assert_eq!(
            Wcs::from_metadata(&metadata).unwrap_err(),
            CoordinateError::SingularMatrix
        );
    }

    #[test]
    fn test_analyze_field() {
        let (wcs, field) =
            analyze_field(&tan_metadata(), ImageSize::from_width_height(100, 100)).unwrap();

        assert_eq!(field.center_pixel, (50, 50));
        let (x, y) = wcs.world_to_pixel(&field.center).unwrap();
        assert_relative_eq!(x, 50.0, epsilon = 1e-6);
        assert_relative_eq!(y, 50.0, epsilon = 1e-6);

        // 99 * sqrt(2) arcsec diagonal
        let expected = 99.0 * 2f64.sqrt() / 3600.0;
        assert_relative_eq!(field.diagonal.degrees(), expected, max_relative = 1e-6);
        assert_relative_eq!(field.diagonal.arcminutes(), expected * 60.0, max_relative = 1e-6);
        assert_relative_eq!(field.pixel_scale.arcseconds(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_display_dump() {
        let wcs = Wcs::from_metadata(&tan_metadata()).unwrap();
        let text = wcs.to_string();
        assert!(text.starts_with("WCS Keywords"));
        assert!(text.contains("CTYPE : 'RA---TAN'  'DEC--TAN'"));
        assert!(text.contains("NAXIS : 100  100"));
    }
}
