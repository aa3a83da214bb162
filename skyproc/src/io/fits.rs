//! FITS container loading and writing.
//!
//! The loader opens a file, records a structural summary of every HDU, reads
//! the primary image as `f64` (cfitsio applies BSCALE/BZERO) and collects a
//! fixed set of header cards into an [`ImageMetadata`] record. Integer pixels
//! equal to the header's BLANK value come back as NaN. The handle is released
//! before [`load_fits`] returns.

use fitsio::hdu::{FitsHdu, HduInfo};
use fitsio::images::{ImageDescription, ImageType};
use fitsio::FitsFile;
use log::{debug, info};
use ndarray::Array2;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::image_size::ImageSize;

/// Failure to produce an image from a FITS container. Fatal to a pipeline run.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("FITS error reading {path}: {source}")]
    Fits {
        path: PathBuf,
        #[source]
        source: fitsio::errors::Error,
    },

    #[error("primary HDU of {0} holds no image data")]
    NoImageData(PathBuf),

    #[error("primary HDU of {path} has {naxis} non-trivial axes, expected 2")]
    UnsupportedDimensions { path: PathBuf, naxis: usize },

    #[error("pixel count {actual} does not match header shape {expected:?}")]
    ShapeMismatch { expected: Vec<usize>, actual: usize },
}

/// Scalar value of a header card.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Text(String),
    Real(f64),
    Integer(i64),
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::Text(s) => write!(f, "'{s}'"),
            HeaderValue::Real(v) => write!(f, "{v}"),
            HeaderValue::Integer(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::Text(value.to_string())
    }
}

impl From<f64> for HeaderValue {
    fn from(value: f64) -> Self {
        HeaderValue::Real(value)
    }
}

impl From<i64> for HeaderValue {
    fn from(value: i64) -> Self {
        HeaderValue::Integer(value)
    }
}

#[derive(Debug, Clone, Copy)]
enum CardKind {
    Text,
    Real,
    Integer,
}

/// Header cards read from the primary HDU.
///
/// Anything not listed here is ignored. Missing cards are simply absent from
/// the record.
const CARDS: &[(&str, CardKind)] = &[
    ("TELESCOP", CardKind::Text),
    ("INSTRUME", CardKind::Text),
    ("FILTER", CardKind::Text),
    ("OBJECT", CardKind::Text),
    ("DATE-OBS", CardKind::Text),
    ("EXPTIME", CardKind::Real),
    ("NAXIS", CardKind::Integer),
    ("NAXIS1", CardKind::Integer),
    ("NAXIS2", CardKind::Integer),
    ("CTYPE1", CardKind::Text),
    ("CTYPE2", CardKind::Text),
    ("CUNIT1", CardKind::Text),
    ("CUNIT2", CardKind::Text),
    ("RADESYS", CardKind::Text),
    ("EQUINOX", CardKind::Real),
    ("CRVAL1", CardKind::Real),
    ("CRVAL2", CardKind::Real),
    ("CRPIX1", CardKind::Real),
    ("CRPIX2", CardKind::Real),
    ("CDELT1", CardKind::Real),
    ("CDELT2", CardKind::Real),
    ("CROTA2", CardKind::Real),
    ("CD1_1", CardKind::Real),
    ("CD1_2", CardKind::Real),
    ("CD2_1", CardKind::Real),
    ("CD2_2", CardKind::Real),
    ("PC1_1", CardKind::Real),
    ("PC1_2", CardKind::Real),
    ("PC2_1", CardKind::Real),
    ("PC2_2", CardKind::Real),
    ("LONPOLE", CardKind::Real),
    ("LATPOLE", CardKind::Real),
    ("BLANK", CardKind::Integer),
    ("BSCALE", CardKind::Real),
    ("BZERO", CardKind::Real),
];

/// Flat key to scalar mapping of the header cards that were present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageMetadata {
    cards: BTreeMap<String, HeaderValue>,
}

impl ImageMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a card.
    pub fn insert(&mut self, key: &str, value: impl Into<HeaderValue>) {
        self.cards.insert(key.to_uppercase(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<HeaderValue> {
        self.cards.remove(&key.to_uppercase())
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.cards.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.cards.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.cards.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Text card, trimmed of the trailing blanks FITS pads strings with.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.cards.get(key)? {
            HeaderValue::Text(s) => Some(s.trim_end()),
            _ => None,
        }
    }

    /// Numeric card as `f64`. Integer cards are widened.
    pub fn real(&self, key: &str) -> Option<f64> {
        match self.cards.get(key)? {
            HeaderValue::Real(v) => Some(*v),
            HeaderValue::Integer(v) => Some(*v as f64),
            HeaderValue::Text(_) => None,
        }
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        match self.cards.get(key)? {
            HeaderValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn telescope(&self) -> Option<&str> {
        self.text("TELESCOP")
    }

    pub fn instrument(&self) -> Option<&str> {
        self.text("INSTRUME")
    }

    pub fn filter(&self) -> Option<&str> {
        self.text("FILTER")
    }

    /// Exposure time in seconds
    pub fn exposure_time(&self) -> Option<f64> {
        self.real("EXPTIME")
    }

    pub fn naxis1(&self) -> Option<usize> {
        self.integer("NAXIS1").and_then(|v| usize::try_from(v).ok())
    }

    pub fn naxis2(&self) -> Option<usize> {
        self.integer("NAXIS2").and_then(|v| usize::try_from(v).ok())
    }
}

/// Kind of HDU as reported in the structural summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HduKind {
    Primary,
    Image,
    Table,
    Unknown,
}

impl fmt::Display for HduKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HduKind::Primary => "PrimaryHDU",
            HduKind::Image => "ImageHDU",
            HduKind::Table => "TableHDU",
            HduKind::Unknown => "UnknownHDU",
        };
        f.write_str(name)
    }
}

/// One row of the structural summary.
#[derive(Debug, Clone, PartialEq)]
pub struct HduSummary {
    pub index: usize,
    pub name: String,
    pub kind: HduKind,
    /// Image shape in FITS axis order (NAXIS1 first) or `[ncols, nrows]` for tables
    pub dimensions: Vec<usize>,
    pub format: Option<String>,
}

impl fmt::Display for HduSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims = self
            .dimensions
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        write!(
            f,
            "{:<4}{:<11}{:<12}({}){:>10}",
            self.index,
            self.name,
            self.kind,
            dims,
            self.format.as_deref().unwrap_or("")
        )
    }
}

/// Structural summary of a whole container.
#[derive(Debug, Clone, PartialEq)]
pub struct FitsSummary<'a> {
    pub path: &'a Path,
    pub hdus: &'a [HduSummary],
}

impl fmt::Display for FitsSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Filename: {}", self.path.display())?;
        writeln!(f, "No. Name       Type        Dimensions   Format")?;
        for hdu in self.hdus {
            writeln!(f, "{hdu}")?;
        }
        Ok(())
    }
}

/// A loaded primary image with its metadata.
#[derive(Debug, Clone)]
pub struct FitsImage {
    pub path: PathBuf,
    /// Pixel data indexed `[[y, x]]`: rows are NAXIS2, columns are NAXIS1
    pub data: Array2<f64>,
    pub metadata: ImageMetadata,
    pub hdus: Vec<HduSummary>,
}

impl FitsImage {
    pub fn size(&self) -> ImageSize {
        ImageSize::of_array(&self.data)
    }

    pub fn summary(&self) -> FitsSummary<'_> {
        FitsSummary {
            path: &self.path,
            hdus: &self.hdus,
        }
    }
}

fn fits_error(path: &Path) -> impl FnOnce(fitsio::errors::Error) -> LoadError + '_ {
    move |source| LoadError::Fits {
        path: path.to_path_buf(),
        source,
    }
}

fn image_type_name(image_type: &ImageType) -> &'static str {
    match image_type {
        ImageType::UnsignedByte => "uint8",
        ImageType::Byte => "int8",
        ImageType::Short => "int16",
        ImageType::UnsignedShort => "uint16",
        ImageType::Long => "int32",
        ImageType::UnsignedLong => "uint32",
        ImageType::LongLong => "int64",
        ImageType::Float => "float32",
        ImageType::Double => "float64",
    }
}

fn is_integer_image(image_type: &ImageType) -> bool {
    !matches!(image_type, ImageType::Float | ImageType::Double)
}

/// Replace pixels holding the scaled BLANK value with NaN and return how
/// many were replaced. Only meaningful for integer images.
fn apply_blank(data: &mut Array2<f64>, metadata: &ImageMetadata) -> usize {
    let Some(blank) = metadata.integer("BLANK") else {
        return 0;
    };
    let bscale = metadata.real("BSCALE").unwrap_or(1.0);
    let bzero = metadata.real("BZERO").unwrap_or(0.0);
    let blank_value = bzero + bscale * blank as f64;

    let mut replaced = 0;
    for value in data.iter_mut().filter(|v| **v == blank_value) {
        *value = f64::NAN;
        replaced += 1;
    }
    replaced
}

fn summarize_hdu(fptr: &mut FitsFile, hdu: &FitsHdu, index: usize) -> HduSummary {
    let extname = hdu
        .read_key::<String>(fptr, "EXTNAME")
        .ok()
        .map(|s| s.trim_end().to_string());

    let (kind, dimensions, format) = match &hdu.info {
        HduInfo::ImageInfo { shape, image_type } => {
            let kind = if index == 0 {
                HduKind::Primary
            } else {
                HduKind::Image
            };
            let format = (!shape.is_empty()).then(|| image_type_name(image_type).to_string());
            (kind, shape.iter().rev().copied().collect(), format)
        }
        HduInfo::TableInfo {
            column_descriptions,
            num_rows,
        } => (
            HduKind::Table,
            vec![column_descriptions.len(), *num_rows],
            None,
        ),
        HduInfo::AnyInfo => (HduKind::Unknown, Vec::new(), None),
    };

    let name = extname.unwrap_or_else(|| {
        if index == 0 {
            "PRIMARY".to_string()
        } else {
            String::new()
        }
    });

    HduSummary {
        index,
        name,
        kind,
        dimensions,
        format,
    }
}

fn read_cards(fptr: &mut FitsFile, hdu: &FitsHdu) -> ImageMetadata {
    let mut metadata = ImageMetadata::new();
    for &(key, kind) in CARDS {
        let value = match kind {
            CardKind::Text => hdu
                .read_key::<String>(fptr, key)
                .ok()
                .map(HeaderValue::Text),
            CardKind::Real => hdu.read_key::<f64>(fptr, key).ok().map(HeaderValue::Real),
            CardKind::Integer => hdu
                .read_key::<i64>(fptr, key)
                .ok()
                .map(HeaderValue::Integer),
        };
        if let Some(value) = value {
            metadata.cards.insert(key.to_string(), value);
        }
    }
    metadata
}

/// Load the primary image of a FITS file.
///
/// Axes of length one beyond the first two are squeezed away, so a
/// `(1, ny, nx)` cube loads as a plain image.
///
/// # Errors
/// Any failure is a [`LoadError`]: missing file, cfitsio failure, an empty
/// primary HDU or a genuinely multi-dimensional image.
pub fn load_fits(path: impl AsRef<Path>) -> Result<FitsImage, LoadError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }

    let mut fptr = FitsFile::open(path).map_err(fits_error(path))?;

    let mut hdus = Vec::new();
    let mut index = 0;
    while let Ok(hdu) = fptr.hdu(index) {
        hdus.push(summarize_hdu(&mut fptr, &hdu, index));
        index += 1;
    }
    debug!("{} contains {} HDU(s)", path.display(), hdus.len());

    let hdu = fptr.primary_hdu().map_err(fits_error(path))?;
    let (shape, integer_pixels) = match &hdu.info {
        HduInfo::ImageInfo { shape, image_type } => (shape.clone(), is_integer_image(image_type)),
        _ => return Err(LoadError::NoImageData(path.to_path_buf())),
    };
    if shape.is_empty() || shape.iter().any(|&n| n == 0) {
        return Err(LoadError::NoImageData(path.to_path_buf()));
    }

    // shape is in C order: [.., NAXIS2, NAXIS1]
    let (leading, plane) = shape.split_at(shape.len().saturating_sub(2));
    if plane.len() != 2 || leading.iter().any(|&n| n != 1) {
        let naxis = shape.iter().filter(|&&n| n > 1).count();
        return Err(LoadError::UnsupportedDimensions {
            path: path.to_path_buf(),
            naxis,
        });
    }
    let (height, width) = (plane[0], plane[1]);

    let pixels: Vec<f64> = hdu.read_image(&mut fptr).map_err(fits_error(path))?;
    let actual = pixels.len();
    let mut data = Array2::from_shape_vec((height, width), pixels).map_err(|_| {
        LoadError::ShapeMismatch {
            expected: vec![height, width],
            actual,
        }
    })?;

    let metadata = read_cards(&mut fptr, &hdu);
    drop(fptr);

    if integer_pixels {
        let blanked = apply_blank(&mut data, &metadata);
        if blanked > 0 {
            debug!("{blanked} BLANK pixel(s) set to NaN");
        }
    }

    info!(
        "Loaded {} ({}x{}, {} header cards)",
        path.display(),
        width,
        height,
        metadata.len()
    );

    Ok(FitsImage {
        path: path.to_path_buf(),
        data,
        metadata,
        hdus,
    })
}

/// Write `data` as the primary image of a new FITS file, replacing any
/// existing file, followed by the given header cards.
pub fn write_fits(
    path: impl AsRef<Path>,
    data: &Array2<f64>,
    cards: &[(&str, HeaderValue)],
) -> Result<(), fitsio::errors::Error> {
    let path = path.as_ref();
    let (height, width) = data.dim();
    let description = ImageDescription {
        data_type: ImageType::Double,
        dimensions: &[height, width],
    };

    let mut fptr = FitsFile::create(path)
        .with_custom_primary(&description)
        .overwrite()
        .open()?;
    let hdu = fptr.primary_hdu()?;

    let pixels: Vec<f64> = data.iter().copied().collect();
    hdu.write_image(&mut fptr, &pixels)?;

    for (key, value) in cards {
        match value {
            HeaderValue::Text(s) => hdu.write_key(&mut fptr, key, s.as_str())?,
            HeaderValue::Real(v) => hdu.write_key(&mut fptr, key, *v)?,
            HeaderValue::Integer(v) => hdu.write_key(&mut fptr, key, *v)?,
        }
    }

    debug!("Wrote {}x{} image to {}", width, height, path.display());
    Ok(())
}
