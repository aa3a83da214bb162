//! Single-frame astronomical image analysis.
//!
//! The crate is organised by pipeline concern:
//! - [`io`]: FITS container loading and writing
//! - [`image_proc`]: background estimation, star finding and aperture photometry
//! - [`wcs`]: pixel to sky transforms and angular helpers
//! - [`viz`]: display normalization and annotated figure rendering

pub mod image_proc;
pub mod image_size;
pub mod io;
pub mod viz;
pub mod wcs;

pub use image_size::ImageSize;
pub use io::fits::{load_fits, FitsImage, ImageMetadata, LoadError};
