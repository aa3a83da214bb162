//! Display normalization and annotated source figures.

pub mod display;
pub mod render;
pub mod stretch;

pub use display::show_figure;
pub use render::{render_sources, Figure, RenderConfig};
pub use stretch::{ImageNormalize, Stretch};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VizError {
    #[error("drawing failed: {0}")]
    Drawing(String),

    #[error("cannot render an empty image")]
    EmptyImage,

    #[error("invalid figure geometry {width}x{height} px")]
    InvalidGeometry { width: u32, height: u32 },

    #[error("failed to write {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("display failed: {0}")]
    Window(String),

    #[error("built without interactive display support (enable the `sdl2` feature)")]
    DisplayUnavailable,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VizError>;
