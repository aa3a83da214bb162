//! Annotated source figure: stretched image, source markers and a colorbar.
//!
//! The figure is rasterized into an in-memory RGB buffer with plotters and
//! written out as PNG through `image`. Text needs a system font; when none
//! is available the figure is still produced without labels.

use image::RgbImage;
use log::{debug, warn};
use ndarray::{Array2, ArrayView2};
use plotters::prelude::*;
use plotters::style::colors::colormaps::{ColorMap, ViridisRGB};
use plotters::style::text_anchor::{HPos, Pos, VPos};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::stretch::{ImageNormalize, Stretch};
use super::{Result, VizError};

/// Figure layout and marker styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Figure size in inches
    pub figsize: (f64, f64),
    pub dpi: u32,
    pub stretch: Stretch,
    /// Marker circle radius in image pixels
    pub marker_radius: f64,
    pub marker_alpha: f64,
    /// Marker line width in points
    pub marker_line_width: f64,
    pub title: String,
    pub colorbar_label: String,
    /// Open the figure in a window after rendering
    pub show: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            figsize: (10.0, 8.0),
            dpi: 300,
            stretch: Stretch::Sqrt,
            marker_radius: 10.0,
            marker_alpha: 0.7,
            marker_line_width: 1.5,
            title: "Detected Sources".to_string(),
            colorbar_label: "Flux".to_string(),
            show: false,
        }
    }
}

impl RenderConfig {
    /// Output size in pixels.
    pub fn pixel_size(&self) -> (u32, u32) {
        let dpi = self.dpi as f64;
        (
            (self.figsize.0 * dpi).round().max(0.0) as u32,
            (self.figsize.1 * dpi).round().max(0.0) as u32,
        )
    }

    fn points_to_pixels(&self, points: f64) -> f64 {
        points * self.dpi as f64 / 72.0
    }
}

/// Rendered figure held in memory.
pub struct Figure {
    pub width: u32,
    pub height: u32,
    pub pixels: RgbImage,
}

impl Figure {
    /// Write the figure as PNG, creating parent directories as needed.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        self.pixels
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|source| VizError::Save {
                path: path.to_path_buf(),
                source,
            })?;
        debug!("Wrote {}x{} figure to {}", self.width, self.height, path.display());
        Ok(())
    }
}

fn drawing_error<E: std::fmt::Display>(err: E) -> VizError {
    VizError::Drawing(err.to_string())
}

fn viridis(t: f64) -> RGBColor {
    ViridisRGB.get_color(t.clamp(0.0, 1.0) as f32)
}

/// Render `image` with origin at the lower left, a circle around every
/// `(x, y)` position and a colorbar in data units.
pub fn render_sources(
    image: &ArrayView2<f64>,
    positions: &[(f64, f64)],
    config: &RenderConfig,
) -> Result<Figure> {
    let (height, width) = image.dim();
    if width == 0 || height == 0 {
        return Err(VizError::EmptyImage);
    }

    let (fig_w, fig_h) = config.pixel_size();
    if fig_w < 32 || fig_h < 32 {
        return Err(VizError::InvalidGeometry {
            width: fig_w,
            height: fig_h,
        });
    }

    let norm = ImageNormalize::from_data(image, config.stretch);
    let display = image.mapv(|v| norm.normalize(v));

    let mut buffer = vec![0u8; fig_w as usize * fig_h as usize * 3];
    draw_figure(&mut buffer, (fig_w, fig_h), &display, &norm, positions, config)?;

    let pixels = RgbImage::from_raw(fig_w, fig_h, buffer).ok_or(VizError::InvalidGeometry {
        width: fig_w,
        height: fig_h,
    })?;

    Ok(Figure {
        width: fig_w,
        height: fig_h,
        pixels,
    })
}

fn draw_figure(
    buffer: &mut [u8],
    (fig_w, fig_h): (u32, u32),
    display: &Array2<f64>,
    norm: &ImageNormalize,
    positions: &[(f64, f64)],
    config: &RenderConfig,
) -> Result<()> {
    let (height, width) = display.dim();
    let scale = config.dpi as f64 / 100.0;
    let px = |v: f64| (v * scale).round().max(1.0) as u32;

    let title_font = config.points_to_pixels(14.0).round().max(1.0);
    let label_font = config.points_to_pixels(10.0).round().max(1.0);

    let root = BitMapBackend::with_buffer(buffer, (fig_w, fig_h)).into_drawing_area();
    root.fill(&WHITE).map_err(drawing_error)?;

    let title_height = px(60.0);
    let title_style = ("sans-serif", title_font)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Center));
    if let Err(e) = root.draw_text(
        &config.title,
        &title_style,
        ((fig_w / 2) as i32, (title_height / 2) as i32),
    ) {
        warn!("Figure title not drawn: {e}");
    }

    let body = root.margin(title_height, px(20.0), px(20.0), px(20.0));
    let (body_w, body_h) = body.dim_in_pixel();
    let colorbar_width = px(140.0).min(body_w / 3);
    let (image_area, colorbar_area) = body.split_horizontally(body_w - colorbar_width);

    // Keep image pixels square inside the space left by the axis labels
    let x_label_area = px(50.0);
    let y_label_area = px(60.0);
    let (area_w, _) = image_area.dim_in_pixel();
    let avail_w = area_w.saturating_sub(y_label_area + px(10.0)) as f64;
    let avail_h = body_h.saturating_sub(x_label_area) as f64;
    let pixel_scale = (avail_w / width as f64).min(avail_h / height as f64);
    let plot_w = (width as f64 * pixel_scale).floor() as u32;
    let plot_h = (height as f64 * pixel_scale).floor() as u32;
    let spare_w = (avail_w as u32).saturating_sub(plot_w);
    let spare_h = (avail_h as u32).saturating_sub(plot_h);

    let x_range = -0.5..width as f64 - 0.5;
    let y_range = -0.5..height as f64 - 0.5;
    let mut chart = ChartBuilder::on(&image_area)
        .margin_top(spare_h / 2)
        .margin_bottom(spare_h - spare_h / 2)
        .margin_left(spare_w / 2)
        .margin_right(spare_w - spare_w / 2 + px(10.0))
        .x_label_area_size(x_label_area)
        .y_label_area_size(y_label_area)
        .build_cartesian_2d(x_range, y_range)
        .map_err(drawing_error)?;

    let plotting = chart.plotting_area().strip_coord_spec();
    let (pw, ph) = plotting.dim_in_pixel();
    for sy in 0..ph {
        let fy = 1.0 - (sy as f64 + 0.5) / ph as f64;
        let row = ((fy * height as f64) as usize).min(height - 1);
        for sx in 0..pw {
            let fx = (sx as f64 + 0.5) / pw as f64;
            let col = ((fx * width as f64) as usize).min(width - 1);
            plotting
                .draw_pixel((sx as i32, sy as i32), &viridis(display[[row, col]]))
                .map_err(drawing_error)?;
        }
    }

    if let Err(e) = chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("X (pixels)")
        .y_desc("Y (pixels)")
        .label_style(("sans-serif", label_font))
        .axis_desc_style(("sans-serif", label_font))
        .draw()
    {
        warn!("Image axes not drawn: {e}");
    }

    let radius = (config.marker_radius * pw as f64 / width as f64)
        .round()
        .max(1.0) as i32;
    let line_width = config.points_to_pixels(config.marker_line_width).round().max(1.0) as u32;
    let marker_style = RED.mix(config.marker_alpha).stroke_width(line_width);
    chart
        .draw_series(
            positions
                .iter()
                .filter(|(x, y)| x.is_finite() && y.is_finite())
                .map(|&(x, y)| Circle::new((x, y), radius, marker_style)),
        )
        .map_err(drawing_error)?;

    draw_colorbar(
        &colorbar_area,
        norm,
        config,
        (x_label_area + spare_h - spare_h / 2, spare_h / 2),
        label_font,
    )?;

    root.present().map_err(drawing_error)?;
    Ok(())
}

fn draw_colorbar(
    area: &DrawingArea<BitMapBackend, plotters::coord::Shift>,
    norm: &ImageNormalize,
    config: &RenderConfig,
    (bottom, top): (u32, u32),
    label_font: f64,
) -> Result<()> {
    let (area_w, _) = area.dim_in_pixel();
    let (vmin, vmax) = if norm.vmax > norm.vmin {
        (norm.vmin, norm.vmax)
    } else {
        (norm.vmin, norm.vmin + 1.0)
    };

    let mut chart = ChartBuilder::on(area)
        .margin_top(top)
        .margin_bottom(bottom)
        .margin_left(area_w / 8)
        .right_y_label_area_size(area_w / 2)
        .build_cartesian_2d(0.0..1.0, vmin..vmax)
        .map_err(drawing_error)?;

    let bar = chart.plotting_area().strip_coord_spec();
    let (bw, bh) = bar.dim_in_pixel();
    for sy in 0..bh {
        let t = 1.0 - (sy as f64 + 0.5) / bh as f64;
        let color = viridis(norm.normalize(vmin + t * (vmax - vmin)));
        for sx in 0..bw {
            bar.draw_pixel((sx as i32, sy as i32), &color)
                .map_err(drawing_error)?;
        }
    }

    if let Err(e) = chart
        .configure_mesh()
        .disable_mesh()
        .disable_x_axis()
        .y_desc(config.colorbar_label.as_str())
        .label_style(("sans-serif", label_font))
        .axis_desc_style(("sans-serif", label_font))
        .draw()
    {
        warn!("Colorbar labels not drawn: {e}");
    }

    Ok(())
}
