//! Interactive figure window.
//!
//! With the `sdl2` feature the figure is streamed into an SDL texture and
//! shown until the window is closed or Escape/Q is pressed. Without it,
//! [`show_figure`] returns [`VizError::DisplayUnavailable`].

use super::render::Figure;
use super::{Result, VizError};

/// Largest share of the desktop the window may take on either axis.
const MAX_SCREEN_FRACTION: f64 = 0.9;

/// Window size for a figure on a `screen` sized desktop, keeping the aspect
/// ratio and never enlarging the figure.
pub fn fit_window((fig_w, fig_h): (u32, u32), (screen_w, screen_h): (u32, u32)) -> (u32, u32) {
    if fig_w == 0 || fig_h == 0 || screen_w == 0 || screen_h == 0 {
        return (fig_w.max(1), fig_h.max(1));
    }
    let scale = (MAX_SCREEN_FRACTION * screen_w as f64 / fig_w as f64)
        .min(MAX_SCREEN_FRACTION * screen_h as f64 / fig_h as f64)
        .min(1.0);
    (
        ((fig_w as f64 * scale).round() as u32).max(1),
        ((fig_h as f64 * scale).round() as u32).max(1),
    )
}

/// Destination rectangle `(x, y, w, h)` centring the figure in the window.
pub fn letterbox((fig_w, fig_h): (u32, u32), (win_w, win_h): (u32, u32)) -> (i32, i32, u32, u32) {
    let scale = (win_w as f64 / fig_w as f64).min(win_h as f64 / fig_h as f64);
    let w = ((fig_w as f64 * scale) as u32).max(1);
    let h = ((fig_h as f64 * scale) as u32).max(1);
    (
        (win_w.saturating_sub(w) / 2) as i32,
        (win_h.saturating_sub(h) / 2) as i32,
        w,
        h,
    )
}

/// Show `figure` in a window and block until it is closed.
#[cfg(feature = "sdl2")]
pub fn show_figure(figure: &Figure, title: &str) -> Result<()> {
    use log::debug;
    use sdl2::event::Event;
    use sdl2::keyboard::Keycode;
    use sdl2::rect::Rect;

    let display_error = |context: &str, e: String| VizError::Window(format!("{context}: {e}"));

    let sdl_context = sdl2::init().map_err(|e| display_error("SDL init failed", e))?;
    let video_subsystem = sdl_context
        .video()
        .map_err(|e| display_error("video subsystem init failed", e))?;

    let mode = video_subsystem
        .desktop_display_mode(0)
        .map_err(|e| display_error("failed to get display mode", e))?;
    let (win_w, win_h) = fit_window(
        (figure.width, figure.height),
        (mode.w.max(0) as u32, mode.h.max(0) as u32),
    );
    debug!(
        "Showing {}x{} figure in a {}x{} window",
        figure.width, figure.height, win_w, win_h
    );

    let window = video_subsystem
        .window(title, win_w, win_h)
        .position_centered()
        .resizable()
        .build()
        .map_err(|e| display_error("failed to create window", e.to_string()))?;

    let mut canvas = window
        .into_canvas()
        .build()
        .map_err(|e| display_error("failed to create canvas", e.to_string()))?;
    let texture_creator = canvas.texture_creator();

    let mut texture = texture_creator
        .create_texture_streaming(
            sdl2::pixels::PixelFormatEnum::RGB24,
            figure.width,
            figure.height,
        )
        .map_err(|e| display_error("failed to create texture", format!("{e:?}")))?;
    texture
        .update(None, figure.pixels.as_raw(), figure.width as usize * 3)
        .map_err(|e| display_error("failed to update texture", format!("{e:?}")))?;

    let mut event_pump = sdl_context
        .event_pump()
        .map_err(|e| display_error("failed to get event pump", e))?;

    'running: loop {
        let window_size = canvas
            .output_size()
            .map_err(|e| display_error("failed to query window size", e))?;
        let (x, y, w, h) = letterbox((figure.width, figure.height), window_size);

        canvas.set_draw_color(sdl2::pixels::Color::RGB(255, 255, 255));
        canvas.clear();
        canvas
            .copy(&texture, None, Some(Rect::new(x, y, w, h)))
            .map_err(|e| display_error("failed to copy texture", e))?;
        canvas.present();

        match event_pump.wait_event() {
            Event::Quit { .. }
            | Event::KeyDown {
                keycode: Some(Keycode::Escape | Keycode::Q),
                ..
            } => break 'running,
            _ => {}
        }
    }
    Ok(())
}

/// Show `figure` in a window and block until it is closed.
#[cfg(not(feature = "sdl2"))]
pub fn show_figure(_figure: &Figure, _title: &str) -> Result<()> {
    Err(VizError::DisplayUnavailable)
}
