use crate::foundation::core::{FrameRGBA, Rgb8};
use crate::foundation::error::{KeyError, KeyResult};

/// Read the RGB color at frame coordinate `(x, y)`.
///
/// The coordinate must already be in frame space; see [`DisplayMapping`] for converting from a
/// scaled on-screen position.
pub fn pick(frame: &FrameRGBA, x: u32, y: u32) -> KeyResult<Rgb8> {
    let [r, g, b, _] = frame.pixel(x, y).ok_or_else(|| {
        KeyError::validation(format!(
            "pick ({x}, {y}) is outside {}x{} frame",
            frame.width, frame.height
        ))
    })?;
    Ok(Rgb8::new(r, g, b))
}

/// How a frame is fitted into its display rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DisplayFit {
    /// Scale uniformly to fit, letterboxing the remaining space.
    #[default]
    Contain,
    /// Scale each axis independently to fill the rectangle.
    Stretch,
}

/// Maps points in a display rectangle onto frame-buffer pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayMapping {
    scale_x: f64,
    scale_y: f64,
    offset_x: f64,
    offset_y: f64,
    frame_width: u32,
    frame_height: u32,
}

impl DisplayMapping {
    /// Build a mapping for a `frame_width x frame_height` frame shown in a
    /// `display_width x display_height` rectangle.
    pub fn new(
        display_width: f64,
        display_height: f64,
        frame_width: u32,
        frame_height: u32,
        fit: DisplayFit,
    ) -> KeyResult<Self> {
        if !(display_width.is_finite() && display_height.is_finite())
            || display_width <= 0.0
            || display_height <= 0.0
        {
            return Err(KeyError::validation("display size must be finite and > 0"));
        }
        if frame_width == 0 || frame_height == 0 {
            return Err(KeyError::validation("frame size must be > 0"));
        }

        let fw = f64::from(frame_width);
        let fh = f64::from(frame_height);
        let (scale_x, scale_y, offset_x, offset_y) = match fit {
            DisplayFit::Stretch => (display_width / fw, display_height / fh, 0.0, 0.0),
            DisplayFit::Contain => {
                let s = (display_width / fw).min(display_height / fh);
                (
                    s,
                    s,
                    (display_width - fw * s) / 2.0,
                    (display_height - fh * s) / 2.0,
                )
            }
        };
        Ok(Self {
            scale_x,
            scale_y,
            offset_x,
            offset_y,
            frame_width,
            frame_height,
        })
    }

    /// Convert a display point to a frame pixel, or `None` if it misses the displayed image.
    pub fn to_frame(&self, display_x: f64, display_y: f64) -> Option<(u32, u32)> {
        let fx = ((display_x - self.offset_x) / self.scale_x).floor();
        let fy = ((display_y - self.offset_y) / self.scale_y).floor();
        if !(fx.is_finite() && fy.is_finite()) || fx < 0.0 || fy < 0.0 {
            return None;
        }
        if fx >= f64::from(self.frame_width) || fy >= f64::from(self.frame_height) {
            return None;
        }
        Some((fx as u32, fy as u32))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/keying/sampler.rs"]
mod tests;
