use crate::foundation::core::{FrameRGBA, Rgb8};
use crate::foundation::error::{KeyError, KeyResult};

/// Propose a key color by averaging the four corner pixels.
///
/// Assumes the background is visible in every corner. Each channel is the rounded mean of the
/// corner samples (halves round up).
pub fn detect_key_color(frame: &FrameRGBA) -> KeyResult<Rgb8> {
    let (w, h) = (frame.width, frame.height);
    if w == 0 || h == 0 {
        return Err(KeyError::validation("cannot detect key color of an empty frame"));
    }
    let corners = [(0, 0), (w - 1, 0), (0, h - 1), (w - 1, h - 1)];

    let mut sum = [0u32; 3];
    for (x, y) in corners {
        let px = frame
            .pixel(x, y)
            .ok_or_else(|| KeyError::validation("frame buffer shorter than its dimensions"))?;
        for c in 0..3 {
            sum[c] += u32::from(px[c]);
        }
    }

    let n = corners.len() as u32;
    let avg = sum.map(|s| ((2 * s + n) / (2 * n)) as u8);
    let color = Rgb8::new(avg[0], avg[1], avg[2]);
    tracing::debug!(%color, "detected key color from frame corners");
    Ok(color)
}

#[cfg(test)]
#[path = "../../tests/unit/keying/detect.rs"]
mod tests;
