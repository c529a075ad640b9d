use std::fmt;
use std::str::FromStr;

use crate::foundation::error::{KeyError, KeyResult};

/// Opaque 8-bit RGB color.
///
/// The canonical text form is `#RRGGBB` (uppercase hex). Parsing is case-insensitive, tolerates
/// surrounding whitespace and a missing `#`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgb8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb8 {
    /// Pure green, the default key color.
    pub const GREEN: Self = Self::new(0, 255, 0);

    /// Construct from channel values.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Channels as an array in `[r, g, b]` order.
    pub fn channels(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Parse `#RRGGBB`.
    pub fn parse_hex(s: &str) -> KeyResult<Self> {
        let trimmed = s.trim();
        let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(KeyError::invalid_color(format!(
                "\"{s}\": key color must be #RRGGBB (case-insensitive)"
            )));
        }

        fn hex_byte(s: &str, pair: &str) -> KeyResult<u8> {
            u8::from_str_radix(pair, 16).map_err(|_| {
                KeyError::invalid_color(format!("\"{s}\": invalid hex byte \"{pair}\""))
            })
        }

        Ok(Self {
            r: hex_byte(s, &hex[0..2])?,
            g: hex_byte(s, &hex[2..4])?,
            b: hex_byte(s, &hex[4..6])?,
        })
    }

    /// Format as canonical `#RRGGBB`.
    pub fn to_hex(self) -> String {
        self.to_string()
    }
}

impl Default for Rgb8 {
    fn default() -> Self {
        Self::GREEN
    }
}

impl fmt::Display for Rgb8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb8 {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_hex(s)
    }
}

impl serde::Serialize for Rgb8 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Rgb8 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A decoded frame as straight-alpha RGBA8 pixels.
///
/// Keyed output is **not** premultiplied: the color channels of retained pixels keep their
/// original values and alpha is written separately.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
}

impl FrameRGBA {
    /// Wrap an RGBA8 buffer, validating that it matches `width * height * 4`.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> KeyResult<Self> {
        let expected = expected_len(width, height)?;
        if data.len() != expected {
            return Err(KeyError::validation(format!(
                "frame buffer has {} bytes, expected {expected} for {width}x{height} rgba8",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A frame where every pixel is `px`.
    pub fn filled(width: u32, height: u32, px: [u8; 4]) -> KeyResult<Self> {
        let n = expected_len(width, height)? / 4;
        Self::new(width, height, px.repeat(n))
    }

    /// Build a frame from rows of opaque colors. All rows must have the same length.
    pub fn from_rows(rows: &[&[Rgb8]]) -> KeyResult<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.len());
        if rows.iter().any(|r| r.len() != width) {
            return Err(KeyError::validation("frame rows must have equal length"));
        }
        let data = rows
            .iter()
            .flat_map(|row| row.iter().flat_map(|c| [c.r, c.g, c.b, 255]))
            .collect();
        Self::new(dim(width)?, dim(height)?, data)
    }

    /// Check that `data` holds exactly `width * height` RGBA8 pixels.
    ///
    /// Fields are public, so a frame built by hand can disagree with its dimensions.
    pub fn check_layout(&self) -> KeyResult<()> {
        let expected = expected_len(self.width, self.height)?;
        if self.data.len() != expected {
            return Err(KeyError::validation(format!(
                "frame buffer has {} bytes, expected {expected} for {}x{} rgba8",
                self.data.len(),
                self.width,
                self.height
            )));
        }
        Ok(())
    }

    /// Number of pixels.
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Byte stride of one row.
    pub fn stride(&self) -> usize {
        (self.width as usize) * 4
    }

    /// RGBA value at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        let px = self.data.get(idx..idx + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Alpha channel, row-major.
    pub fn alpha_plane(&self) -> Vec<u8> {
        self.data.chunks_exact(4).map(|px| px[3]).collect()
    }

    /// Convert from an `image` buffer.
    pub fn from_image(img: image::RgbaImage) -> KeyResult<Self> {
        let (width, height) = img.dimensions();
        Self::new(width, height, img.into_raw())
    }

    /// Convert into an `image` buffer.
    pub fn into_image(self) -> KeyResult<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.data)
            .ok_or_else(|| KeyError::validation("frame buffer does not fit its dimensions"))
    }
}

fn expected_len(width: u32, height: u32) -> KeyResult<usize> {
    if width == 0 || height == 0 {
        return Err(KeyError::validation(format!(
            "frame dimensions must be non-zero, got {width}x{height}"
        )));
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| KeyError::validation("frame buffer size overflow"))
}

fn dim(n: usize) -> KeyResult<u32> {
    u32::try_from(n).map_err(|_| KeyError::validation(format!("frame dimension {n} exceeds u32")))
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
