use serde::{Deserialize, Serialize};

use crate::foundation::core::Rgb8;
use crate::foundation::error::KeyResult;

/// Allowed range of [`KeySettings::similarity`].
pub const SIMILARITY_RANGE: (f32, f32) = (0.0, 1.0);
/// Allowed range of [`KeySettings::smoothness`].
pub const SMOOTHNESS_RANGE: (f32, f32) = (0.0, 1.0);
/// Allowed range of [`KeySettings::spill`].
pub const SPILL_RANGE: (f32, f32) = (0.0, 1.0);
/// Allowed range of [`KeySettings::contrast`]. `1.0` is neutral.
pub const CONTRAST_RANGE: (f32, f32) = (0.0, 2.0);
/// Allowed range of [`KeySettings::brightness`]. `0.0` is neutral.
pub const BRIGHTNESS_RANGE: (f32, f32) = (-1.0, 1.0);

const DEFAULT_SIMILARITY: f32 = 0.4;
const DEFAULT_SMOOTHNESS: f32 = 0.1;
const DEFAULT_SPILL: f32 = 0.1;
const DEFAULT_CONTRAST: f32 = 1.0;
const DEFAULT_BRIGHTNESS: f32 = 0.0;

/// Per-source configuration of the keying transform.
///
/// Every bounded field is clamped on the way in, so a stored `KeySettings` is always in range.
/// Non-finite inputs fall back to the field default.
///
/// Note that `similarity` is inversely related to how much gets removed: the distance threshold
/// is `(1 - similarity) * MAX_DISTANCE`, so `similarity = 1` keys out only exact matches (plus
/// the smoothing ramp).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "KeySettingsRecord", into = "KeySettingsRecord")]
pub struct KeySettings {
    enabled: bool,
    key_color: Rgb8,
    similarity: f32,
    smoothness: f32,
    spill: f32,
    contrast: f32,
    brightness: f32,
}

impl Default for KeySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            key_color: Rgb8::GREEN,
            similarity: DEFAULT_SIMILARITY,
            smoothness: DEFAULT_SMOOTHNESS,
            spill: DEFAULT_SPILL,
            contrast: DEFAULT_CONTRAST,
            brightness: DEFAULT_BRIGHTNESS,
        }
    }
}

fn clamp_field(v: f32, range: (f32, f32), fallback: f32) -> f32 {
    if v.is_finite() {
        v.clamp(range.0, range.1)
    } else {
        fallback
    }
}

impl KeySettings {
    /// Default settings with keying turned on.
    pub fn enabled_default() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Whether the keying transform runs at all.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Color to remove.
    pub fn key_color(&self) -> Rgb8 {
        self.key_color
    }

    /// Tolerance control in `[0, 1]`.
    pub fn similarity(&self) -> f32 {
        self.similarity
    }

    /// Width of the alpha ramp beyond the threshold, in `[0, 1]`.
    pub fn smoothness(&self) -> f32 {
        self.smoothness
    }

    /// Fraction of key-color bleed suppressed on retained pixels, in `[0, 1]`.
    ///
    /// Spill only touches visible pixels, and those lie beyond the threshold where the
    /// `1 - d / threshold` falloff is already zero, so it does not change keyed output.
    pub fn spill(&self) -> f32 {
        self.spill
    }

    /// Post-key contrast in `[0, 2]`.
    pub fn contrast(&self) -> f32 {
        self.contrast
    }

    /// Post-key brightness in `[-1, 1]`.
    pub fn brightness(&self) -> f32 {
        self.brightness
    }

    /// Turn keying on or off.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Replace the key color.
    pub fn set_key_color(&mut self, color: Rgb8) {
        self.key_color = color;
    }

    /// Set similarity, clamped to [`SIMILARITY_RANGE`].
    pub fn set_similarity(&mut self, v: f32) {
        self.similarity = clamp_field(v, SIMILARITY_RANGE, DEFAULT_SIMILARITY);
    }

    /// Set smoothness, clamped to [`SMOOTHNESS_RANGE`].
    pub fn set_smoothness(&mut self, v: f32) {
        self.smoothness = clamp_field(v, SMOOTHNESS_RANGE, DEFAULT_SMOOTHNESS);
    }

    /// Set spill suppression, clamped to [`SPILL_RANGE`].
    pub fn set_spill(&mut self, v: f32) {
        self.spill = clamp_field(v, SPILL_RANGE, DEFAULT_SPILL);
    }

    /// Set contrast, clamped to [`CONTRAST_RANGE`].
    pub fn set_contrast(&mut self, v: f32) {
        self.contrast = clamp_field(v, CONTRAST_RANGE, DEFAULT_CONTRAST);
    }

    /// Set brightness, clamped to [`BRIGHTNESS_RANGE`].
    pub fn set_brightness(&mut self, v: f32) {
        self.brightness = clamp_field(v, BRIGHTNESS_RANGE, DEFAULT_BRIGHTNESS);
    }

    /// Builder form of [`KeySettings::set_enabled`].
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.set_enabled(enabled);
        self
    }

    /// Builder form of [`KeySettings::set_key_color`].
    pub fn with_key_color(mut self, color: Rgb8) -> Self {
        self.set_key_color(color);
        self
    }

    /// Builder form of [`KeySettings::set_similarity`].
    pub fn with_similarity(mut self, v: f32) -> Self {
        self.set_similarity(v);
        self
    }

    /// Builder form of [`KeySettings::set_smoothness`].
    pub fn with_smoothness(mut self, v: f32) -> Self {
        self.set_smoothness(v);
        self
    }

    /// Builder form of [`KeySettings::set_spill`].
    pub fn with_spill(mut self, v: f32) -> Self {
        self.set_spill(v);
        self
    }

    /// Builder form of [`KeySettings::set_contrast`].
    pub fn with_contrast(mut self, v: f32) -> Self {
        self.set_contrast(v);
        self
    }

    /// Builder form of [`KeySettings::set_brightness`].
    pub fn with_brightness(mut self, v: f32) -> Self {
        self.set_brightness(v);
        self
    }

    /// Whether tone adjustment is a no-op.
    pub fn tone_is_neutral(&self) -> bool {
        self.contrast == DEFAULT_CONTRAST && self.brightness == DEFAULT_BRIGHTNESS
    }

    /// Parse the flat JSON persistence schema.
    ///
    /// Missing fields take their defaults, out-of-range numbers are clamped and a malformed
    /// `keyColor` is replaced with `#00FF00` (logged, not an error).
    pub fn from_json(s: &str) -> KeyResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Format as the flat JSON persistence schema.
    pub fn to_json(&self) -> KeyResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Pretty-printed variant of [`KeySettings::to_json`].
    pub fn to_json_pretty(&self) -> KeyResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Wire shape of [`KeySettings`]: `{enabled, keyColor: "#RRGGBB", similarity, ...}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct KeySettingsRecord {
    enabled: bool,
    key_color: String,
    similarity: f32,
    smoothness: f32,
    spill: f32,
    contrast: f32,
    brightness: f32,
}

impl Default for KeySettingsRecord {
    fn default() -> Self {
        KeySettings::default().into()
    }
}

impl From<KeySettings> for KeySettingsRecord {
    fn from(s: KeySettings) -> Self {
        Self {
            enabled: s.enabled,
            key_color: s.key_color.to_hex(),
            similarity: s.similarity,
            smoothness: s.smoothness,
            spill: s.spill,
            contrast: s.contrast,
            brightness: s.brightness,
        }
    }
}

impl From<KeySettingsRecord> for KeySettings {
    fn from(r: KeySettingsRecord) -> Self {
        let key_color = match Rgb8::parse_hex(&r.key_color) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "falling back to default key color {}", Rgb8::GREEN);
                Rgb8::GREEN
            }
        };
        KeySettings::default()
            .with_enabled(r.enabled)
            .with_key_color(key_color)
            .with_similarity(r.similarity)
            .with_smoothness(r.smoothness)
            .with_spill(r.spill)
            .with_contrast(r.contrast)
            .with_brightness(r.brightness)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/keying/settings.rs"]
mod tests;
