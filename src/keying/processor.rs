use rayon::prelude::*;

use crate::foundation::core::FrameRGBA;
use crate::foundation::error::{KeyError, KeyResult};
use crate::keying::settings::KeySettings;

/// Largest possible Euclidean distance between two RGB8 colors, `sqrt(255² * 3)`.
pub const MAX_DISTANCE: f32 = 441.672_96;

/// Per-frame constants derived from a [`KeySettings`] snapshot.
///
/// Computed once per frame so the per-pixel loop only does arithmetic.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyParams {
    /// Key color channels as floats.
    pub key: [f32; 3],
    /// Distance below which pixels become fully transparent.
    pub threshold: f32,
    /// Width of the linear alpha ramp above `threshold`.
    pub smooth_range: f32,
    /// Spill suppression strength.
    pub spill: f32,
    /// Index (0=r, 1=g, 2=b) of the key color's largest channel. Ties pick the first.
    pub dominant: usize,
    /// Contrast multiplier.
    pub contrast: f32,
    /// Brightness as a channel offset (`brightness * 255`).
    pub brightness_offset: f32,
    /// Whether contrast/brightness are non-neutral.
    pub adjust_tone: bool,
}

impl KeyParams {
    /// Derive keying constants from settings.
    pub fn from_settings(settings: &KeySettings) -> Self {
        let key = settings.key_color().channels();
        let mut dominant = 0;
        for i in 1..3 {
            if key[i] > key[dominant] {
                dominant = i;
            }
        }
        Self {
            key: key.map(f32::from),
            threshold: (1.0 - settings.similarity()) * MAX_DISTANCE,
            smooth_range: settings.smoothness() * MAX_DISTANCE,
            spill: settings.spill(),
            dominant,
            contrast: settings.contrast(),
            brightness_offset: settings.brightness() * 255.0,
            adjust_tone: !settings.tone_is_neutral(),
        }
    }

    /// Euclidean RGB distance from `rgb` to the key color.
    pub fn distance(&self, rgb: [u8; 3]) -> f32 {
        let dr = f32::from(rgb[0]) - self.key[0];
        let dg = f32::from(rgb[1]) - self.key[1];
        let db = f32::from(rgb[2]) - self.key[2];
        (dr * dr + dg * dg + db * db).sqrt()
    }

    /// Alpha for a pixel at distance `d` from the key color.
    ///
    /// `d <= threshold` is transparent, so with `threshold == 0` an exact key match still keys
    /// out. With a zero smoothing range there is no ramp and everything else is opaque.
    pub fn alpha_for_distance(&self, d: f32) -> u8 {
        if d <= self.threshold {
            return 0;
        }
        if self.smooth_range > 0.0 && d < self.threshold + self.smooth_range {
            let ramp = 255.0 * (d - self.threshold) / self.smooth_range;
            return ramp.floor().clamp(0.0, 255.0) as u8;
        }
        255
    }

    /// Spill strength for a pixel at distance `d`: `max(0, 1 - d/threshold) * spill`.
    pub fn spill_factor(&self, d: f32) -> f32 {
        if self.spill <= 0.0 || self.threshold <= 0.0 {
            return 0.0;
        }
        ((1.0 - d / self.threshold).max(0.0) * self.spill).min(1.0)
    }
}

/// Pull the `dominant` channel toward the max of the other two by `factor`.
///
/// Never raises a channel: a dominant channel already at or below the others is left alone.
pub fn suppress_spill(rgb: &mut [u8; 3], dominant: usize, factor: f32) {
    let others = (0..3)
        .filter(|&i| i != dominant)
        .map(|i| rgb[i])
        .max()
        .unwrap_or(0);
    let v = rgb[dominant];
    if v <= others || factor <= 0.0 {
        return;
    }
    let excess = f32::from(v - others);
    let reduced = (f32::from(v) - excess * factor.min(1.0)).round();
    rgb[dominant] = reduced.clamp(f32::from(others), f32::from(v)) as u8;
}

fn adjust_tone(v: u8, p: &KeyParams) -> u8 {
    ((f32::from(v) - 128.0) * p.contrast + 128.0 + p.brightness_offset)
        .round()
        .clamp(0.0, 255.0) as u8
}

/// Key a single straight-alpha RGBA pixel. The incoming alpha is replaced.
pub fn key_pixel(px: [u8; 4], p: &KeyParams) -> [u8; 4] {
    let mut rgb = [px[0], px[1], px[2]];
    let d = p.distance(rgb);
    let alpha = p.alpha_for_distance(d);

    if alpha > 0 {
        let factor = p.spill_factor(d);
        if factor > 0.0 {
            suppress_spill(&mut rgb, p.dominant, factor);
        }
        if p.adjust_tone {
            for c in &mut rgb {
                *c = adjust_tone(*c, p);
            }
        }
    }

    [rgb[0], rgb[1], rgb[2], alpha]
}

fn key_span(data: &mut [u8], p: &KeyParams) {
    for px in data.chunks_exact_mut(4) {
        let out = key_pixel([px[0], px[1], px[2], px[3]], p);
        px.copy_from_slice(&out);
    }
}

fn key_rows_parallel(data: &mut [u8], stride: usize, p: &KeyParams) {
    data.par_chunks_mut(stride).for_each(|row| key_span(row, p));
}

/// Threading controls for the per-pixel pass.
#[derive(Clone, Debug)]
pub struct ProcessorOpts {
    /// Split the frame into rows and key them on rayon workers.
    pub parallel: bool,
    /// Dedicated worker count. `None` uses the global rayon pool.
    pub threads: Option<usize>,
    /// Frames smaller than this many pixels are keyed serially.
    pub min_parallel_pixels: usize,
}

impl Default for ProcessorOpts {
    fn default() -> Self {
        Self {
            parallel: true,
            threads: None,
            min_parallel_pixels: 128 * 128,
        }
    }
}

impl ProcessorOpts {
    /// Single-threaded processing.
    pub fn serial() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }
}

/// The chroma-key transform: `(frame, settings) -> keyed frame`.
///
/// Pure with respect to its inputs; the only state is the optional worker pool.
pub struct PixelProcessor {
    opts: ProcessorOpts,
    pool: Option<rayon::ThreadPool>,
}

impl std::fmt::Debug for PixelProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelProcessor")
            .field("opts", &self.opts)
            .field("dedicated_pool", &self.pool.is_some())
            .finish()
    }
}

impl PixelProcessor {
    /// Build a processor. Fails if `threads` is `Some(0)` or the pool cannot be created.
    pub fn new(opts: ProcessorOpts) -> KeyResult<Self> {
        let pool = if opts.parallel && opts.threads.is_some() {
            Some(build_thread_pool(opts.threads)?)
        } else {
            None
        };
        Ok(Self { opts, pool })
    }

    /// Options this processor was built with.
    pub fn opts(&self) -> &ProcessorOpts {
        &self.opts
    }

    /// Key `frame` in place. Disabled settings leave the frame untouched.
    #[tracing::instrument(level = "trace", skip_all, fields(w = frame.width, h = frame.height))]
    pub fn process_in_place(&self, frame: &mut FrameRGBA, settings: &KeySettings) -> KeyResult<()> {
        if !settings.enabled() {
            return Ok(());
        }
        frame.check_layout()?;

        let params = KeyParams::from_settings(settings);
        if !self.opts.parallel || frame.pixel_count() < self.opts.min_parallel_pixels {
            key_span(&mut frame.data, &params);
            return Ok(());
        }

        let stride = frame.stride();
        let data = frame.data.as_mut_slice();
        match &self.pool {
            Some(pool) => pool.install(|| key_rows_parallel(data, stride, &params)),
            None => key_rows_parallel(data, stride, &params),
        }
        Ok(())
    }

    /// Key a copy of `frame`.
    pub fn process(&self, frame: &FrameRGBA, settings: &KeySettings) -> KeyResult<FrameRGBA> {
        let mut out = frame.clone();
        self.process_in_place(&mut out, settings)?;
        Ok(out)
    }
}

/// Serial convenience wrapper around [`PixelProcessor::process`].
pub fn process_frame(frame: &FrameRGBA, settings: &KeySettings) -> KeyResult<FrameRGBA> {
    let mut out = frame.clone();
    PixelProcessor {
        opts: ProcessorOpts::serial(),
        pool: None,
    }
    .process_in_place(&mut out, settings)?;
    Ok(out)
}

fn build_thread_pool(threads: Option<usize>) -> KeyResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(KeyError::validation(
            "processor 'threads' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("chromakey-{i}"));
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| KeyError::Other(anyhow::anyhow!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/keying/processor.rs"]
mod tests;
