//! Chromakey is a real-time chroma-key compositor.
//!
//! A [`CompositeRenderer`] is attached to one source item. On every display tick it reads the
//! item's [`KeySettings`] from a [`SettingsStore`], pulls the current frame from a
//! [`FrameSource`], keys it with [`PixelProcessor`] and publishes the RGBA result to an
//! [`OutputSurface`].
//!
//! - Tune settings by hand, pick the key color from a frame ([`PickSession`]) or detect it
//!   automatically ([`detect_key_color`])
//! - Persist settings per source as camelCase JSON
//! - Drive renderers from a host callback through [`RendererHandle`]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;
mod keying;
mod render;

pub use crate::foundation::core::{FrameRGBA, Rgb8};
pub use crate::foundation::error::{KeyError, KeyResult};

pub use crate::keying::detect::detect_key_color;
pub use crate::keying::pick::{DEFAULT_PICK_TIMEOUT, PickOpts, PickSession, PickState};
pub use crate::keying::processor::{
    KeyParams, MAX_DISTANCE, PixelProcessor, ProcessorOpts, key_pixel, process_frame,
    suppress_spill,
};
pub use crate::keying::sampler::{DisplayFit, DisplayMapping, pick};
pub use crate::keying::settings::{
    BRIGHTNESS_RANGE, CONTRAST_RANGE, KeySettings, SIMILARITY_RANGE, SMOOTHNESS_RANGE,
    SPILL_RANGE,
};
pub use crate::keying::store::{SettingsStore, SourceId};

pub use crate::render::handle::RendererHandle;
pub use crate::render::renderer::{
    CompositeRenderer, RenderStats, RendererOpts, RendererState, TickOutcome,
};
pub use crate::render::source::{
    FrameSource, ImageSequenceSource, SourceFrame, VecFrameSource, load_frame,
};
pub use crate::render::surface::{InMemorySurface, OutputSurface, PngSequenceSurface};
