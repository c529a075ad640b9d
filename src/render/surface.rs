use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::foundation::core::FrameRGBA;
use crate::foundation::error::{KeyError, KeyResult};

/// Writable RGBA raster read by downstream preview/export renderers.
///
/// Lifecycle: `acquire` once the frame size is known (again if it changes), `publish` per
/// produced frame in production order, `release` on teardown. Failures are reported as
/// [`KeyError::SurfaceAcquisition`].
pub trait OutputSurface: Send {
    /// Allocate or resize the surface for `width x height`.
    fn acquire(&mut self, width: u32, height: u32) -> KeyResult<()>;
    /// Replace the surface contents with `frame`.
    fn publish(&mut self, frame: &FrameRGBA) -> KeyResult<()>;
    /// Drop any held resources. Must be idempotent.
    fn release(&mut self);
}

#[derive(Debug, Default)]
struct MemoryState {
    size: Option<(u32, u32)>,
    frame: Option<FrameRGBA>,
    published: u64,
    acquired: u64,
    refuse: bool,
}

/// Surface that keeps the last published frame in memory.
///
/// Clones share state, so a caller can keep one handle for inspection while the renderer owns
/// another.
#[derive(Clone, Debug, Default)]
pub struct InMemorySurface {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemorySurface {
    /// New, unacquired surface.
    pub fn new() -> Self {
        Self::default()
    }

    /// A surface whose `acquire` always fails.
    pub fn unavailable() -> Self {
        let s = Self::default();
        s.lock().refuse = true;
        s
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A poisoned lock only means a panicking test thread; the state is still plain data.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Last published frame.
    pub fn frame(&self) -> Option<FrameRGBA> {
        self.lock().frame.clone()
    }

    /// Number of `publish` calls since creation.
    pub fn published(&self) -> u64 {
        self.lock().published
    }

    /// Number of successful `acquire` calls since creation.
    pub fn acquired(&self) -> u64 {
        self.lock().acquired
    }

    /// Current size, `None` when not acquired.
    pub fn size(&self) -> Option<(u32, u32)> {
        self.lock().size
    }
}

impl OutputSurface for InMemorySurface {
    fn acquire(&mut self, width: u32, height: u32) -> KeyResult<()> {
        let mut st = self.lock();
        if st.refuse {
            return Err(KeyError::surface("in-memory surface marked unavailable"));
        }
        st.size = Some((width, height));
        st.acquired += 1;
        Ok(())
    }

    fn publish(&mut self, frame: &FrameRGBA) -> KeyResult<()> {
        frame
            .check_layout()
            .map_err(|e| KeyError::surface(format!("publish rejected: {e}")))?;
        let mut guard = self.lock();
        let st = &mut *guard;
        if st.size != Some((frame.width, frame.height)) {
            return Err(KeyError::surface(format!(
                "publish {}x{} into surface sized {:?}",
                frame.width, frame.height, st.size
            )));
        }
        match &mut st.frame {
            Some(dst) => dst.clone_from(frame),
            None => st.frame = Some(frame.clone()),
        }
        st.published += 1;
        Ok(())
    }

    fn release(&mut self) {
        let mut st = self.lock();
        st.size = None;
        st.frame = None;
    }
}

/// Writes each published frame to `<dir>/<prefix><n>.png`.
#[derive(Debug)]
pub struct PngSequenceSurface {
    dir: PathBuf,
    prefix: String,
    size: Option<(u32, u32)>,
    written: u64,
}

impl PngSequenceSurface {
    /// Surface writing into `dir` (created on acquire).
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            size: None,
            written: 0,
        }
    }

    /// Frames written so far.
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl OutputSurface for PngSequenceSurface {
    fn acquire(&mut self, width: u32, height: u32) -> KeyResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            KeyError::surface(format!("create output dir '{}': {e}", self.dir.display()))
        })?;
        self.size = Some((width, height));
        Ok(())
    }

    fn publish(&mut self, frame: &FrameRGBA) -> KeyResult<()> {
        if self.size.is_none() {
            return Err(KeyError::surface("png surface published before acquire"));
        }
        frame
            .check_layout()
            .map_err(|e| KeyError::surface(format!("publish rejected: {e}")))?;
        let path = self
            .dir
            .join(format!("{}{:05}.png", self.prefix, self.written));
        image::save_buffer_with_format(
            &path,
            &frame.data,
            frame.width,
            frame.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .map_err(|e| KeyError::surface(format!("write png '{}': {e}", path.display())))?;
        self.written += 1;
        Ok(())
    }

    fn release(&mut self) {
        self.size = None;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/surface.rs"]
mod tests;
