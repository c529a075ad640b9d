use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::foundation::core::FrameRGBA;
use crate::foundation::error::{KeyError, KeyResult};

/// A decoded frame handed out by a [`FrameSource`].
#[derive(Clone, Debug)]
pub struct SourceFrame {
    /// Increases whenever the source produces a different frame. Equal sequence numbers mean
    /// the pixels are unchanged.
    pub seq: u64,
    /// The decoded pixels.
    pub frame: Arc<FrameRGBA>,
}

/// Supplier of decoded frames (the editor's media layer).
///
/// Polled once per scheduling tick. Must not block: return `Ok(None)` while the frame for the
/// current instant is not decoded yet and `Err(KeyError::FrameDecode)` when decoding failed.
pub trait FrameSource: Send {
    /// Current frame, `None` if not ready yet.
    fn poll_frame(&mut self) -> KeyResult<Option<SourceFrame>>;

    /// Whether the source has no further frames to offer.
    fn is_finished(&self) -> bool {
        false
    }
}

/// In-memory playlist, mostly for tests and demos.
///
/// Each poll advances to the next frame; after the last one the source keeps returning it with
/// the same sequence number.
#[derive(Debug, Default)]
pub struct VecFrameSource {
    frames: Vec<Arc<FrameRGBA>>,
    cursor: usize,
    not_ready_polls: usize,
    fail_at: Option<(usize, String)>,
}

impl VecFrameSource {
    /// Source over `frames`.
    pub fn new(frames: Vec<FrameRGBA>) -> Self {
        Self {
            frames: frames.into_iter().map(Arc::new).collect(),
            ..Self::default()
        }
    }

    /// Report "not ready" for the first `polls` polls.
    pub fn with_not_ready_polls(mut self, polls: usize) -> Self {
        self.not_ready_polls = polls;
        self
    }

    /// Fail with a decode error when frame `index` would be produced.
    pub fn with_failure_at(mut self, index: usize, msg: impl Into<String>) -> Self {
        self.fail_at = Some((index, msg.into()));
        self
    }
}

impl FrameSource for VecFrameSource {
    fn poll_frame(&mut self) -> KeyResult<Option<SourceFrame>> {
        if self.not_ready_polls > 0 {
            self.not_ready_polls -= 1;
            return Ok(None);
        }
        if self.frames.is_empty() {
            return Ok(None);
        }
        let idx = self.cursor.min(self.frames.len() - 1);
        if let Some((at, msg)) = &self.fail_at
            && *at == idx
        {
            return Err(KeyError::frame_decode(format!("frame {idx}: {msg}")));
        }
        if self.cursor < self.frames.len() {
            self.cursor += 1;
        }
        Ok(Some(SourceFrame {
            seq: idx as u64,
            frame: Arc::clone(&self.frames[idx]),
        }))
    }

    fn is_finished(&self) -> bool {
        self.cursor >= self.frames.len()
    }
}

/// Reads a directory of image files (sorted by file name) as a frame sequence.
#[derive(Debug)]
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    next: usize,
    last: Option<SourceFrame>,
}

impl ImageSequenceSource {
    /// Collect `*.png` files in `dir`.
    pub fn open(dir: &Path) -> KeyResult<Self> {
        let rd = std::fs::read_dir(dir).map_err(|e| {
            KeyError::frame_decode(format!("read frame dir '{}': {e}", dir.display()))
        })?;
        let mut paths = Vec::new();
        for entry in rd {
            let path = entry
                .map_err(|e| KeyError::frame_decode(format!("read frame dir entry: {e}")))?
                .path();
            let is_png = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("png"));
            if is_png {
                paths.push(path);
            }
        }
        paths.sort();
        if paths.is_empty() {
            return Err(KeyError::frame_decode(format!(
                "no png frames in '{}'",
                dir.display()
            )));
        }
        Ok(Self::from_paths(paths))
    }

    /// Sequence over explicit paths, in order.
    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            next: 0,
            last: None,
        }
    }

    /// Number of frames in the sequence.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Path of frame `index`.
    pub fn path(&self, index: usize) -> Option<&Path> {
        self.paths.get(index).map(PathBuf::as_path)
    }
}

/// Decode one image file into a frame.
pub fn load_frame(path: &Path) -> KeyResult<FrameRGBA> {
    let img = image::open(path)
        .map_err(|e| KeyError::frame_decode(format!("decode '{}': {e}", path.display())))?;
    FrameRGBA::from_image(img.to_rgba8())
}

impl FrameSource for ImageSequenceSource {
    fn poll_frame(&mut self) -> KeyResult<Option<SourceFrame>> {
        let Some(path) = self.paths.get(self.next) else {
            return Ok(self.last.clone());
        };
        let frame = load_frame(path)?;
        let sf = SourceFrame {
            seq: self.next as u64,
            frame: Arc::new(frame),
        };
        self.next += 1;
        self.last = Some(sf.clone());
        Ok(Some(sf))
    }

    fn is_finished(&self) -> bool {
        self.next >= self.paths.len()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/source.rs"]
mod tests;
