use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use crate::keying::store::SettingsStore;
use crate::render::renderer::{CompositeRenderer, TickOutcome};

/// Shared handle to a [`CompositeRenderer`] for hosts whose display callback may fire while the
/// previous tick is still running on another thread.
///
/// [`on_display_frame`](Self::on_display_frame) never waits: if a tick is in flight the new one
/// is dropped and reported as [`TickOutcome::Busy`], so ticks never overlap or reorder.
#[derive(Clone, Debug)]
pub struct RendererHandle {
    inner: Arc<Mutex<CompositeRenderer>>,
    busy: Arc<AtomicU64>,
}

impl RendererHandle {
    /// Wrap a renderer.
    pub fn new(renderer: CompositeRenderer) -> Self {
        Self {
            inner: Arc::new(Mutex::new(renderer)),
            busy: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Per-display-frame entry point.
    pub fn on_display_frame(&self, store: &SettingsStore) -> TickOutcome {
        match self.inner.try_lock() {
            Ok(mut renderer) => renderer.tick(store),
            Err(TryLockError::WouldBlock) => {
                self.busy.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("tick skipped; previous tick still running");
                TickOutcome::Busy
            }
            Err(TryLockError::Poisoned(poisoned)) => {
                tracing::warn!("renderer lock poisoned; stopping renderer");
                let mut renderer = poisoned.into_inner();
                renderer.stop();
                TickOutcome::Stopped
            }
        }
    }

    /// Run `f` with exclusive access (blocking), for lifecycle calls like play/pause/stop.
    pub fn with<R>(&self, f: impl FnOnce(&mut CompositeRenderer) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    /// Ticks dropped because a previous tick was still running.
    pub fn skipped_busy(&self) -> u64 {
        self.busy.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, CompositeRenderer> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
