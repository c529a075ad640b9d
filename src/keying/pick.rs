use std::time::{Duration, Instant};

use crate::foundation::core::{FrameRGBA, Rgb8};
use crate::foundation::error::{KeyError, KeyResult};
use crate::keying::sampler::{DisplayMapping, pick};

/// How long pick mode waits for a qualifying input before giving up.
pub const DEFAULT_PICK_TIMEOUT: Duration = Duration::from_secs(10);

/// Interactive color-pick options.
#[derive(Clone, Debug)]
pub struct PickOpts {
    /// Window after [`PickSession::enter`] during which a pick is accepted.
    pub timeout: Duration,
}

impl Default for PickOpts {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_PICK_TIMEOUT,
        }
    }
}

/// Pick-mode state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PickState {
    /// Not picking.
    Idle,
    /// Waiting for a qualifying input.
    Picking,
    /// A color was picked and reported.
    Picked(Rgb8),
    /// The window elapsed without a pick. Not an error.
    TimedOut,
    /// The owner cancelled pick mode.
    Cancelled,
}

type OnColor = Box<dyn FnOnce(Rgb8) + Send>;

/// Short-lived color-pick state machine owned by whoever requested the pick.
///
/// `Idle -> Picking -> {Picked | TimedOut | Cancelled}`. The callback fires at most once, and is
/// dropped on every exit path. Time is passed in explicitly so hosts drive it from their own
/// clock.
pub struct PickSession {
    opts: PickOpts,
    state: PickState,
    deadline: Option<Instant>,
    on_color: Option<OnColor>,
}

impl std::fmt::Debug for PickSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PickSession")
            .field("opts", &self.opts)
            .field("state", &self.state)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl Default for PickSession {
    fn default() -> Self {
        Self::new(PickOpts::default())
    }
}

impl PickSession {
    /// New idle session.
    pub fn new(opts: PickOpts) -> Self {
        Self {
            opts,
            state: PickState::Idle,
            deadline: None,
            on_color: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> PickState {
        self.state
    }

    /// Whether a pick is currently pending.
    pub fn is_picking(&self) -> bool {
        self.state == PickState::Picking
    }

    /// Enter pick mode. `on_color` runs once with the picked color.
    ///
    /// Re-entering from any finished state starts a fresh window. Entering while already
    /// picking is rejected so the pending callback is not silently lost.
    pub fn enter(
        &mut self,
        now: Instant,
        on_color: impl FnOnce(Rgb8) + Send + 'static,
    ) -> KeyResult<()> {
        if self.is_picking() {
            return Err(KeyError::validation("pick mode is already active"));
        }
        self.state = PickState::Picking;
        self.deadline = Some(now + self.opts.timeout);
        self.on_color = Some(Box::new(on_color));
        tracing::debug!(timeout_ms = self.opts.timeout.as_millis() as u64, "pick mode entered");
        Ok(())
    }

    /// Expire the session if its window has elapsed. Returns `true` on the transition.
    pub fn poll_timeout(&mut self, now: Instant) -> bool {
        if !self.is_picking() {
            return false;
        }
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.finish(PickState::TimedOut);
                tracing::debug!("pick mode timed out");
                true
            }
            _ => false,
        }
    }

    /// Leave pick mode without reporting a color.
    pub fn cancel(&mut self) {
        if self.is_picking() {
            self.finish(PickState::Cancelled);
        }
    }

    /// Offer a frame-space coordinate as the pick.
    ///
    /// Returns the picked color, or `None` when not picking or the window already elapsed.
    pub fn submit(
        &mut self,
        frame: &FrameRGBA,
        x: u32,
        y: u32,
        now: Instant,
    ) -> KeyResult<Option<Rgb8>> {
        if self.poll_timeout(now) || !self.is_picking() {
            return Ok(None);
        }
        let color = pick(frame, x, y)?;
        let on_color = self.on_color.take();
        self.finish(PickState::Picked(color));
        if let Some(cb) = on_color {
            cb(color);
        }
        tracing::debug!(%color, x, y, "color picked");
        Ok(Some(color))
    }

    /// Offer a display-space point. Points that miss the displayed frame do not qualify and
    /// leave the session picking.
    pub fn submit_display(
        &mut self,
        frame: &FrameRGBA,
        mapping: &DisplayMapping,
        display_x: f64,
        display_y: f64,
        now: Instant,
    ) -> KeyResult<Option<Rgb8>> {
        if self.poll_timeout(now) || !self.is_picking() {
            return Ok(None);
        }
        match mapping.to_frame(display_x, display_y) {
            Some((x, y)) => self.submit(frame, x, y, now),
            None => Ok(None),
        }
    }

    fn finish(&mut self, state: PickState) {
        self.state = state;
        self.deadline = None;
        self.on_color = None;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/keying/pick.rs"]
mod tests;
