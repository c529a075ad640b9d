use crate::foundation::core::FrameRGBA;
use crate::foundation::error::{KeyError, KeyResult};
use crate::keying::processor::{PixelProcessor, ProcessorOpts};
use crate::keying::settings::KeySettings;
use crate::keying::store::{SettingsStore, SourceId};
use crate::render::source::{FrameSource, SourceFrame};
use crate::render::surface::OutputSurface;

/// Renderer lifecycle.
///
/// `Idle -> Loading -> Ready -> Processing <-> Paused`, `Error` from `Loading`/`Processing`, and
/// `Stopped` from anywhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RendererState {
    /// No frame source attached.
    Idle,
    /// Waiting for the first frame.
    Loading,
    /// First frame shown; playback not running.
    Ready,
    /// Keying a new frame every tick.
    Processing,
    /// Playback paused; the last output is re-displayed.
    Paused,
    /// Torn down. A new source may be attached.
    Stopped,
    /// The source or surface failed. See [`CompositeRenderer::error`].
    Error,
}

/// What a single [`CompositeRenderer::tick`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to do in the current state.
    Inactive,
    /// The source had no frame ready yet.
    NotReady,
    /// First frame keyed and published; now `Ready`.
    Loaded,
    /// A frame was keyed and published.
    Processed,
    /// Keying failed; the unprocessed frame was published instead. Also returned for the first
    /// frame, in which case the renderer is now `Ready`.
    Passthrough,
    /// Same frame and settings as last time; nothing republished.
    SkippedUnchanged,
    /// Paused or ready; the previous output stays on the surface.
    Retained,
    /// The previous tick was still running (see [`crate::RendererHandle`]).
    Busy,
    /// Settings were removed or disabled; the renderer tore itself down.
    Stopped,
    /// The renderer entered `Error` during this tick.
    Failed,
}

/// Renderer configuration.
#[derive(Clone, Debug)]
pub struct RendererOpts {
    /// Pixel pass threading.
    pub processor: ProcessorOpts,
    /// Skip ticks whose frame sequence number and settings match the last processed ones.
    pub skip_unchanged: bool,
}

impl Default for RendererOpts {
    fn default() -> Self {
        Self {
            processor: ProcessorOpts::default(),
            skip_unchanged: true,
        }
    }
}

/// Per-renderer counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Ticks received.
    pub ticks: u64,
    /// Frames keyed and published.
    pub processed: u64,
    /// Frames published unkeyed after a keying failure.
    pub passthrough: u64,
    /// Ticks skipped because nothing changed.
    pub skipped_unchanged: u64,
    /// Ticks that re-displayed the retained output.
    pub retained: u64,
    /// Ticks where the source had nothing ready.
    pub not_ready: u64,
}

/// Per-source keying compositor driven by the host's per-frame callback.
///
/// Each [`tick`](Self::tick) reads a settings snapshot from the store, pulls the current frame,
/// keys it and publishes it to the output surface. Processing is synchronous within a tick, so a
/// settings change made between ticks applies from the next tick on.
pub struct CompositeRenderer {
    source_id: SourceId,
    opts: RendererOpts,
    processor: PixelProcessor,
    surface: Box<dyn OutputSurface>,
    source: Option<Box<dyn FrameSource>>,
    state: RendererState,
    surface_size: Option<(u32, u32)>,
    last_input: Option<SourceFrame>,
    last_settings: Option<KeySettings>,
    output: Option<FrameRGBA>,
    tick_requested: bool,
    error: Option<KeyError>,
    stats: RenderStats,
}

impl std::fmt::Debug for CompositeRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeRenderer")
            .field("source_id", &self.source_id)
            .field("state", &self.state)
            .field("surface_size", &self.surface_size)
            .field("tick_requested", &self.tick_requested)
            .field("error", &self.error)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl CompositeRenderer {
    /// Renderer for `source_id` publishing into `surface`. Starts `Idle`.
    pub fn new(
        source_id: impl Into<SourceId>,
        surface: Box<dyn OutputSurface>,
        opts: RendererOpts,
    ) -> KeyResult<Self> {
        let processor = PixelProcessor::new(opts.processor.clone())?;
        Ok(Self {
            source_id: source_id.into(),
            opts,
            processor,
            surface,
            source: None,
            state: RendererState::Idle,
            surface_size: None,
            last_input: None,
            last_settings: None,
            output: None,
            tick_requested: false,
            error: None,
            stats: RenderStats::default(),
        })
    }

    /// Source item this renderer keys.
    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RendererState {
        self.state
    }

    /// Error that moved the renderer into `Error`, if any.
    pub fn error(&self) -> Option<&KeyError> {
        self.error.as_ref()
    }

    /// Last published frame.
    pub fn output(&self) -> Option<&FrameRGBA> {
        self.output.as_ref()
    }

    /// Counters since construction.
    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Whether the renderer asked for another tick.
    pub fn wants_tick(&self) -> bool {
        self.tick_requested
    }

    /// Ask for a tick, e.g. after a settings edit while paused.
    pub fn request_tick(&mut self) {
        if !matches!(
            self.state,
            RendererState::Idle | RendererState::Stopped | RendererState::Error
        ) {
            self.tick_requested = true;
        }
    }

    /// Whether the attached source has run out of new frames.
    pub fn source_finished(&self) -> bool {
        self.source.as_ref().is_none_or(|s| s.is_finished())
    }

    /// Attach a frame source: `Idle | Stopped -> Loading`.
    pub fn attach(&mut self, source: Box<dyn FrameSource>) -> KeyResult<()> {
        if !matches!(self.state, RendererState::Idle | RendererState::Stopped) {
            return Err(KeyError::validation(format!(
                "cannot attach a source while {:?}",
                self.state
            )));
        }
        self.source = Some(source);
        self.error = None;
        self.set_state(RendererState::Loading);
        self.tick_requested = true;
        Ok(())
    }

    /// Start or resume playback: `Ready | Paused -> Processing`.
    pub fn play(&mut self) -> KeyResult<()> {
        match self.state {
            RendererState::Processing => Ok(()),
            RendererState::Ready | RendererState::Paused => {
                self.set_state(RendererState::Processing);
                self.tick_requested = true;
                Ok(())
            }
            other => Err(KeyError::validation(format!("cannot play while {other:?}"))),
        }
    }

    /// Pause playback: `Processing -> Paused`. The last output stays on the surface.
    pub fn pause(&mut self) -> KeyResult<()> {
        match self.state {
            RendererState::Paused => Ok(()),
            RendererState::Processing => {
                self.set_state(RendererState::Paused);
                self.tick_requested = false;
                Ok(())
            }
            other => Err(KeyError::validation(format!("cannot pause while {other:?}"))),
        }
    }

    /// Leave `Error` and reload from the same source. Fatal errors cannot be retried.
    pub fn retry(&mut self) -> KeyResult<()> {
        if self.state != RendererState::Error {
            return Err(KeyError::validation(format!(
                "cannot retry while {:?}",
                self.state
            )));
        }
        if self.error.as_ref().is_some_and(KeyError::is_fatal) || self.source.is_none() {
            return Err(KeyError::validation("renderer failed fatally; rebuild it"));
        }
        self.error = None;
        self.set_state(RendererState::Loading);
        self.tick_requested = true;
        Ok(())
    }

    /// Tear down: cancel pending ticks, drop the source, release the surface and retained
    /// buffers.
    pub fn stop(&mut self) {
        self.tick_requested = false;
        self.source = None;
        self.release_buffers();
        if self.state != RendererState::Stopped {
            self.set_state(RendererState::Stopped);
        }
    }

    /// One scheduling tick. Call from the host's per-display-frame callback.
    #[tracing::instrument(level = "trace", skip_all, fields(source = %self.source_id, state = ?self.state))]
    pub fn tick(&mut self, store: &SettingsStore) -> TickOutcome {
        self.stats.ticks += 1;
        self.tick_requested = false;
        if matches!(
            self.state,
            RendererState::Idle | RendererState::Stopped | RendererState::Error
        ) {
            return TickOutcome::Inactive;
        }

        let settings = match store.get(&self.source_id) {
            Some(s) if s.enabled() => s.clone(),
            Some(_) => {
                tracing::debug!(source = %self.source_id, "keying disabled; stopping renderer");
                self.stop();
                return TickOutcome::Stopped;
            }
            None => {
                tracing::debug!(source = %self.source_id, "key settings removed; stopping renderer");
                self.stop();
                return TickOutcome::Stopped;
            }
        };

        match self.state {
            RendererState::Loading => self.tick_loading(&settings),
            RendererState::Processing => self.tick_processing(&settings),
            RendererState::Ready | RendererState::Paused => self.tick_static(&settings),
            RendererState::Idle | RendererState::Stopped | RendererState::Error => {
                TickOutcome::Inactive
            }
        }
    }

    fn tick_loading(&mut self, settings: &KeySettings) -> TickOutcome {
        let Some(input) = self.poll_source() else {
            return self.poll_failed_or_not_ready();
        };
        let outcome = self.render(input, settings);
        if outcome == TickOutcome::Failed {
            return outcome;
        }
        self.set_state(RendererState::Ready);
        if outcome == TickOutcome::Passthrough {
            return outcome;
        }
        TickOutcome::Loaded
    }

    fn tick_processing(&mut self, settings: &KeySettings) -> TickOutcome {
        let Some(input) = self.poll_source() else {
            return self.poll_failed_or_not_ready();
        };

        let unchanged = self.opts.skip_unchanged
            && self.last_input.as_ref().is_some_and(|l| l.seq == input.seq)
            && self.last_settings.as_ref() == Some(settings);
        let outcome = if unchanged {
            self.stats.skipped_unchanged += 1;
            TickOutcome::SkippedUnchanged
        } else {
            self.render(input, settings)
        };
        if self.state == RendererState::Processing {
            self.tick_requested = true;
        }
        outcome
    }

    fn tick_static(&mut self, settings: &KeySettings) -> TickOutcome {
        if self.last_settings.as_ref() != Some(settings)
            && let Some(input) = self.last_input.clone()
        {
            return self.render(input, settings);
        }
        self.stats.retained += 1;
        TickOutcome::Retained
    }

    /// `None` means either not ready or failed; the two are told apart by `self.state`.
    fn poll_source(&mut self) -> Option<SourceFrame> {
        let source = self.source.as_mut()?;
        match source.poll_frame() {
            Ok(frame) => frame,
            Err(e) => {
                self.fail(e);
                None
            }
        }
    }

    fn poll_failed_or_not_ready(&mut self) -> TickOutcome {
        if self.state == RendererState::Error {
            return TickOutcome::Failed;
        }
        self.stats.not_ready += 1;
        self.tick_requested = true;
        TickOutcome::NotReady
    }

    fn render(&mut self, input: SourceFrame, settings: &KeySettings) -> TickOutcome {
        // A frame whose buffer disagrees with its size cannot be shown even unkeyed.
        if let Err(e) = input.frame.check_layout() {
            self.fail(KeyError::frame_decode(format!("malformed frame {}: {e}", input.seq)));
            return TickOutcome::Failed;
        }

        let size = (input.frame.width, input.frame.height);
        if self.surface_size != Some(size) {
            if let Err(e) = self.surface.acquire(size.0, size.1) {
                self.fail(e);
                return TickOutcome::Failed;
            }
            tracing::debug!(source = %self.source_id, w = size.0, h = size.1, "surface acquired");
            self.surface_size = Some(size);
        }

        let mut out = match self.output.take() {
            Some(mut buf) => {
                buf.clone_from(&input.frame);
                buf
            }
            None => (*input.frame).clone(),
        };

        let outcome = match self.processor.process_in_place(&mut out, settings) {
            Ok(()) => {
                self.stats.processed += 1;
                TickOutcome::Processed
            }
            Err(e) => {
                tracing::warn!(
                    source = %self.source_id,
                    error = %e,
                    "keying failed; publishing unprocessed frame"
                );
                out.clone_from(&input.frame);
                self.stats.passthrough += 1;
                TickOutcome::Passthrough
            }
        };

        let published = self.surface.publish(&out);
        self.output = Some(out);
        self.last_input = Some(input);
        self.last_settings = Some(settings.clone());
        if let Err(e) = published {
            self.fail(e);
            return TickOutcome::Failed;
        }
        outcome
    }

    fn fail(&mut self, e: KeyError) {
        tracing::warn!(source = %self.source_id, error = %e, "renderer error");
        self.tick_requested = false;
        if e.is_fatal() {
            self.release_buffers();
        }
        self.error = Some(e);
        self.set_state(RendererState::Error);
    }

    fn release_buffers(&mut self) {
        if self.surface_size.take().is_some() {
            self.surface.release();
        }
        self.output = None;
        self.last_input = None;
        self.last_settings = None;
    }

    fn set_state(&mut self, next: RendererState) {
        tracing::debug!(source = %self.source_id, from = ?self.state, to = ?next, "renderer state");
        self.state = next;
    }
}

impl Drop for CompositeRenderer {
    fn drop(&mut self) {
        if self.surface_size.take().is_some() {
            self.surface.release();
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/renderer.rs"]
mod tests;
