use super::*;
use crate::foundation::core::Rgb8;
use crate::render::source::VecFrameSource;
use crate::render::surface::InMemorySurface;

const SRC: &str = "clip-1";

fn key_frame(v: u8) -> FrameRGBA {
    // Left column is key green, right column a gray level `v`.
    let g = Rgb8::GREEN;
    let c = Rgb8::new(v, v, v);
    FrameRGBA::from_rows(&[&[g, c], &[g, c]]).unwrap()
}

fn store() -> SettingsStore {
    let mut store = SettingsStore::new();
    store.set(
        SRC,
        KeySettings::enabled_default()
            .with_similarity(1.0)
            .with_smoothness(0.0)
            .with_spill(0.0),
    );
    store
}

fn renderer(surface: &InMemorySurface) -> CompositeRenderer {
    let opts = RendererOpts {
        processor: ProcessorOpts::serial(),
        skip_unchanged: true,
    };
    CompositeRenderer::new(SRC, Box::new(surface.clone()), opts).unwrap()
}

fn loaded(frames: Vec<FrameRGBA>, surface: &InMemorySurface, store: &SettingsStore) -> CompositeRenderer {
    let mut r = renderer(surface);
    r.attach(Box::new(VecFrameSource::new(frames))).unwrap();
    assert_eq!(r.tick(store), TickOutcome::Loaded);
    r
}

#[test]
fn starts_idle_and_ignores_ticks() {
    let surface = InMemorySurface::new();
    let mut r = renderer(&surface);
    assert_eq!(r.state(), RendererState::Idle);
    assert!(!r.wants_tick());
    assert_eq!(r.tick(&store()), TickOutcome::Inactive);
    assert_eq!(surface.published(), 0);
}

#[test]
fn loading_waits_for_first_frame_then_ready() {
    let store = store();
    let surface = InMemorySurface::new();
    let mut r = renderer(&surface);
    r.attach(Box::new(
        VecFrameSource::new(vec![key_frame(9)]).with_not_ready_polls(2),
    ))
    .unwrap();
    assert_eq!(r.state(), RendererState::Loading);
    assert!(r.wants_tick());

    assert_eq!(r.tick(&store), TickOutcome::NotReady);
    assert_eq!(r.tick(&store), TickOutcome::NotReady);
    assert!(r.wants_tick());
    assert_eq!(r.tick(&store), TickOutcome::Loaded);
    assert_eq!(r.state(), RendererState::Ready);
    assert!(!r.wants_tick());

    assert_eq!(surface.size(), Some((2, 2)));
    let out = surface.frame().unwrap();
    assert_eq!(out.alpha_plane(), vec![0, 255, 0, 255]);
    assert_eq!(r.stats().not_ready, 2);
}

#[test]
fn processing_publishes_frames_in_order() {
    let store = store();
    let surface = InMemorySurface::new();
    let mut r = loaded(vec![key_frame(1), key_frame(2), key_frame(3)], &surface, &store);

    r.play().unwrap();
    assert_eq!(r.state(), RendererState::Processing);

    let mut seen = Vec::new();
    for _ in 0..2 {
        assert_eq!(r.tick(&store), TickOutcome::Processed);
        assert!(r.wants_tick());
        seen.push(surface.frame().unwrap().data[4]);
    }
    assert_eq!(seen, vec![2, 3]);
    assert_eq!(surface.published(), 3);
}

#[test]
fn unchanged_frame_and_settings_are_skipped() {
    let store = store();
    let surface = InMemorySurface::new();
    let mut r = loaded(vec![key_frame(1)], &surface, &store);
    r.play().unwrap();

    assert_eq!(r.tick(&store), TickOutcome::SkippedUnchanged);
    assert_eq!(r.tick(&store), TickOutcome::SkippedUnchanged);
    assert_eq!(surface.published(), 1);
    assert_eq!(r.stats().skipped_unchanged, 2);
    assert!(r.source_finished());
}

#[test]
fn settings_change_applies_on_next_tick() {
    let mut store = store();
    let surface = InMemorySurface::new();
    let mut r = loaded(vec![key_frame(1)], &surface, &store);
    r.play().unwrap();
    assert_eq!(r.tick(&store), TickOutcome::SkippedUnchanged);

    store.update(SRC, |s| s.set_key_color(Rgb8::new(1, 1, 1)));
    assert_eq!(r.tick(&store), TickOutcome::Processed);
    assert_eq!(surface.frame().unwrap().alpha_plane(), vec![255, 0, 255, 0]);
}

#[test]
fn pause_retains_output_and_resume_continues() {
    let mut store = store();
    let surface = InMemorySurface::new();
    let mut r = loaded(vec![key_frame(1), key_frame(2)], &surface, &store);
    r.play().unwrap();
    assert_eq!(r.tick(&store), TickOutcome::Processed);

    r.pause().unwrap();
    assert_eq!(r.state(), RendererState::Paused);
    assert!(!r.wants_tick());
    let before = surface.published();
    assert_eq!(r.tick(&store), TickOutcome::Retained);
    assert_eq!(r.tick(&store), TickOutcome::Retained);
    assert_eq!(surface.published(), before);
    assert_eq!(r.output().unwrap().data[4], 2);

    // An edit while paused re-keys the retained frame once.
    store.update(SRC, |s| s.set_brightness(0.5));
    r.request_tick();
    assert!(r.wants_tick());
    assert_eq!(r.tick(&store), TickOutcome::Processed);
    assert_eq!(r.tick(&store), TickOutcome::Retained);

    r.play().unwrap();
    assert_eq!(r.state(), RendererState::Processing);
}

#[test]
fn invalid_transitions_are_rejected() {
    let surface = InMemorySurface::new();
    let mut r = renderer(&surface);
    assert!(r.play().is_err());
    assert!(r.pause().is_err());
    assert!(r.retry().is_err());

    r.attach(Box::new(VecFrameSource::new(vec![key_frame(1)])))
        .unwrap();
    assert!(
        r.attach(Box::new(VecFrameSource::new(vec![key_frame(1)])))
            .is_err()
    );
    assert!(r.pause().is_err());
}

#[test]
fn decode_failure_enters_error_without_retry_loop() {
    let store = store();
    let surface = InMemorySurface::new();
    let source = VecFrameSource::new(vec![key_frame(1), key_frame(2)]).with_failure_at(1, "bad");
    let mut r = renderer(&surface);
    r.attach(Box::new(source)).unwrap();
    assert_eq!(r.tick(&store), TickOutcome::Loaded);
    r.play().unwrap();

    assert_eq!(r.tick(&store), TickOutcome::Failed);
    assert_eq!(r.state(), RendererState::Error);
    assert!(matches!(r.error(), Some(KeyError::FrameDecode(_))));
    assert!(!r.wants_tick());

    // No automatic retry: further ticks do nothing.
    assert_eq!(r.tick(&store), TickOutcome::Inactive);
    // Last good output stays visible.
    assert_eq!(surface.frame().unwrap().data[4], 1);

    r.retry().unwrap();
    assert_eq!(r.state(), RendererState::Loading);
    assert!(r.error().is_none());
}

#[test]
fn decode_failure_while_loading_enters_error() {
    let store = store();
    let surface = InMemorySurface::new();
    let mut r = renderer(&surface);
    r.attach(Box::new(
        VecFrameSource::new(vec![key_frame(1)]).with_failure_at(0, "eof"),
    ))
    .unwrap();
    assert_eq!(r.tick(&store), TickOutcome::Failed);
    assert_eq!(r.state(), RendererState::Error);
}

fn short_frame() -> FrameRGBA {
    FrameRGBA {
        width: 2,
        height: 2,
        data: vec![0; 8],
    }
}

#[test]
fn malformed_frame_while_processing_enters_error() {
    let store = store();
    let surface = InMemorySurface::new();
    let mut r = loaded(vec![key_frame(1), short_frame()], &surface, &store);
    r.play().unwrap();

    assert_eq!(r.tick(&store), TickOutcome::Failed);
    assert_eq!(r.state(), RendererState::Error);
    assert!(matches!(r.error(), Some(KeyError::FrameDecode(_))));
    assert_eq!(r.stats().passthrough, 0);
    assert_eq!(surface.published(), 1);
    // The last good frame stays on the surface, intact.
    let shown = surface.frame().unwrap();
    assert_eq!(shown.data.len(), 16);
    assert_eq!(shown.data[4], 1);
    assert!(r.retry().is_ok());
}

#[test]
fn malformed_first_frame_never_reaches_png_surface() {
    let store = store();
    let dir = std::path::PathBuf::from("target").join("unit_renderer_short_frame");
    let _ = std::fs::remove_dir_all(&dir);
    let surface = crate::render::surface::PngSequenceSurface::new(&dir, "f_");
    let mut r = CompositeRenderer::new(SRC, Box::new(surface), RendererOpts::default()).unwrap();
    r.attach(Box::new(VecFrameSource::new(vec![short_frame()])))
        .unwrap();

    assert_eq!(r.tick(&store), TickOutcome::Failed);
    assert_eq!(r.state(), RendererState::Error);
    assert!(r.output().is_none());
    assert!(!dir.join("f_00000.png").exists());
}

#[test]
fn surface_failure_is_fatal_for_instance() {
    let store = store();
    let surface = InMemorySurface::unavailable();
    let mut r = renderer(&surface);
    r.attach(Box::new(VecFrameSource::new(vec![key_frame(1)])))
        .unwrap();
    assert_eq!(r.tick(&store), TickOutcome::Failed);
    assert!(matches!(r.error(), Some(KeyError::SurfaceAcquisition(_))));
    assert!(r.retry().is_err());
}

#[test]
fn disabling_or_removing_settings_stops() {
    let mut store = store();
    let surface = InMemorySurface::new();
    let mut r = loaded(vec![key_frame(1), key_frame(2)], &surface, &store);
    r.play().unwrap();

    store.disable(&SourceId::from(SRC));
    assert_eq!(r.tick(&store), TickOutcome::Stopped);
    assert_eq!(r.state(), RendererState::Stopped);
    assert!(r.output().is_none());
    assert_eq!(surface.size(), None);

    // Re-attach after stop, then remove the settings entirely.
    store.enable(SRC);
    r.attach(Box::new(VecFrameSource::new(vec![key_frame(3)])))
        .unwrap();
    assert_eq!(r.tick(&store), TickOutcome::Loaded);
    store.remove(&SourceId::from(SRC));
    assert_eq!(r.tick(&store), TickOutcome::Stopped);
}

#[test]
fn stop_cancels_pending_tick_and_releases_surface() {
    let store = store();
    let surface = InMemorySurface::new();
    let mut r = loaded(vec![key_frame(1), key_frame(2)], &surface, &store);
    r.play().unwrap();
    assert!(r.wants_tick());

    r.stop();
    assert_eq!(r.state(), RendererState::Stopped);
    assert!(!r.wants_tick());
    assert!(surface.frame().is_none());
    assert!(r.source_finished());
    assert_eq!(r.tick(&store), TickOutcome::Inactive);
}

#[test]
fn frame_size_change_reacquires_surface() {
    let store = store();
    let surface = InMemorySurface::new();
    let big = FrameRGBA::filled(4, 3, [0, 255, 0, 255]).unwrap();
    let mut r = loaded(vec![key_frame(1), big], &surface, &store);
    r.play().unwrap();
    assert_eq!(r.tick(&store), TickOutcome::Processed);
    assert_eq!(surface.size(), Some((4, 3)));
    assert_eq!(surface.acquired(), 2);
    assert!(surface.frame().unwrap().alpha_plane().iter().all(|&a| a == 0));
}

#[test]
fn dropping_renderer_releases_surface() {
    let store = store();
    let surface = InMemorySurface::new();
    let r = loaded(vec![key_frame(1)], &surface, &store);
    assert!(surface.size().is_some());
    drop(r);
    assert!(surface.size().is_none());
}
