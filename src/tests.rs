use crate::bounds::{compute_overflow, zoom_rect};
use crate::errors::ViewerError;
use crate::gesture::{
    GesturePhase, PanDirection, PanEvent, PanningDelegate, PinchEvent, TapEvent, TransformCommand,
};
use crate::gpu::headless::RecordingBackend;
use crate::math::{Point, Size, Transform};
use crate::settings::Settings;
use crate::surface::SurfaceHost;
use crate::view::{FrameOutcome, ImageView};
use image::{Rgba, RgbaImage};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

const FRAME: Duration = Duration::from_millis(16);
const WAIT: Duration = Duration::from_secs(5);

fn square_image(side: u32) -> Arc<RgbaImage> {
    Arc::new(RgbaImage::from_pixel(side, side, Rgba([90, 120, 200, 255])))
}

fn settings() -> Settings {
    Settings {
        render_workers: 2,
        ..Settings::default()
    }
}

/// A 500px square image in a 100pt square view, laid out and drawn once.
fn laid_out_view(backend: RecordingBackend, settings: Settings) -> ImageView<RecordingBackend> {
    let mut view = ImageView::new(backend, settings).unwrap();
    view.set_image(square_image(500));
    view.layout(Size::new(100.0, 100.0)).unwrap();
    view
}

fn run_animation(view: &mut ImageView<RecordingBackend>, mut now: Instant) -> Instant {
    for _ in 0..200 {
        now += FRAME;
        view.frame(now);
        if !view.is_animating() {
            break;
        }
    }
    now
}

fn pinch(phase: GesturePhase, scale: f32) -> PinchEvent {
    PinchEvent {
        phase,
        location: Point::new(50.0, 50.0),
        scale,
    }
}

fn pan(phase: GesturePhase, dx: f32, velocity_x: f32) -> PanEvent {
    PanEvent {
        phase,
        translation: Point::new(dx, 0.0),
        velocity: Point::new(velocity_x, 0.0),
    }
}

fn double_tap_center() -> TapEvent {
    TapEvent {
        location: Point::new(50.0, 50.0),
    }
}

#[test]
fn test_first_frame_draws_immediate_render() {
    let mut view = laid_out_view(RecordingBackend::new(), settings());
    let now = Instant::now();

    let bitmap = view.displayed_bitmap().unwrap();
    assert_eq!(bitmap.dimensions(), (200, 200));
    assert_eq!(view.render_level(), Some(1.0));

    assert_eq!(view.frame(now), FrameOutcome::Drawn);
    assert_eq!(view.frame(now + FRAME), FrameOutcome::Unchanged);
    assert_eq!(view.backend().draw_count(), 1);
    assert_eq!(view.backend().live_textures(), 1);
}

#[test]
fn test_pinch_past_max_settles_exactly_at_max() {
    let mut view = laid_out_view(
        RecordingBackend::new(),
        Settings {
            max_scale: 2.0,
            ..settings()
        },
    );
    let now = Instant::now();
    view.frame(now);

    view.handle_pinch(pinch(GesturePhase::Began, 1.5), now);
    view.handle_pinch(pinch(GesturePhase::Changed, 2.0), now);
    assert!((view.transform().scale() - 3.0).abs() < 1e-5);
    assert!(!view.is_animating());

    view.handle_pinch(pinch(GesturePhase::Ended, 1.0), now);
    let target = view.animation_target().unwrap();
    assert_eq!(target.scale(), 2.0);

    run_animation(&mut view, now);
    assert!(!view.is_animating());
    assert_eq!(view.transform().scale(), 2.0);
    let (_, overflow) = compute_overflow(&view.transform(), &view.image_bounds());
    assert!(overflow.is_zero(), "{:?}", overflow);
}

#[test]
fn test_pinch_below_min_returns_to_identity() {
    let mut view = laid_out_view(RecordingBackend::new(), settings());
    let now = Instant::now();

    view.handle_pinch(pinch(GesturePhase::Began, 0.5), now);
    view.handle_pinch(pinch(GesturePhase::Ended, 1.0), now);
    run_animation(&mut view, now);
    assert_eq!(view.transform(), Transform::IDENTITY);
}

#[test]
fn test_zero_velocity_pan_starts_no_animation() {
    let mut view = laid_out_view(RecordingBackend::new(), settings());
    let now = Instant::now();

    view.handle_pan(pan(GesturePhase::Began, 0.0, 0.0), now);
    view.handle_pan(pan(GesturePhase::Ended, 0.0, 0.0), now);
    assert!(!view.is_animating());
    assert_eq!(view.transform(), Transform::IDENTITY);
}

#[test]
fn test_pan_past_edge_rubber_bands_then_settles() {
    let mut view = laid_out_view(RecordingBackend::new(), settings());
    let now = run_animation(&mut view, Instant::now());
    view.handle_double_tap(double_tap_center(), now);
    let now = run_animation(&mut view, now);
    assert_eq!(view.transform().scale(), 2.0);

    // 60pt right is 1.2 view units: the raw origin would land at -1.1.
    view.handle_pan(pan(GesturePhase::Began, 60.0, 0.0), now);
    let shown = zoom_rect(&view.transform()).min_x();
    assert!(shown < -1.0 && shown > -1.1, "min_x {}", shown);

    view.handle_pan(pan(GesturePhase::Ended, 0.0, 0.0), now);
    assert!(view.is_animating());
    run_animation(&mut view, now);

    assert!((zoom_rect(&view.transform()).min_x() + 1.0).abs() < 1e-5);
    let (_, overflow) = compute_overflow(&view.transform(), &view.image_bounds());
    assert!(overflow.is_zero());
}

#[test]
fn test_double_tap_toggles_zoom() {
    let mut view = laid_out_view(RecordingBackend::new(), settings());
    let now = Instant::now();

    view.handle_double_tap(double_tap_center(), now);
    let now = run_animation(&mut view, now);
    assert_eq!(view.transform(), Transform::from_scale_translation(2.0, 0.0, 0.0));

    view.handle_double_tap(double_tap_center(), now);
    run_animation(&mut view, now);
    assert_eq!(view.transform(), Transform::IDENTITY);
}

#[test]
fn test_render_level_change_requests_sharper_bitmap() {
    let mut view = laid_out_view(RecordingBackend::new(), settings());
    let now = Instant::now();

    view.handle_double_tap(double_tap_center(), now);
    run_animation(&mut view, now);
    assert_eq!(view.render_level(), Some(2.0));

    view.wait_for_renders(WAIT);
    assert_eq!(view.displayed_bitmap().unwrap().dimensions(), (400, 400));
    assert_eq!(view.render_stats().rasterized, 2);
}

#[test]
fn test_render_level_stays_below_max() {
    let mut view = laid_out_view(
        RecordingBackend::new(),
        Settings {
            max_scale: 2.0,
            ..settings()
        },
    );
    let now = Instant::now();
    view.handle_double_tap(double_tap_center(), now);
    run_animation(&mut view, now);
    assert_eq!(view.transform().scale(), 2.0);
    assert_eq!(view.render_level(), Some(1.0));
}

#[test]
fn test_compile_failure_disables_drawing() {
    let mut view = laid_out_view(RecordingBackend::failing(), settings());
    let now = Instant::now();

    assert_eq!(view.frame(now), FrameOutcome::Disabled);
    assert!(!view.graphics_ready());
    assert_eq!(view.frame(now + FRAME), FrameOutcome::Disabled);
    assert_eq!(view.backend().compile_count(), 1);
    assert_eq!(view.backend().draw_count(), 0);

    // Gestures and animations still move the transform while drawing is off.
    view.handle_double_tap(double_tap_center(), now);
    assert!(view.is_animating());
    let mut clock = now;
    for _ in 0..200 {
        clock += FRAME;
        assert_eq!(view.frame(clock), FrameOutcome::Disabled);
        if !view.is_animating() {
            break;
        }
    }
    assert!(!view.is_animating());
    assert_eq!(view.transform().scale(), 2.0);
    assert_eq!(view.backend().draw_count(), 0);
}

#[test]
fn test_layout_change_mid_animation_settles_smoothly() {
    let mut view = laid_out_view(RecordingBackend::new(), settings());
    let mut now = Instant::now();
    view.frame(now);

    view.handle_double_tap(
        TapEvent {
            location: Point::new(90.0, 10.0),
        },
        now,
    );
    let (tx, _) = view.animation_target().unwrap().translation();
    assert!((tx + 0.8).abs() < 1e-5, "{}", tx);
    for _ in 0..2 {
        now += FRAME;
        view.frame(now);
    }

    // The image now only covers -0.5..0.5 horizontally.
    view.layout(Size::new(200.0, 100.0)).unwrap();
    let target = view.animation_target().unwrap();
    assert!(target.translation().0.abs() < 1e-5, "{:?}", target);

    let mut min_x = vec![zoom_rect(&view.transform()).min_x()];
    for _ in 0..200 {
        now += FRAME;
        view.frame(now);
        min_x.push(zoom_rect(&view.transform()).min_x());
        if !view.is_animating() {
            break;
        }
    }
    assert!(!view.is_animating());

    let last = min_x[min_x.len() - 1];
    let before = min_x[min_x.len() - 2];
    assert!((last - before).abs() < 0.02, "settle jumped from {} to {}", before, last);
    assert!((last + 0.5).abs() < 1e-4, "{}", last);
    let (_, overflow) = compute_overflow(&view.transform(), &view.image_bounds());
    assert!(overflow.is_zero(), "{:?}", overflow);
}

#[test]
fn test_out_of_bounds_landing_animates_back() {
    let mut view = laid_out_view(RecordingBackend::new(), settings());
    let now = Instant::now();
    view.frame(now);

    let outside = Transform::from_scale_translation(2.0, 3.0, 0.0);
    view.apply(
        TransformCommand::Animate {
            to: outside,
            duration: Duration::from_millis(300),
        },
        now,
    );

    let mut clock = now;
    for _ in 0..19 {
        clock += FRAME;
        view.frame(clock);
    }
    // The first animation landed where it was told to, and a corrective one
    // took over instead of snapping.
    assert_eq!(view.transform(), outside);
    assert!(view.is_animating());
    let target = view.animation_target().unwrap();
    assert_eq!(target, Transform::from_scale_translation(2.0, 1.0, 0.0));

    run_animation(&mut view, clock);
    assert!(!view.is_animating());
    assert_eq!(view.transform(), target);
    let (_, overflow) = compute_overflow(&view.transform(), &view.image_bounds());
    assert!(overflow.is_zero(), "{:?}", overflow);
}

#[test]
fn test_huge_animation_duration_is_clamped() {
    let mut view = laid_out_view(
        RecordingBackend::new(),
        Settings {
            zoom_animation_secs: 1e30,
            pan_settle_secs: f32::INFINITY,
            ..settings()
        },
    );
    let now = Instant::now();
    view.frame(now);

    view.handle_double_tap(double_tap_center(), now);
    assert!(view.is_animating());
    run_animation(&mut view, now + Duration::from_secs(60));
    assert!(!view.is_animating());
    assert_eq!(view.transform().scale(), 2.0);
}

#[test]
fn test_surface_teardown_releases_and_reacquires() {
    let view = Rc::new(RefCell::new(laid_out_view(RecordingBackend::new(), settings())));
    let mut host = SurfaceHost::new();
    host.register(&view);
    let now = Instant::now();

    assert_eq!(view.borrow_mut().frame(now), FrameOutcome::Drawn);
    assert_eq!(view.borrow().render_stats().entries, 1);

    assert_eq!(host.surface_torn_down(), 1);
    {
        let view = view.borrow();
        assert_eq!(view.render_stats().entries, 0);
        assert_eq!(view.backend().live_textures(), 0);
    }

    let mut view = view.borrow_mut();
    assert_eq!(view.frame(now + FRAME), FrameOutcome::Drawn);
    assert_eq!(view.backend().compile_count(), 2);
    assert_eq!(view.backend().live_textures(), 1);
}

#[test]
fn test_no_image_is_idle() {
    let mut view = ImageView::new(RecordingBackend::new(), settings()).unwrap();
    let now = Instant::now();
    view.layout(Size::new(100.0, 100.0)).unwrap();

    view.handle_double_tap(double_tap_center(), now);
    view.handle_pinch(pinch(GesturePhase::Began, 2.0), now);
    assert!(!view.is_animating());
    assert_eq!(view.transform(), Transform::IDENTITY);
    assert_eq!(view.frame(now), FrameOutcome::Idle);
    assert_eq!(view.backend().compile_count(), 0);
}

#[test]
fn test_invalid_viewport_is_rejected() {
    let mut view = ImageView::new(RecordingBackend::new(), settings()).unwrap();
    let err = view.layout(Size::new(0.0, 100.0)).unwrap_err();
    assert!(matches!(err, ViewerError::InvalidViewport { .. }));
}

#[test]
fn test_set_image_resets_zoom() {
    let mut view = laid_out_view(RecordingBackend::new(), settings());
    let now = Instant::now();
    view.handle_double_tap(double_tap_center(), now);
    run_animation(&mut view, now);
    assert_eq!(view.transform().scale(), 2.0);

    let replacement = Arc::new(RgbaImage::from_pixel(300, 150, Rgba([1, 2, 3, 255])));
    view.set_image(replacement);
    assert_eq!(view.transform(), Transform::IDENTITY);
    assert_eq!(view.render_level(), Some(1.0));
    // Landscape image in a square view: full width, half height.
    assert_eq!(view.image_bounds().height(), 1.0);
    assert_eq!(view.displayed_bitmap().unwrap().dimensions(), (200, 100));
}

struct RefuseLeft {
    asked: Rc<RefCell<Vec<PanDirection>>>,
}

impl PanningDelegate for RefuseLeft {
    fn should_pan_in_direction(&self, direction: PanDirection) -> bool {
        self.asked.borrow_mut().push(direction);
        direction != PanDirection::Left
    }
}

#[test]
fn test_panning_delegate_vetoes_at_edge() {
    let mut view = laid_out_view(RecordingBackend::new(), settings());
    let asked = Rc::new(RefCell::new(Vec::new()));
    view.set_panning_delegate(Some(Box::new(RefuseLeft {
        asked: Rc::clone(&asked),
    })));

    // At identity the view sits on every edge.
    assert!(!view.should_begin_pan(Point::new(-300.0, 10.0)));
    assert!(view.should_begin_pan(Point::new(300.0, 10.0)));
    assert!(view.should_begin_pan(Point::new(50.0, 50.0)));
    assert_eq!(*asked.borrow(), vec![PanDirection::Left, PanDirection::Right]);

    view.set_panning_delegate(None);
    assert!(view.should_begin_pan(Point::new(-300.0, 10.0)));
}
