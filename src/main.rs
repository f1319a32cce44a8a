use anyhow::Context;
use image::{imageops, Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use zoomview::gesture::{GesturePhase, PanEvent, PinchEvent, TapEvent};
use zoomview::gpu::headless::RecordingBackend;
use zoomview::logging::init_tracing;
use zoomview::{FrameOutcome, ImageView, Point, Settings, Size, ViewerError};

const FRAME: Duration = Duration::from_millis(16);
const VIEWPORT: Size = Size {
    width: 390.0,
    height: 844.0,
};

fn main() -> anyhow::Result<()> {
    let settings = Settings::load();
    init_tracing(settings.debug_logging);

    let mut args = std::env::args().skip(1);
    let input = args.next().map(PathBuf::from);
    let output = args.next().map(PathBuf::from);

    let image = match &input {
        Some(path) => load_image(path)?,
        None => {
            log::info!("No image given, using a generated checkerboard");
            checkerboard(1200, 900)
        }
    };

    let mut view = ImageView::new(RecordingBackend::new(), settings).context("creating view")?;
    view.set_image(Arc::new(image));
    view.layout(VIEWPORT)?;

    let mut clock = Instant::now();
    let mut frames = FrameCounter::default();
    frames.record(view.frame(clock));

    let center = Point::new(VIEWPORT.width / 2.0, VIEWPORT.height / 2.0);

    view.handle_double_tap(TapEvent { location: center }, clock);
    clock = run_frames(&mut view, clock, &mut frames);

    for (phase, scale) in [
        (GesturePhase::Began, 1.2),
        (GesturePhase::Changed, 1.5),
        (GesturePhase::Changed, 2.5),
        (GesturePhase::Ended, 1.0),
    ] {
        view.handle_pinch(
            PinchEvent {
                phase,
                location: center,
                scale,
            },
            clock,
        );
        clock += FRAME;
        frames.record(view.frame(clock));
    }
    clock = run_frames(&mut view, clock, &mut frames);

    for (phase, dx, velocity) in [
        (GesturePhase::Began, 40.0, 0.0),
        (GesturePhase::Changed, 120.0, 0.0),
        (GesturePhase::Ended, 0.0, 900.0),
    ] {
        view.handle_pan(
            PanEvent {
                phase,
                translation: Point::new(dx, 0.0),
                velocity: Point::new(velocity, 0.0),
            },
            clock,
        );
        clock += FRAME;
        frames.record(view.frame(clock));
    }
    clock = run_frames(&mut view, clock, &mut frames);

    view.wait_for_renders(Duration::from_secs(10));
    frames.record(view.frame(clock + FRAME));

    let transform = view.transform();
    let stats = view.render_stats();
    log::info!(
        "Final scale {:.3}, translation {:?}, render level {:?}",
        transform.scale(),
        transform.translation(),
        view.render_level()
    );
    tracing::info!(
        drawn = frames.drawn,
        unchanged = frames.unchanged,
        disabled = frames.disabled,
        draw_calls = view.backend().draw_count(),
        cache_entries = stats.entries,
        rasterized = stats.rasterized,
        discarded = stats.discarded,
        "demo finished"
    );

    if let Some(path) = output {
        let bitmap = view
            .displayed_bitmap()
            .context("no bitmap was rendered")?;
        // Bitmaps are stored bottom row first.
        imageops::flip_vertical(&**bitmap)
            .save(&path)
            .with_context(|| format!("saving {}", path.display()))?;
        log::info!("Wrote current level of detail to {:?}", path);
    }

    Ok(())
}

fn load_image(path: &Path) -> Result<RgbaImage, ViewerError> {
    let image = image::open(path).map_err(|e| ViewerError::ImageLoadError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    log::info!("Loaded {:?} ({}x{})", path, image.width(), image.height());
    Ok(image.to_rgba8())
}

fn checkerboard(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        if (x / 50 + y / 50) % 2 == 0 {
            Rgba([230, 230, 230, 255])
        } else {
            Rgba([40, 60, 120, 255])
        }
    })
}

#[derive(Default)]
struct FrameCounter {
    drawn: usize,
    unchanged: usize,
    disabled: usize,
}

impl FrameCounter {
    fn record(&mut self, outcome: FrameOutcome) {
        match outcome {
            FrameOutcome::Drawn => self.drawn += 1,
            FrameOutcome::Unchanged | FrameOutcome::Idle => self.unchanged += 1,
            FrameOutcome::Disabled => self.disabled += 1,
        }
    }
}

fn run_frames(view: &mut ImageView<RecordingBackend>, mut clock: Instant, frames: &mut FrameCounter) -> Instant {
    while view.is_animating() {
        clock += FRAME;
        let outcome = view.frame(clock);
        frames.record(outcome);
        if outcome == FrameOutcome::Idle {
            // Nothing is displayed yet, so the animation is not advancing.
            break;
        }
    }
    clock
}
