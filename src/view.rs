//! The embeddable zoomable image view.
//!
//! Everything here runs on the host's UI thread: gesture callbacks, layout,
//! and one [`ImageView::frame`] per display refresh. Background rasterization
//! results are picked up at the start of each frame.

use crate::animation::Animator;
use crate::bounds::{adjusted_transform, image_bounds_for};
use crate::errors::{Result, ViewerError};
use crate::gesture::{
    GestureConfig, GestureController, PanEvent, PanningDelegate, PinchEvent, TapEvent, TransformCommand,
    ViewGeometry,
};
use crate::gpu::{
    quad_vertices, DrawParams, GraphicsBackend, PrimitiveMode, SceneVertex, ShaderProgram, TextureId,
    VertexAttribute, VertexBuffer, FRAGMENT_SHADER, VERTEX_SHADER,
};
use crate::math::{Point, Rect, Size, Transform};
use crate::render_cache::{CacheStats, CallerId, RenderCache};
use crate::settings::Settings;
use image::RgbaImage;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// No image, or nothing rasterized yet.
    Idle,
    /// Graphics resources could not be acquired; the view stays blank.
    Disabled,
    /// Nothing changed since the last draw.
    Unchanged,
    Drawn,
}

/// Transform produced by the animation for this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingUpdate {
    transform: Transform,
    /// The animation reached its target with this update.
    settled: bool,
}

struct UploadedTexture {
    id: TextureId,
    source: Arc<RgbaImage>,
}

struct GraphicsResources<B: GraphicsBackend> {
    program: B::Program,
    buffer: B::Buffer,
    texture: Option<UploadedTexture>,
}

type Inbox = Rc<RefCell<Option<Arc<RgbaImage>>>>;

pub struct ImageView<B: GraphicsBackend> {
    backend: B,
    settings: Settings,
    controller: GestureController,
    animator: Animator,
    renderer: RenderCache,
    caller: CallerId,
    inbox: Inbox,
    delegate: Option<Box<dyn PanningDelegate>>,

    transform: Transform,
    viewport: Size,
    image_bounds: Rect,
    vertices: [SceneVertex; 6],
    render_level: Option<f32>,
    displayed: Option<Arc<RgbaImage>>,

    graphics: Option<GraphicsResources<B>>,
    graphics_failed: bool,
    vertices_dirty: bool,
    needs_display: bool,
}

impl<B: GraphicsBackend> ImageView<B> {
    pub fn new(backend: B, settings: Settings) -> Result<Self> {
        let settings = settings.sanitized();
        settings.validate()?;
        let renderer = RenderCache::new(settings.device_density, settings.worker_count())?;

        Ok(Self {
            backend,
            controller: GestureController::new(GestureConfig::from(&settings)),
            settings,
            animator: Animator::new(),
            renderer,
            caller: CallerId::new(),
            inbox: Rc::new(RefCell::new(None)),
            delegate: None,

            transform: Transform::IDENTITY,
            viewport: Size::new(0.0, 0.0),
            image_bounds: Rect::new(0.0, 0.0, 0.0, 0.0),
            vertices: quad_vertices(0.0, 0.0),
            render_level: None,
            displayed: None,

            graphics: None,
            graphics_failed: false,
            vertices_dirty: true,
            needs_display: false,
        })
    }

    /// Shows a new image at identity zoom. Work still running for the
    /// previous image is dropped when it completes.
    pub fn set_image(&mut self, image: Arc<RgbaImage>) {
        tracing::info!(width = image.width(), height = image.height(), "image set");
        self.renderer.set_image(image);
        self.animator.cancel();
        self.controller.reset();
        self.transform = Transform::IDENTITY;
        self.displayed = None;
        self.inbox.borrow_mut().take();
        self.render_level = None;
        self.needs_display = true;
        self.relayout();
    }

    pub fn layout(&mut self, viewport: Size) -> Result<()> {
        let valid = viewport.width.is_finite()
            && viewport.height.is_finite()
            && viewport.width > 0.0
            && viewport.height > 0.0;
        if !valid {
            return Err(ViewerError::InvalidViewport {
                width: viewport.width,
                height: viewport.height,
            });
        }
        self.viewport = viewport;
        self.relayout();
        Ok(())
    }

    fn relayout(&mut self) {
        if self.viewport.is_empty() {
            return;
        }
        let Some((half_width, half_height)) = self.renderer.quad_extent(self.viewport) else {
            return;
        };
        self.vertices = quad_vertices(half_width, half_height);
        self.image_bounds = image_bounds_for(half_width, half_height);
        self.vertices_dirty = true;

        let level = self.level_for(self.transform.scale());
        self.render_level = Some(level);
        if self.displayed.is_none() {
            self.displayed = self.renderer.render_immediate(level, self.viewport);
        } else {
            self.request_level(level);
        }
        tracing::debug!(
            viewport = ?(self.viewport.width, self.viewport.height),
            half_width,
            half_height,
            level,
            "layout"
        );

        // A running animation keeps going, but toward a target that fits the
        // new bounds.
        match self.animator.target() {
            Some(target) => {
                self.animator
                    .retarget(adjusted_transform(&target, &self.image_bounds, false));
            }
            None => self.check_bounds(),
        }
        self.needs_display = true;
    }

    pub fn reset_zoom(&mut self) {
        self.animator.cancel();
        self.controller.reset();
        if self.transform != Transform::IDENTITY {
            self.transform = Transform::IDENTITY;
            self.needs_display = true;
        }
    }

    pub fn set_max_scale(&mut self, max_scale: f32) {
        self.settings.max_scale = max_scale;
        self.controller.config.max_scale = max_scale;
    }

    pub fn set_min_scale(&mut self, min_scale: f32) {
        self.settings.min_scale = min_scale;
        self.controller.config.min_scale = min_scale;
    }

    pub fn set_panning_delegate(&mut self, delegate: Option<Box<dyn PanningDelegate>>) {
        self.delegate = delegate;
    }

    fn geometry(&self) -> Option<ViewGeometry> {
        if self.renderer.image().is_none() || self.viewport.is_empty() {
            return None;
        }
        Some(ViewGeometry {
            viewport: self.viewport,
            image_bounds: self.image_bounds,
        })
    }

    pub fn handle_pinch(&mut self, event: PinchEvent, now: Instant) {
        let Some(geometry) = self.geometry() else {
            return;
        };
        self.animator.cancel();
        let command = self.controller.pinch(event, &self.transform, &geometry);
        self.apply(command, now);
    }

    pub fn handle_pan(&mut self, event: PanEvent, now: Instant) {
        let Some(geometry) = self.geometry() else {
            return;
        };
        self.animator.cancel();
        let command = self.controller.pan(event, &self.transform, &geometry);
        self.apply(command, now);
    }

    pub fn handle_double_tap(&mut self, event: TapEvent, now: Instant) {
        let Some(geometry) = self.geometry() else {
            return;
        };
        self.animator.cancel();
        let command = self.controller.double_tap(event, &self.transform, &geometry);
        self.apply(command, now);
    }

    /// Asked by the host before a pan recognizer starts.
    pub fn should_begin_pan(&self, velocity: Point) -> bool {
        if self.geometry().is_none() {
            return true;
        }
        GestureController::should_begin_pan(velocity, &self.transform, &self.image_bounds, self.delegate.as_deref())
    }

    pub(crate) fn apply(&mut self, command: TransformCommand, now: Instant) {
        match command {
            TransformCommand::None => {}
            TransformCommand::Set(transform) => {
                if transform != self.transform {
                    self.transform = transform;
                    self.needs_display = true;
                }
            }
            TransformCommand::Animate { to, duration } => {
                self.animator.start(self.transform, to, duration, now);
            }
        }
    }

    /// Hard-clamps the live transform to the image.
    fn check_bounds(&mut self) {
        if self.geometry().is_none() {
            return;
        }
        let adjusted = adjusted_transform(&self.transform, &self.image_bounds, false);
        if adjusted != self.transform {
            self.transform = adjusted;
            self.needs_display = true;
        }
    }

    /// Animates back inside the image when a settled transform lies outside it.
    fn settle_bounds(&mut self, now: Instant) {
        if self.geometry().is_none() {
            return;
        }
        let adjusted = adjusted_transform(&self.transform, &self.image_bounds, false);
        if adjusted != self.transform {
            tracing::debug!(?adjusted, "settled outside the image, animating back");
            self.animator
                .start(self.transform, adjusted, self.controller.config.zoom_duration, now);
        }
    }

    fn apply_update(&mut self, update: PendingUpdate, now: Instant) {
        self.transform = update.transform;
        self.needs_display = true;
        if update.settled {
            self.settle_bounds(now);
        }
    }

    fn level_for(&self, scale: f32) -> f32 {
        scale
            .floor()
            .min(self.settings.max_scale - 1.0)
            .max(self.settings.min_scale)
    }

    fn request_level(&mut self, level: f32) {
        let inbox = Rc::clone(&self.inbox);
        self.renderer.request_render(
            level,
            self.viewport,
            self.caller,
            Box::new(move |bitmap| {
                *inbox.borrow_mut() = Some(bitmap);
            }),
        );
    }

    fn update_render_level(&mut self) {
        if self.geometry().is_none() {
            return;
        }
        let level = self.level_for(self.transform.scale());
        if self.render_level != Some(level) {
            tracing::debug!(from = ?self.render_level, to = level, "render level changed");
            self.render_level = Some(level);
            self.request_level(level);
        }
    }

    fn take_delivery(&mut self) {
        if let Some(bitmap) = self.inbox.borrow_mut().take() {
            tracing::trace!(width = bitmap.width(), height = bitmap.height(), "bitmap delivered");
            self.displayed = Some(bitmap);
            self.needs_display = true;
        }
    }

    /// Blocks up to `timeout` for outstanding rasterizations.
    pub fn wait_for_renders(&mut self, timeout: Duration) -> usize {
        let mut fired = self.renderer.poll_completed();
        let deadline = Instant::now() + timeout;
        while self.renderer.has_pending() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            fired += self.renderer.wait_for_results(remaining);
        }
        self.take_delivery();
        fired
    }

    /// Runs one display refresh: applies deliveries, advances the animation
    /// and draws if anything changed.
    pub fn frame(&mut self, now: Instant) -> FrameOutcome {
        self.renderer.poll_completed();
        self.take_delivery();

        if self.renderer.image().is_none() || self.displayed.is_none() {
            return FrameOutcome::Idle;
        }

        let update = self.animator.tick(now).map(|tick| PendingUpdate {
            transform: tick.transform,
            settled: tick.finished,
        });
        if self.graphics_failed {
            // Nothing is drawn, but the transform still follows the animation.
            if let Some(update) = update {
                self.apply_update(update, now);
            }
            return FrameOutcome::Disabled;
        }
        if update.is_none() && !self.needs_display {
            return FrameOutcome::Unchanged;
        }

        if let Err(e) = self.ensure_graphics() {
            if let Some(update) = update {
                self.apply_update(update, now);
            }
            self.disable_graphics(e);
            return FrameOutcome::Disabled;
        }
        if let Err(e) = self.draw(update, now) {
            self.disable_graphics(e);
            return FrameOutcome::Disabled;
        }
        FrameOutcome::Drawn
    }

    fn ensure_graphics(&mut self) -> Result<()> {
        if self.graphics.is_some() {
            return Ok(());
        }
        let mut program = self.backend.compile(VERTEX_SHADER, FRAGMENT_SHADER)?;
        for attribute in [VertexAttribute::Position, VertexAttribute::TexCoords0] {
            program.bind_attribute(attribute.name(), attribute.slot());
        }
        let buffer = self.backend.create_buffer()?;
        self.graphics = Some(GraphicsResources {
            program,
            buffer,
            texture: None,
        });
        self.vertices_dirty = true;
        tracing::debug!("graphics resources acquired");
        Ok(())
    }

    fn disable_graphics(&mut self, error: ViewerError) {
        error.log();
        self.graphics_failed = true;
        self.release_graphics();
    }

    fn release_graphics(&mut self) {
        if let Some(graphics) = self.graphics.take() {
            if let Some(texture) = graphics.texture {
                self.backend.delete_texture(texture.id);
            }
        }
        self.vertices_dirty = true;
    }

    fn draw(&mut self, update: Option<PendingUpdate>, now: Instant) -> Result<()> {
        if let Some(update) = update {
            self.apply_update(update, now);
        }
        self.update_render_level();

        let Some(bitmap) = self.displayed.clone() else {
            return Ok(());
        };
        let Some(graphics) = self.graphics.as_mut() else {
            return Ok(());
        };

        let stale_texture = match &graphics.texture {
            Some(texture) => !Arc::ptr_eq(&texture.source, &bitmap),
            None => true,
        };
        if stale_texture {
            let id = self.backend.upload_texture(&bitmap)?;
            if let Some(old) = graphics.texture.replace(UploadedTexture { id, source: bitmap }) {
                self.backend.delete_texture(old.id);
            }
        }
        if self.vertices_dirty {
            graphics.buffer.upload(&self.vertices)?;
            self.vertices_dirty = false;
        }

        self.backend.clear(self.settings.clear_color);
        graphics.buffer.bind();
        let params = DrawParams {
            model_view: self.transform,
            texture: graphics.texture.as_ref().map(|texture| texture.id),
            ..DrawParams::default()
        };
        params.apply(&mut graphics.program);
        if let Some(texture) = params.texture {
            self.backend.bind_texture(texture);
        }
        graphics
            .buffer
            .draw(PrimitiveMode::Triangles, 0, self.vertices.len() as u32);
        self.needs_display = false;
        Ok(())
    }

    /// Releases cached bitmaps and device resources. They are re-acquired
    /// on the next frame.
    pub fn on_surface_teardown(&mut self) {
        tracing::debug!(cached = self.renderer.stats().entries, "surface torn down");
        self.renderer.clear_cache();
        self.release_graphics();
        self.graphics_failed = false;
        self.needs_display = true;
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn is_animating(&self) -> bool {
        self.animator.is_active()
    }

    pub fn animation_target(&self) -> Option<Transform> {
        self.animator.target()
    }

    pub fn graphics_ready(&self) -> bool {
        !self.graphics_failed
    }

    pub fn image_bounds(&self) -> Rect {
        self.image_bounds
    }

    pub fn render_level(&self) -> Option<f32> {
        self.render_level
    }

    pub fn displayed_bitmap(&self) -> Option<&Arc<RgbaImage>> {
        self.displayed.as_ref()
    }

    pub fn render_stats(&self) -> CacheStats {
        self.renderer.stats()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
