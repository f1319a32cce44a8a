//! Turns pinch, pan and double-tap gestures into transform updates.
//!
//! The controller never owns the live transform. Each handler receives it,
//! and returns a [`TransformCommand`] telling the view what to do next:
//! replace the transform now, animate towards a target, or leave it alone.

use crate::bounds::{adjusted_transform, zoom_rect};
use crate::math::{distance_travelled, Point, Rect, Size, Transform};
use crate::settings::{Settings, MAX_ANIMATION_SECS};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    Began,
    Changed,
    Ended,
    Cancelled,
    Failed,
}

impl GesturePhase {
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            GesturePhase::Ended | GesturePhase::Cancelled | GesturePhase::Failed
        )
    }
}

/// A pinch update. `scale` is the factor since the previous event, and
/// `location` is the focal point in view coordinates (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinchEvent {
    pub phase: GesturePhase,
    pub location: Point,
    pub scale: f32,
}

/// A pan update. `translation` is the movement since the previous event in
/// view points; `velocity` is in points per second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanEvent {
    pub phase: GesturePhase,
    pub translation: Point,
    pub velocity: Point,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TapEvent {
    pub location: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanDirection {
    Up,
    Down,
    Left,
    Right,
}

/// Lets an enclosing container claim a pan that starts at an image edge.
pub trait PanningDelegate {
    fn should_pan_in_direction(&self, direction: PanDirection) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformCommand {
    /// Leave the live transform as it is.
    None,
    /// Replace the live transform immediately.
    Set(Transform),
    /// Animate from the live transform to `to`.
    Animate { to: Transform, duration: Duration },
}

/// What the controller needs to know about the view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewGeometry {
    pub viewport: Size,
    pub image_bounds: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureConfig {
    pub max_scale: f32,
    pub min_scale: f32,
    pub double_tap_scale: f32,
    pub zoom_duration: Duration,
    pub pan_settle_duration: Duration,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for GestureConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            max_scale: settings.max_scale,
            min_scale: settings.min_scale,
            double_tap_scale: settings.double_tap_scale,
            zoom_duration: animation_duration(settings.zoom_animation_secs),
            pan_settle_duration: animation_duration(settings.pan_settle_secs),
        }
    }
}

/// Settings may come straight from a file, so the value is capped rather than
/// trusted. NaN becomes zero.
fn animation_duration(secs: f32) -> Duration {
    Duration::try_from_secs_f32(secs.clamp(0.0, MAX_ANIMATION_SECS)).unwrap_or(Duration::ZERO)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GestureKind {
    Pinch,
    Pan,
}

#[derive(Debug)]
pub struct GestureController {
    pub config: GestureConfig,
    active: Option<GestureKind>,
    /// Undamped pan position; the live transform is this after rubber-banding.
    pan_raw: Transform,
    /// Last pinch focal point in GL orientation (y up).
    pinch_focal: Point,
}

impl GestureController {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            active: None,
            pan_raw: Transform::IDENTITY,
            pinch_focal: Point::ZERO,
        }
    }

    /// Forgets any gesture in progress.
    pub fn reset(&mut self) {
        self.active = None;
        self.pan_raw = Transform::IDENTITY;
        self.pinch_focal = Point::ZERO;
    }

    /// Claims the live transform for `kind`. Returns false when a more recent
    /// gesture of another kind already owns it.
    fn claim(&mut self, kind: GestureKind, phase: GesturePhase) -> bool {
        match (self.active, phase) {
            (_, GesturePhase::Began) => {
                self.active = Some(kind);
                true
            }
            (None, GesturePhase::Changed) => {
                self.active = Some(kind);
                true
            }
            (Some(active), _) => active == kind,
            (None, _) => false,
        }
    }

    fn gl_point(geometry: &ViewGeometry, location: Point) -> Point {
        let normalized = geometry.viewport.normalize(location);
        Point::new(normalized.x, -normalized.y)
    }

    pub fn pinch(&mut self, event: PinchEvent, current: &Transform, geometry: &ViewGeometry) -> TransformCommand {
        let starting = event.phase == GesturePhase::Began || self.active.is_none();
        if !self.claim(GestureKind::Pinch, event.phase) {
            tracing::trace!(phase = ?event.phase, "pinch ignored, another gesture is active");
            return TransformCommand::None;
        }

        match event.phase {
            GesturePhase::Began | GesturePhase::Changed => {
                if starting {
                    tracing::debug!("pinch began");
                }
                if !(event.scale.is_finite() && event.scale > 0.0) {
                    tracing::trace!(scale = event.scale, "pinch update ignored, degenerate scale");
                    return TransformCommand::None;
                }
                self.pinch_focal = Self::gl_point(geometry, event.location);
                let scaled = Transform::scale_about(self.pinch_focal, event.scale).multiply(current);
                TransformCommand::Set(adjusted_transform(&scaled, &geometry.image_bounds, false))
            }
            GesturePhase::Ended | GesturePhase::Cancelled | GesturePhase::Failed => {
                self.active = None;
                let scale = current.scale();
                let limit = if scale > self.config.max_scale {
                    Some(self.config.max_scale)
                } else if scale < self.config.min_scale {
                    Some(self.config.min_scale)
                } else {
                    None
                };

                match limit {
                    Some(limit) => {
                        tracing::debug!(scale, limit, "pinch ended past scale limit");
                        let rescaled = current.rescaled_about(self.pinch_focal, limit);
                        TransformCommand::Animate {
                            to: adjusted_transform(&rescaled, &geometry.image_bounds, false),
                            duration: self.config.zoom_duration,
                        }
                    }
                    None => {
                        tracing::debug!(scale, "pinch ended");
                        TransformCommand::Set(adjusted_transform(current, &geometry.image_bounds, false))
                    }
                }
            }
        }
    }

    pub fn pan(&mut self, event: PanEvent, current: &Transform, geometry: &ViewGeometry) -> TransformCommand {
        let starting = event.phase == GesturePhase::Began || self.active.is_none();
        if !self.claim(GestureKind::Pan, event.phase) {
            tracing::trace!(phase = ?event.phase, "pan ignored, another gesture is active");
            return TransformCommand::None;
        }

        match event.phase {
            GesturePhase::Began | GesturePhase::Changed => {
                if starting {
                    self.pan_raw = *current;
                }
                let dx = event.translation.x / (geometry.viewport.width / 2.0);
                let dy = event.translation.y / (geometry.viewport.height / 2.0);
                self.pan_raw = Transform::translation_matrix(dx, -dy).multiply(&self.pan_raw);
                TransformCommand::Set(adjusted_transform(&self.pan_raw, &geometry.image_bounds, true))
            }
            GesturePhase::Ended => {
                self.active = None;
                self.settle_pan(event.velocity, current, geometry)
            }
            GesturePhase::Cancelled | GesturePhase::Failed => {
                self.active = None;
                self.settle_pan(Point::ZERO, current, geometry)
            }
        }
    }

    /// Projects where a fling lands and returns the bounded landing spot.
    fn settle_pan(&self, velocity: Point, current: &Transform, geometry: &ViewGeometry) -> TransformCommand {
        let horizon = self.config.pan_settle_duration.as_secs_f32();
        let vx = velocity.x / (geometry.viewport.width * 5.0);
        let vy = velocity.y / (geometry.viewport.height * 5.0);

        let rect = zoom_rect(current);
        let (dx, dy) = if horizon > 0.0 {
            (
                distance_travelled(vx, -vx.abs() / horizon, horizon),
                distance_travelled(vy, -vy.abs() / horizon, horizon),
            )
        } else {
            (0.0, 0.0)
        };
        let min_x = rect.min_x() - dx;
        let min_y = rect.min_y() - dy;

        let landing = Transform::from_scale_translation(
            current.scale(),
            -(2.0 * min_x / rect.width() + 1.0),
            2.0 * min_y / rect.width() + 1.0,
        );
        let to = adjusted_transform(&landing, &geometry.image_bounds, false);

        if to == *current {
            tracing::debug!("pan ended at rest");
            TransformCommand::None
        } else {
            tracing::debug!(vx, vy, "pan ended, settling");
            TransformCommand::Animate {
                to,
                duration: self.config.pan_settle_duration,
            }
        }
    }

    pub fn double_tap(&mut self, event: TapEvent, current: &Transform, geometry: &ViewGeometry) -> TransformCommand {
        let to = if current.scale() > 1.0 {
            Transform::IDENTITY
        } else {
            let focal = Self::gl_point(geometry, event.location);
            Transform::scale_about(focal, self.config.double_tap_scale).multiply(&Transform::IDENTITY)
        };
        tracing::debug!(from_scale = current.scale(), to_scale = to.scale(), "double tap");
        TransformCommand::Animate {
            to: adjusted_transform(&to, &geometry.image_bounds, false),
            duration: self.config.zoom_duration,
        }
    }

    /// Decides whether a pan may start, deferring to `delegate` when the view
    /// already touches the image edge in the dominant direction of travel.
    pub fn should_begin_pan(
        velocity: Point,
        current: &Transform,
        image_bounds: &Rect,
        delegate: Option<&dyn PanningDelegate>,
    ) -> bool {
        let Some(delegate) = delegate else {
            return true;
        };
        let rect = zoom_rect(current);

        let direction = if velocity.x.abs() > velocity.y.abs() {
            if velocity.x < 0.0 {
                (rect.max_x() >= image_bounds.max_x()).then_some(PanDirection::Left)
            } else {
                (rect.min_x() <= image_bounds.min_x()).then_some(PanDirection::Right)
            }
        } else if velocity.y.abs() > velocity.x.abs() {
            if velocity.y < 0.0 {
                (rect.max_y() >= image_bounds.max_y()).then_some(PanDirection::Up)
            } else {
                (rect.min_y() <= image_bounds.min_y()).then_some(PanDirection::Down)
            }
        } else {
            None
        };

        match direction {
            Some(direction) => {
                let allowed = delegate.should_pan_in_direction(direction);
                tracing::debug!(?direction, allowed, "pan at edge");
                allowed
            }
            None => true,
        }
    }
}

impl Default for GestureController {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}
