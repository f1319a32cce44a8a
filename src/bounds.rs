//! Keeps the visible rectangle inside the image quad.
//!
//! Everything here works in normalized model space: the quad spans
//! `-1..1` at identity, and the image occupies [`image_bounds_for`] of it.
//! The zoom rect uses a y-down origin to match gesture coordinates; the
//! image bounds are symmetric about zero, so both conventions agree on them.

use crate::math::{dampen, Rect, Transform};

/// Signed distance the zoom rect sticks out past the image on each axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Overflow {
    pub horizontal: f32,
    pub vertical: f32,
}

impl Overflow {
    pub fn is_zero(&self) -> bool {
        self.horizontal == 0.0 && self.vertical == 0.0
    }
}

/// Origin of the zoom rect after hard clamping.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AdjustedOrigin {
    pub min_x: f32,
    pub min_y: f32,
}

/// The part of the normalized quad currently on screen.
pub fn zoom_rect(transform: &Transform) -> Rect {
    let (tx, ty) = transform.translation();
    let width = 2.0 / transform.scale();
    Rect::new(
        -(width / 2.0) * (tx + 1.0),
        (width / 2.0) * (ty - 1.0),
        width,
        width,
    )
}

/// Image quad extent from its half-extents.
pub fn image_bounds_for(half_width: f32, half_height: f32) -> Rect {
    Rect::new(-half_width, -half_height, half_width * 2.0, half_height * 2.0)
}

fn clamp_axis(min: f32, size: f32, image_min: f32, image_max: f32, image_size: f32) -> (f32, f32) {
    let offset = (size - image_size) / 2.0;
    if offset < 0.0 {
        // Cropped: keep the view over the image.
        if min < image_min {
            (image_min, min - image_min)
        } else if min + size > image_max {
            (image_max - size, min + size - image_max)
        } else {
            (min, 0.0)
        }
    } else {
        // Slack: the image sits centered with equal margins.
        (image_min - offset, 0.0)
    }
}

pub fn compute_overflow(transform: &Transform, image_bounds: &Rect) -> (AdjustedOrigin, Overflow) {
    let rect = zoom_rect(transform);

    let (min_x, horizontal) = clamp_axis(
        rect.min_x(),
        rect.width(),
        image_bounds.min_x(),
        image_bounds.max_x(),
        image_bounds.width(),
    );
    let (min_y, vertical) = clamp_axis(
        rect.min_y(),
        rect.height(),
        image_bounds.min_y(),
        image_bounds.max_y(),
        image_bounds.height(),
    );

    (
        AdjustedOrigin { min_x, min_y },
        Overflow {
            horizontal,
            vertical,
        },
    )
}

/// Rebuilds `transform` with its translation corrected to lie in bounds.
///
/// With `allow_overflow` the clamped origin is pushed back out by
/// [`dampen`] of the overflow, which gives the rubber-band feel while a pan
/// is in progress. The scale is carried over unchanged.
pub fn adjusted_transform(transform: &Transform, image_bounds: &Rect, allow_overflow: bool) -> Transform {
    let rect = zoom_rect(transform);
    let (origin, overflow) = compute_overflow(transform, image_bounds);

    let (min_x, min_y) = if allow_overflow {
        (
            origin.min_x + dampen(overflow.horizontal),
            origin.min_y + dampen(overflow.vertical),
        )
    } else {
        (origin.min_x, origin.min_y)
    };

    let tx = -(2.0 * min_x / rect.width() + 1.0);
    let ty = 2.0 * min_y / rect.width() + 1.0;
    Transform::from_scale_translation(transform.scale(), tx, ty)
}
