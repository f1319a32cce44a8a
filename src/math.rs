//! Matrix and geometry helpers shared by the bounds engine, the gesture
//! controller and the animation driver.
//!
//! Matrices follow the GL convention: 16 floats, column-major, so element
//! `m[4 * column + row]`. Only uniform scale plus translation is ever built,
//! which keeps the translation in `m[12]`/`m[13]` and the scale in `m[0]`.

use std::fmt;

/// A 4x4 model transform uploaded as-is to the shader.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Transform {
    pub m: [f32; 16],
}

impl Transform {
    /// Per-component tolerance used for equality. Repeated composition drifts
    /// by a few ulps, and exact comparison makes settle checks oscillate.
    pub const EPSILON: f32 = 1e-5;

    pub const IDENTITY: Transform = Transform {
        m: [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    };

    pub fn from_scale_translation(scale: f32, tx: f32, ty: f32) -> Self {
        let mut t = Self::IDENTITY;
        t.m[0] = scale;
        t.m[5] = scale;
        t.m[12] = tx;
        t.m[13] = ty;
        t
    }

    /// `T(p) * S(factor) * T(-p)`: scales by `factor` keeping `p` fixed.
    pub fn scale_about(point: Point, factor: f32) -> Self {
        Self::from_scale_translation(
            factor,
            point.x * (1.0 - factor),
            point.y * (1.0 - factor),
        )
    }

    pub fn translation_matrix(dx: f32, dy: f32) -> Self {
        Self::from_scale_translation(1.0, dx, dy)
    }

    /// Matrix product `self * rhs` (`rhs` is applied first).
    pub fn multiply(&self, rhs: &Transform) -> Transform {
        let mut out = [0.0f32; 16];
        for col in 0..4 {
            for row in 0..4 {
                let mut sum = 0.0;
                for k in 0..4 {
                    sum += self.m[k * 4 + row] * rhs.m[col * 4 + k];
                }
                out[col * 4 + row] = sum;
            }
        }
        Transform { m: out }
    }

    pub fn scale(&self) -> f32 {
        self.m[0]
    }

    pub fn translation(&self) -> (f32, f32) {
        (self.m[12], self.m[13])
    }

    pub fn approx_eq(&self, other: &Transform, epsilon: f32) -> bool {
        self.m
            .iter()
            .zip(other.m.iter())
            .all(|(a, b)| (a - b).abs() < epsilon)
    }

    /// Re-targets the scale to exactly `target_scale`, keeping `point` fixed.
    /// A collapsed `self` has no meaningful placement, so the result is then
    /// the identity scaled about `point`.
    pub fn rescaled_about(&self, point: Point, target_scale: f32) -> Transform {
        let current = self.scale();
        if !(current.is_finite() && current > 0.0) {
            return Transform::scale_about(point, target_scale);
        }
        let factor = target_scale / current;
        let mut t = Transform::scale_about(point, factor).multiply(self);
        t.m[0] = target_scale;
        t.m[5] = target_scale;
        t
    }

    /// Component-wise ease-out between `self` and `to`.
    pub fn interpolate(&self, to: &Transform, elapsed: f32, duration: f32) -> Transform {
        let mut out = [0.0f32; 16];
        for (i, value) in out.iter_mut().enumerate() {
            *value = animation_curve(self.m[i], to.m[i], elapsed, duration);
        }
        Transform { m: out }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl PartialEq for Transform {
    fn eq(&self, other: &Self) -> bool {
        self.approx_eq(other, Self::EPSILON)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (tx, ty) = self.translation();
        f.debug_struct("Transform")
            .field("scale", &self.scale())
            .field("tx", &tx)
            .field("ty", &ty)
            .finish()
    }
}

/// Quadratic ease-out: `-(to - from) * p * (p - 2) + from`.
///
/// `p` is clamped to `[0, 1]` and both endpoints are returned exactly.
pub fn animation_curve(from: f32, to: f32, elapsed: f32, duration: f32) -> f32 {
    if duration <= 0.0 {
        return to;
    }
    let progress = elapsed / duration;
    if progress <= 0.0 {
        return from;
    }
    if progress >= 1.0 {
        return to;
    }
    let change = to - from;
    -change * progress * (progress - 2.0) + from
}

/// Compresses overflow into a bounded rubber-band offset in (-1, 1).
pub fn dampen(overflow: f32) -> f32 {
    (overflow / 5.0).tanh()
}

/// Kinematic distance `v*t + a*t^2/2`.
pub fn distance_travelled(initial_velocity: f32, acceleration: f32, time: f32) -> f32 {
    initial_velocity * time + acceleration * time * time / 2.0
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Maps a point in view coordinates (top-left origin) to `-1..1` on both
    /// axes, still y-down.
    pub fn normalize(&self, point: Point) -> Point {
        Point::new(
            (point.x / self.width) * 2.0 - 1.0,
            (point.y / self.height) * 2.0 - 1.0,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub fn min_x(&self) -> f32 {
        self.origin.x
    }

    pub fn min_y(&self) -> f32 {
        self.origin.y
    }

    pub fn max_x(&self) -> f32 {
        self.origin.x + self.size.width
    }

    pub fn max_y(&self) -> f32 {
        self.origin.y + self.size.height
    }

    pub fn width(&self) -> f32 {
        self.size.width
    }

    pub fn height(&self) -> f32 {
        self.size.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transform {
        Transform::from_scale_translation(2.5, -0.75, 0.4)
    }

    #[test]
    fn test_multiply_identity() {
        let t = sample();
        assert_eq!(Transform::IDENTITY.multiply(&t), t);
        assert_eq!(t.multiply(&Transform::IDENTITY), t);
    }

    #[test]
    fn test_multiply_composes_scale_and_translation() {
        let translate = Transform::translation_matrix(0.5, -0.25);
        let scale = Transform::from_scale_translation(2.0, 0.0, 0.0);
        let t = translate.multiply(&scale);
        assert_eq!(t.scale(), 2.0);
        assert_eq!(t.translation(), (0.5, -0.25));

        // Scale applied after translation also scales the offset.
        let t = scale.multiply(&translate);
        assert_eq!(t.translation(), (1.0, -0.5));
    }

    #[test]
    fn test_scale_about_keeps_point_fixed() {
        let p = Point::new(0.3, -0.6);
        let t = Transform::scale_about(p, 3.0);
        let (tx, ty) = t.translation();
        assert!((t.scale() * p.x + tx - p.x).abs() < 1e-6);
        assert!((t.scale() * p.y + ty - p.y).abs() < 1e-6);
    }

    #[test]
    fn test_rescaled_about_is_exact() {
        let t = Transform::from_scale_translation(7.3, 0.2, -0.1);
        let r = t.rescaled_about(Point::new(0.1, 0.1), 5.0);
        assert_eq!(r.scale(), 5.0);
        assert_eq!(r.m[5], 5.0);
    }

    #[test]
    fn test_rescaled_about_collapsed_scale_stays_finite() {
        let collapsed = Transform::from_scale_translation(0.0, 0.3, -0.2);
        let t = collapsed.rescaled_about(Point::new(0.5, 0.5), 1.0);
        assert!(t.m.iter().all(|v| v.is_finite()), "{:?}", t);
        assert_eq!(t, Transform::IDENTITY);
    }

    #[test]
    fn test_approx_eq_tolerates_drift() {
        let a = sample();
        let mut b = a;
        b.m[12] += 5e-6;
        assert_eq!(a, b);
        b.m[12] += 1e-4;
        assert_ne!(a, b);
    }

    #[test]
    fn test_interpolate_same_endpoints_is_noop() {
        let t = sample();
        for step in 0..=10 {
            let i = t.interpolate(&t, step as f32 * 0.03, 0.3);
            assert!(i.approx_eq(&t, Transform::EPSILON));
        }
    }

    #[test]
    fn test_interpolate_endpoints_exact() {
        let a = sample();
        let b = Transform::from_scale_translation(1.3, 0.1, 0.9);
        assert_eq!(a.interpolate(&b, 0.0, 0.3).m, a.m);
        assert_eq!(a.interpolate(&b, 0.3, 0.3).m, b.m);
        assert_eq!(a.interpolate(&b, 0.9, 0.3).m, b.m);
    }

    #[test]
    fn test_animation_curve_eases_out() {
        let half = animation_curve(0.0, 1.0, 0.5, 1.0);
        assert!((half - 0.75).abs() < 1e-6);
        assert_eq!(animation_curve(3.0, 9.0, 1.0, 0.0), 9.0);
    }

    #[test]
    fn test_dampen_bounded_monotonic() {
        assert_eq!(dampen(0.0), 0.0);
        let mut last = dampen(-1000.0);
        assert!(last >= -1.0);
        for i in -200..=200 {
            let x = i as f32 * 0.5;
            let v = dampen(x);
            assert!(v >= last);
            assert!(v.abs() <= 1.0);
            if x.abs() <= 20.0 {
                assert!(v.abs() < 1.0);
            }
            last = v;
        }
        assert!(dampen(1e6) <= 1.0);
        assert!(dampen(0.5) > 0.0 && dampen(-0.5) < 0.0);
    }

    #[test]
    fn test_distance_travelled() {
        assert_eq!(distance_travelled(0.0, 0.0, 0.2), 0.0);
        let d = distance_travelled(1.0, -1.0 / 0.2, 0.2);
        assert!((d - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_normalize() {
        let size = Size::new(200.0, 100.0);
        assert_eq!(size.normalize(Point::new(100.0, 50.0)), Point::new(0.0, 0.0));
        assert_eq!(size.normalize(Point::new(0.0, 100.0)), Point::new(-1.0, 1.0));
    }
}
