//! Geometric helpers shared by the lod terrain and the scatter placement.

mod lattice;

pub use lattice::Lattice;

use bevy::math::{Rect, Vec2};

/// Computes the distance between the `point` and the closest point of the `rect`.
///
/// Points inside of the rect have a distance of zero.
#[inline]
pub fn distance_to_rect(rect: Rect, point: Vec2) -> f32 {
    let closest = point.max(rect.min).min(rect.max);
    closest.distance(point)
}

/// Returns whether all corners of the rect are finite and the rect is not inverted.
#[inline]
pub(crate) fn is_valid_rect(rect: Rect) -> bool {
    rect.min.is_finite() && rect.max.is_finite() && rect.min.cmple(rect.max).all()
}

#[inline]
pub(crate) fn inverse_mix(a: f32, b: f32, value: f32) -> f32 {
    ((value - a) / (b - a)).clamp(0.0, 1.0)
}
