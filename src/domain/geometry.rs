// Pure geometry helpers used by combat and bot steering.

use std::f32::consts::{PI, TAU};

pub fn distance(ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    (bx - ax).hypot(by - ay)
}

/// Heading from `(ax, ay)` towards `(bx, by)` in radians, `atan2` convention.
pub fn angle_to(ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    (by - ay).atan2(bx - ax)
}

/// Wraps an angle into `[-π, π)`.
pub fn wrap_angle(angle: f32) -> f32 {
    (angle + PI).rem_euclid(TAU) - PI
}

/// Returns true if `target` lies within `half_arc` radians of `facing`, measured the short way
/// around the circle.
pub fn in_arc(facing: f32, target: f32, half_arc: f32) -> bool {
    wrap_angle(target - facing).abs() <= half_arc
}
