/*
 * Math Module
 *
 * Small vector helpers shared by the steering behaviors and the flock.
 * Everything works on nannou's `Vec2` and returns zero rather than NaN for
 * degenerate input.
 */

use nannou::prelude::*;

#[inline]
pub fn clamp01(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Unit vector in the direction of `v`, or zero if `v` has no usable length.
#[inline]
pub fn normalize_or_zero(v: Vec2) -> Vec2 {
    let length_squared = v.length_squared();
    if length_squared > f32::EPSILON * f32::EPSILON && length_squared.is_finite() {
        v / length_squared.sqrt()
    } else {
        Vec2::ZERO
    }
}

/// Caps the length of `v` at `max`, preserving direction.
#[inline]
pub fn clamp_length(v: Vec2, max: f32) -> Vec2 {
    let length_squared = v.length_squared();
    if length_squared > max * max {
        v * (max / length_squared.sqrt())
    } else {
        v
    }
}

/// Counter-clockwise perpendicular.
#[inline]
pub fn perp(v: Vec2) -> Vec2 {
    vec2(-v.y, v.x)
}

/// Where `value` sits between `a` and `b`, clamped to [0, 1].
#[inline]
pub fn inverse_lerp(a: f32, b: f32, value: f32) -> f32 {
    if (b - a).abs() <= f32::EPSILON {
        return 0.0;
    }
    clamp01((value - a) / (b - a))
}

/// Linear interpolation with `t` clamped to [0, 1].
#[inline]
pub fn lerp(a: Vec2, b: Vec2, t: f32) -> Vec2 {
    let t = clamp01(t);
    a + (b - a) * t
}

#[inline]
pub fn is_finite(v: Vec2) -> bool {
    v.x.is_finite() && v.y.is_finite()
}

/// Critically damped approach of `current` towards `target`.
///
/// `velocity` is the spring's state and must be carried between calls by the
/// caller. Follows the usual game-engine smooth-damp approximation of
/// `exp(-omega * dt)`, including the guard that stops the output from
/// overshooting the target.
pub fn smooth_damp(
    current: Vec2,
    target: Vec2,
    velocity: &mut Vec2,
    smooth_time: f32,
    dt: f32,
) -> Vec2 {
    let smooth_time = smooth_time.max(1e-4);
    if dt <= 0.0 {
        return current;
    }

    let omega = 2.0 / smooth_time;
    let x = omega * dt;
    let decay = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);

    let change = current - target;
    let temp = (*velocity + change * omega) * dt;
    *velocity = (*velocity - temp * omega) * decay;
    let mut output = target + (change + temp) * decay;

    // Past the target means the spring would oscillate; pin it instead.
    if (target - current).dot(output - target) > 0.0 {
        output = target;
        *velocity = Vec2::ZERO;
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_or_zero_handles_zero() {
        assert_eq!(normalize_or_zero(Vec2::ZERO), Vec2::ZERO);
        let n = normalize_or_zero(vec2(3.0, 4.0));
        assert!((n.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn clamp_length_preserves_direction() {
        let v = clamp_length(vec2(10.0, 10.0), 5.0);
        assert!((v.length() - 5.0).abs() < 1e-5);
        assert!((v.x - v.y).abs() < 1e-6);
        assert_eq!(clamp_length(vec2(1.0, 0.0), 5.0), vec2(1.0, 0.0));
    }

    #[test]
    fn inverse_lerp_clamps() {
        assert_eq!(inverse_lerp(1.0, 3.0, 0.0), 0.0);
        assert_eq!(inverse_lerp(1.0, 3.0, 2.0), 0.5);
        assert_eq!(inverse_lerp(1.0, 3.0, 9.0), 1.0);
        assert_eq!(inverse_lerp(2.0, 2.0, 9.0), 0.0);
    }

    #[test]
    fn smooth_damp_converges_without_overshoot() {
        let target = vec2(10.0, 0.0);
        let mut velocity = Vec2::ZERO;
        let mut current = Vec2::ZERO;
        for _ in 0..200 {
            current = smooth_damp(current, target, &mut velocity, 0.2, 1.0 / 60.0);
            assert!(current.x <= target.x + 1e-4);
        }
        assert!((current - target).length() < 1e-2);
    }

    #[test]
    fn smooth_damp_from_rest_moves_partway() {
        let mut velocity = Vec2::ZERO;
        let out = smooth_damp(Vec2::ZERO, vec2(1.0, 0.0), &mut velocity, 0.2, 1.0 / 60.0);
        assert!(out.x > 0.0 && out.x < 1.0);
        assert!(velocity.x > 0.0);
    }
}
