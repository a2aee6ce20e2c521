/*
 * Containment behaviors: keep agents inside a circle or inside the viewport.
 * Both are silent while the agent is comfortably inside and ramp up
 * quadratically once it drifts towards or past the boundary.
 */

use nannou::prelude::*;
use serde::{Deserialize, Serialize};

use super::{require_positive, SteeringContext};
use crate::error::SteeringError;
use crate::math;

/// Fraction of the radius below which StayInRadius stays silent.
const DEAD_ZONE: f32 = 0.9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StayInRadiusParams {
    pub center: [f32; 2],
    pub radius: f32,
}

impl Default for StayInRadiusParams {
    fn default() -> Self {
        Self {
            center: [0.0, 0.0],
            radius: 15.0,
        }
    }
}

impl StayInRadiusParams {
    pub fn center(&self) -> Point2 {
        pt2(self.center[0], self.center[1])
    }

    pub fn validate(&self) -> Result<(), SteeringError> {
        require_positive("stay_in_radius", "radius", self.radius)?;
        if !self.center.iter().all(|c| c.is_finite()) {
            return Err(SteeringError::InvalidParameter {
                behavior: "stay_in_radius",
                name: "center",
                reason: format!("must be finite, got {:?}", self.center),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StayOnScreenParams {
    /// Width of the border band, as a fraction of the viewport.
    pub margin: f32,
}

impl Default for StayOnScreenParams {
    fn default() -> Self {
        Self { margin: 0.05 }
    }
}

impl StayOnScreenParams {
    pub fn validate(&self) -> Result<(), SteeringError> {
        if !(0.0..=0.5).contains(&self.margin) {
            return Err(SteeringError::InvalidParameter {
                behavior: "stay_on_screen",
                name: "margin",
                reason: format!("must be within [0, 0.5], got {}", self.margin),
            });
        }
        Ok(())
    }
}

pub(crate) fn stay_in_radius(params: &StayInRadiusParams, ctx: &SteeringContext<'_>) -> Vec2 {
    let to_center = params.center() - ctx.position;
    let t = to_center.length() / params.radius;
    if t < DEAD_ZONE {
        return Vec2::ZERO;
    }
    to_center * t * t
}

pub(crate) fn stay_on_screen(params: &StayOnScreenParams, ctx: &SteeringContext<'_>) -> Vec2 {
    let margin = params.margin;
    let uv = ctx.viewport.to_normalized(ctx.position);

    let inside = |v: f32| v >= margin && v <= 1.0 - margin;
    if inside(uv.x) && inside(uv.y) {
        return Vec2::ZERO;
    }

    let excursion = |v: f32| {
        if v < margin {
            margin - v
        } else if v > 1.0 - margin {
            v - (1.0 - margin)
        } else {
            0.0
        }
    };
    let outside = excursion(uv.x).max(excursion(uv.y));

    math::normalize_or_zero(ctx.viewport.center() - ctx.position) * outside * outside
}
