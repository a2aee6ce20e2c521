/*
 * Escape behavior: flee the centroid of nearby threats, with closer threats
 * weighted more heavily.
 */

use nannou::prelude::*;
use serde::{Deserialize, Serialize};

use super::{require_positive, SteeringContext};
use crate::error::SteeringError;
use crate::math;
use crate::spatial::LayerMask;

const NAME: &str = "escape";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscapeParams {
    pub detection_radius: f32,
    pub max_flee_force: f32,
    pub layers: LayerMask,
}

impl Default for EscapeParams {
    fn default() -> Self {
        Self {
            detection_radius: 5.0,
            max_flee_force: 10.0,
            layers: LayerMask::PREDATORS,
        }
    }
}

impl EscapeParams {
    pub fn validate(&self) -> Result<(), SteeringError> {
        require_positive(NAME, "detection_radius", self.detection_radius)?;
        require_positive(NAME, "max_flee_force", self.max_flee_force)?;
        if self.layers.is_empty() {
            return Err(SteeringError::EmptyLayerMask { behavior: NAME });
        }
        Ok(())
    }
}

/// Full-strength flight away from the proximity-weighted centroid of every
/// threat in range. Closer threats pull the centroid harder.
pub(crate) fn compute(params: &EscapeParams, ctx: &SteeringContext<'_>) -> Vec2 {
    let mut threats = ctx
        .spatial
        .query_radius(ctx.position, params.detection_radius, params.layers);
    if threats.is_empty() {
        return Vec2::ZERO;
    }
    threats.sort_by_key(|hit| hit.handle);

    let radius = params.detection_radius;
    let mut weighted = Vec2::ZERO;
    let mut total_weight = 0.0;
    for hit in &threats {
        let weight = math::clamp01((radius - hit.position.distance(ctx.position)) / radius);
        weighted += hit.position * weight;
        total_weight += weight;
    }

    // Every threat sits exactly on the detection edge
    if total_weight <= 0.0 {
        return Vec2::ZERO;
    }

    let centroid = weighted / total_weight;
    let away = ctx.position - centroid;
    if away.length_squared() < 1e-4 {
        return Vec2::ZERO;
    }
    math::normalize_or_zero(away) * params.max_flee_force
}
