/*
 * Cohesion behavior: steer towards the neighbors' centroid.
 */

use nannou::prelude::*;

use super::SteeringContext;

/// Offset from the agent to the mean position of its neighbors.
///
/// Left unnormalized: the pull grows with the distance to the group.
pub(crate) fn compute(ctx: &SteeringContext<'_>) -> Vec2 {
    if ctx.neighbors.is_empty() {
        return Vec2::ZERO;
    }

    let sum = ctx.neighbors.iter().fold(Vec2::ZERO, |acc, hit| acc + hit.position);
    let centroid = sum / ctx.neighbors.len() as f32;
    centroid - ctx.position
}
