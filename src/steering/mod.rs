/*
 * Steering Module
 *
 * A steering behavior maps one agent, its neighbors and its flock's parameters
 * to a 2D force for the current tick. Behaviors are plain values: they hold only
 * tunables and can be shared between flocks behind an `Arc`. The little mutable
 * state a behavior needs (the attraction spring) lives in a `SmoothingState`
 * that the flock keeps per agent and threads through every evaluation.
 *
 * Variants:
 * - Cohesion: pull towards the neighbors' centroid
 * - Escape: flee a proximity-weighted centroid of nearby predators
 * - Attraction: join and orbit a ring around nearby attractors
 * - StayInRadius / StayOnScreen: containment
 * - Composite: weighted, per-weight capped sum of other behaviors
 */

use nannou::prelude::*;
use serde::{Deserialize, Serialize};

use crate::agent::AgentId;
use crate::error::SteeringError;
use crate::math;
use crate::params::FlockParams;
use crate::random::RandomSource;
use crate::spatial::{SpatialHit, SpatialQuery};
use crate::viewport::Viewport;

pub mod attraction;
pub mod cohesion;
pub mod composite;
pub mod containment;
pub mod escape;

pub use attraction::{largest_gap_midpoint, AttractionParams, RingCache};
pub use composite::CompositeBehavior;
pub use containment::{StayInRadiusParams, StayOnScreenParams};
pub use escape::EscapeParams;

/// Everything a behavior may read while computing one agent's force.
pub struct SteeringContext<'a> {
    pub agent: AgentId,
    pub position: Point2,
    /// Agents within the flock's neighbor radius, the agent itself excluded.
    pub neighbors: &'a [SpatialHit],
    pub params: &'a FlockParams,
    pub spatial: &'a dyn SpatialQuery,
    pub viewport: &'a Viewport,
    /// Positions of the whole flock as of the start of the tick.
    pub population: &'a [(AgentId, Point2)],
    pub dt: f32,
}

/// Mutable state threaded through one agent's evaluation.
pub struct SteeringScratch<'s> {
    pub smoothing: &'s mut SmoothingState,
    pub rings: &'s mut RingCache,
    pub rng: &'s mut dyn RandomSource,
}

/// Per-agent spring state, one slot per attraction node in the behavior tree.
///
/// Slots are handed out in evaluation order, which is fixed for a given tree,
/// so the same node always gets the same slot.
#[derive(Debug, Clone, Default)]
pub struct SmoothingState {
    radial_velocity: Vec<Vec2>,
    cursor: usize,
}

impl SmoothingState {
    /// Start a new evaluation pass.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    pub(crate) fn next_slot(&mut self) -> &mut Vec2 {
        if self.cursor == self.radial_velocity.len() {
            self.radial_velocity.push(Vec2::ZERO);
        }
        let slot = &mut self.radial_velocity[self.cursor];
        self.cursor += 1;
        slot
    }

    pub fn slot(&self, index: usize) -> Option<Vec2> {
        self.radial_velocity.get(index).copied()
    }

    pub fn slot_count(&self) -> usize {
        self.radial_velocity.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SteeringBehavior {
    Cohesion,
    Escape(EscapeParams),
    Attraction(AttractionParams),
    StayInRadius(StayInRadiusParams),
    StayOnScreen(StayOnScreenParams),
    Composite(CompositeBehavior),
}

impl SteeringBehavior {
    pub fn name(&self) -> &'static str {
        match self {
            SteeringBehavior::Cohesion => "cohesion",
            SteeringBehavior::Escape(_) => "escape",
            SteeringBehavior::Attraction(_) => "attraction",
            SteeringBehavior::StayInRadius(_) => "stay_in_radius",
            SteeringBehavior::StayOnScreen(_) => "stay_on_screen",
            SteeringBehavior::Composite(_) => "composite",
        }
    }

    /// Compute this tick's force for `ctx.agent`.
    ///
    /// Degenerate geometry (no neighbors, nothing in range, sitting exactly on a
    /// centroid) yields zero. Errors are reserved for broken configuration and
    /// non-finite results.
    pub fn compute_force(
        &self,
        ctx: &SteeringContext<'_>,
        scratch: &mut SteeringScratch<'_>,
    ) -> Result<Vec2, SteeringError> {
        let force = match self {
            SteeringBehavior::Cohesion => cohesion::compute(ctx),
            SteeringBehavior::Escape(p) => escape::compute(p, ctx),
            SteeringBehavior::Attraction(p) => attraction::compute(p, ctx, scratch),
            SteeringBehavior::StayInRadius(p) => containment::stay_in_radius(p, ctx),
            SteeringBehavior::StayOnScreen(p) => containment::stay_on_screen(p, ctx),
            SteeringBehavior::Composite(c) => c.compute(ctx, scratch)?,
        };

        if !math::is_finite(force) {
            return Err(SteeringError::NonFiniteForce { behavior: self.name() });
        }
        Ok(force)
    }

    /// Reject configurations that could never compute a meaningful force.
    pub fn validate(&self) -> Result<(), SteeringError> {
        match self {
            SteeringBehavior::Cohesion => Ok(()),
            SteeringBehavior::Escape(p) => p.validate(),
            SteeringBehavior::Attraction(p) => p.validate(),
            SteeringBehavior::StayInRadius(p) => p.validate(),
            SteeringBehavior::StayOnScreen(p) => p.validate(),
            SteeringBehavior::Composite(c) => c.validate(),
        }
    }

    /// Number of attraction nodes, i.e. smoothing slots an agent needs.
    pub fn attraction_slots(&self) -> usize {
        match self {
            SteeringBehavior::Attraction(_) => 1,
            SteeringBehavior::Composite(c) => c.behaviors.iter().map(|b| b.attraction_slots()).sum(),
            _ => 0,
        }
    }
}

pub(crate) fn require_positive(behavior: &'static str, name: &'static str, value: f32) -> Result<(), SteeringError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SteeringError::InvalidParameter {
            behavior,
            name,
            reason: format!("must be positive and finite, got {value}"),
        })
    }
}
