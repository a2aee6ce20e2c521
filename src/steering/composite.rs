/*
 * Composite behavior: a weighted blend of child behaviors, where each
 * child's contribution is scaled by its weight and capped at it.
 */

use nannou::prelude::*;
use serde::{Deserialize, Serialize};

use super::{SteeringBehavior, SteeringContext, SteeringScratch};
use crate::error::SteeringError;

/// Weighted sum of child behaviors.
///
/// Each child's weighted force is capped at the length of its own weight, so a
/// weight is both a scale and a ceiling for that child's contribution.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeBehavior {
    pub behaviors: Vec<SteeringBehavior>,
    pub weights: Vec<f32>,
}

impl CompositeBehavior {
    pub fn new(behaviors: Vec<SteeringBehavior>, weights: Vec<f32>) -> Result<Self, SteeringError> {
        let composite = Self { behaviors, weights };
        composite.validate()?;
        Ok(composite)
    }

    /// Build from (behavior, weight) pairs, which can't mismatch in length.
    pub fn weighted<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (SteeringBehavior, f32)>,
    {
        let (behaviors, weights) = pairs.into_iter().unzip();
        Self { behaviors, weights }
    }

    pub fn validate(&self) -> Result<(), SteeringError> {
        self.check_lengths()?;
        for &weight in &self.weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(SteeringError::InvalidParameter {
                    behavior: "composite",
                    name: "weights",
                    reason: format!("weights must be finite and non-negative, got {weight}"),
                });
            }
        }
        self.behaviors.iter().try_for_each(SteeringBehavior::validate)
    }

    fn check_lengths(&self) -> Result<(), SteeringError> {
        if self.behaviors.len() != self.weights.len() {
            return Err(SteeringError::WeightMismatch {
                behaviors: self.behaviors.len(),
                weights: self.weights.len(),
            });
        }
        Ok(())
    }

    pub(crate) fn compute(&self, ctx: &SteeringContext<'_>, scratch: &mut SteeringScratch<'_>) -> Result<Vec2, SteeringError> {
        self.check_lengths()?;

        let mut total = Vec2::ZERO;
        for (behavior, &weight) in self.behaviors.iter().zip(&self.weights) {
            let mut partial = behavior.compute_force(ctx, scratch)? * weight;
            if partial.length_squared() > weight * weight {
                partial = partial.normalize() * weight;
            }
            total += partial;
        }
        Ok(total)
    }
}
