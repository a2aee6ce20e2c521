/*
 * Flock Parameters Module
 *
 * This module defines the FlockParams struct holding the movement and spawn
 * tunables of one flock. They stay fixed for the flock's lifetime unless
 * replaced explicitly through `Flock::set_params`. Slider ranges for the viewer
 * live here too so the UI and validation agree on sane values.
 */

use serde::{Deserialize, Serialize};

use crate::agent::Polarity;
use crate::error::FlockError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlockParams {
    /// Multiplier applied to the raw steering force.
    pub drive_factor: f32,
    pub max_speed: f32,
    pub neighbor_radius: f32,
    pub avoidance_radius_multiplier: f32,
    /// Radius of the disk agents are spawned in.
    pub spawn_radius: f32,
    /// Minimum distance between agents spawned on the screen edge.
    pub min_spawn_spacing: f32,
    pub starting_count: usize,
    pub default_polarity: Polarity,
    pub polarity_score: i32,
}

impl Default for FlockParams {
    fn default() -> Self {
        Self {
            drive_factor: 10.0,
            max_speed: 5.0,
            neighbor_radius: 1.5,
            avoidance_radius_multiplier: 0.5,
            spawn_radius: 5.0,
            min_spawn_spacing: 1.0,
            starting_count: 250,
            default_polarity: Polarity::Neutral,
            polarity_score: 0,
        }
    }
}

impl FlockParams {
    pub fn square_max_speed(&self) -> f32 {
        self.max_speed * self.max_speed
    }

    pub fn square_neighbor_radius(&self) -> f32 {
        self.neighbor_radius * self.neighbor_radius
    }

    /// Squared avoidance distance, exposed for callers; no built-in behavior reads it.
    pub fn square_avoidance_radius(&self) -> f32 {
        self.square_neighbor_radius() * self.avoidance_radius_multiplier * self.avoidance_radius_multiplier
    }

    pub fn validate(&self) -> Result<(), FlockError> {
        positive("drive_factor", self.drive_factor)?;
        positive("max_speed", self.max_speed)?;
        positive("neighbor_radius", self.neighbor_radius)?;
        positive("spawn_radius", self.spawn_radius)?;

        if !(0.0..=1.0).contains(&self.avoidance_radius_multiplier) {
            return Err(FlockError::InvalidParameter {
                name: "avoidance_radius_multiplier",
                reason: format!("must be within [0, 1], got {}", self.avoidance_radius_multiplier),
            });
        }
        if !self.min_spawn_spacing.is_finite() || self.min_spawn_spacing < 0.0 {
            return Err(FlockError::InvalidParameter {
                name: "min_spawn_spacing",
                reason: format!("must be finite and non-negative, got {}", self.min_spawn_spacing),
            });
        }
        Ok(())
    }

    // Ranges for viewer sliders
    pub fn drive_factor_range() -> std::ops::RangeInclusive<f32> {
        1.0..=100.0
    }

    pub fn max_speed_range() -> std::ops::RangeInclusive<f32> {
        1.0..=100.0
    }

    pub fn neighbor_radius_range() -> std::ops::RangeInclusive<f32> {
        1.0..=10.0
    }
}

fn positive(name: &'static str, value: f32) -> Result<(), FlockError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(FlockError::InvalidParameter {
            name,
            reason: format!("must be positive and finite, got {value}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(FlockParams::default().validate().is_ok());
    }

    #[test]
    fn square_avoidance_radius_uses_multiplier() {
        let params = FlockParams {
            neighbor_radius: 2.0,
            avoidance_radius_multiplier: 0.5,
            ..Default::default()
        };
        assert!((params.square_avoidance_radius() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_bad_values() {
        let bad_speed = FlockParams { max_speed: 0.0, ..Default::default() };
        assert!(matches!(
            bad_speed.validate(),
            Err(FlockError::InvalidParameter { name: "max_speed", .. })
        ));

        let bad_multiplier = FlockParams { avoidance_radius_multiplier: 1.5, ..Default::default() };
        assert!(bad_multiplier.validate().is_err());

        let bad_spacing = FlockParams { min_spawn_spacing: -1.0, ..Default::default() };
        assert!(bad_spacing.validate().is_err());
    }
}
