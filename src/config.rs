/*
 * Configuration Module
 *
 * Scenario files are TOML. Every section falls back to defaults, so a file only
 * needs to name what it changes. Validation of flock parameters and behaviors
 * happens when the Simulation is built from the config, where each error can
 * be tied to the flock that caused it.
 */

use std::fs;
use std::path::Path;

use nannou::prelude::*;
use serde::{Deserialize, Serialize};

use crate::agent::Polarity;
use crate::error::ConfigError;
use crate::params::FlockParams;
use crate::steering::{CompositeBehavior, StayInRadiusParams, SteeringBehavior};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub seed: u64,
    /// Fixed simulation steps per second.
    pub step_hz: f32,
    /// Upper bound on steps run for one frame when catching up.
    pub max_catch_up_steps: usize,
    pub grid_cell_size: f32,
    pub cluster_radius: f32,
    pub stable_pass_threshold: u32,
    pub viewport: ViewportConfig,
    pub predators: Vec<[f32; 2]>,
    pub attractors: Vec<[f32; 2]>,
    pub flocks: Vec<FlockConfig>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            step_hz: 60.0,
            max_catch_up_steps: 5,
            grid_cell_size: 2.0,
            cluster_radius: 1.0,
            stable_pass_threshold: 2,
            viewport: ViewportConfig::default(),
            predators: Vec::new(),
            attractors: Vec::new(),
            flocks: vec![FlockConfig::default()],
        }
    }
}

impl SimConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub center: [f32; 2],
    pub width: f32,
    pub height: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            center: [0.0, 0.0],
            width: 32.0,
            height: 18.0,
        }
    }
}

impl ViewportConfig {
    pub fn center(&self) -> Point2 {
        pt2(self.center[0], self.center[1])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlockConfig {
    pub name: String,
    #[serde(default)]
    pub params: FlockParams,
    #[serde(default = "default_behavior")]
    pub behavior: SteeringBehavior,
    #[serde(default)]
    pub spawn: SpawnConfig,
}

impl Default for FlockConfig {
    fn default() -> Self {
        Self {
            name: "flock".to_owned(),
            params: FlockParams::default(),
            behavior: default_behavior(),
            spawn: SpawnConfig::default(),
        }
    }
}

/// Cohesion held inside a circle around the origin.
pub fn default_behavior() -> SteeringBehavior {
    SteeringBehavior::Composite(CompositeBehavior::weighted([
        (SteeringBehavior::Cohesion, 1.0),
        (SteeringBehavior::StayInRadius(StayInRadiusParams::default()), 0.5),
    ]))
}

/// Initial population of one flock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    pub center: [f32; 2],
    /// Spawn on the viewport border instead of around `center`.
    pub on_screen_edge: bool,
    /// Overrides the flock's starting count.
    pub count: Option<usize>,
    pub polarity: Option<Polarity>,
    /// One agent per word; replaces the counted spawn when non-empty.
    pub words: Vec<WordConfig>,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            center: [0.0, 0.0],
            on_screen_edge: false,
            count: None,
            polarity: None,
            words: Vec::new(),
        }
    }
}

impl SpawnConfig {
    pub fn center(&self) -> Point2 {
        pt2(self.center[0], self.center[1])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordConfig {
    pub text: String,
    #[serde(default)]
    pub polarity: Polarity,
}
