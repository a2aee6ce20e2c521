/*
 * Error Module
 *
 * Typed errors for every layer of the simulation. Configuration problems are
 * reported when a behavior, flock or index is set up; numeric trouble inside a
 * single agent's force computation is reported per agent and never aborts a tick.
 */

use thiserror::Error;

use crate::agent::FlockId;

/// Errors raised by steering behaviors, either while validating a configuration
/// or while computing a force for one agent.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SteeringError {
    #[error("composite behavior has {behaviors} behaviors but {weights} weights")]
    WeightMismatch { behaviors: usize, weights: usize },

    #[error("invalid parameter `{name}` on {behavior}: {reason}")]
    InvalidParameter {
        behavior: &'static str,
        name: &'static str,
        reason: String,
    },

    #[error("{behavior} filters on an empty layer mask and can never find anything")]
    EmptyLayerMask { behavior: &'static str },

    #[error("{behavior} produced a non-finite force")]
    NonFiniteForce { behavior: &'static str },
}

/// Errors raised by flock setup and lifecycle operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlockError {
    #[error("rejected steering behavior: {0}")]
    Behavior(#[from] SteeringError),

    #[error("invalid flock parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("word spawn needs one word per polarity: got {polarities} polarities and {words} words")]
    SpawnMismatch { polarities: usize, words: usize },

    #[error("no flock with id {0:?}")]
    UnknownFlock(FlockId),
}

/// Errors raised when the spatial collaborators are misconfigured.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpatialError {
    #[error("spatial collaborator misconfigured: {0}")]
    Misconfigured(String),
}

/// Errors raised while loading a scenario configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("flock `{name}`: {source}")]
    Flock {
        name: String,
        #[source]
        source: FlockError,
    },

    #[error("spatial setup: {0}")]
    Spatial(#[from] SpatialError),
}
