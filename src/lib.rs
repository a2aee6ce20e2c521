/*
 * wordflock - Module Definitions
 *
 * Composable steering behaviors, a flock integrator and connected-component
 * clustering for word-forming boid swarms, plus a small nannou viewer.
 *
 * Core: agent, steering, flock, cluster, simulation (with spatial, viewport,
 * params, math, random, config, error supporting them).
 * Viewer: app, renderer, ui, debug.
 */

// Re-export key components for easier access
pub use agent::{Agent, AgentId, AgentSnapshot, FlockId, Polarity};
pub use cluster::{Cluster, ClusterBuilder, ClusterKey, ClusterTracker};
pub use config::SimConfig;
pub use error::{ConfigError, FlockError, SpatialError, SteeringError};
pub use flock::{Flock, SpawnDistribution, World};
pub use params::FlockParams;
pub use simulation::Simulation;
pub use spatial::{LayerMask, SpatialGrid, SpatialQuery};
pub use steering::SteeringBehavior;
pub use viewport::Viewport;

// Define modules
pub mod agent;
pub mod cluster;
pub mod config;
pub mod error;
pub mod flock;
pub mod math;
pub mod params;
pub mod random;
pub mod simulation;
pub mod spatial;
pub mod steering;
pub mod viewport;

pub mod app;
pub mod debug;
pub mod renderer;
pub mod ui;
