/*
 * Agent Module
 *
 * This module defines the Agent struct: one flocking entity with a position,
 * a heading, a polarity tag and the id of the flock that owns it.
 * Agents are only ever created and destroyed by their Flock.
 */

use nannou::prelude::*;
use serde::{Deserialize, Serialize};

use crate::math;

/// Identifies a flock within a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlockId(pub u32);

/// Identifies an agent. Serials are never reused within a flock, so an id stays
/// unique for the lifetime of the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId {
    pub flock: FlockId,
    pub serial: u32,
}

/// Tri-state tag consumed by scoring logic outside the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Polarity {
    pub const ALL: [Polarity; 3] = [Polarity::Positive, Polarity::Neutral, Polarity::Negative];
}

#[derive(Debug, Clone)]
pub struct Agent {
    id: AgentId,
    pub position: Point2,
    pub heading: Vec2,
    pub polarity: Polarity,
    pub polarity_score: i32,
    pub assigned_word: Option<String>,
}

impl Agent {
    pub(crate) fn new(id: AgentId, position: Point2, heading: Vec2, polarity: Polarity, polarity_score: i32) -> Self {
        Self {
            id,
            position,
            heading: math::normalize_or_zero(heading),
            polarity,
            polarity_score,
            assigned_word: None,
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    /// The flock that owns this agent.
    pub fn parent_flock(&self) -> FlockId {
        self.id.flock
    }

    /// Face the velocity and move along it for `dt` seconds.
    ///
    /// A zero velocity keeps the previous heading.
    pub fn apply_move(&mut self, velocity: Vec2, dt: f32) {
        let facing = math::normalize_or_zero(velocity);
        if facing != Vec2::ZERO {
            self.heading = facing;
        }
        self.position += velocity * dt;
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            id: self.id,
            position: self.position,
            polarity: self.polarity,
            polarity_score: self.polarity_score,
            assigned_word: self.assigned_word.clone(),
        }
    }
}

/// Read-only copy of an agent, used wherever the population is handed to code
/// that must not mutate it (clustering, game logic).
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub position: Point2,
    pub polarity: Polarity,
    pub polarity_score: i32,
    pub assigned_word: Option<String>,
}

impl AgentSnapshot {
    pub fn new(id: AgentId, position: Point2) -> Self {
        Self {
            id,
            position,
            polarity: Polarity::Neutral,
            polarity_score: 0,
            assigned_word: None,
        }
    }

    pub fn with_polarity(mut self, polarity: Polarity, polarity_score: i32) -> Self {
        self.polarity = polarity;
        self.polarity_score = polarity_score;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> Agent {
        let id = AgentId { flock: FlockId(1), serial: 0 };
        Agent::new(id, pt2(0.0, 0.0), vec2(0.0, 1.0), Polarity::Positive, 2)
    }

    #[test]
    fn apply_move_faces_velocity() {
        let mut a = agent();
        a.apply_move(vec2(2.0, 0.0), 0.5);
        assert_eq!(a.position, pt2(1.0, 0.0));
        assert_eq!(a.heading, vec2(1.0, 0.0));
    }

    #[test]
    fn zero_move_keeps_heading() {
        let mut a = agent();
        a.apply_move(Vec2::ZERO, 1.0);
        assert_eq!(a.heading, vec2(0.0, 1.0));
        assert_eq!(a.position, pt2(0.0, 0.0));
    }

    #[test]
    fn parent_flock_comes_from_id() {
        assert_eq!(agent().parent_flock(), FlockId(1));
    }
}
