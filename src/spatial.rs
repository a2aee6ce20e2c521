/*
 * Spatial Module
 *
 * This module defines the radius-query interface consumed by the flock, the
 * steering behaviors and the cluster builder, plus the hash grid that backs it.
 * The grid divides the plane into square cells so a radius query only visits the
 * cells the query circle can touch instead of scanning every entity.
 *
 * The grid is rebuilt once per tick; queries always reflect the state at the
 * moment of the last rebuild.
 */

use ahash::AHashMap;
use bitflags::bitflags;
use nannou::prelude::*;

use crate::agent::AgentId;
use crate::error::SpatialError;

bitflags! {
    /// Which kinds of entity a query should return.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    #[serde(transparent)]
    pub struct LayerMask: u8 {
        const AGENTS = 1 << 0;
        const PREDATORS = 1 << 1;
        const ATTRACTORS = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PredatorId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttractorId(pub u32);

/// Anything that can be found by a spatial query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityHandle {
    Agent(AgentId),
    Predator(PredatorId),
    Attractor(AttractorId),
}

impl EntityHandle {
    pub fn layer(&self) -> LayerMask {
        match self {
            EntityHandle::Agent(_) => LayerMask::AGENTS,
            EntityHandle::Predator(_) => LayerMask::PREDATORS,
            EntityHandle::Attractor(_) => LayerMask::ATTRACTORS,
        }
    }

    pub fn agent(&self) -> Option<AgentId> {
        match self {
            EntityHandle::Agent(id) => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialHit {
    pub handle: EntityHandle,
    pub position: Point2,
}

/// Radius query against whatever structure indexes the world.
pub trait SpatialQuery {
    /// Every entity on one of `layers` within `radius` of `center` (inclusive).
    fn query_radius(&self, center: Point2, radius: f32, layers: LayerMask) -> Vec<SpatialHit>;
}

/// Uniform hash grid over an unbounded plane.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f32,
    cells: AHashMap<(i32, i32), Vec<usize>>,
    entries: Vec<SpatialHit>,
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Result<Self, SpatialError> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(SpatialError::Misconfigured(format!(
                "grid cell size must be positive and finite, got {cell_size}"
            )));
        }
        Ok(Self {
            cell_size,
            cells: AHashMap::new(),
            entries: Vec::new(),
        })
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    fn cell_of(&self, position: Point2) -> (i32, i32) {
        (
            (position.x / self.cell_size).floor() as i32,
            (position.y / self.cell_size).floor() as i32,
        )
    }

    // Keep allocated cell vectors around between rebuilds
    pub fn clear(&mut self) {
        for cell in self.cells.values_mut() {
            cell.clear();
        }
        self.entries.clear();
    }

    pub fn insert(&mut self, handle: EntityHandle, position: Point2) {
        let cell = self.cell_of(position);
        let index = self.entries.len();
        self.entries.push(SpatialHit { handle, position });
        self.cells.entry(cell).or_default().push(index);
    }

    /// Replace the whole contents of the grid.
    pub fn rebuild<I>(&mut self, entities: I)
    where
        I: IntoIterator<Item = (EntityHandle, Point2)>,
    {
        self.clear();
        for (handle, position) in entities {
            self.insert(handle, position);
        }
        self.cells.retain(|_, cell| !cell.is_empty());
    }
}

impl SpatialQuery for SpatialGrid {
    fn query_radius(&self, center: Point2, radius: f32, layers: LayerMask) -> Vec<SpatialHit> {
        let mut result = Vec::new();
        if radius < 0.0 || !radius.is_finite() || layers.is_empty() {
            return result;
        }

        let radius_sq = radius * radius;
        let min = self.cell_of(center - vec2(radius, radius));
        let max = self.cell_of(center + vec2(radius, radius));

        for cy in min.1..=max.1 {
            for cx in min.0..=max.0 {
                let Some(cell) = self.cells.get(&(cx, cy)) else {
                    continue;
                };
                for &index in cell {
                    let hit = self.entries[index];
                    if !layers.intersects(hit.handle.layer()) {
                        continue;
                    }
                    if hit.position.distance_squared(center) <= radius_sq {
                        result.push(hit);
                    }
                }
            }
        }

        result
    }
}

/// Brute-force index: checks every entity. Handy for small worlds and as a
/// reference when testing the grid.
#[derive(Debug, Clone, Default)]
pub struct LinearIndex {
    entries: Vec<SpatialHit>,
}

impl LinearIndex {
    pub fn new<I>(entities: I) -> Self
    where
        I: IntoIterator<Item = (EntityHandle, Point2)>,
    {
        Self {
            entries: entities
                .into_iter()
                .map(|(handle, position)| SpatialHit { handle, position })
                .collect(),
        }
    }
}

impl SpatialQuery for LinearIndex {
    fn query_radius(&self, center: Point2, radius: f32, layers: LayerMask) -> Vec<SpatialHit> {
        let radius_sq = radius * radius;
        self.entries
            .iter()
            .filter(|hit| layers.intersects(hit.handle.layer()))
            .filter(|hit| hit.position.distance_squared(center) <= radius_sq)
            .copied()
            .collect()
    }
}
