/*
 * Flock Module
 *
 * A Flock owns a population of agents, the steering behavior that drives them
 * and the per-agent state that behavior needs between ticks. Each tick every
 * agent queries its neighbors, asks the behavior for a force, scales it by the
 * drive factor, caps it at the maximum speed and integrates.
 *
 * The spatial index handed to `update` must have been rebuilt from the current
 * positions; the flock never rebuilds it itself.
 */

use std::sync::Arc;

use ahash::AHashMap;
use nannou::prelude::*;
use tracing::{debug, warn};

use crate::agent::{Agent, AgentId, AgentSnapshot, FlockId, Polarity};
use crate::error::FlockError;
use crate::math;
use crate::params::FlockParams;
use crate::random::RandomSource;
use crate::spatial::{EntityHandle, LayerMask, SpatialHit, SpatialQuery};
use crate::steering::{RingCache, SmoothingState, SteeringBehavior, SteeringContext, SteeringScratch};
use crate::viewport::Viewport;

/// Attempts at finding a well-spaced edge position before settling.
const EDGE_SPAWN_ATTEMPTS: usize = 10;

/// The shared world a flock reads during its update.
#[derive(Clone, Copy)]
pub struct World<'a> {
    pub spatial: &'a dyn SpatialQuery,
    pub viewport: &'a Viewport,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlockTickReport {
    pub stepped: usize,
    /// Agents whose force was rejected and replaced by zero.
    pub rejected: usize,
    /// Agents whose velocity hit the speed cap.
    pub clamped: usize,
}

impl std::ops::AddAssign for FlockTickReport {
    fn add_assign(&mut self, other: Self) {
        self.stepped += other.stepped;
        self.rejected += other.rejected;
        self.clamped += other.clamped;
    }
}

/// Where freshly spawned agents are placed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpawnDistribution {
    /// Uniform inside a disk of the flock's spawn radius.
    Disk { center: Point2 },
    /// Uniform on the viewport border, spread out by the flock's minimum spacing.
    ScreenEdge { viewport: Viewport },
}

pub struct Flock {
    id: FlockId,
    name: String,
    params: FlockParams,
    behavior: Arc<SteeringBehavior>,
    agents: Vec<Agent>,
    smoothing: AHashMap<AgentId, SmoothingState>,
    rings: RingCache,
    next_serial: u32,
}

impl Flock {
    pub fn new(
        id: FlockId,
        name: impl Into<String>,
        params: FlockParams,
        behavior: Arc<SteeringBehavior>,
    ) -> Result<Self, FlockError> {
        params.validate()?;
        behavior.validate()?;
        Ok(Self {
            id,
            name: name.into(),
            params,
            behavior,
            agents: Vec::new(),
            smoothing: AHashMap::new(),
            rings: RingCache::default(),
            next_serial: 0,
        })
    }

    pub fn id(&self) -> FlockId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &FlockParams {
        &self.params
    }

    pub fn set_params(&mut self, params: FlockParams) -> Result<(), FlockError> {
        params.validate()?;
        self.params = params;
        Ok(())
    }

    pub fn behavior(&self) -> &Arc<SteeringBehavior> {
        &self.behavior
    }

    /// Swap the steering behavior. Spring state is dropped since its slots
    /// belonged to the old behavior tree.
    pub fn set_behavior(&mut self, behavior: Arc<SteeringBehavior>) -> Result<(), FlockError> {
        behavior.validate()?;
        self.behavior = behavior;
        self.smoothing.clear();
        Ok(())
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id() == id)
    }

    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.iter_mut().find(|a| a.id() == id)
    }

    pub fn contains(&self, id: AgentId) -> bool {
        id.flock == self.id && self.agent(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn snapshots(&self) -> impl Iterator<Item = AgentSnapshot> + '_ {
        self.agents.iter().map(Agent::snapshot)
    }

    pub fn smoothing_state(&self, id: AgentId) -> Option<&SmoothingState> {
        self.smoothing.get(&id)
    }

    /// Advance every agent by `dt` seconds.
    pub fn update(&mut self, dt: f32, world: World<'_>, rng: &mut dyn RandomSource) -> FlockTickReport {
        let mut report = FlockTickReport::default();
        if self.agents.is_empty() {
            return report;
        }

        // Everyone reads start-of-tick positions, whatever order they move in
        let population: Vec<(AgentId, Point2)> = self.agents.iter().map(|a| (a.id(), a.position)).collect();
        self.rings.clear();

        let max_speed = self.params.max_speed;
        let square_max_speed = self.params.square_max_speed();

        for (index, &(id, position)) in population.iter().enumerate() {
            let neighbors: Vec<SpatialHit> = world
                .spatial
                .query_radius(position, self.params.neighbor_radius, LayerMask::AGENTS)
                .into_iter()
                .filter(|hit| hit.handle != EntityHandle::Agent(id))
                .collect();

            let ctx = SteeringContext {
                agent: id,
                position,
                neighbors: &neighbors,
                params: &self.params,
                spatial: world.spatial,
                viewport: world.viewport,
                population: &population,
                dt,
            };
            let smoothing = self.smoothing.entry(id).or_default();
            smoothing.rewind();
            let mut scratch = SteeringScratch {
                smoothing,
                rings: &mut self.rings,
                rng: &mut *rng,
            };

            let force = match self.behavior.compute_force(&ctx, &mut scratch) {
                Ok(force) => force,
                Err(err) => {
                    warn!(flock = %self.name, agent = ?id, error = %err, "steering force rejected");
                    report.rejected += 1;
                    Vec2::ZERO
                }
            };

            let mut velocity = force * self.params.drive_factor;
            if !math::is_finite(velocity) {
                warn!(flock = %self.name, agent = ?id, "drive factor overflowed the force");
                report.rejected += 1;
                velocity = Vec2::ZERO;
            }
            if velocity.length_squared() > square_max_speed {
                velocity = math::clamp_length(velocity, max_speed);
                report.clamped += 1;
            }

            self.agents[index].apply_move(velocity, dt);
            report.stepped += 1;
        }

        debug!(
            flock = %self.name,
            stepped = report.stepped,
            rejected = report.rejected,
            clamped = report.clamped,
            "flock updated"
        );
        report
    }

    fn push_agent(&mut self, position: Point2, polarity: Polarity, polarity_score: i32, rng: &mut dyn RandomSource) -> AgentId {
        let id = AgentId {
            flock: self.id,
            serial: self.next_serial,
        };
        self.next_serial += 1;
        let angle = rng.uniform_angle();
        self.agents
            .push(Agent::new(id, position, vec2(angle.cos(), angle.sin()), polarity, polarity_score));
        id
    }

    fn spawn_positions(&self, count: usize, distribution: &SpawnDistribution, rng: &mut dyn RandomSource) -> Vec<Point2> {
        match distribution {
            SpawnDistribution::Disk { center } => (0..count)
                .map(|_| *center + rng.uniform_in_disk(self.params.spawn_radius))
                .collect(),
            SpawnDistribution::ScreenEdge { viewport } => {
                let spacing = self.params.min_spawn_spacing;
                let mut picked: Vec<Point2> = Vec::with_capacity(count);
                for _ in 0..count {
                    let clearance = |p: Point2| picked.iter().map(|q| q.distance(p)).fold(f32::INFINITY, f32::min);

                    let mut best = viewport.random_edge_point(rng);
                    let mut best_clearance = clearance(best);
                    let mut attempts = 1;
                    while best_clearance < spacing && attempts < EDGE_SPAWN_ATTEMPTS {
                        let candidate = viewport.random_edge_point(rng);
                        let candidate_clearance = clearance(candidate);
                        if candidate_clearance > best_clearance {
                            best = candidate;
                            best_clearance = candidate_clearance;
                        }
                        attempts += 1;
                    }
                    picked.push(best);
                }
                picked
            }
        }
    }

    pub fn spawn_agents(
        &mut self,
        count: usize,
        distribution: &SpawnDistribution,
        polarity: Polarity,
        polarity_score: i32,
        rng: &mut dyn RandomSource,
    ) -> Vec<AgentId> {
        let positions = self.spawn_positions(count, distribution, rng);
        let ids: Vec<AgentId> = positions
            .into_iter()
            .map(|p| self.push_agent(p, polarity, polarity_score, rng))
            .collect();
        debug!(flock = %self.name, count = ids.len(), ?polarity, "spawned agents");
        ids
    }

    /// Spawn `count` agents of one polarity in a disk around `center`.
    pub fn spawn_agents_with_polarity(
        &mut self,
        polarity: Polarity,
        center: Point2,
        count: usize,
        rng: &mut dyn RandomSource,
    ) -> Vec<AgentId> {
        let score = self.params.polarity_score;
        self.spawn_agents(count, &SpawnDistribution::Disk { center }, polarity, score, rng)
    }

    /// Replace the whole population with one agent per word.
    pub fn spawn_agents_with_words<S: AsRef<str>>(
        &mut self,
        polarities: &[Polarity],
        words: &[S],
        distribution: &SpawnDistribution,
        rng: &mut dyn RandomSource,
    ) -> Result<Vec<AgentId>, FlockError> {
        if polarities.len() != words.len() {
            return Err(FlockError::SpawnMismatch {
                polarities: polarities.len(),
                words: words.len(),
            });
        }

        self.clear_agents();
        let score = self.params.polarity_score;
        let positions = self.spawn_positions(words.len(), distribution, rng);
        let mut ids = Vec::with_capacity(words.len());
        for ((position, &polarity), word) in positions.into_iter().zip(polarities).zip(words) {
            let id = self.push_agent(position, polarity, score, rng);
            if let Some(agent) = self.agents.last_mut() {
                agent.assigned_word = Some(word.as_ref().to_owned());
            }
            ids.push(id);
        }
        debug!(flock = %self.name, count = ids.len(), "spawned word agents");
        Ok(ids)
    }

    pub fn spawn_starting_agents(&mut self, center: Point2, rng: &mut dyn RandomSource) -> Vec<AgentId> {
        let count = self.params.starting_count;
        let polarity = self.params.default_polarity;
        let score = self.params.polarity_score;
        self.spawn_agents(count, &SpawnDistribution::Disk { center }, polarity, score, rng)
    }

    pub fn spawn_agent_at(
        &mut self,
        position: Point2,
        polarity: Polarity,
        polarity_score: i32,
        rng: &mut dyn RandomSource,
    ) -> AgentId {
        self.push_agent(position, polarity, polarity_score, rng)
    }

    /// Remove one agent. Returns false if it isn't a member of this flock.
    pub fn remove_agent(&mut self, id: AgentId) -> bool {
        let Some(index) = self.agents.iter().position(|a| a.id() == id) else {
            return false;
        };
        self.agents.remove(index);
        self.smoothing.remove(&id);
        true
    }

    pub fn clear_agents(&mut self) {
        self.agents.clear();
        self.smoothing.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{LinearIndex, SpatialGrid};
    use crate::steering::{AttractionParams, CompositeBehavior, StayInRadiusParams};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn flock_with(params: FlockParams, behavior: SteeringBehavior) -> Flock {
        Flock::new(FlockId(0), "test", params, Arc::new(behavior)).unwrap()
    }

    fn world_grid(flock: &Flock) -> SpatialGrid {
        let mut grid = SpatialGrid::new(2.0).unwrap();
        grid.rebuild(flock.agents().iter().map(|a| (EntityHandle::Agent(a.id()), a.position)));
        grid
    }

    fn viewport() -> Viewport {
        Viewport::new(pt2(0.0, 0.0), 40.0, 30.0).unwrap()
    }

    #[test]
    fn rejects_invalid_setup() {
        let bad_params = FlockParams { max_speed: -1.0, ..Default::default() };
        assert!(Flock::new(FlockId(0), "x", bad_params, Arc::new(SteeringBehavior::Cohesion)).is_err());

        let bad_behavior = SteeringBehavior::Composite(CompositeBehavior {
            behaviors: vec![SteeringBehavior::Cohesion],
            weights: vec![],
        });
        let err = Flock::new(FlockId(0), "x", FlockParams::default(), Arc::new(bad_behavior)).err();
        assert!(matches!(err, Some(FlockError::Behavior(_))));
    }

    #[test]
    fn spawned_agents_belong_to_the_flock() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut flock = flock_with(FlockParams::default(), SteeringBehavior::Cohesion);
        let ids = flock.spawn_agents(25, &SpawnDistribution::Disk { center: pt2(3.0, 3.0) }, Polarity::Negative, -2, &mut rng);
        assert_eq!(ids.len(), 25);
        assert_eq!(flock.len(), 25);
        for agent in flock.agents() {
            assert_eq!(agent.parent_flock(), FlockId(0));
            assert_eq!(agent.polarity, Polarity::Negative);
            assert_eq!(agent.polarity_score, -2);
            assert!(agent.position.distance(pt2(3.0, 3.0)) <= 5.0 + 1e-4);
        }
    }

    #[test]
    fn removal_is_idempotent_and_ids_are_not_reused() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut flock = flock_with(FlockParams::default(), SteeringBehavior::Cohesion);
        let ids = flock.spawn_agents_with_polarity(Polarity::Positive, Vec2::ZERO, 3, &mut rng);
        assert!(flock.remove_agent(ids[1]));
        assert!(!flock.remove_agent(ids[1]));
        assert_eq!(flock.len(), 2);
        assert!(!flock.contains(ids[1]));

        let other = AgentId { flock: FlockId(9), serial: 0 };
        assert!(!flock.remove_agent(other));

        let fresh = flock.spawn_agent_at(Vec2::ZERO, Polarity::Neutral, 0, &mut rng);
        assert!(!ids.contains(&fresh));
    }

    #[test]
    fn word_spawn_checks_lengths_before_clearing() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut flock = flock_with(FlockParams::default(), SteeringBehavior::Cohesion);
        flock.spawn_starting_agents(Vec2::ZERO, &mut rng);
        let before = flock.len();

        let err = flock.spawn_agents_with_words(&[Polarity::Positive], &["a", "b"], &SpawnDistribution::Disk { center: Vec2::ZERO }, &mut rng);
        assert_eq!(err, Err(FlockError::SpawnMismatch { polarities: 1, words: 2 }));
        assert_eq!(flock.len(), before);

        let ids = flock
            .spawn_agents_with_words(
                &[Polarity::Positive, Polarity::Negative],
                &["sun", "rain"],
                &SpawnDistribution::ScreenEdge { viewport: viewport() },
                &mut rng,
            )
            .unwrap();
        assert_eq!(flock.len(), 2);
        assert_eq!(flock.agent(ids[1]).unwrap().assigned_word.as_deref(), Some("rain"));
        assert_eq!(flock.agent(ids[1]).unwrap().polarity, Polarity::Negative);
    }

    #[test]
    fn edge_spawn_stays_on_the_border() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut flock = flock_with(FlockParams::default(), SteeringBehavior::Cohesion);
        let vp = viewport();
        flock.spawn_agents(40, &SpawnDistribution::ScreenEdge { viewport: vp }, Polarity::Neutral, 0, &mut rng);
        for agent in flock.agents() {
            let n = vp.to_normalized(agent.position);
            let on_border = n.x.abs() < 1e-4 || (n.x - 1.0).abs() < 1e-4 || n.y.abs() < 1e-4 || (n.y - 1.0).abs() < 1e-4;
            assert!(on_border);
        }
    }

    #[test]
    fn edge_spawn_spreads_a_small_batch() {
        // 140 units of border for 8 agents: spacing 3 is always reachable in 10 tries
        // with overwhelming probability, so most pairs end up well apart
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let params = FlockParams { min_spawn_spacing: 3.0, ..Default::default() };
        let mut flock = flock_with(params, SteeringBehavior::Cohesion);
        flock.spawn_agents(8, &SpawnDistribution::ScreenEdge { viewport: viewport() }, Polarity::Neutral, 0, &mut rng);
        let positions: Vec<Point2> = flock.agents().iter().map(|a| a.position).collect();
        let mut close_pairs = 0;
        for i in 0..positions.len() {
            for j in i + 1..positions.len() {
                if positions[i].distance(positions[j]) < 3.0 {
                    close_pairs += 1;
                }
            }
        }
        assert_eq!(close_pairs, 0);
    }

    #[test]
    fn update_clamps_speed_and_faces_motion() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let params = FlockParams { neighbor_radius: 3.0, ..Default::default() };
        let mut flock = flock_with(params, SteeringBehavior::Cohesion);
        let a = flock.spawn_agent_at(pt2(0.0, 0.0), Polarity::Neutral, 0, &mut rng);
        flock.spawn_agent_at(pt2(2.0, 0.0), Polarity::Neutral, 0, &mut rng);

        let grid = world_grid(&flock);
        let vp = viewport();
        let report = flock.update(1.0, World { spatial: &grid, viewport: &vp }, &mut rng);
        assert_eq!(report.stepped, 2);
        assert_eq!(report.clamped, 2);

        let agent = flock.agent(a).unwrap();
        assert!((agent.position - pt2(5.0, 0.0)).length() < 1e-4);
        assert!((agent.heading - vec2(1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn isolated_agent_keeps_still_and_heading() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut flock = flock_with(FlockParams::default(), SteeringBehavior::Cohesion);
        let id = flock.spawn_agent_at(pt2(1.0, 1.0), Polarity::Neutral, 0, &mut rng);
        let heading = flock.agent(id).unwrap().heading;

        let index = LinearIndex::new(flock.agents().iter().map(|a| (EntityHandle::Agent(a.id()), a.position)));
        let vp = viewport();
        flock.update(0.5, World { spatial: &index, viewport: &vp }, &mut rng);
        let agent = flock.agent(id).unwrap();
        assert_eq!(agent.position, pt2(1.0, 1.0));
        assert_eq!(agent.heading, heading);
    }

    #[test]
    fn broken_behavior_only_zeroes_the_force() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let mut flock = flock_with(FlockParams::default(), SteeringBehavior::Cohesion);
        flock.spawn_agent_at(pt2(0.0, 0.0), Polarity::Neutral, 0, &mut rng);
        flock.spawn_agent_at(pt2(1.0, 0.0), Polarity::Neutral, 0, &mut rng);
        // Bypass validation the way a hand-built tree could
        flock.behavior = Arc::new(SteeringBehavior::Composite(CompositeBehavior {
            behaviors: vec![SteeringBehavior::Cohesion],
            weights: vec![1.0, 2.0],
        }));

        let grid = world_grid(&flock);
        let vp = viewport();
        let report = flock.update(1.0, World { spatial: &grid, viewport: &vp }, &mut rng);
        assert_eq!(report.rejected, 2);
        assert_eq!(flock.agents()[0].position, pt2(0.0, 0.0));
    }

    #[test]
    fn smoothing_state_is_per_agent_and_dropped_on_removal() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let behavior = SteeringBehavior::Composite(CompositeBehavior::weighted([
            (SteeringBehavior::Attraction(AttractionParams::default()), 5.0),
            (SteeringBehavior::StayInRadius(StayInRadiusParams::default()), 1.0),
        ]));
        let mut flock = flock_with(FlockParams::default(), behavior);
        let a = flock.spawn_agent_at(pt2(1.0, 0.0), Polarity::Neutral, 0, &mut rng);
        let b = flock.spawn_agent_at(pt2(0.0, 3.0), Polarity::Neutral, 0, &mut rng);

        let mut grid = SpatialGrid::new(2.0).unwrap();
        let mut entities: Vec<(EntityHandle, Point2)> =
            flock.agents().iter().map(|x| (EntityHandle::Agent(x.id()), x.position)).collect();
        entities.push((EntityHandle::Attractor(crate::spatial::AttractorId(0)), pt2(0.0, 0.0)));
        grid.rebuild(entities);

        let vp = viewport();
        flock.update(1.0 / 60.0, World { spatial: &grid, viewport: &vp }, &mut rng);

        // The spring runs at any distance; each agent's slot tracks its own radius
        let slot_a = flock.smoothing_state(a).unwrap().slot(0).unwrap();
        let slot_b = flock.smoothing_state(b).unwrap().slot(0).unwrap();
        assert_ne!(slot_a, Vec2::ZERO);
        assert_ne!(slot_b, Vec2::ZERO);
        assert_ne!(slot_a, slot_b);

        assert!(flock.remove_agent(a));
        assert!(flock.smoothing_state(a).is_none());
        assert_eq!(flock.smoothing_state(b).unwrap().slot(0), Some(slot_b));
    }
}
