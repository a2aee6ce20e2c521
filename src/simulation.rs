/*
 * Simulation Module
 *
 * The Simulation owns everything that lives in the world: the flocks and their
 * agents, predators, attractors, the viewport, the spatial grid and the seeded
 * random number generator. It is the only place the grid is rebuilt, so every
 * flock in a step reads the same start-of-step snapshot of the world.
 *
 * Stepping happens either directly with `step(dt)` or through `advance`, which
 * feeds wall-clock frame time into a fixed-timestep accumulator.
 */

use std::sync::Arc;
use std::time::Duration;

use nannou::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::agent::{AgentId, AgentSnapshot, FlockId, Polarity};
use crate::cluster::{Cluster, ClusterBuilder};
use crate::config::SimConfig;
use crate::error::{ConfigError, FlockError, SpatialError};
use crate::flock::{Flock, FlockTickReport, SpawnDistribution, World};
use crate::params::FlockParams;
use crate::spatial::{AttractorId, EntityHandle, LayerMask, PredatorId, SpatialGrid, SpatialQuery};
use crate::steering::SteeringBehavior;
use crate::viewport::Viewport;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    pub tick: u64,
    pub agents: usize,
    pub flocks: FlockTickReport,
}

pub struct Simulation {
    flocks: Vec<Flock>,
    predators: Vec<(PredatorId, Point2)>,
    attractors: Vec<(AttractorId, Point2)>,
    next_flock: u32,
    next_predator: u32,
    next_attractor: u32,
    viewport: Viewport,
    grid: SpatialGrid,
    rng: ChaCha8Rng,
    cluster_builder: ClusterBuilder,
    tick: u64,
    last_report: StepReport,
    // Fixed timestep
    step_size: Duration,
    accumulator: Duration,
    max_catch_up_steps: usize,
}

impl Simulation {
    pub fn new(viewport: Viewport, grid_cell_size: f32, cluster_radius: f32, seed: u64) -> Result<Self, SpatialError> {
        Ok(Self {
            flocks: Vec::new(),
            predators: Vec::new(),
            attractors: Vec::new(),
            next_flock: 0,
            next_predator: 0,
            next_attractor: 0,
            viewport,
            grid: SpatialGrid::new(grid_cell_size)?,
            rng: ChaCha8Rng::seed_from_u64(seed),
            cluster_builder: ClusterBuilder::new(cluster_radius)?,
            tick: 0,
            last_report: StepReport::default(),
            step_size: Duration::from_secs_f32(1.0 / 60.0),
            accumulator: Duration::ZERO,
            max_catch_up_steps: 5,
        })
    }

    /// Build the world described by `config` and spawn every flock's initial
    /// population.
    pub fn from_config(config: &SimConfig) -> Result<Self, ConfigError> {
        let viewport = Viewport::new(config.viewport.center(), config.viewport.width, config.viewport.height)?;
        let mut sim = Self::new(viewport, config.grid_cell_size, config.cluster_radius, config.seed)?;
        sim.set_step_rate(config.step_hz)?;
        sim.max_catch_up_steps = config.max_catch_up_steps.max(1);

        for p in &config.predators {
            sim.add_predator(pt2(p[0], p[1]));
        }
        for p in &config.attractors {
            sim.add_attractor(pt2(p[0], p[1]));
        }

        for flock_config in &config.flocks {
            let wrap = |source: FlockError| ConfigError::Flock {
                name: flock_config.name.clone(),
                source,
            };
            let id = sim
                .add_flock(
                    flock_config.name.clone(),
                    flock_config.params.clone(),
                    Arc::new(flock_config.behavior.clone()),
                )
                .map_err(wrap)?;

            let spawn = &flock_config.spawn;
            let distribution = if spawn.on_screen_edge {
                SpawnDistribution::ScreenEdge { viewport }
            } else {
                SpawnDistribution::Disk { center: spawn.center() }
            };

            let Simulation { flocks, rng, .. } = &mut sim;
            let flock = flocks
                .iter_mut()
                .find(|f| f.id() == id)
                .ok_or_else(|| wrap(FlockError::UnknownFlock(id)))?;

            if !spawn.words.is_empty() {
                let polarities: Vec<Polarity> = spawn.words.iter().map(|w| w.polarity).collect();
                let words: Vec<&str> = spawn.words.iter().map(|w| w.text.as_str()).collect();
                flock
                    .spawn_agents_with_words(&polarities, &words, &distribution, rng)
                    .map_err(wrap)?;
            } else {
                let count = spawn.count.unwrap_or(flock.params().starting_count);
                let polarity = spawn.polarity.unwrap_or(flock.params().default_polarity);
                let score = flock.params().polarity_score;
                flock.spawn_agents(count, &distribution, polarity, score, rng);
            }
        }

        info!(
            flocks = sim.flocks.len(),
            agents = sim.agent_count(),
            predators = sim.predators.len(),
            attractors = sim.attractors.len(),
            seed = config.seed,
            "simulation built from config"
        );
        Ok(sim)
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn last_report(&self) -> StepReport {
        self.last_report
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn step_size(&self) -> Duration {
        self.step_size
    }

    pub fn set_step_rate(&mut self, hz: f32) -> Result<(), SpatialError> {
        if !hz.is_finite() || hz <= 0.0 {
            return Err(SpatialError::Misconfigured(format!(
                "step rate must be positive and finite, got {hz}"
            )));
        }
        self.step_size = Duration::from_secs_f32(1.0 / hz);
        Ok(())
    }

    pub fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    pub fn cluster_radius(&self) -> f32 {
        self.cluster_builder.radius()
    }

    pub fn set_cluster_radius(&mut self, radius: f32) -> Result<(), SpatialError> {
        self.cluster_builder = ClusterBuilder::new(radius)?;
        Ok(())
    }

    // Flocks

    pub fn add_flock(
        &mut self,
        name: impl Into<String>,
        params: FlockParams,
        behavior: Arc<SteeringBehavior>,
    ) -> Result<FlockId, FlockError> {
        let id = FlockId(self.next_flock);
        let flock = Flock::new(id, name, params, behavior)?;
        self.next_flock += 1;
        info!(flock = flock.name(), id = id.0, "flock added");
        self.flocks.push(flock);
        Ok(id)
    }

    pub fn flocks(&self) -> &[Flock] {
        &self.flocks
    }

    pub fn flock(&self, id: FlockId) -> Option<&Flock> {
        self.flocks.iter().find(|f| f.id() == id)
    }

    pub fn flock_mut(&mut self, id: FlockId) -> Option<&mut Flock> {
        self.flocks.iter_mut().find(|f| f.id() == id)
    }

    /// A flock and the simulation's RNG, borrowed together for spawning.
    fn flock_and_rng(&mut self, id: FlockId) -> Result<(&mut Flock, &mut ChaCha8Rng), FlockError> {
        let Simulation { flocks, rng, .. } = self;
        let flock = flocks
            .iter_mut()
            .find(|f| f.id() == id)
            .ok_or(FlockError::UnknownFlock(id))?;
        Ok((flock, rng))
    }

    pub fn spawn_agents(
        &mut self,
        flock: FlockId,
        count: usize,
        distribution: &SpawnDistribution,
        polarity: Polarity,
        polarity_score: i32,
    ) -> Result<Vec<AgentId>, FlockError> {
        let (flock, rng) = self.flock_and_rng(flock)?;
        Ok(flock.spawn_agents(count, distribution, polarity, polarity_score, rng))
    }

    pub fn spawn_agents_with_polarity(
        &mut self,
        flock: FlockId,
        polarity: Polarity,
        center: Point2,
        count: usize,
    ) -> Result<Vec<AgentId>, FlockError> {
        let (flock, rng) = self.flock_and_rng(flock)?;
        Ok(flock.spawn_agents_with_polarity(polarity, center, count, rng))
    }

    pub fn spawn_agents_with_words<S: AsRef<str>>(
        &mut self,
        flock: FlockId,
        polarities: &[Polarity],
        words: &[S],
        distribution: &SpawnDistribution,
    ) -> Result<Vec<AgentId>, FlockError> {
        let (flock, rng) = self.flock_and_rng(flock)?;
        flock.spawn_agents_with_words(polarities, words, distribution, rng)
    }

    pub fn spawn_starting_agents(&mut self, flock: FlockId, center: Point2) -> Result<Vec<AgentId>, FlockError> {
        let (flock, rng) = self.flock_and_rng(flock)?;
        Ok(flock.spawn_starting_agents(center, rng))
    }

    pub fn spawn_agent_at(
        &mut self,
        flock: FlockId,
        position: Point2,
        polarity: Polarity,
        polarity_score: i32,
    ) -> Result<AgentId, FlockError> {
        let (flock, rng) = self.flock_and_rng(flock)?;
        Ok(flock.spawn_agent_at(position, polarity, polarity_score, rng))
    }

    /// Remove an agent from whichever flock owns it.
    pub fn remove_agent(&mut self, id: AgentId) -> bool {
        self.flock_mut(id.flock).map_or(false, |f| f.remove_agent(id))
    }

    /// Drop every agent and reset the step counter. Flocks, predators and
    /// attractors stay.
    pub fn clear_agents(&mut self) {
        for flock in &mut self.flocks {
            flock.clear_agents();
        }
        self.tick = 0;
        self.accumulator = Duration::ZERO;
    }

    pub fn agent_count(&self) -> usize {
        self.flocks.iter().map(Flock::len).sum()
    }

    pub fn agents(&self) -> Vec<AgentSnapshot> {
        self.flocks.iter().flat_map(Flock::snapshots).collect()
    }

    // Predators and attractors

    pub fn add_predator(&mut self, position: Point2) -> PredatorId {
        let id = PredatorId(self.next_predator);
        self.next_predator += 1;
        self.predators.push((id, position));
        id
    }

    pub fn move_predator(&mut self, id: PredatorId, position: Point2) -> bool {
        match self.predators.iter_mut().find(|(p, _)| *p == id) {
            Some(entry) => {
                entry.1 = position;
                true
            }
            None => false,
        }
    }

    pub fn remove_predator(&mut self, id: PredatorId) -> bool {
        let before = self.predators.len();
        self.predators.retain(|(p, _)| *p != id);
        self.predators.len() != before
    }

    pub fn predators(&self) -> &[(PredatorId, Point2)] {
        &self.predators
    }

    pub fn add_attractor(&mut self, position: Point2) -> AttractorId {
        let id = AttractorId(self.next_attractor);
        self.next_attractor += 1;
        self.attractors.push((id, position));
        id
    }

    pub fn move_attractor(&mut self, id: AttractorId, position: Point2) -> bool {
        match self.attractors.iter_mut().find(|(a, _)| *a == id) {
            Some(entry) => {
                entry.1 = position;
                true
            }
            None => false,
        }
    }

    pub fn remove_attractor(&mut self, id: AttractorId) -> bool {
        let before = self.attractors.len();
        self.attractors.retain(|(a, _)| *a != id);
        self.attractors.len() != before
    }

    pub fn attractors(&self) -> &[(AttractorId, Point2)] {
        &self.attractors
    }

    // Stepping

    fn rebuild_grid(&mut self) {
        let agents = self
            .flocks
            .iter()
            .flat_map(|f| f.agents().iter().map(|a| (EntityHandle::Agent(a.id()), a.position)));
        let predators = self.predators.iter().map(|&(id, p)| (EntityHandle::Predator(id), p));
        let attractors = self.attractors.iter().map(|&(id, p)| (EntityHandle::Attractor(id), p));
        self.grid.rebuild(agents.chain(predators).chain(attractors));
    }

    /// Advance every flock by `dt` seconds.
    pub fn step(&mut self, dt: f32) -> StepReport {
        if !dt.is_finite() || dt <= 0.0 {
            warn!(dt, "ignoring step with non-positive time delta");
            return StepReport {
                tick: self.tick,
                agents: self.agent_count(),
                flocks: FlockTickReport::default(),
            };
        }

        self.rebuild_grid();
        let world = World {
            spatial: &self.grid,
            viewport: &self.viewport,
        };

        let mut totals = FlockTickReport::default();
        for flock in &mut self.flocks {
            totals += flock.update(dt, world, &mut self.rng);
        }
        self.tick += 1;

        let report = StepReport {
            tick: self.tick,
            agents: self.agent_count(),
            flocks: totals,
        };
        debug!(tick = report.tick, agents = report.agents, rejected = totals.rejected, "step");
        self.last_report = report;
        report
    }

    /// Feed `frame_time` into the accumulator and run the fixed steps it pays for.
    ///
    /// At most `max_catch_up_steps` run per call; time beyond that is dropped so
    /// a long stall can't snowball. Returns the number of steps run.
    pub fn advance(&mut self, frame_time: Duration) -> usize {
        self.accumulator += frame_time;
        let dt = self.step_size.as_secs_f32();

        let mut steps = 0;
        while self.accumulator >= self.step_size && steps < self.max_catch_up_steps {
            self.step(dt);
            self.accumulator -= self.step_size;
            steps += 1;
        }
        if self.accumulator >= self.step_size {
            debug!(dropped = ?self.accumulator, "simulation fell behind, dropping time");
            self.accumulator = Duration::ZERO;
        }
        steps
    }

    /// Fraction of a step left in the accumulator, for interpolated drawing.
    pub fn interpolation_alpha(&self) -> f32 {
        (self.accumulator.as_secs_f32() / self.step_size.as_secs_f32()).clamp(0.0, 1.0)
    }

    // Clustering

    /// Cluster every agent of every flock at the current positions.
    pub fn build_clusters(&mut self) -> Vec<Cluster> {
        self.rebuild_grid();
        let agents = self.agents();
        self.cluster_builder.build(&agents, &self.grid)
    }

    /// Every agent of a listed polarity within `radius` of `center` has its flock
    /// spawn `spawn_per_agent` more of the same polarity around `center`.
    /// Returns the number of agents spawned.
    pub fn multiply_near(&mut self, center: Point2, radius: f32, polarities: &[Polarity], spawn_per_agent: usize) -> usize {
        self.rebuild_grid();
        let mut hits = self.grid.query_radius(center, radius, LayerMask::AGENTS);
        hits.sort_by_key(|hit| hit.handle);

        let matches: Vec<(FlockId, Polarity)> = hits
            .iter()
            .filter_map(|hit| hit.handle.agent())
            .filter_map(|id| {
                let agent = self.flock(id.flock)?.agent(id)?;
                polarities.contains(&agent.polarity).then_some((id.flock, agent.polarity))
            })
            .collect();

        let mut spawned = 0;
        for (flock, polarity) in matches {
            if let Ok(ids) = self.spawn_agents_with_polarity(flock, polarity, center, spawn_per_agent) {
                spawned += ids.len();
            }
        }
        debug!(spawned, "multiplied agents");
        spawned
    }
}
