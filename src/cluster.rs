/*
 * Cluster Module
 *
 * Groups agents into connected components: two agents are linked when they are
 * within the cluster radius of each other, and a cluster is everything reachable
 * through such links. Built by flood fill over repeated radius queries, so the
 * cost is one query per agent.
 *
 * Clusters carry no identity from one pass to the next. `ClusterKey` and
 * `ClusterTracker` let callers follow a group that keeps the same members.
 */

use std::collections::VecDeque;

use ahash::{AHashMap, AHashSet};
use nannou::prelude::*;
use tracing::debug;

use crate::agent::{AgentId, AgentSnapshot, Polarity};
use crate::error::SpatialError;
use crate::spatial::{EntityHandle, LayerMask, SpatialGrid, SpatialQuery};

/// Sorted member ids: equal keys mean the same set of agents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterKey(Vec<AgentId>);

impl ClusterKey {
    pub fn ids(&self) -> &[AgentId] {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolarityCounts {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

impl PolarityCounts {
    pub fn get(&self, polarity: Polarity) -> usize {
        match polarity {
            Polarity::Positive => self.positive,
            Polarity::Neutral => self.neutral,
            Polarity::Negative => self.negative,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    members: Vec<AgentSnapshot>,
}

impl Cluster {
    pub fn new(members: Vec<AgentSnapshot>) -> Self {
        Self { members }
    }

    pub fn members(&self) -> &[AgentSnapshot] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.members.iter().any(|m| m.id == id)
    }

    /// Mean member position; zero for an empty cluster.
    pub fn centroid(&self) -> Point2 {
        if self.members.is_empty() {
            return Vec2::ZERO;
        }
        let sum = self.members.iter().fold(Vec2::ZERO, |acc, m| acc + m.position);
        sum / self.members.len() as f32
    }

    pub fn key(&self) -> ClusterKey {
        let mut ids: Vec<AgentId> = self.members.iter().map(|m| m.id).collect();
        ids.sort_unstable();
        ClusterKey(ids)
    }

    pub fn polarity_counts(&self) -> PolarityCounts {
        let mut counts = PolarityCounts::default();
        for member in &self.members {
            match member.polarity {
                Polarity::Positive => counts.positive += 1,
                Polarity::Neutral => counts.neutral += 1,
                Polarity::Negative => counts.negative += 1,
            }
        }
        counts
    }

    pub fn total_polarity_score(&self) -> i32 {
        self.members.iter().map(|m| m.polarity_score).sum()
    }

    /// Words carried by members, in member order.
    pub fn words(&self) -> impl Iterator<Item = &str> + '_ {
        self.members.iter().filter_map(|m| m.assigned_word.as_deref())
    }
}

/// Partitions agents into clusters under a fixed link distance.
#[derive(Debug, Clone)]
pub struct ClusterBuilder {
    radius: f32,
    grid: SpatialGrid,
}

impl ClusterBuilder {
    pub fn new(radius: f32) -> Result<Self, SpatialError> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(SpatialError::Misconfigured(format!(
                "cluster radius must be positive and finite, got {radius}"
            )));
        }
        Ok(Self {
            radius,
            grid: SpatialGrid::new(radius)?,
        })
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Flood fill over `agents`, finding links through `index`.
    ///
    /// Hits for agents missing from `agents` are ignored, so the index may hold
    /// more than the set being clustered.
    pub fn build(&self, agents: &[AgentSnapshot], index: &dyn SpatialQuery) -> Vec<Cluster> {
        let lookup: AHashMap<AgentId, usize> = agents.iter().enumerate().map(|(i, a)| (a.id, i)).collect();
        let mut visited = AHashSet::with_capacity(agents.len());
        let mut queue = VecDeque::new();
        let mut clusters = Vec::new();

        for seed in agents {
            if !visited.insert(seed.id) {
                continue;
            }
            queue.push_back(seed);
            let mut members = Vec::new();

            while let Some(current) = queue.pop_front() {
                members.push(current.clone());
                for hit in index.query_radius(current.position, self.radius, LayerMask::AGENTS) {
                    let EntityHandle::Agent(id) = hit.handle else {
                        continue;
                    };
                    let Some(&i) = lookup.get(&id) else {
                        continue;
                    };
                    if visited.insert(id) {
                        queue.push_back(&agents[i]);
                    }
                }
            }

            clusters.push(Cluster::new(members));
        }

        debug!(agents = agents.len(), clusters = clusters.len(), "clusters built");
        clusters
    }

    /// Like `build`, but indexes `agents` on the builder's own grid first.
    pub fn build_indexed(&mut self, agents: &[AgentSnapshot]) -> Vec<Cluster> {
        self.grid
            .rebuild(agents.iter().map(|a| (EntityHandle::Agent(a.id), a.position)));
        self.build(agents, &self.grid)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerReport {
    /// Clusters seen for at least the threshold number of consecutive passes.
    pub stable: Vec<ClusterKey>,
    /// Clusters that reached the threshold on this pass.
    pub newly_stable: Vec<ClusterKey>,
    /// Keys seen on the previous pass but not on this one.
    pub vanished: Vec<ClusterKey>,
}

/// Follows clusters across passes by their member set.
#[derive(Debug, Clone)]
pub struct ClusterTracker {
    stable_pass_threshold: u32,
    streaks: AHashMap<ClusterKey, u32>,
}

impl ClusterTracker {
    pub fn new(stable_pass_threshold: u32) -> Self {
        Self {
            stable_pass_threshold: stable_pass_threshold.max(1),
            streaks: AHashMap::new(),
        }
    }

    pub fn stable_pass_threshold(&self) -> u32 {
        self.stable_pass_threshold
    }

    /// Consecutive passes `key` has been seen, or 0.
    pub fn streak(&self, key: &ClusterKey) -> u32 {
        self.streaks.get(key).copied().unwrap_or(0)
    }

    pub fn observe(&mut self, clusters: &[Cluster]) -> TrackerReport {
        let mut report = TrackerReport::default();
        let mut seen = AHashSet::with_capacity(clusters.len());

        for cluster in clusters {
            let key = cluster.key();
            let streak = self.streaks.entry(key.clone()).or_insert(0);
            *streak += 1;
            if *streak >= self.stable_pass_threshold {
                if *streak == self.stable_pass_threshold {
                    report.newly_stable.push(key.clone());
                }
                report.stable.push(key.clone());
            }
            seen.insert(key);
        }

        self.streaks.retain(|key, _| {
            let keep = seen.contains(key);
            if !keep {
                report.vanished.push(key.clone());
            }
            keep
        });
        report.vanished.sort_unstable();
        report
    }

    pub fn reset(&mut self) {
        self.streaks.clear();
    }
}

impl Default for ClusterTracker {
    fn default() -> Self {
        Self::new(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::FlockId;
    use crate::spatial::LinearIndex;

    fn snap(flock: u32, serial: u32, x: f32, y: f32) -> AgentSnapshot {
        AgentSnapshot::new(AgentId { flock: FlockId(flock), serial }, pt2(x, y))
    }

    fn sorted_keys(clusters: &[Cluster]) -> Vec<ClusterKey> {
        let mut keys: Vec<ClusterKey> = clusters.iter().map(Cluster::key).collect();
        keys.sort();
        keys
    }

    #[test]
    fn rejects_bad_radius() {
        assert!(ClusterBuilder::new(0.0).is_err());
        assert!(ClusterBuilder::new(f32::INFINITY).is_err());
    }

    #[test]
    fn chains_link_transitively() {
        // 0-1-2 linked pairwise at distance 1, 3 is far away
        let agents = vec![
            snap(0, 0, 0.0, 0.0),
            snap(0, 1, 1.0, 0.0),
            snap(1, 0, 2.0, 0.0),
            snap(0, 2, 10.0, 0.0),
        ];
        let mut builder = ClusterBuilder::new(1.0).unwrap();
        let clusters = builder.build_indexed(&agents);
        assert_eq!(clusters.len(), 2);
        let big = clusters.iter().find(|c| c.len() == 3).unwrap();
        assert!(big.contains(agents[2].id));
        assert!((big.centroid() - pt2(1.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn agents_outside_the_input_are_ignored() {
        let agents = vec![snap(0, 0, 0.0, 0.0), snap(0, 1, 2.0, 0.0)];
        // A bridge agent the builder was not asked about
        let index = LinearIndex::new(
            agents
                .iter()
                .map(|a| (EntityHandle::Agent(a.id), a.position))
                .chain([(EntityHandle::Agent(AgentId { flock: FlockId(0), serial: 9 }), pt2(1.0, 0.0))]),
        );
        let clusters = ClusterBuilder::new(1.0).unwrap().build(&agents, &index);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn grid_and_brute_force_agree() {
        let agents: Vec<AgentSnapshot> = (0..60)
            .map(|i| {
                let i = i as f32;
                snap(0, i as u32, (i * 1.7).sin() * 8.0, (i * 0.9).cos() * 8.0)
            })
            .collect();
        let mut builder = ClusterBuilder::new(1.5).unwrap();
        let indexed = builder.build_indexed(&agents);
        let linear = LinearIndex::new(agents.iter().map(|a| (EntityHandle::Agent(a.id), a.position)));
        let brute = builder.build(&agents, &linear);
        assert_eq!(sorted_keys(&indexed), sorted_keys(&brute));
    }

    #[test]
    fn polarity_tallies() {
        let cluster = Cluster::new(vec![
            snap(0, 0, 0.0, 0.0).with_polarity(Polarity::Positive, 3),
            snap(0, 1, 0.0, 0.0).with_polarity(Polarity::Positive, 1),
            snap(0, 2, 0.0, 0.0).with_polarity(Polarity::Negative, -2),
        ]);
        let counts = cluster.polarity_counts();
        assert_eq!(counts.get(Polarity::Positive), 2);
        assert_eq!(counts.negative, 1);
        assert_eq!(counts.neutral, 0);
        assert_eq!(cluster.total_polarity_score(), 2);
    }

    #[test]
    fn empty_cluster_centroid_is_zero() {
        assert_eq!(Cluster::new(Vec::new()).centroid(), Vec2::ZERO);
    }

    #[test]
    fn key_ignores_member_order() {
        let a = Cluster::new(vec![snap(0, 1, 0.0, 0.0), snap(0, 0, 1.0, 0.0)]);
        let b = Cluster::new(vec![snap(0, 0, 1.0, 0.0), snap(0, 1, 0.0, 0.0)]);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn tracker_reports_stability_and_vanishing() {
        let pair = Cluster::new(vec![snap(0, 0, 0.0, 0.0), snap(0, 1, 1.0, 0.0)]);
        let lone = Cluster::new(vec![snap(0, 2, 5.0, 0.0)]);
        let mut tracker = ClusterTracker::new(2);

        let first = tracker.observe(&[pair.clone(), lone.clone()]);
        assert!(first.stable.is_empty());

        let second = tracker.observe(&[pair.clone(), lone.clone()]);
        assert_eq!(second.stable.len(), 2);
        assert_eq!(second.newly_stable.len(), 2);

        let third = tracker.observe(&[pair.clone()]);
        assert_eq!(third.stable, vec![pair.key()]);
        assert!(third.newly_stable.is_empty());
        assert_eq!(third.vanished, vec![lone.key()]);
        assert_eq!(tracker.streak(&lone.key()), 0);
        assert_eq!(tracker.streak(&pair.key()), 3);
    }
}
