/*
 * Attraction / Orbit Behavior
 *
 * Agents that sense attractors gather on a ring around the attractors'
 * centroid. Newcomers head for the middle of the widest free arc on the ring,
 * agents already on it circle tangentially while a damped radial spring holds
 * them at the ring radius. A hysteresis band around the ring blends the two
 * modes so agents don't chatter on the boundary.
 */

use std::f32::consts::TAU;

use ahash::AHashMap;
use nannou::prelude::*;
use serde::{Deserialize, Serialize};

use super::{require_positive, SteeringContext, SteeringScratch};
use crate::agent::AgentId;
use crate::error::SteeringError;
use crate::math;
use crate::spatial::LayerMask;

const NAME: &str = "attraction";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttractionParams {
    pub detection_radius: f32,
    pub layers: LayerMask,
    pub ring_radius: f32,
    /// Half-width of the blend band around the ring.
    pub hysteresis: f32,
    pub join_speed: f32,
    pub orbit_speed: f32,
    pub radial_stiffness: f32,
    pub radial_smooth_time: f32,
}

impl Default for AttractionParams {
    fn default() -> Self {
        Self {
            detection_radius: 5.0,
            layers: LayerMask::ATTRACTORS,
            ring_radius: 2.0,
            hysteresis: 0.1,
            join_speed: 5.0,
            orbit_speed: 5.0,
            radial_stiffness: 10.0,
            radial_smooth_time: 0.2,
        }
    }
}

impl AttractionParams {
    pub fn validate(&self) -> Result<(), SteeringError> {
        require_positive(NAME, "detection_radius", self.detection_radius)?;
        require_positive(NAME, "ring_radius", self.ring_radius)?;
        require_positive(NAME, "join_speed", self.join_speed)?;
        require_positive(NAME, "orbit_speed", self.orbit_speed)?;
        require_positive(NAME, "radial_stiffness", self.radial_stiffness)?;
        require_positive(NAME, "radial_smooth_time", self.radial_smooth_time)?;
        if !self.hysteresis.is_finite() || self.hysteresis < 0.0 {
            return Err(SteeringError::InvalidParameter {
                behavior: NAME,
                name: "hysteresis",
                reason: format!("must be finite and non-negative, got {}", self.hysteresis),
            });
        }
        if self.layers.is_empty() {
            return Err(SteeringError::EmptyLayerMask { behavior: NAME });
        }
        Ok(())
    }

    pub fn inner(&self) -> f32 {
        self.ring_radius - self.hysteresis
    }

    pub fn outer(&self) -> f32 {
        self.ring_radius + self.hysteresis
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RingKey {
    centroid: (u32, u32),
    ring_radius: u32,
    hysteresis: u32,
}

impl RingKey {
    fn new(centroid: Point2, ring_radius: f32, hysteresis: f32) -> Self {
        Self {
            centroid: (centroid.x.to_bits(), centroid.y.to_bits()),
            ring_radius: ring_radius.to_bits(),
            hysteresis: hysteresis.to_bits(),
        }
    }
}

/// Ring occupants computed at most once per tick for each distinct ring.
///
/// Must be cleared whenever the population it was filled from moves.
#[derive(Debug, Clone, Default)]
pub struct RingCache {
    rings: AHashMap<RingKey, Vec<(f32, AgentId)>>,
}

impl RingCache {
    pub fn clear(&mut self) {
        self.rings.clear();
    }

    pub fn len(&self) -> usize {
        self.rings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    /// Agents within `hysteresis` of the ring, sorted by angle around `centroid`.
    pub fn occupants(
        &mut self,
        centroid: Point2,
        ring_radius: f32,
        hysteresis: f32,
        population: &[(AgentId, Point2)],
    ) -> &[(f32, AgentId)] {
        self.rings
            .entry(RingKey::new(centroid, ring_radius, hysteresis))
            .or_insert_with(|| {
                let mut ring: Vec<(f32, AgentId)> = population
                    .iter()
                    .filter(|(_, p)| (p.distance(centroid) - ring_radius).abs() <= hysteresis)
                    .map(|(id, p)| {
                        let d = *p - centroid;
                        (d.y.atan2(d.x), *id)
                    })
                    .collect();
                ring.sort_by(|a, b| a.0.total_cmp(&b.0));
                ring
            })
    }
}

/// Midpoint of the widest gap between consecutive sorted angles, wrapping
/// around the full turn. The first of several equal gaps wins.
///
/// The result may exceed π when the widest gap is the wrap-around one.
pub fn largest_gap_midpoint(sorted_angles: &[f32]) -> Option<f32> {
    let n = sorted_angles.len();
    if n == 0 {
        return None;
    }

    let mut best_gap = 0.0;
    let mut join_angle = 0.0;
    for i in 0..n {
        let a1 = sorted_angles[i];
        let a2 = if i + 1 < n { sorted_angles[i + 1] } else { sorted_angles[0] + TAU };
        let gap = a2 - a1;
        if gap > best_gap {
            best_gap = gap;
            join_angle = a1 + gap * 0.5;
        }
    }
    Some(join_angle)
}

pub(crate) fn compute(params: &AttractionParams, ctx: &SteeringContext<'_>, scratch: &mut SteeringScratch<'_>) -> Vec2 {
    // Claim the slot before any early return so slot order never shifts
    let radial_velocity = scratch.smoothing.next_slot();

    let mut attractors = ctx
        .spatial
        .query_radius(ctx.position, params.detection_radius, params.layers);
    if attractors.is_empty() {
        return Vec2::ZERO;
    }
    attractors.sort_by_key(|hit| hit.handle);
    let centroid = attractors.iter().fold(Vec2::ZERO, |acc, hit| acc + hit.position) / attractors.len() as f32;

    let gap_angle = {
        let ring = scratch
            .rings
            .occupants(centroid, params.ring_radius, params.hysteresis, ctx.population);
        let angles: Vec<f32> = ring.iter().map(|(angle, _)| *angle).collect();
        largest_gap_midpoint(&angles)
    };
    let join_angle = match gap_angle {
        Some(angle) => angle,
        None => scratch.rng.uniform_angle(),
    };

    let join_pos = centroid + vec2(join_angle.cos(), join_angle.sin()) * params.ring_radius;
    let join = math::normalize_or_zero(join_pos - ctx.position) * params.join_speed;

    let to_center = centroid - ctx.position;
    let distance = to_center.length();
    let mut orbit = Vec2::ZERO;
    if distance > 0.0 {
        let dir = to_center / distance;
        let tangent = math::perp(dir) * params.orbit_speed;
        let target_radial = -dir * (params.ring_radius - distance) * params.radial_stiffness;
        let radial = math::smooth_damp(
            Vec2::ZERO,
            target_radial,
            radial_velocity,
            params.radial_smooth_time,
            ctx.dt,
        );
        orbit = tangent + radial;
    }

    if distance > params.outer() {
        join
    } else if distance < params.inner() {
        orbit
    } else {
        let t = math::inverse_lerp(params.inner(), params.outer(), distance);
        math::lerp(orbit, join, t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::FlockId;
    use crate::spatial::{AttractorId, EntityHandle};
    use crate::steering::test_support::Fixture;
    use crate::steering::SteeringBehavior;
    use std::f32::consts::{FRAC_PI_2, PI};

    fn id(serial: u32) -> AgentId {
        AgentId { flock: FlockId(0), serial }
    }

    fn attraction() -> SteeringBehavior {
        SteeringBehavior::Attraction(AttractionParams::default())
    }

    #[test]
    fn gap_midpoint_wraps_around() {
        let angle = largest_gap_midpoint(&[0.0, FRAC_PI_2, PI]).unwrap();
        assert!((angle - 1.5 * PI).abs() < 1e-5);
    }

    #[test]
    fn gap_midpoint_single_occupant_is_opposite() {
        let angle = largest_gap_midpoint(&[0.5]).unwrap();
        assert!((angle - (0.5 + PI)).abs() < 1e-5);
        assert_eq!(largest_gap_midpoint(&[]), None);
    }

    #[test]
    fn gap_midpoint_keeps_first_of_equal_gaps() {
        // Three exact gaps of 2 rad, the wrap-around gap is smaller
        let angle = largest_gap_midpoint(&[-3.0, -1.0, 1.0, 3.0]).unwrap();
        assert!((angle + 2.0).abs() < 1e-6, "{angle}");
    }

    #[test]
    fn ring_cache_sorts_and_memoizes() {
        let population = vec![
            (id(0), pt2(0.0, 2.0)),
            (id(1), pt2(2.0, 0.0)),
            (id(2), pt2(0.0, 5.0)),
            (id(3), pt2(-2.05, 0.0)),
        ];
        let mut cache = RingCache::default();
        let ring = cache.occupants(Vec2::ZERO, 2.0, 0.1, &population).to_vec();
        let ids: Vec<AgentId> = ring.iter().map(|(_, id)| *id).collect();
        assert_eq!(ids, vec![id(1), id(0), id(3)]);

        // A different population is ignored until the cache is cleared
        cache.occupants(Vec2::ZERO, 2.0, 0.1, &[]);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.occupants(Vec2::ZERO, 2.0, 0.1, &[]).len(), 3);
        cache.clear();
        assert!(cache.occupants(Vec2::ZERO, 2.0, 0.1, &[]).is_empty());
    }

    #[test]
    fn nothing_sensed_gives_zero() {
        let mut fixture = Fixture::new().with_entities(vec![(EntityHandle::Agent(id(0)), pt2(0.0, 0.0))]);
        assert_eq!(fixture.force(&attraction(), id(0), pt2(0.0, 0.0)).unwrap(), Vec2::ZERO);
        // The slot is still claimed
        assert_eq!(fixture.smoothing.slot_count(), 1);
    }

    #[test]
    fn newcomer_heads_for_the_free_arc() {
        // Occupants at 0 and π/2: widest gap is centred on 5π/4
        let mut fixture = Fixture::new().with_entities(vec![
            (EntityHandle::Attractor(AttractorId(0)), pt2(0.0, 0.0)),
            (EntityHandle::Agent(id(1)), pt2(2.0, 0.0)),
            (EntityHandle::Agent(id(2)), pt2(0.0, 2.0)),
            (EntityHandle::Agent(id(0)), pt2(-4.0, 0.0)),
        ]);
        let force = fixture.force(&attraction(), id(0), pt2(-4.0, 0.0)).unwrap();
        let angle = 1.25 * PI;
        let join_pos = vec2(angle.cos(), angle.sin()) * 2.0;
        let expected = (join_pos - vec2(-4.0, 0.0)).normalize() * 5.0;
        assert!((force - expected).length() < 1e-4, "{force:?} vs {expected:?}");
    }

    #[test]
    fn inside_ring_orbits_and_pushes_out() {
        let mut fixture = Fixture::new().with_entities(vec![
            (EntityHandle::Attractor(AttractorId(0)), pt2(0.0, 0.0)),
            (EntityHandle::Agent(id(0)), pt2(1.0, 0.0)),
        ]);
        let force = fixture.force(&attraction(), id(0), pt2(1.0, 0.0)).unwrap();
        // Tangent of (-1, 0) is (0, -1); the spring points outwards along +x
        assert!(force.y < -4.9 && force.y > -5.1, "{force:?}");
        assert!(force.x > 0.0, "{force:?}");
        assert!(fixture.smoothing.slot(0).unwrap() != Vec2::ZERO);
    }

    #[test]
    fn empty_ring_picks_some_angle() {
        let mut fixture = Fixture::new().with_entities(vec![
            (EntityHandle::Attractor(AttractorId(0)), pt2(0.0, 0.0)),
            (EntityHandle::Agent(id(0)), pt2(4.0, 0.0)),
        ]);
        let force = fixture.force(&attraction(), id(0), pt2(4.0, 0.0)).unwrap();
        assert!((force.length() - 5.0).abs() < 1e-4);
    }

    #[test]
    fn blend_is_continuous_across_the_band() {
        let params = AttractionParams::default();
        let behavior = SteeringBehavior::Attraction(params.clone());
        let eps = 1e-3;
        let force_at = |d: f32| {
            // Fixed occupants keep the join angle at π/2 whether or not the agent
            // itself sits in the band; fresh spring state per sample
            let position = pt2(0.0, -d);
            let mut fixture = Fixture::new().with_entities(vec![
                (EntityHandle::Attractor(AttractorId(0)), pt2(0.0, 0.0)),
                (EntityHandle::Agent(id(1)), pt2(2.0, 0.0)),
                (EntityHandle::Agent(id(2)), pt2(-2.0, 0.0)),
                (EntityHandle::Agent(id(0)), position),
            ]);
            fixture.force(&behavior, id(0), position).unwrap()
        };

        // Each edge of the band on its own: the band itself spans the whole blend
        for edge in [params.inner(), params.outer()] {
            let forces = [force_at(edge - eps), force_at(edge), force_at(edge + eps)];
            for pair in forces.windows(2) {
                assert!((pair[0] - pair[1]).length() < 0.1, "jump at {edge} between {:?} and {:?}", pair[0], pair[1]);
            }
        }
    }

    #[test]
    fn agent_in_the_band_counts_as_an_occupant() {
        // Alone on the ring at angle 0, the agent aims for the opposite side
        let position = pt2(2.0, 0.0);
        let mut fixture = Fixture::new().with_entities(vec![
            (EntityHandle::Attractor(AttractorId(0)), pt2(0.0, 0.0)),
            (EntityHandle::Agent(id(0)), position),
        ]);
        let ring = fixture
            .rings
            .occupants(Vec2::ZERO, 2.0, 0.1, &fixture.population)
            .to_vec();
        assert_eq!(ring.len(), 1);
        assert_eq!(ring[0].1, id(0));

        // Halfway through the band: half the (0, -5) orbit tangent, half the
        // (-5, 0) join towards angle π
        let force = fixture.force(&attraction(), id(0), position).unwrap();
        assert!((force - vec2(-2.5, -2.5)).length() < 1e-3, "{force:?}");
    }

    #[test]
    fn validation() {
        assert!(AttractionParams::default().validate().is_ok());
        let bad = AttractionParams { hysteresis: -0.1, ..Default::default() };
        assert!(bad.validate().is_err());
        let bad = AttractionParams { radial_smooth_time: 0.0, ..Default::default() };
        assert!(bad.validate().is_err());
        let bad = AttractionParams { layers: LayerMask::empty(), ..Default::default() };
        assert_eq!(bad.validate(), Err(SteeringError::EmptyLayerMask { behavior: "attraction" }));
    }
}
