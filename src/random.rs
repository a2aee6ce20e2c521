/*
 * Random Source Module
 *
 * The simulation only ever needs two kinds of random numbers: a uniform float in
 * [0, 1) and a uniform point inside a disk. Any `rand::Rng` provides both, so
 * callers can hand in a seeded `ChaCha8Rng` for reproducible runs or a thread rng
 * for the viewer.
 */

use nannou::prelude::*;
use rand::Rng;
use std::f32::consts::TAU;

pub trait RandomSource {
    /// Uniform float in [0, 1).
    fn uniform_01(&mut self) -> f32;

    /// Uniform point inside a disk of `radius` centred on the origin.
    fn uniform_in_disk(&mut self, radius: f32) -> Point2 {
        // sqrt keeps the area density uniform
        let r = radius * self.uniform_01().sqrt();
        let theta = self.uniform_01() * TAU;
        pt2(r * theta.cos(), r * theta.sin())
    }

    /// Uniform angle in [0, 2π).
    fn uniform_angle(&mut self) -> f32 {
        self.uniform_01() * TAU
    }

    /// Uniform integer in [0, upper).
    fn uniform_index(&mut self, upper: usize) -> usize {
        ((self.uniform_01() * upper as f32) as usize).min(upper.saturating_sub(1))
    }
}

impl<R: Rng + ?Sized> RandomSource for R {
    fn uniform_01(&mut self) -> f32 {
        self.gen::<f32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn disk_samples_stay_inside_radius() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..1000 {
            let p = rng.uniform_in_disk(3.0);
            assert!(p.length() <= 3.0 + 1e-5);
        }
    }

    #[test]
    fn uniform_index_stays_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut seen = [false; 4];
        for _ in 0..200 {
            let i = rng.uniform_index(4);
            assert!(i < 4);
            seen[i] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
