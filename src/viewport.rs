/*
 * Viewport Module
 *
 * The simulation's stand-in for a camera: a world-space rectangle that maps
 * to normalized [0, 1] viewport coordinates. Used by the stay-on-screen
 * behavior, by screen-edge spawning and by the viewer.
 */

use nannou::prelude::*;

use crate::error::SpatialError;
use crate::random::RandomSource;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    bounds: Rect,
}

impl Viewport {
    pub fn new(center: Point2, width: f32, height: f32) -> Result<Self, SpatialError> {
        let valid = |v: f32| v.is_finite() && v > 0.0;
        if !valid(width) || !valid(height) || !center.x.is_finite() || !center.y.is_finite() {
            return Err(SpatialError::Misconfigured(format!(
                "viewport needs a finite positive size, got {width}x{height}"
            )));
        }
        Ok(Self {
            bounds: Rect::from_x_y_w_h(center.x, center.y, width, height),
        })
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn center(&self) -> Point2 {
        self.bounds.xy()
    }

    pub fn width(&self) -> f32 {
        self.bounds.w()
    }

    pub fn height(&self) -> f32 {
        self.bounds.h()
    }

    /// World point to viewport coordinates: (0, 0) bottom-left, (1, 1) top-right.
    pub fn to_normalized(&self, point: Point2) -> Vec2 {
        vec2(
            (point.x - self.bounds.left()) / self.bounds.w(),
            (point.y - self.bounds.bottom()) / self.bounds.h(),
        )
    }

    pub fn from_normalized(&self, u: f32, v: f32) -> Point2 {
        pt2(
            self.bounds.left() + u * self.bounds.w(),
            self.bounds.bottom() + v * self.bounds.h(),
        )
    }

    /// A uniformly chosen side, then a uniform position along it.
    pub fn random_edge_point(&self, rng: &mut dyn RandomSource) -> Point2 {
        let along = rng.uniform_01();
        match rng.uniform_index(4) {
            0 => self.from_normalized(0.0, along), // left
            1 => self.from_normalized(1.0, along), // right
            2 => self.from_normalized(along, 0.0), // bottom
            _ => self.from_normalized(along, 1.0), // top
        }
    }
}
