/*
 * Renderer Module
 *
 * Draws the simulation state for inspection: agents coloured by polarity and
 * pointing along their heading, predators, attractors with their ring, and
 * cluster centroids sized by membership. The simulation's viewport is fitted
 * to the window, so the world-to-screen mapping is a uniform scale and shift.
 */

use nannou::prelude::*;

use crate::agent::Polarity;
use crate::app::Model;
use crate::steering::SteeringBehavior;
use crate::ui;
use crate::viewport::Viewport;

/// Agent size in pixels.
pub const AGENT_SIZE: f32 = 6.0;

/// Uniform world-to-window mapping that fits the viewport inside the window.
#[derive(Debug, Clone, Copy)]
pub struct ScreenMapping {
    center: Point2,
    scale: f32,
}

impl ScreenMapping {
    pub fn fit(viewport: &Viewport, window_rect: Rect) -> Self {
        let scale = (window_rect.w() / viewport.width()).min(window_rect.h() / viewport.height());
        Self {
            center: viewport.center(),
            scale,
        }
    }

    pub fn to_screen(&self, world: Point2) -> Point2 {
        (world - self.center) * self.scale
    }

    pub fn to_world(&self, screen: Point2) -> Point2 {
        screen / self.scale + self.center
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }
}

fn polarity_color(polarity: Polarity) -> Rgb<u8> {
    match polarity {
        Polarity::Positive => rgb(90, 220, 120),
        Polarity::Neutral => rgb(220, 220, 220),
        Polarity::Negative => rgb(230, 80, 80),
    }
}

/// Ring radii of every attraction node, for drawing the rings.
fn ring_radii(behavior: &SteeringBehavior, out: &mut Vec<f32>) {
    match behavior {
        SteeringBehavior::Attraction(p) => out.push(p.ring_radius),
        SteeringBehavior::Composite(c) => c.behaviors.iter().for_each(|b| ring_radii(b, out)),
        _ => {}
    }
}

// Render the model
pub fn view(app: &App, model: &Model, frame: Frame) {
    let draw = app.draw();
    draw.background().color(BLACK);

    let window_rect = app.window_rect();
    let sim = &model.sim;
    let mapping = ScreenMapping::fit(sim.viewport(), window_rect);

    // Viewport border
    let border = sim.viewport().bounds();
    draw.rect()
        .xy(mapping.to_screen(border.xy()))
        .wh(border.wh() * mapping.scale())
        .no_fill()
        .stroke_weight(1.0)
        .stroke(rgba(0.3, 0.3, 0.3, 1.0));

    let mut radii = Vec::new();
    for flock in sim.flocks() {
        ring_radii(flock.behavior(), &mut radii);
    }
    for &(_, position) in sim.attractors() {
        let screen = mapping.to_screen(position);
        draw.ellipse().xy(screen).radius(AGENT_SIZE).color(rgba(0.3, 0.6, 1.0, 1.0));
        for &radius in &radii {
            draw.ellipse()
                .xy(screen)
                .radius(radius * mapping.scale())
                .no_fill()
                .stroke(rgba(0.3, 0.6, 1.0, 0.4))
                .stroke_weight(1.0);
        }
    }

    for &(_, position) in sim.predators() {
        draw.rect()
            .xy(mapping.to_screen(position))
            .w_h(AGENT_SIZE * 2.0, AGENT_SIZE * 2.0)
            .rotate(PI / 4.0)
            .color(ORANGE);
    }

    for flock in sim.flocks() {
        for agent in flock.agents() {
            let screen = mapping.to_screen(agent.position);
            let angle = agent.heading.y.atan2(agent.heading.x);
            let color = polarity_color(agent.polarity);

            draw.tri()
                .points(
                    pt2(AGENT_SIZE, 0.0),
                    pt2(-AGENT_SIZE / 2.0, AGENT_SIZE / 2.0),
                    pt2(-AGENT_SIZE / 2.0, -AGENT_SIZE / 2.0),
                )
                .xy(screen)
                .rotate(angle)
                .color(color);

            if let Some(word) = &agent.assigned_word {
                draw.text(word)
                    .xy(screen + vec2(0.0, AGENT_SIZE * 2.0))
                    .color(color)
                    .font_size(12);
            }
        }
    }

    if model.controls.show_clusters {
        for cluster in model.clusters.iter().filter(|c| c.len() > 1) {
            let screen = mapping.to_screen(cluster.centroid());
            draw.ellipse()
                .xy(screen)
                .radius(AGENT_SIZE + cluster.len() as f32)
                .no_fill()
                .stroke(rgba(1.0, 1.0, 0.0, 0.6))
                .stroke_weight(1.5);
        }
    }

    if model.controls.show_debug {
        ui::draw_debug_info(&draw, &model.debug_info, window_rect);
    }

    if let Err(err) = draw.to_frame(app, &frame) {
        tracing::error!(error = ?err, "failed to draw frame");
    }
    if let Err(err) = model.egui.draw_to_frame(&frame) {
        tracing::error!(error = ?err, "failed to draw controls");
    }
}
