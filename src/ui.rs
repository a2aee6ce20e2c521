/*
 * UI Module
 *
 * This module contains the viewer's control panel, built with nannou_egui.
 * The sliders edit a ViewerControls value; the app compares it against the
 * previous frame's copy and pushes changes into the simulation.
 */

use nannou_egui::{egui, Egui};

use crate::debug::DebugInfo;
use crate::params::FlockParams;

/// Everything the control panel can change.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerControls {
    pub drive_factor: f32,
    pub max_speed: f32,
    pub neighbor_radius: f32,
    pub cluster_radius: f32,
    pub show_clusters: bool,
    pub show_debug: bool,
    pub pause_simulation: bool,
}

impl ViewerControls {
    pub fn from_params(params: &FlockParams, cluster_radius: f32) -> Self {
        Self {
            drive_factor: params.drive_factor,
            max_speed: params.max_speed,
            neighbor_radius: params.neighbor_radius,
            cluster_radius,
            show_clusters: true,
            show_debug: false,
            pause_simulation: false,
        }
    }

    /// `base` with the panel's movement tunables applied.
    pub fn apply_to(&self, base: &FlockParams) -> FlockParams {
        FlockParams {
            drive_factor: self.drive_factor,
            max_speed: self.max_speed,
            neighbor_radius: self.neighbor_radius,
            ..base.clone()
        }
    }

    pub fn cluster_radius_range() -> std::ops::RangeInclusive<f32> {
        0.25..=5.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UiActions {
    pub reset: bool,
    pub params_changed: bool,
    pub cluster_radius_changed: bool,
}

// Draw the control panel and report what the user asked for
pub fn update_ui(egui: &mut Egui, controls: &mut ViewerControls, debug_info: &DebugInfo) -> UiActions {
    let before = controls.clone();
    let mut actions = UiActions::default();

    let ctx = egui.begin_frame();

    egui::Window::new("Simulation Controls")
        .default_pos([10.0, 10.0])
        .show(&ctx, |ui| {
            ui.collapsing("Flock Parameters", |ui| {
                ui.add(egui::Slider::new(&mut controls.drive_factor, FlockParams::drive_factor_range()).text("Drive Factor"));
                ui.add(egui::Slider::new(&mut controls.max_speed, FlockParams::max_speed_range()).text("Max Speed"));
                ui.add(
                    egui::Slider::new(&mut controls.neighbor_radius, FlockParams::neighbor_radius_range())
                        .text("Neighbor Radius"),
                );

                if ui.button("Reset Scenario").clicked() {
                    actions.reset = true;
                }
            });

            ui.collapsing("Clusters", |ui| {
                ui.add(
                    egui::Slider::new(&mut controls.cluster_radius, ViewerControls::cluster_radius_range())
                        .text("Cluster Radius"),
                );
                ui.checkbox(&mut controls.show_clusters, "Show Clusters");
            });

            ui.collapsing("Stats", |ui| {
                for line in debug_info.lines() {
                    ui.label(line);
                }
                ui.label("Left click: attractor, right click: predator");
            });

            ui.checkbox(&mut controls.show_debug, "Show Debug Info");
            ui.checkbox(&mut controls.pause_simulation, "Pause Simulation");
        });

    actions.params_changed = controls.drive_factor != before.drive_factor
        || controls.max_speed != before.max_speed
        || controls.neighbor_radius != before.neighbor_radius;
    actions.cluster_radius_changed = controls.cluster_radius != before.cluster_radius;
    actions
}

// Draw debug information in the top-left corner of the window
pub fn draw_debug_info(draw: &nannou::Draw, debug_info: &DebugInfo, window_rect: nannou::geom::Rect) {
    let margin = 20.0;
    let line_height = 20.0;
    let panel_width = 300.0;
    let lines = debug_info.lines();
    let panel_height = line_height * lines.len() as f32 + margin;
    let panel_x = window_rect.left() + panel_width / 2.0;
    let panel_y = window_rect.top() - panel_height / 2.0;

    draw.rect()
        .x_y(panel_x, panel_y)
        .w_h(panel_width, panel_height)
        .color(nannou::color::rgba(0.0, 0.0, 0.0, 0.7));

    let text_x = window_rect.left() + margin;
    let text_y = window_rect.top() - margin;

    for (i, text) in lines.iter().enumerate() {
        let y = text_y - (i as f32 * line_height);
        draw.text(text)
            .left_justify()
            .x_y(text_x + panel_width / 2.0 - margin, y)
            .w(panel_width - margin)
            .color(nannou::color::WHITE)
            .font_size(14);
    }
}
