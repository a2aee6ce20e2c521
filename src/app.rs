/*
 * Application Module
 *
 * This module defines the viewer's model and its nannou callbacks. The viewer
 * wraps a Simulation, drives it with wall-clock time through the simulation's
 * fixed-timestep accumulator, clusters the population after every frame and
 * lets the user drop attractors and predators with the mouse.
 *
 * nannou builds the model from a plain function pointer, so the scenario is
 * handed over through a OnceLock set by `run` before the app starts.
 */

use std::sync::OnceLock;
use std::time::Instant;

use nannou::prelude::*;
use nannou::winit::event::{MouseButton, WindowEvent as RawWindowEvent};
use nannou_egui::Egui;
use tracing::{error, info};

use crate::cluster::{Cluster, ClusterTracker};
use crate::config::SimConfig;
use crate::debug::DebugInfo;
use crate::renderer::{self, ScreenMapping};
use crate::simulation::Simulation;
use crate::ui::{self, ViewerControls};

static SCENARIO: OnceLock<SimConfig> = OnceLock::new();

// Main model for the application
pub struct Model {
    pub sim: Simulation,
    pub config: SimConfig,
    pub egui: Egui,
    pub controls: ViewerControls,
    pub debug_info: DebugInfo,
    pub clusters: Vec<Cluster>,
    pub tracker: ClusterTracker,
    pub mouse_position: Point2,
    pub last_update_time: Instant,
}

/// Open the viewer on `config`. Blocks until the window closes.
pub fn run(config: SimConfig) {
    if SCENARIO.set(config).is_err() {
        error!("viewer already running");
        return;
    }
    nannou::app(model).update(update).run();
}

fn model(app: &App) -> Model {
    let config = SCENARIO.get().cloned().unwrap_or_default();

    let window_id = app
        .new_window()
        .title("wordflock")
        .size(1280, 720)
        .view(renderer::view)
        .mouse_moved(mouse_moved)
        .mouse_pressed(mouse_pressed)
        .raw_event(raw_window_event)
        .build()
        .expect("failed to create window");
    let window = app.window(window_id).expect("window vanished after creation");
    let egui = Egui::from_window(&window);

    // The config was validated by the binary before the viewer starts
    let sim = Simulation::from_config(&config).expect("scenario rejected");
    let base = sim.flocks().first().map(|f| f.params().clone()).unwrap_or_default();
    let controls = ViewerControls::from_params(&base, sim.cluster_radius());

    info!(agents = sim.agent_count(), "viewer started");

    Model {
        sim,
        tracker: ClusterTracker::new(config.stable_pass_threshold),
        config,
        egui,
        controls,
        debug_info: DebugInfo::default(),
        clusters: Vec::new(),
        mouse_position: Point2::ZERO,
        last_update_time: Instant::now(),
    }
}

fn reset(model: &mut Model) {
    match Simulation::from_config(&model.config) {
        Ok(sim) => {
            model.sim = sim;
            model.tracker.reset();
            model.clusters.clear();
            model.controls.cluster_radius = model.sim.cluster_radius();
            info!("scenario reset");
        }
        Err(err) => error!(error = %err, "failed to rebuild scenario"),
    }
}

// Push slider values into every flock
fn apply_controls(model: &mut Model) {
    let ids: Vec<_> = model.sim.flocks().iter().map(|f| f.id()).collect();
    for id in ids {
        let Some(flock) = model.sim.flock_mut(id) else {
            continue;
        };
        let params = model.controls.apply_to(flock.params());
        if let Err(err) = flock.set_params(params) {
            error!(flock = flock.name(), error = %err, "slider values rejected");
        }
    }
}

pub fn update(app: &App, model: &mut Model, update: Update) {
    model.debug_info.fps = app.fps();
    model.debug_info.frame_time = update.since_last;

    let actions = ui::update_ui(&mut model.egui, &mut model.controls, &model.debug_info);
    if actions.reset {
        reset(model);
    }
    if actions.params_changed {
        apply_controls(model);
    }
    if actions.cluster_radius_changed {
        if let Err(err) = model.sim.set_cluster_radius(model.controls.cluster_radius) {
            error!(error = %err, "cluster radius rejected");
        }
    }

    let now = Instant::now();
    let frame_time = now.duration_since(model.last_update_time);
    model.last_update_time = now;

    if !model.controls.pause_simulation {
        model.debug_info.steps_per_frame = model.sim.advance(frame_time);
        model.debug_info.interpolation_alpha = model.sim.interpolation_alpha();
        model.debug_info.record_step(&model.sim.last_report());
    }

    model.clusters = model.sim.build_clusters();
    let report = model.tracker.observe(&model.clusters);
    model.debug_info.clusters = model.clusters.len();
    model.debug_info.stable_clusters = report.stable.len();
    model.debug_info.largest_cluster = model.clusters.iter().map(Cluster::len).max().unwrap_or(0);
}

pub fn mouse_moved(app: &App, model: &mut Model, pos: Point2) {
    let mapping = ScreenMapping::fit(model.sim.viewport(), app.window_rect());
    model.mouse_position = mapping.to_world(pos);
}

pub fn mouse_pressed(_app: &App, model: &mut Model, button: MouseButton) {
    // Clicks that land on the control panel belong to egui
    if model.egui.ctx().is_pointer_over_area() {
        return;
    }
    match button {
        MouseButton::Left => {
            model.sim.add_attractor(model.mouse_position);
        }
        MouseButton::Right => {
            model.sim.add_predator(model.mouse_position);
        }
        _ => {}
    }
}

pub fn raw_window_event(_app: &App, model: &mut Model, event: &RawWindowEvent) {
    model.egui.handle_raw_event(event);
}
