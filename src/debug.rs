/*
 * Debug Information Module
 *
 * This module defines the DebugInfo struct that collects per-frame metrics
 * shown in the viewer's control panel and overlay.
 */

use std::time::Duration;

use crate::simulation::StepReport;

#[derive(Debug, Clone, Default)]
pub struct DebugInfo {
    pub fps: f32,
    pub frame_time: Duration,
    pub steps_per_frame: usize,
    pub interpolation_alpha: f32,
    pub tick: u64,
    pub agents: usize,
    pub clusters: usize,
    pub stable_clusters: usize,
    pub largest_cluster: usize,
    /// Forces rejected during the last step, summed over all flocks.
    pub rejected_forces: usize,
}

impl DebugInfo {
    pub fn record_step(&mut self, report: &StepReport) {
        self.tick = report.tick;
        self.agents = report.agents;
        self.rejected_forces = report.flocks.rejected;
    }

    pub fn lines(&self) -> [String; 6] {
        [
            format!("FPS: {:.1}", self.fps),
            format!("Frame time: {:.2} ms", self.frame_time.as_secs_f64() * 1000.0),
            format!("Tick: {} ({} steps/frame)", self.tick, self.steps_per_frame),
            format!("Agents: {}", self.agents),
            format!(
                "Clusters: {} ({} stable, largest {})",
                self.clusters, self.stable_clusters, self.largest_cluster
            ),
            format!("Rejected forces: {}", self.rejected_forces),
        ]
    }
}
