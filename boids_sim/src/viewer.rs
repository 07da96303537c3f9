//! Repaint listeners: headless stand-ins for a rendering window.

use boids_core::physics::WorldBounds;
use boids_core::protocol::{Frame, RepaintListener};
use boids_core::validation::{summarize_groups, ValidationReport, ValidationSession};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Logs a one-line summary per group every `every` frames.
pub struct LogViewer {
    every: u64,
}

impl LogViewer {
    pub fn new(every: u64) -> Self {
        Self { every: every.max(1) }
    }
}

impl RepaintListener for LogViewer {
    fn repaint(&self, frame: &Frame) {
        debug!(tick = frame.tick, boids = frame.boids.len(), walls = frame.walls.len(), "repaint");
        if frame.tick % self.every != 0 {
            return;
        }
        for group in summarize_groups(frame.boids.values()) {
            info!(
                tick = frame.tick,
                group = %group.name,
                count = group.count,
                x = group.centroid[0],
                y = group.centroid[1],
                speed = group.mean_speed,
                polarization = group.polarization,
                "flock"
            );
        }
    }
}

/// Checks every frame against the world's physical invariants.
pub struct InvariantMonitor {
    session: Mutex<ValidationSession>,
}

impl InvariantMonitor {
    pub fn new(bounds: WorldBounds) -> Self {
        Self {
            session: Mutex::new(ValidationSession::new(bounds)),
        }
    }

    pub fn report(&self) -> ValidationReport {
        lock(&self.session).generate_report()
    }
}

impl RepaintListener for InvariantMonitor {
    fn repaint(&self, frame: &Frame) {
        lock(&self.session).record_frame(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boids_core::{BoidState, GroupParameters, Rgb, Vec2};
    use boids_env::EntityId;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn frame(tick: u64) -> Frame {
        let group = Arc::new(GroupParameters::new("red", Rgb::RED));
        let boid = BoidState::new(EntityId::from_seed(tick), group, Vec2::new(tick as f64, 0.0), Vec2::new(0.0, 1.0));
        Frame {
            tick,
            boids: Arc::new(HashMap::from([(boid.owner, boid)])),
            walls: Arc::new(HashMap::new()),
        }
    }

    #[test]
    fn test_monitor_reports_clean_run() {
        let monitor = InvariantMonitor::new(WorldBounds::new(800.0, 600.0));
        let viewer = LogViewer::new(2);
        for tick in 0..4 {
            monitor.repaint(&frame(tick));
            viewer.repaint(&frame(tick));
        }
        let report = monitor.report();
        assert!(report.passes());
        assert_eq!(report.frames, 4);
        assert_eq!(report.groups[0].name, "red");
    }
}
