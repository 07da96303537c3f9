//! Validation Module - Invariant Checks over Published Frames
//! ===========================================================
//!
//! Feeds every published frame through the physical invariants of the
//! world and summarizes each population:
//! - Speed cap (|velocity| ≤ max_speed) and force cap (|acceleration| ≤ max_force)
//! - Toroidal bounds (every position inside the world rectangle)
//! - Tick progress (frames never go back in time)
//! - Per-group centroid, mean speed and polarization
//!
//! Usage:
//! ```ignore
//! use boids_core::validation::ValidationSession;
//!
//! let mut session = ValidationSession::new(config.bounds());
//! session.record_frame(&frame);
//! let report = session.generate_report();
//! report.print();
//! ```

use crate::body::{BoidState, Vec2};
use crate::physics::WorldBounds;
use crate::protocol::Frame;
use serde::Serialize;
use std::collections::BTreeMap;

/// Slack for float comparisons against the caps.
const TOLERANCE: f64 = 1e-9;

// =============================================================================
// GROUP SUMMARY
// =============================================================================

/// Aggregate motion of one population in one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub name: String,
    pub count: usize,
    /// Arithmetic mean position (not torus-aware)
    pub centroid: [f64; 2],
    pub mean_speed: f64,
    /// Length of the mean unit heading, in [0, 1]. 1 means all boids fly
    /// the same way.
    pub polarization: f64,
}

/// Summarizes every population present in `boids`, sorted by group name.
pub fn summarize_groups<'a>(boids: impl IntoIterator<Item = &'a BoidState>) -> Vec<GroupSummary> {
    let mut groups: BTreeMap<&str, (usize, Vec2, f64, Vec2)> = BTreeMap::new();
    for boid in boids {
        let entry = groups
            .entry(boid.group.name.as_str())
            .or_insert((0, Vec2::zeros(), 0.0, Vec2::zeros()));
        entry.0 += 1;
        entry.1 += boid.position;
        entry.2 += boid.velocity.norm();
        if let Some(unit) = boid.velocity.try_normalize(f64::EPSILON) {
            entry.3 += unit;
        }
    }

    groups
        .into_iter()
        .map(|(name, (count, positions, speeds, headings))| {
            let n = count as f64;
            GroupSummary {
                name: name.to_string(),
                count,
                centroid: [positions.x / n, positions.y / n],
                mean_speed: speeds / n,
                polarization: (headings / n).norm(),
            }
        })
        .collect()
}

// =============================================================================
// VALIDATION SESSION
// =============================================================================

/// Accumulates invariant checks over a sequence of frames.
#[derive(Debug, Clone)]
pub struct ValidationSession {
    bounds: WorldBounds,
    frames: usize,
    last_tick: Option<u64>,
    tick_regressions: usize,
    speed_violations: usize,
    force_violations: usize,
    bounds_violations: usize,
    /// Highest observed |velocity| / max_speed
    max_speed_ratio: f64,
    groups: Vec<GroupSummary>,
}

impl ValidationSession {
    pub fn new(bounds: WorldBounds) -> Self {
        Self {
            bounds,
            frames: 0,
            last_tick: None,
            tick_regressions: 0,
            speed_violations: 0,
            force_violations: 0,
            bounds_violations: 0,
            max_speed_ratio: 0.0,
            groups: Vec::new(),
        }
    }

    /// Checks one published frame.
    pub fn record_frame(&mut self, frame: &Frame) {
        self.frames += 1;
        if let Some(last) = self.last_tick {
            if frame.tick < last {
                tracing::warn!(tick = frame.tick, last, "frame went back in time");
                self.tick_regressions += 1;
            }
        }
        self.last_tick = Some(frame.tick);

        for boid in frame.boids.values() {
            let speed = boid.velocity.norm();
            let max_speed = boid.group.max_speed;
            if max_speed > 0.0 {
                self.max_speed_ratio = self.max_speed_ratio.max(speed / max_speed);
            }
            if speed > max_speed + TOLERANCE {
                tracing::warn!(boid = %boid.owner, speed, max_speed, "speed cap violated");
                self.speed_violations += 1;
            }
            if boid.acceleration.norm() > boid.group.max_force + TOLERANCE {
                self.force_violations += 1;
            }
            if !self.bounds.contains(&boid.position) {
                tracing::warn!(boid = %boid.owner, x = boid.position.x, y = boid.position.y, "boid outside the torus");
                self.bounds_violations += 1;
            }
        }
        self.groups = summarize_groups(frame.boids.values());
    }

    pub fn generate_report(&self) -> ValidationReport {
        ValidationReport {
            frames: self.frames,
            last_tick: self.last_tick.unwrap_or(0),
            tick_regressions: self.tick_regressions,
            speed_violations: self.speed_violations,
            force_violations: self.force_violations,
            bounds_violations: self.bounds_violations,
            max_speed_ratio: self.max_speed_ratio,
            groups: self.groups.clone(),
        }
    }
}

// =============================================================================
// VALIDATION REPORT
// =============================================================================

/// Final validation report.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub frames: usize,
    pub last_tick: u64,
    pub tick_regressions: usize,
    pub speed_violations: usize,
    pub force_violations: usize,
    pub bounds_violations: usize,
    pub max_speed_ratio: f64,
    /// Groups as of the last frame
    pub groups: Vec<GroupSummary>,
}

impl ValidationReport {
    /// True if no invariant was violated.
    pub fn passes(&self) -> bool {
        self.tick_regressions == 0
            && self.speed_violations == 0
            && self.force_violations == 0
            && self.bounds_violations == 0
    }

    /// Print formatted report to console
    pub fn print(&self) {
        println!();
        println!("╔══════════════════════════════════════════════════════════════╗");
        println!("║                 BOIDS VALIDATION REPORT                      ║");
        println!("╠══════════════════════════════════════════════════════════════╣");
        println!("║ Frames:                {:>10}                            ║", self.frames);
        println!("║ Last Tick:             {:>10}                            ║", self.last_tick);
        println!("║ Tick Regressions:      {:>10}                            ║", self.tick_regressions);
        println!("║ Speed Violations:      {:>10}                            ║", self.speed_violations);
        println!("║ Force Violations:      {:>10}                            ║", self.force_violations);
        println!("║ Bounds Violations:     {:>10}                            ║", self.bounds_violations);
        println!("║ Max Speed Ratio:       {:>10.3}                            ║", self.max_speed_ratio);
        println!("╚══════════════════════════════════════════════════════════════╝");

        if !self.groups.is_empty() {
            println!();
            println!("  Group       Count    Centroid            Speed   Polarization");
            println!("─────────────────────────────────────────────────────────────────");
            for g in &self.groups {
                println!(
                    "  {:<10} {:>6}    ({:>7.1}, {:>7.1})   {:>5.2}   {:>6.3}",
                    g.name, g.count, g.centroid[0], g.centroid[1], g.mean_speed, g.polarization
                );
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::{GroupParameters, Rgb};
    use approx::assert_relative_eq;
    use boids_env::EntityId;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn frame(tick: u64, boids: Vec<BoidState>) -> Frame {
        Frame {
            tick,
            boids: Arc::new(boids.into_iter().map(|b| (b.owner, b)).collect()),
            walls: Arc::new(HashMap::new()),
        }
    }

    fn boid(seed: u64, group: &Arc<GroupParameters>, pos: (f64, f64), vel: (f64, f64)) -> BoidState {
        BoidState::new(
            EntityId::from_seed(seed),
            Arc::clone(group),
            Vec2::new(pos.0, pos.1),
            Vec2::new(vel.0, vel.1),
        )
    }

    #[test]
    fn test_group_summary() {
        let red = Arc::new(GroupParameters::new("red", Rgb::RED));
        let blue = Arc::new(GroupParameters::new("blue", Rgb::BLUE));
        let boids = vec![
            boid(1, &red, (0.0, 0.0), (1.0, 0.0)),
            boid(2, &red, (10.0, 20.0), (-1.0, 0.0)),
            boid(3, &blue, (5.0, 5.0), (0.0, 2.0)),
        ];

        let summary = summarize_groups(&boids);

        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].name, "blue");
        assert_relative_eq!(summary[0].polarization, 1.0);
        assert_eq!(summary[1].count, 2);
        assert_relative_eq!(summary[1].centroid[0], 5.0);
        assert_relative_eq!(summary[1].centroid[1], 10.0);
        assert_relative_eq!(summary[1].mean_speed, 1.0);
        assert_relative_eq!(summary[1].polarization, 0.0);
    }

    #[test]
    fn test_clean_frames_pass() {
        let red = Arc::new(GroupParameters::new("red", Rgb::RED));
        let mut session = ValidationSession::new(WorldBounds::new(800.0, 600.0));
        session.record_frame(&frame(0, vec![boid(1, &red, (0.0, 0.0), (0.0, 1.5))]));
        session.record_frame(&frame(1, vec![boid(1, &red, (0.0, 1.5), (0.0, 2.0))]));

        let report = session.generate_report();
        assert!(report.passes());
        assert_eq!(report.frames, 2);
        assert_eq!(report.last_tick, 1);
        assert_relative_eq!(report.max_speed_ratio, 1.0);
    }

    #[test]
    fn test_violations_detected() {
        let red = Arc::new(GroupParameters::new("red", Rgb::RED));
        let mut session = ValidationSession::new(WorldBounds::new(800.0, 600.0));
        session.record_frame(&frame(5, vec![boid(1, &red, (500.0, 0.0), (3.0, 0.0))]));
        session.record_frame(&frame(4, Vec::new()));

        let report = session.generate_report();
        assert!(!report.passes());
        assert_eq!(report.speed_violations, 1);
        assert_eq!(report.bounds_violations, 1);
        assert_eq!(report.tick_regressions, 1);
    }
}
