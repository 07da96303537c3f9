//! Tick metrics published by the world coordinator.
//!
//! The coordinator pushes a fresh [`TickMetrics`] into a `tokio::sync::watch`
//! channel whenever its counters change, so observers (the scenario runner,
//! the CLI) can follow progress without touching the coordinator's state.

use boids_env::EntityId;
use serde::{Deserialize, Serialize};

/// Counters describing a world's progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickMetrics {
    /// Last tick whose accounting completed
    pub completed_ticks: u64,

    /// Boids currently counted towards tick completion
    pub live_boids: usize,

    /// Canonical boid bodies, including terminated ones
    pub total_boids: usize,

    pub walls: usize,

    /// Actions integrated since start
    pub actions_integrated: u64,

    /// Actions dropped for answering a wrong tick, duplicates, or non-live senders
    pub stale_actions: u64,

    /// Actions naming a boid the coordinator has never seen
    pub missing_entities: u64,

    /// Entities whose tasks reported termination
    pub terminated: u64,

    /// First boid integrated in the last completed tick. Varies between runs
    /// because actions are integrated in arrival order.
    pub last_first_mover: Option<EntityId>,

    pub started: bool,
    pub stopped: bool,
}

impl TickMetrics {
    /// Fraction of received actions that were integrated.
    pub fn acceptance_rate(&self) -> f64 {
        let received = self.actions_integrated + self.stale_actions + self.missing_entities;
        if received == 0 {
            1.0
        } else {
            self.actions_integrated as f64 / received as f64
        }
    }

    /// Mean actions integrated per completed tick.
    pub fn actions_per_tick(&self) -> f64 {
        if self.completed_ticks == 0 {
            0.0
        } else {
            self.actions_integrated as f64 / self.completed_ticks as f64
        }
    }
}
