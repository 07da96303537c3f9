//! World configuration and per-tick barrier accounting.

use crate::error::BoidsError;
use crate::flocking::SteeringConfig;
use crate::physics::WorldBounds;
use boids_env::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Configuration of one simulated world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Torus width, centred on the origin (default: 800)
    pub width: f64,

    /// Torus height, centred on the origin (default: 600)
    pub height: f64,

    /// Wait between a completed tick and the next perception (default: 0)
    pub pause: Duration,

    /// Maximum distance between consecutive wall points, also the wall
    /// perception range (default: 100)
    pub wall_spacing: f64,

    /// Length of the sightline boids cast along their heading (default: 5)
    pub sightline_length: f64,

    /// Multiplier on the raw wall escape force (default: 1e8)
    pub escape_gain: f64,

    /// Wait a boid observes before submitting each action (default: 0)
    pub action_delay: Duration,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            pause: Duration::ZERO,
            wall_spacing: 100.0,
            sightline_length: 5.0,
            escape_gain: 1e8,
            action_delay: Duration::ZERO,
        }
    }
}

impl WorldConfig {
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn with_action_delay(mut self, delay: Duration) -> Self {
        self.action_delay = delay;
        self
    }

    pub fn validate(&self) -> Result<(), BoidsError> {
        for (name, value) in [
            ("width", self.width),
            ("height", self.height),
            ("wall_spacing", self.wall_spacing),
            ("sightline_length", self.sightline_length),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(BoidsError::config(format!("{name} must be positive, got {value}")));
            }
        }
        if !self.escape_gain.is_finite() || self.escape_gain < 0.0 {
            return Err(BoidsError::config(format!(
                "escape_gain must be non-negative, got {}",
                self.escape_gain
            )));
        }
        Ok(())
    }

    pub fn bounds(&self) -> WorldBounds {
        WorldBounds::new(self.width, self.height)
    }

    pub fn steering(&self) -> SteeringConfig {
        SteeringConfig {
            wall_range: self.wall_spacing,
            sightline_length: self.sightline_length,
            escape_gain: self.escape_gain,
        }
    }
}

/// Why an action was not accounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// No tick is waiting for actions
    Closed,
    /// The action answers another tick
    WrongTick,
    /// The sender was not expected this tick
    NotExpected,
    /// The sender already submitted this tick
    Duplicate,
}

/// Which boids a tick waits for and which have answered.
///
/// The expected set is the live set at broadcast time, minus any boid that
/// terminates before answering.
#[derive(Debug, Clone, Default)]
pub struct TickAccounting {
    tick: u64,
    open: bool,
    expected: HashSet<EntityId>,
    accounted: HashSet<EntityId>,
}

impl TickAccounting {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens `tick`, waiting on every id in `live`.
    pub fn begin<'a>(&mut self, tick: u64, live: impl IntoIterator<Item = &'a EntityId>) {
        self.tick = tick;
        self.open = true;
        self.expected = live.into_iter().copied().collect();
        self.accounted.clear();
    }

    /// Records an action, or says why it cannot be counted.
    pub fn record(&mut self, sender: EntityId, tick: u64) -> Result<(), StaleReason> {
        if !self.open {
            return Err(StaleReason::Closed);
        }
        if tick != self.tick {
            return Err(StaleReason::WrongTick);
        }
        if !self.expected.contains(&sender) {
            return Err(StaleReason::NotExpected);
        }
        if !self.accounted.insert(sender) {
            return Err(StaleReason::Duplicate);
        }
        Ok(())
    }

    /// Stops waiting for `id`. Returns true if it was still owed.
    pub fn forget(&mut self, id: &EntityId) -> bool {
        let owed = self.expected.remove(id) && !self.accounted.contains(id);
        self.accounted.remove(id);
        owed
    }

    pub fn is_complete(&self) -> bool {
        self.open && self.accounted.len() == self.expected.len()
    }

    pub fn close(&mut self) {
        self.open = false;
        self.expected.clear();
        self.accounted.clear();
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Number of actions recorded for the open tick.
    pub fn answered(&self) -> usize {
        self.accounted.len()
    }

    /// Expected boids that have not answered the open tick.
    pub fn pending(&self) -> usize {
        self.expected.len() - self.accounted.len()
    }
}
