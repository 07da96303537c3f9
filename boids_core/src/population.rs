//! Population parameters: the immutable per-group tuning of the flocking rules.

use crate::error::BoidsError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_REPULSION_FORCE: f64 = 5.0;
pub const DEFAULT_SEPARATION_FORCE: f64 = 1.0;
pub const DEFAULT_COHESION_FORCE: f64 = 0.0001;
pub const DEFAULT_ALIGNMENT_FORCE: f64 = 1.0;

pub const DEFAULT_REPULSION_DIST: f64 = 100.0;
pub const DEFAULT_SEPARATION_DIST: f64 = 10.0;
pub const DEFAULT_COHESION_DIST: f64 = 100.0;
pub const DEFAULT_ALIGNMENT_DIST: f64 = 100.0;

pub const DEFAULT_POPULATION_SIZE: usize = 100;

/// Render colour of a population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const RED: Rgb = Rgb(255, 0, 0);
    pub const GREEN: Rgb = Rgb(0, 255, 0);
    pub const BLUE: Rgb = Rgb(0, 0, 255);
}

/// One flocking rule: on/off, weight in the final sum, trigger distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleParams {
    pub enabled: bool,
    pub weight: f64,
    pub distance: f64,
}

impl RuleParams {
    pub fn new(weight: f64, distance: f64) -> Self {
        Self {
            enabled: true,
            weight,
            distance,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Properties of a boids population.
///
/// Created once at configuration time and shared behind an `Arc` by every
/// boid of the group; never mutated after spawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupParameters {
    /// Unique group name, also the group's delivery tag
    pub name: String,

    pub color: Rgb,

    pub max_speed: f64,
    pub max_force: f64,

    /// Inertia: the flocking force is divided by it
    pub mass: f64,

    pub separation: RuleParams,
    pub cohesion: RuleParams,
    pub alignment: RuleParams,
    pub repulsion: RuleParams,

    /// Cosine of the visibility half-angle; -1.0 disables the cone
    pub visible_angle_cos: f64,
}

impl GroupParameters {
    /// Creates a group with the stock tuning.
    pub fn new(name: impl Into<String>, color: Rgb) -> Self {
        Self {
            name: name.into(),
            color,
            max_speed: 2.0,
            max_force: 1.7,
            mass: 1.0,
            separation: RuleParams::new(DEFAULT_SEPARATION_FORCE, DEFAULT_SEPARATION_DIST),
            cohesion: RuleParams::new(DEFAULT_COHESION_FORCE, DEFAULT_COHESION_DIST),
            alignment: RuleParams::new(DEFAULT_ALIGNMENT_FORCE, DEFAULT_ALIGNMENT_DIST),
            repulsion: RuleParams::new(DEFAULT_REPULSION_FORCE, DEFAULT_REPULSION_DIST),
            // 90 radians, not degrees: the stock cone is about 117° wide
            visible_angle_cos: 90.0_f64.cos(),
        }
    }

    /// Checks the values the physics divides by or clamps against.
    pub fn validate(&self) -> Result<(), BoidsError> {
        if self.name.is_empty() {
            return Err(BoidsError::config("group name must not be empty"));
        }
        if !(self.max_speed > 0.0) {
            return Err(BoidsError::config(format!(
                "group {}: max_speed must be positive, got {}",
                self.name, self.max_speed
            )));
        }
        if !(self.max_force > 0.0) {
            return Err(BoidsError::config(format!(
                "group {}: max_force must be positive, got {}",
                self.name, self.max_force
            )));
        }
        if !(self.mass > 0.0) {
            return Err(BoidsError::config(format!(
                "group {}: mass must be positive, got {}",
                self.name, self.mass
            )));
        }
        if !(-1.0..=1.0).contains(&self.visible_angle_cos) {
            return Err(BoidsError::config(format!(
                "group {}: visible_angle_cos must lie in [-1, 1], got {}",
                self.name, self.visible_angle_cos
            )));
        }
        for (rule, params) in [
            ("separation", &self.separation),
            ("cohesion", &self.cohesion),
            ("alignment", &self.alignment),
            ("repulsion", &self.repulsion),
        ] {
            if params.distance < 0.0 {
                return Err(BoidsError::config(format!(
                    "group {}: {} distance must not be negative",
                    self.name, rule
                )));
            }
        }
        Ok(())
    }
}

/// A group plus how many boids of it to spawn.
#[derive(Debug, Clone)]
pub struct Population {
    pub params: Arc<GroupParameters>,
    pub size: usize,
}

impl Population {
    pub fn new(params: GroupParameters, size: usize) -> Result<Self, BoidsError> {
        if size == 0 {
            return Err(BoidsError::config(format!(
                "population {} must contain at least one boid",
                params.name
            )));
        }
        params.validate()?;
        Ok(Self {
            params: Arc::new(params),
            size,
        })
    }

    /// A stock population of `DEFAULT_POPULATION_SIZE` boids.
    pub fn with_defaults(name: &str, color: Rgb) -> Self {
        Self {
            params: Arc::new(GroupParameters::new(name, color)),
            size: DEFAULT_POPULATION_SIZE,
        }
    }

    /// The red, green and blue populations of the classic setup.
    pub fn classic_trio() -> Vec<Population> {
        vec![
            Population::with_defaults("red", Rgb::RED),
            Population::with_defaults("green", Rgb::GREEN),
            Population::with_defaults("blue", Rgb::BLUE),
        ]
    }
}
