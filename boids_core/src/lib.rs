//! Boids Core - Concurrent Flocking Simulation
//!
//! This library implements the simulation core of a boids world:
//! 1. **Force model**: separation, cohesion, alignment and repulsion rules,
//!    blended with line-of-sight wall avoidance
//! 2. **Physics**: force and speed capping with toroidal wrap
//! 3. **Coordination**: a single coordinator actor that broadcasts a perception
//!    per tick and waits for every live boid's action before advancing

pub mod agent_runtime;
pub mod body;
pub mod coordinator;
pub mod error;
pub mod flocking;
pub mod geometry;
pub mod metrics;
pub mod physics;
pub mod population;
pub mod protocol;
pub mod validation;
pub mod world;

// Re-export key types for convenience
pub use body::{BoidState, Vec2, WallSegment};
pub use coordinator::Coordinator;
pub use error::BoidsError;
pub use flocking::{BoidBrain, SteeringConfig};
pub use metrics::TickMetrics;
pub use physics::WorldBounds;
pub use population::{GroupParameters, Population, Rgb, RuleParams};
pub use protocol::{Event, Frame, PerceptionSnapshot, RepaintListener};
pub use world::WorldConfig;
