//! Boids Simulation Harness
//!
//! This crate bootstraps boids worlds on top of `boids_core` and runs them
//! headlessly:
//! - **Bootstrap**: create worlds, spawn boids and walls, start and stop
//! - **Context**: a virtual clock and a seeded RNG for reproducible spawn layouts
//! - **Viewers**: repaint listeners that log or validate frames
//! - **Scenarios**: preset worlds driven by a runner that checks invariants
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Simulation                           │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ SimContext / TokioContext (clock, spawn, random)     │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                              │                              │
//! │  ┌────────────┐   Event   ┌──▼─────────┐                    │
//! │  │ BoidAgent  │◄─────────►│ Coordinator│──▶ RepaintListener │
//! │  │ WallAgent  │ EventSpace│  (world)   │                    │
//! │  └────────────┘           └────────────┘                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use boids_sim::{SimContext, Simulation};
//! use boids_core::{Population, WorldConfig};
//!
//! let mut sim = Simulation::new(SimContext::shared(42));
//! let world = sim.create_world(WorldConfig::default())?;
//! for population in Population::classic_trio() {
//!     sim.add_population(world, &population)?;
//! }
//! sim.start(world)?;
//! ```

mod context;
mod simulation;
pub mod runner;
pub mod scenarios;
pub mod viewer;

pub use context::SimContext;
pub use runner::{RunnerConfig, ScenarioResult, ScenarioRunner};
pub use simulation::Simulation;
pub use viewer::{InvariantMonitor, LogViewer};
