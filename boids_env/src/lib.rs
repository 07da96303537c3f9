//! Boids Environment Abstraction Layer
//!
//! This crate provides the runtime seams the simulation core is written
//! against, so the same coordinator and entity tasks run both under a real
//! tokio clock and under a virtual, seeded clock in tests and headless runs.
//!
//! # Core Concept: Scoped Event Delivery
//!
//! Every entity (boid, wall, coordinator) owns a mailbox registered in an
//! [`EventSpace`]. Messages are addressed by [`Scope`]:
//! - one entity (`Scope::Entity`)
//! - every entity carrying a tag (`Scope::Group`)
//! - everybody (`Scope::All`)
//!
//! # Example
//!
//! ```ignore
//! use boids_env::{EventSpace, EntityId, Scope};
//!
//! let space = EventSpace::<String>::shared();
//! let id = EntityId::new();
//! let mut mailbox = space.register(id, ["boids"]);
//!
//! space.emit(&Scope::group("boids"), "hello".to_string());
//! assert_eq!(mailbox.try_recv().as_deref(), Some("hello"));
//! ```

mod context;
mod error;
mod event_space;
mod tokio_impl;
mod types;

pub use context::SimulationContext;
pub use error::EnvError;
pub use event_space::{EventSpace, Mailbox, Scope};
pub use tokio_impl::TokioContext;
pub use types::EntityId;
