//! Error taxonomy of the simulation core.
//!
//! Geometry degeneracies never show up here: parallel sightlines and
//! zero-length vectors are absorbed as "no contribution" where they occur.

use boids_env::{EntityId, EnvError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoidsError {
    /// Invalid world, group, population or wall definition
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A message referenced an entity absent from the canonical map
    #[error("Missing entity: {0}")]
    MissingEntity(EntityId),

    /// No world with this id was created
    #[error("Unknown world: {0}")]
    UnknownWorld(EntityId),

    /// The world was already started
    #[error("World {0} already started")]
    AlreadyStarted(EntityId),

    #[error(transparent)]
    Env(#[from] EnvError),
}

impl BoidsError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
