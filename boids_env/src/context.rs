//! Core execution context trait for simulation entities.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// The central interface for runtime interaction.
///
/// This trait abstracts the clock, task spawning and randomness so that the
/// coordinator and entity tasks can run against wall-clock tokio time in
/// production and against a virtual clock in headless runs.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`, `thread_rng`
/// - **Simulation**: `SimContext` (in `boids_sim`) - virtual clock, `ChaCha8Rng(seed)`
#[async_trait]
pub trait SimulationContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    fn now(&self) -> Duration;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task.
    ///
    /// Entity loops and deferred timers are started through here so that
    /// the naming of tasks shows up in the trace output.
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Returns a uniformly distributed sample in `[0, 1)`.
    ///
    /// Used for initial positions and velocities of spawned boids.
    fn random(&self) -> f64;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    fn seed(&self) -> u64;
}
