//! Simulation context implementing SimulationContext for headless runs.

use async_trait::async_trait;
use boids_env::SimulationContext;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Simulation context backed by virtual time and a seeded RNG.
///
/// This implements `SimulationContext` using:
/// - A virtual clock that only moves when something sleeps or it is advanced manually
/// - A seeded ChaCha8 RNG, so spawn layouts repeat for a given seed
/// - Sleep that advances virtual time and yields instead of waiting
///
/// Task interleaving is still up to the tokio scheduler, so the order in
/// which actions reach the coordinator is not reproducible.
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<Mutex<u64>>,

    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl SimContext {
    /// Creates a new SimContext with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            virtual_time_ns: Arc::new(Mutex::new(0)),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        *lock(&self.virtual_time_ns) += duration.as_nanos() as u64;
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        *lock(&self.virtual_time_ns)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            virtual_time_ns: Arc::clone(&self.virtual_time_ns),
            rng: Arc::clone(&self.rng),
        }
    }
}

#[async_trait]
impl SimulationContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    async fn sleep(&self, duration: Duration) {
        // Virtual sleep: time jumps forward, other tasks get a turn
        self.advance_time(duration);
        tokio::task::yield_now().await;
    }

    fn spawn<F>(&self, name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let name = name.to_string();
        tokio::spawn(async move {
            future.await;
            tracing::trace!(task = %name, "sim task finished");
        });
    }

    fn random(&self) -> f64 {
        lock(&self.rng).gen::<f64>()
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_context_time() {
        let ctx = SimContext::new(42);
        assert_eq!(ctx.now(), Duration::ZERO);

        ctx.advance_time(Duration::from_secs(1));
        assert_eq!(ctx.now(), Duration::from_secs(1));

        ctx.advance_time(Duration::from_millis(500));
        assert_eq!(ctx.now(), Duration::from_millis(1500));
    }

    #[test]
    fn test_sim_context_deterministic_random() {
        let ctx1 = SimContext::new(42);
        let ctx2 = SimContext::new(42);
        let a: Vec<f64> = (0..5).map(|_| ctx1.random()).collect();
        let b: Vec<f64> = (0..5).map(|_| ctx2.random()).collect();
        assert_eq!(a, b);
        assert!(a.iter().all(|x| (0.0..1.0).contains(x)));

        let other = SimContext::new(43);
        assert_ne!(a[0], other.random());
    }

    #[test]
    fn test_sim_context_clone_shares_time() {
        let ctx1 = SimContext::new(42);
        let ctx2 = ctx1.clone();

        ctx1.advance_time(Duration::from_secs(5));

        assert_eq!(ctx1.now(), ctx2.now());
        assert_eq!(ctx2.seed(), 42);
    }

    #[tokio::test]
    async fn test_sleep_advances_virtual_time() {
        let ctx = SimContext::new(1);
        ctx.sleep(Duration::from_millis(250)).await;
        assert_eq!(ctx.now(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_boid_action_delay_runs_on_virtual_clock() {
        use boids_core::agent_runtime::BoidAgent;
        use boids_core::protocol::{Event, Initialization, PerceptionSnapshot, BOIDS_TAG};
        use boids_core::{BoidState, GroupParameters, Rgb, SteeringConfig, Vec2};
        use boids_env::{EntityId, EventSpace};
        use std::collections::HashMap;

        let ctx = SimContext::shared(5);
        let space = EventSpace::<Event>::shared();
        let world = EntityId::from_seed(1);
        let id = EntityId::from_seed(2);
        let mut world_box = space.register(world, Vec::<String>::new());
        let mailbox = space.register(id, [BOIDS_TAG]);
        let agent = BoidAgent::new(Arc::clone(&ctx), Arc::clone(&space), mailbox);

        let group = Arc::new(GroupParameters::new("red", Rgb::RED));
        let body = BoidState::new(id, group, Vec2::zeros(), Vec2::new(0.0, 1.0));
        let init = Initialization::Boid {
            world,
            state: body.clone(),
            name: "Boid0".to_string(),
            steering: SteeringConfig::default(),
            action_delay: Duration::from_millis(40),
        };
        let snapshot = PerceptionSnapshot {
            tick: 1,
            boids: HashMap::from([(id, body)]),
            walls: HashMap::new(),
        };
        space.send_to(id, Event::Initialize(init)).unwrap();
        space.send_to(id, Event::Perception(Arc::new(snapshot))).unwrap();
        let task = tokio::spawn(agent.run());

        match world_box.recv().await {
            Some(Event::Action(action)) => {
                assert_eq!(action.tick, 1);
                assert_eq!(ctx.now(), Duration::from_millis(40));
            }
            other => panic!("expected action, got {other:?}"),
        }

        space.send_to(id, Event::Die).unwrap();
        task.await.unwrap();
        assert!(matches!(world_box.recv().await, Some(Event::Terminated { entity }) if entity == id));
    }
}
