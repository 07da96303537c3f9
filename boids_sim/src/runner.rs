//! Scenario runner - drives preset worlds headlessly and checks invariants.

use crate::context::SimContext;
use crate::scenarios::{MidRunEvent, ScenarioId};
use crate::simulation::Simulation;
use crate::viewer::{InvariantMonitor, LogViewer};

use boids_core::validation::ValidationReport;
use boids_core::{BoidsError, TickMetrics, WorldConfig};
use boids_env::SimulationContext;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Configuration for a scenario run.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Seed for spawn layouts
    pub seed: u64,

    /// Ticks to complete before stopping
    pub ticks: u64,

    /// Boids per population
    pub population_size: usize,

    /// Pause between ticks
    pub pause: Duration,

    /// Wait each boid observes before submitting its action
    pub action_delay: Duration,

    /// Log flock summaries every this many ticks (0 = never)
    pub log_every: u64,

    /// Wall-clock budget for the whole run
    pub timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            ticks: 200,
            population_size: 30,
            pause: Duration::ZERO,
            action_delay: Duration::ZERO,
            log_every: 0,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Ticks completed before stop
    pub total_ticks: u64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Coordinator counters at the end of the run
    pub metrics: TickMetrics,

    /// Fraction of received actions that were integrated
    pub acceptance_rate: f64,

    /// Mean actions integrated per completed tick
    pub actions_per_tick: f64,

    /// Invariant checks over every published frame
    pub validation: ValidationReport,
}

/// Runs preset scenarios.
pub struct ScenarioRunner {
    config: RunnerConfig,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            config: RunnerConfig {
                seed,
                ..RunnerConfig::default()
            },
        }
    }

    /// Sets the number of ticks to run.
    pub fn with_ticks(mut self, ticks: u64) -> Self {
        self.config.ticks = ticks;
        self
    }

    /// Sets the boids per population.
    pub fn with_population_size(mut self, size: usize) -> Self {
        self.config.population_size = size;
        self
    }

    /// Sets the pause between ticks.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.config.pause = pause;
        self
    }

    /// Sets the wait each boid observes before submitting its action.
    pub fn with_action_delay(mut self, delay: Duration) -> Self {
        self.config.action_delay = delay;
        self
    }

    /// Sets how often flock summaries are logged.
    pub fn with_log_every(mut self, ticks: u64) -> Self {
        self.config.log_every = ticks;
        self
    }

    /// Sets the wall-clock budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Runs a scenario on a seeded virtual-time context.
    pub async fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.run_with_context(SimContext::shared(self.config.seed), scenario).await
    }

    /// Runs a scenario on the given context.
    pub async fn run_with_context<Ctx: SimulationContext>(&self, context: Arc<Ctx>, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.config.seed);
        let world_config = WorldConfig::default()
            .with_pause(self.config.pause)
            .with_action_delay(self.config.action_delay);
        let monitor = Arc::new(InvariantMonitor::new(world_config.bounds()));

        let outcome = tokio::time::timeout(
            self.config.timeout,
            self.drive(context, scenario, world_config, Arc::clone(&monitor)),
        )
        .await;

        let (metrics, failure) = match outcome {
            Ok(Ok((metrics, failure))) => (metrics, failure),
            Ok(Err(e)) => (TickMetrics::default(), Some(format!("setup failed: {e}"))),
            Err(_) => (
                TickMetrics::default(),
                Some(format!("timed out after {:?}", self.config.timeout)),
            ),
        };

        let validation = monitor.report();
        let failure = failure.or_else(|| {
            (!validation.passes()).then(|| {
                format!(
                    "invariants violated: speed={} force={} bounds={} regressions={}",
                    validation.speed_violations,
                    validation.force_violations,
                    validation.bounds_violations,
                    validation.tick_regressions
                )
            })
        });

        if let Some(reason) = &failure {
            warn!(scenario = scenario.name(), %reason, "scenario failed");
        }
        ScenarioResult {
            scenario: scenario.name().to_string(),
            seed: self.config.seed,
            passed: failure.is_none(),
            total_ticks: metrics.completed_ticks,
            failure_reason: failure,
            acceptance_rate: metrics.acceptance_rate(),
            actions_per_tick: metrics.actions_per_tick(),
            metrics,
            validation,
        }
    }

    /// Builds, runs and stops one world. Returns the final metrics and the
    /// first scenario-specific check that failed.
    async fn drive<Ctx: SimulationContext>(
        &self,
        context: Arc<Ctx>,
        scenario: ScenarioId,
        world_config: WorldConfig,
        monitor: Arc<InvariantMonitor>,
    ) -> Result<(TickMetrics, Option<String>), BoidsError> {
        let mut sim = Simulation::new(context);
        let world = sim.create_world(world_config)?;
        sim.add_listener(world, monitor)?;
        if self.config.log_every > 0 {
            sim.add_listener(world, Arc::new(LogViewer::new(self.config.log_every)))?;
        }

        let size = self.config.population_size;
        let boids = scenario.populate(&mut sim, world, size)?;
        let mut metrics = sim.metrics(world)?;
        sim.start(world)?;

        let mut failure = None;
        if let Some(event) = scenario.mid_run_event() {
            let at = self.config.ticks / 2;
            let before = wait_until(&mut metrics, |m| m.completed_ticks >= at).await;
            debug!(scenario = scenario.name(), tick = before.completed_ticks, ?event, "mid-run event");
            scenario.disrupt(&mut sim, world, &boids, size)?;

            let expected_live = match event {
                MidRunEvent::KillThird => before.live_boids - boids.iter().step_by(3).count(),
                MidRunEvent::SpawnFlock => before.live_boids + size,
            };
            let after = wait_until(&mut metrics, |m| {
                m.live_boids == expected_live || m.completed_ticks >= self.config.ticks
            })
            .await;
            if after.live_boids != expected_live {
                failure = Some(format!(
                    "expected {} live boids after {:?}, found {}",
                    expected_live, event, after.live_boids
                ));
            }
        }

        let reached = wait_until(&mut metrics, |m| m.completed_ticks >= self.config.ticks).await;
        sim.stop(world)?;
        let last = wait_until(&mut metrics, |m| m.stopped).await;

        if failure.is_none() && reached.completed_ticks < self.config.ticks {
            failure = Some(format!(
                "world stalled at tick {} of {}",
                reached.completed_ticks, self.config.ticks
            ));
        }
        info!(
            scenario = scenario.name(),
            ticks = last.completed_ticks,
            actions = last.actions_integrated,
            stale = last.stale_actions,
            "scenario finished"
        );
        Ok((last, failure))
    }
}

/// Waits for metrics satisfying `done`, or for the world to go away.
pub async fn wait_until(rx: &mut watch::Receiver<TickMetrics>, done: impl Fn(&TickMetrics) -> bool) -> TickMetrics {
    loop {
        let current = rx.borrow_and_update().clone();
        if done(&current) {
            return current;
        }
        if rx.changed().await.is_err() {
            return rx.borrow().clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_single_flock_passes() {
        let result = ScenarioRunner::new(42)
            .with_ticks(30)
            .with_population_size(8)
            .run(ScenarioId::SingleFlock)
            .await;
        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.total_ticks >= 30);
        assert_eq!(result.metrics.live_boids, 8);
        assert!(result.validation.frames > 30);
    }

    #[tokio::test]
    async fn test_attrition_shrinks_live_set() {
        let result = ScenarioRunner::new(7)
            .with_ticks(40)
            .with_population_size(9)
            .run(ScenarioId::Attrition)
            .await;
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.total_boids, 9);
        assert_eq!(result.metrics.live_boids, 6);
    }

    #[tokio::test]
    async fn test_late_joiners_grow_live_set() {
        let result = ScenarioRunner::new(7)
            .with_ticks(40)
            .with_population_size(5)
            .run(ScenarioId::LateJoiners)
            .await;
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.live_boids, 10);
    }

    #[tokio::test]
    async fn test_classic_with_pause() {
        let result = ScenarioRunner::new(3)
            .with_ticks(20)
            .with_population_size(5)
            .with_pause(Duration::from_millis(5))
            .run(ScenarioId::Classic)
            .await;
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.walls, 3);
    }

    #[tokio::test]
    async fn test_action_delay_reaches_boids() {
        let result = ScenarioRunner::new(11)
            .with_ticks(10)
            .with_population_size(4)
            .with_action_delay(Duration::from_millis(2))
            .run(ScenarioId::SingleFlock)
            .await;
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.stale_actions, 0);
        assert_eq!(result.acceptance_rate, 1.0);
        assert!(result.actions_per_tick >= 4.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(4))]

        #[test]
        fn prop_invariants_hold_for_any_seed(seed in any::<u64>()) {
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let result = runtime.block_on(
                ScenarioRunner::new(seed)
                    .with_ticks(15)
                    .with_population_size(6)
                    .run(ScenarioId::WalledCorridor),
            );
            prop_assert!(result.passed, "{:?}", result.failure_reason);
        }
    }
}
