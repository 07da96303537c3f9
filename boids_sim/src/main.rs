//! Boids Simulator CLI
//!
//! Run preset flocking scenarios headlessly and check their invariants.

use boids_env::TokioContext;
use boids_sim::scenarios::ScenarioId;
use boids_sim::{ScenarioResult, ScenarioRunner};
use clap::Parser;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Boids flocking simulator
#[derive(Parser, Debug)]
#[command(name = "boids-sim")]
#[command(about = "Run headless boids flocking scenarios", long_about = None)]
struct Args {
    /// Seed for spawn layouts (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Ticks to run per scenario
    #[arg(short, long, default_value = "200")]
    ticks: u64,

    /// Scenario to run (classic, single_flock, predators, walled_corridor, attrition, late_joiners, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Boids per population
    #[arg(short, long, default_value = "30")]
    population: usize,

    /// Pause between ticks in milliseconds
    #[arg(long, default_value = "0")]
    pause_ms: u64,

    /// Wait before each boid action in milliseconds (defaults to --pause-ms)
    #[arg(long)]
    action_delay_ms: Option<u64>,

    /// Log flock summaries every N ticks (0 = never)
    #[arg(long, default_value = "0")]
    log_every: u64,

    /// Use wall-clock time instead of the virtual clock
    #[arg(long)]
    realtime: bool,

    /// Wall-clock budget per scenario in seconds
    #[arg(long, default_value = "120")]
    timeout_secs: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
    }

    if !args.json {
        info!("Boids Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        match args.scenario.parse() {
            Ok(scenario) => vec![scenario],
            Err(e) => {
                eprintln!("Error: {}", e);
                let names: Vec<&str> = ScenarioId::all().iter().map(|s| s.name()).collect();
                eprintln!("Available scenarios: {}, all", names.join(", "));
                std::process::exit(1);
            }
        }
    };

    let seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    let runner = ScenarioRunner::new(seed)
        .with_ticks(args.ticks)
        .with_population_size(args.population)
        .with_pause(Duration::from_millis(args.pause_ms))
        .with_action_delay(Duration::from_millis(args.action_delay_ms.unwrap_or(args.pause_ms)))
        .with_log_every(args.log_every)
        .with_timeout(Duration::from_secs(args.timeout_secs));

    let mut results: Vec<ScenarioResult> = Vec::new();
    for scenario in &scenarios {
        if !args.json {
            info!("▶ {} - {}", scenario.name(), scenario.description());
        }
        let result = if args.realtime {
            runner.run_with_context(TokioContext::shared(), *scenario).await
        } else {
            runner.run(*scenario).await
        };

        if !args.json {
            if result.passed {
                info!("✓ {} (seed={}) PASSED in {} ticks", scenario.name(), seed, result.total_ticks);
                info!(
                    "  {:.1} actions/tick, {:.1}% accepted",
                    result.actions_per_tick,
                    result.acceptance_rate * 100.0
                );
                result.validation.print();
            } else {
                error!(
                    "✗ {} (seed={}) FAILED: {}",
                    scenario.name(),
                    seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
        results.push(result);
    }

    let total = results.len();
    let failed = results.iter().filter(|r| !r.passed).count();

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed,
            "failed": failed,
            "results": results,
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Failed to encode results: {e}"),
        }
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed, total);
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }
}
