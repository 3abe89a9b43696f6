//! Conclave Simulator CLI
//!
//! Run scripted scenarios, explore them with random walks, and replay
//! recorded sessions.

use clap::{Parser, Subcommand};
use conclave_sim::scenarios::ScenarioId;
use conclave_sim::{
    replay_session, RandomWalkConfig, RandomWalker, RecordedSession, Scenario, ScenarioResult,
    ScenarioRunner,
};
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Conclave deterministic simulation CLI
#[derive(Parser, Debug)]
#[command(name = "conclave-sim")]
#[command(about = "Run, explore and replay deterministic Conclave simulations", long_about = None)]
struct Args {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run scripted scenarios and check their assertions
    Scenario {
        /// Built-in scenario (first_contact, protector_exile, grievance_clock, proxy_maze, full_household, all)
        #[arg(default_value = "all")]
        name: String,

        /// Load the scenario from a JSON file instead
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Model seed (0 = random)
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Write the recorded session to this path
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Explore a scenario with random walks
    Walk {
        /// Built-in scenario to explore
        #[arg(default_value = "full_household")]
        name: String,

        /// Load the scenario from a JSON file instead
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Number of walks
        #[arg(short, long, default_value = "100")]
        iterations: usize,

        /// Step ceiling per walk
        #[arg(long, default_value = "50")]
        steps: usize,

        /// Softmax over rule scores instead of uniform choice
        #[arg(long)]
        heuristic: bool,

        /// Print the coverage gap report
        #[arg(long)]
        coverage: bool,

        /// Stop at the first victory
        #[arg(long)]
        stop_on_victory: bool,

        /// Base seed (0 = random)
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },

    /// Replay a recorded session and report divergences
    Replay {
        /// Session JSON
        path: PathBuf,
    },
}

fn resolve_seed(seed: u64) -> u64 {
    if seed == 0 {
        rand::random()
    } else {
        seed
    }
}

fn load_scenarios(name: &str, file: Option<&PathBuf>) -> Result<Vec<Scenario>, String> {
    if let Some(path) = file {
        return Scenario::from_file(path)
            .map(|scenario| vec![scenario])
            .map_err(|e| format!("{}: {}", path.display(), e));
    }
    if name == "all" {
        return Ok(ScenarioId::all().iter().map(ScenarioId::scenario).collect());
    }
    let id: ScenarioId = name.parse()?;
    Ok(vec![id.scenario()])
}

fn print_json(value: &impl serde::Serialize) -> bool {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            true
        }
        Err(e) => {
            error!("Failed to serialize output: {}", e);
            false
        }
    }
}

fn run_scenarios(
    scenarios: &[Scenario],
    seed: u64,
    export: Option<&PathBuf>,
    json: bool,
) -> bool {
    if export.is_some() && scenarios.len() > 1 {
        error!("--export only supports a single scenario, not 'all'");
        return false;
    }

    let runner = ScenarioRunner::new(seed).with_recorded_states(export.is_some());
    let mut results: Vec<ScenarioResult> = Vec::new();
    let mut failed = 0;

    for scenario in scenarios {
        match runner.run(scenario) {
            Ok(result) => {
                if !json {
                    if result.passed {
                        info!("✓ {} (seed={}) PASSED", result.name, result.seed);
                    } else {
                        error!(
                            "✗ {} (seed={}) FAILED: {}",
                            result.name,
                            result.seed,
                            result.failure_reason().unwrap_or_default()
                        );
                    }
                }
                if !result.passed {
                    failed += 1;
                }
                results.push(result);
            }
            Err(e) => {
                error!("✗ {}: {}", scenario.name, e);
                failed += 1;
            }
        }
    }

    if let (Some(path), Some(result)) = (export, results.first()) {
        match result.session.write_to_file(path) {
            Ok(()) => info!("Exported {} steps to {}", result.session.actions.len(), path.display()),
            Err(e) => {
                error!("Failed to write session: {}", e);
                return false;
            }
        }
    }

    let total = scenarios.len();
    if json {
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed,
            "failed": failed,
            "results": results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.name,
                    "seed": r.seed,
                    "passed": r.passed,
                    "steps": r.action_results.len(),
                    "elapsed": r.final_snapshot.model.elapsed(),
                    "failure_reason": r.failure_reason(),
                })
            }).collect::<Vec<_>>(),
        });
        if !print_json(&summary) {
            return false;
        }
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed, total);
        }
    }
    failed == 0
}

fn run_walk(scenario: Scenario, config: RandomWalkConfig, show_gaps: bool, json: bool) -> bool {
    let results = match RandomWalker::new(scenario, config).run() {
        Ok(results) => results,
        Err(e) => {
            error!("Walk failed: {}", e);
            return false;
        }
    };

    if json {
        return print_json(&results) && results.errors.is_empty();
    }

    info!(
        "{} walks, {} victories, {} errors, best score {:.2}",
        results.iterations,
        results.victories,
        results.errors.len(),
        results.best_score.unwrap_or(0.0)
    );
    for err in &results.errors {
        error!("  walk {} (seed={:#x}): {}", err.iteration, err.seed, err.message);
    }
    if let Some(paths) = &results.victory_paths {
        for path in paths {
            info!("  victory in {} steps (walk {}, seed={:#x})", path.steps.len(), path.iteration, path.seed);
        }
    }
    if let Some(coverage) = &results.coverage {
        info!(
            "  coverage: {} actions, {} states, {} transitions, {} outcome codes",
            coverage.actions.len(),
            coverage.states.len(),
            coverage.transitions.len(),
            coverage.outcomes.len()
        );
    }
    if show_gaps {
        for gap in results.coverage_gaps.iter().flatten() {
            info!("  gap {:?} {}: {}", gap.kind, gap.key, gap.hint);
        }
    }
    results.errors.is_empty()
}

fn run_replay(path: &PathBuf, json: bool) -> bool {
    let session = match RecordedSession::from_file(path) {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to load {}: {}", path.display(), e);
            return false;
        }
    };
    let report = match replay_session(&session) {
        Ok(report) => report,
        Err(e) => {
            error!("Replay failed: {}", e);
            return false;
        }
    };

    if json {
        return print_json(&report) && report.is_clean();
    }

    if let Some(divergence) = &report.divergence {
        error!(
            "✗ Diverged at step {}: expected {} model draws, got {}",
            divergence.action_index, divergence.expected_count, divergence.actual_count
        );
        error!("  expected: {:?}", divergence.expected_log);
        error!("  actual:   {:?}", divergence.actual_log);
    }
    for diff in &report.snapshot_diffs {
        error!("  {}: expected {} got {}", diff.path, diff.expected, diff.actual);
    }
    if let Some(message) = &report.error {
        error!("  content error: {}", message);
    }
    if report.is_clean() {
        info!("✓ {} steps replayed cleanly", report.actions_replayed);
    }
    report.is_clean()
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    if !args.json {
        info!("Conclave Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let ok = match &args.command {
        Command::Scenario { name, file, seed, export } => {
            match load_scenarios(name, file.as_ref()) {
                Ok(scenarios) => run_scenarios(&scenarios, resolve_seed(*seed), export.as_ref(), args.json),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    false
                }
            }
        }
        Command::Walk {
            name,
            file,
            iterations,
            steps,
            heuristic,
            coverage,
            stop_on_victory,
            seed,
        } => match load_scenarios(name, file.as_ref()) {
            Ok(mut scenarios) if scenarios.len() == 1 => {
                let config = RandomWalkConfig {
                    iterations: *iterations,
                    max_actions_per_iteration: *steps,
                    heuristic_scoring: *heuristic,
                    stop_on_victory: *stop_on_victory,
                    seed: Some(resolve_seed(*seed)),
                    ..Default::default()
                };
                run_walk(scenarios.remove(0), config, *coverage, args.json)
            }
            Ok(_) => {
                eprintln!("Error: walk explores a single scenario, not 'all'");
                false
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                false
            }
        },
        Command::Replay { path } => run_replay(path, args.json),
    };

    // Exit with proper code for CI
    if !ok {
        std::process::exit(1);
    }
}
