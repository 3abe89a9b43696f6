//! Scenario runner - executes scripted scenarios and checks assertions.

use crate::error::HarnessError;
use crate::harness::{HarnessConfig, HarnessSnapshot, HeadlessHarness};
use crate::replay::{apply_step, RecordedSession, SessionRecorder};
use crate::scenario::{AssertionFailure, Scenario};
use crate::scenarios::ScenarioId;

use conclave_core::ActionResult;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub name: String,

    /// Model seed used
    pub seed: u64,

    /// Whether every assertion held
    pub passed: bool,

    /// One result per non-wait step
    pub action_results: Vec<ActionResult>,

    /// Assertions that did not hold
    pub failures: Vec<AssertionFailure>,

    pub final_snapshot: HarnessSnapshot,

    /// Full recording, replayable with [`crate::replay_session`]
    pub session: RecordedSession,
}

impl ScenarioResult {
    /// One-line reason for a failed run.
    pub fn failure_reason(&self) -> Option<String> {
        if self.passed {
            return None;
        }
        let reasons: Vec<String> = self
            .failures
            .iter()
            .map(|f| format!("{:?} (actual {})", f.assertion, f.actual))
            .collect();
        Some(reasons.join("; "))
    }
}

/// Runs scripted scenarios.
pub struct ScenarioRunner {
    /// Seed used when the scenario does not pin one
    seed: u64,

    /// Recent transitions kept by each harness
    transition_history: usize,

    /// Store the model JSON after every recorded step
    record_states: bool,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            transition_history: HarnessConfig::default().transition_history,
            record_states: false,
        }
    }

    /// Sets the transition history kept per harness.
    pub fn with_transition_history(mut self, history: usize) -> Self {
        self.transition_history = history;
        self
    }

    /// Sets whether per-step model states are recorded.
    pub fn with_recorded_states(mut self, record: bool) -> Self {
        self.record_states = record;
        self
    }

    /// Runs a built-in scenario with this runner's seed.
    pub fn run_builtin(&self, id: ScenarioId) -> Result<ScenarioResult, HarnessError> {
        let mut scenario = id.scenario();
        scenario.seed = Some(self.seed);
        self.run(&scenario)
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: &Scenario) -> Result<ScenarioResult, HarnessError> {
        let seed = scenario.seed.unwrap_or(self.seed);
        info!("Starting scenario: {} (seed={})", scenario.name, seed);

        let mut harness = HeadlessHarness::with_config(HarnessConfig {
            seed,
            transition_history: self.transition_history,
        });
        harness.setup_from_scenario(scenario)?;

        let mut recorder =
            SessionRecorder::start(&harness, &scenario.name, seed).with_states(self.record_states);
        let mut action_results = Vec::new();

        for (index, step) in scenario.actions.iter().enumerate() {
            let (result, advanced) = apply_step(&mut harness, step)?;
            recorder.record(&harness, step, advanced);

            if let Some(result) = result {
                if result.success {
                    debug!("  [{}] {}@{} -> {:?}", index, step.action, step.cloud_id, result.codes());
                } else {
                    warn!(
                        "  [{}] {}@{} rejected: {}",
                        index,
                        step.action,
                        step.cloud_id,
                        result.message.as_deref().unwrap_or("unknown")
                    );
                }
                action_results.push(result);
            }
        }

        let failures: Vec<AssertionFailure> = scenario
            .assertions
            .iter()
            .filter_map(|assertion| assertion.check(harness.model()).err())
            .collect();
        let passed = failures.is_empty();

        if passed {
            info!(
                "✓ {} complete: {} steps, {} assertions, t={:.1}s",
                scenario.name,
                scenario.actions.len(),
                scenario.assertions.len(),
                harness.model().elapsed()
            );
        } else {
            warn!("✗ {}: {}/{} assertions failed", scenario.name, failures.len(), scenario.assertions.len());
        }

        Ok(ScenarioResult {
            name: scenario.name.clone(),
            seed,
            passed,
            action_results,
            failures,
            final_snapshot: harness.to_json(),
            session: recorder.finish(&harness),
        })
    }
}

/// Runs a scenario with its own seed (or 42).
pub fn run_scenario(scenario: &Scenario) -> Result<ScenarioResult, HarnessError> {
    ScenarioRunner::new(HarnessConfig::default().seed).run(scenario)
}
