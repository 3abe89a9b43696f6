//! Recorded sessions and bit-exact replay with divergence diagnosis.
//!
//! A session records, per step, how many model-channel draws had been made
//! and which labels they carried. Replay re-executes the steps from the
//! initial snapshot and stops at the first step whose draw count differs,
//! reporting both label logs so the diverging decision can be named.

use crate::error::HarnessError;
use crate::harness::{HarnessSnapshot, HeadlessHarness, Transition};
use crate::scenario::ActionRef;

use conclave_core::{ActionOptions, ActionResult, BiographyField, PartId};
use conclave_env::SessionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Numeric tolerance when diffing snapshots.
pub const SNAPSHOT_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngCounts {
    pub model: u64,
}

/// One executed step of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedAction {
    pub action: String,

    #[serde(default)]
    pub cloud_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_cloud_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<BiographyField>,

    /// Seconds advanced before the step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait: Option<f64>,

    /// Simulated time after the step
    pub elapsed_time: f64,

    /// Time advances made so far in the session, this step included
    pub wait_count: u32,

    /// Model-channel draw count after the step
    pub rng_counts: RngCounts,

    /// Model-channel labels drawn during the step
    #[serde(default)]
    pub rng_log: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_state: Option<Value>,
}

impl RecordedAction {
    pub fn is_wait(&self) -> bool {
        self.action == conclave_core::WAIT_ACTION
    }

    pub fn to_action_ref(&self) -> ActionRef {
        ActionRef {
            action: self.action.clone(),
            cloud_id: self.cloud_id.clone(),
            target_cloud_id: self.target_cloud_id.clone(),
            field: self.field,
            wait: self.wait,
        }
    }

    fn options(&self) -> ActionOptions {
        ActionOptions {
            target: self.target_cloud_id.as_deref().map(PartId::new),
            field: self.field,
        }
    }
}

/// A full session: initial snapshot plus every step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedSession {
    pub session_id: SessionId,
    pub scenario: String,
    pub seed: u64,
    pub initial: HarnessSnapshot,
    pub actions: Vec<RecordedAction>,

    #[serde(rename = "final", default, skip_serializing_if = "Option::is_none")]
    pub final_snapshot: Option<HarnessSnapshot>,
}

impl RecordedSession {
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, HarnessError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn write_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), HarnessError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// The steps as scenario actions.
    pub fn action_refs(&self) -> Vec<ActionRef> {
        self.actions.iter().map(RecordedAction::to_action_ref).collect()
    }
}

/// Builds a [`RecordedSession`] while a harness runs.
pub struct SessionRecorder {
    session: RecordedSession,
    last_draws: u64,
    waits: u32,
    capture_states: bool,
}

impl SessionRecorder {
    /// Starts recording from the harness's current state.
    pub fn start(harness: &HeadlessHarness, scenario: &str, seed: u64) -> Self {
        Self {
            session: RecordedSession {
                session_id: SessionId::from_seed(seed),
                scenario: scenario.to_string(),
                seed,
                initial: harness.to_json(),
                actions: Vec::new(),
                final_snapshot: None,
            },
            last_draws: harness.model_draw_count(),
            waits: 0,
            capture_states: false,
        }
    }

    /// Also store the model JSON after every step.
    pub fn with_states(mut self, capture: bool) -> Self {
        self.capture_states = capture;
        self
    }

    /// Records one step that has just been executed on `harness`.
    ///
    /// `advanced` says whether the step included a time advance.
    pub fn record(&mut self, harness: &HeadlessHarness, step: &ActionRef, advanced: bool) {
        if advanced {
            self.waits += 1;
        }
        let draws = harness.model_draw_count();
        self.session.actions.push(RecordedAction {
            action: step.action.clone(),
            cloud_id: step.cloud_id.clone(),
            target_cloud_id: step.target_cloud_id.clone(),
            field: step.field,
            wait: step.wait.filter(|s| *s > 0.0),
            elapsed_time: harness.model().elapsed(),
            wait_count: self.waits,
            rng_counts: RngCounts { model: draws },
            rng_log: harness.model_log_since(self.last_draws).to_vec(),
            model_state: self.capture_states.then(|| harness.model_json()),
        });
        self.last_draws = draws;
    }

    pub fn len(&self) -> usize {
        self.session.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.session.actions.is_empty()
    }

    pub fn finish(mut self, harness: &HeadlessHarness) -> RecordedSession {
        self.session.final_snapshot = Some(harness.to_json());
        self.session
    }
}

/// Executes one scripted step, returning the action result (`None` for a
/// pure wait) and whether time advanced.
pub fn apply_step(
    harness: &mut HeadlessHarness,
    step: &ActionRef,
) -> Result<(Option<ActionResult>, bool), HarnessError> {
    let seconds = step.wait.unwrap_or(0.0);
    let advanced = seconds > 0.0;
    if advanced {
        harness.advance_time(seconds);
    }
    if step.is_wait() {
        return Ok((None, advanced));
    }
    let options = ActionOptions {
        target: step.target_cloud_id.as_deref().map(PartId::new),
        field: step.field,
    };
    let result = harness.execute_action(&step.action, &step.cloud_id, options)?;
    Ok((Some(result), advanced))
}

/// First step whose model draw count differs from the recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Divergence {
    pub action_index: usize,
    pub expected_count: u64,
    pub actual_count: u64,
    pub expected_log: Vec<String>,
    pub actual_log: Vec<String>,
    pub recent_transitions: Vec<Transition>,
}

/// A leaf that differs between two JSON trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub path: String,
    pub expected: Value,
    pub actual: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub actions_replayed: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub divergence: Option<Divergence>,

    #[serde(default)]
    pub snapshot_diffs: Vec<FieldDiff>,

    /// A content error that stopped the replay
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReplayReport {
    /// True when the replay matched the recording exactly.
    pub fn is_clean(&self) -> bool {
        self.divergence.is_none() && self.snapshot_diffs.is_empty() && self.error.is_none()
    }
}

/// Replays a session from its initial snapshot.
///
/// Mismatches are reported in the returned [`ReplayReport`]; only an
/// unrestorable initial snapshot is an `Err`.
pub fn replay_session(session: &RecordedSession) -> Result<ReplayReport, HarnessError> {
    info!(
        "Replaying session {} ({} steps, seed={})",
        session.session_id,
        session.actions.len(),
        session.seed
    );
    let mut harness = HeadlessHarness::from_json(session.initial.clone())?;
    let mut report = ReplayReport::default();

    for (index, step) in session.actions.iter().enumerate() {
        let draws_before = harness.model_draw_count();
        if let Some(seconds) = step.wait {
            harness.advance_time(seconds);
        }
        if !step.is_wait() {
            if let Err(e) = harness.execute_action(&step.action, &step.cloud_id, step.options()) {
                warn!("Replay stopped at step {}: {}", index, e);
                report.error = Some(e.to_string());
                return Ok(report);
            }
        }
        report.actions_replayed = index + 1;

        let actual = harness.model_draw_count();
        if actual != step.rng_counts.model {
            warn!(
                "Divergence at step {} ({}): expected {} model draws, got {}",
                index, step.action, step.rng_counts.model, actual
            );
            report.divergence = Some(Divergence {
                action_index: index,
                expected_count: step.rng_counts.model,
                actual_count: actual,
                expected_log: step.rng_log.clone(),
                actual_log: harness.model_log_since(draws_before).to_vec(),
                recent_transitions: harness.recent_transitions(),
            });
            return Ok(report);
        }

        if let Some(expected) = &step.model_state {
            diff_json(
                &format!("actions[{}]", index),
                expected,
                &harness.model_json(),
                &mut report.snapshot_diffs,
            );
        }
    }

    if let Some(final_snapshot) = &session.final_snapshot {
        let expected = serde_json::to_value(&final_snapshot.model)?;
        diff_json("model", &expected, &harness.model_json(), &mut report.snapshot_diffs);
    }
    debug!(
        "Replay finished: {} steps, {} snapshot diffs",
        report.actions_replayed,
        report.snapshot_diffs.len()
    );
    Ok(report)
}

/// Walks two JSON trees and collects differing leaves.
///
/// Numbers compare within [`SNAPSHOT_EPSILON`]; everything else exactly.
pub fn diff_json(path: &str, expected: &Value, actual: &Value, out: &mut Vec<FieldDiff>) {
    match (expected, actual) {
        (Value::Object(a), Value::Object(b)) => {
            for (key, value) in a {
                let child = format!("{}.{}", path, key);
                diff_json(&child, value, b.get(key).unwrap_or(&Value::Null), out);
            }
            for (key, value) in b {
                if !a.contains_key(key) {
                    out.push(FieldDiff {
                        path: format!("{}.{}", path, key),
                        expected: Value::Null,
                        actual: value.clone(),
                    });
                }
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            for index in 0..a.len().max(b.len()) {
                let child = format!("{}[{}]", path, index);
                diff_json(
                    &child,
                    a.get(index).unwrap_or(&Value::Null),
                    b.get(index).unwrap_or(&Value::Null),
                    out,
                );
            }
        }
        (Value::Number(a), Value::Number(b)) => {
            let close = match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => (x - y).abs() <= SNAPSHOT_EPSILON,
                _ => a == b,
            };
            if !close {
                out.push(FieldDiff {
                    path: path.to_string(),
                    expected: expected.clone(),
                    actual: actual.clone(),
                });
            }
        }
        _ => {
            if expected != actual {
                out.push(FieldDiff {
                    path: path.to_string(),
                    expected: expected.clone(),
                    actual: actual.clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_diff_tolerates_float_noise() {
        let mut diffs = Vec::new();
        diff_json(
            "m",
            &json!({"trust": 0.5, "name": "a"}),
            &json!({"trust": 0.5000001, "name": "a"}),
            &mut diffs,
        );
        assert!(diffs.is_empty());
    }

    #[test]
    fn test_diff_reports_paths() {
        let mut diffs = Vec::new();
        diff_json(
            "m",
            &json!({"parts": [{"trust": 0.5}], "victory": false}),
            &json!({"parts": [{"trust": 0.7}, {"trust": 0.1}], "victory": false, "extra": 1}),
            &mut diffs,
        );
        let paths: Vec<&str> = diffs.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["m.parts[0].trust", "m.parts[1]", "m.extra"]);
    }

    #[test]
    fn test_clean_report() {
        assert!(ReplayReport::default().is_clean());
    }
}
