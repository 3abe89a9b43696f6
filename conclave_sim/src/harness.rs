//! HeadlessHarness - drives one model with a dual-channel RNG, no UI.

use crate::error::HarnessError;
use crate::scenario::Scenario;

use conclave_core::{
    Action, ActionController, ActionOptions, ActionResult, ContentError, Outcome, SimulatorModel,
};
use conclave_env::{Channel, DualRng, DualRngState};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info};

/// Configuration for a harness.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Model seed (the harness channel is derived from it)
    pub seed: u64,

    /// Number of recent transitions kept for divergence reports
    pub transition_history: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            transition_history: 32,
        }
    }
}

/// One labelled step, kept in the recent-transition ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub label: String,
    pub elapsed: f64,
    pub model_draws: u64,
    pub outcomes: Vec<String>,
}

/// Everything needed to resume a harness bit-exactly.
///
/// The transition ring is diagnostic only and is not captured: a resumed
/// harness keeps the same ring size but starts with an empty ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessSnapshot {
    pub model: SimulatorModel,
    pub rng: DualRngState,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_history_limit() -> usize {
    HarnessConfig::default().transition_history
}

pub struct HeadlessHarness {
    model: SimulatorModel,
    controller: ActionController,
    rng: DualRng,
    transitions: VecDeque<Transition>,
    history_limit: usize,
}

impl HeadlessHarness {
    /// Creates an empty harness seeded for both channels from `seed`.
    pub fn new(seed: u64) -> Self {
        Self::with_config(HarnessConfig {
            seed,
            ..Default::default()
        })
    }

    pub fn with_config(config: HarnessConfig) -> Self {
        let mut harness = Self::with_rng(DualRng::model_only(config.seed));
        harness.history_limit = config.transition_history;
        harness
    }

    pub fn with_rng(rng: DualRng) -> Self {
        Self {
            model: SimulatorModel::new(),
            controller: ActionController::new(),
            rng,
            transitions: VecDeque::new(),
            history_limit: default_history_limit(),
        }
    }

    /// Replaces the model with the scenario's initial state.
    pub fn setup_from_scenario(&mut self, scenario: &Scenario) -> Result<(), HarnessError> {
        self.model = scenario.build_model()?;
        self.transitions.clear();
        info!(
            "Loaded scenario '{}' ({} parts, {} in conference)",
            scenario.name,
            self.model.parts().len(),
            self.model.conference().len()
        );
        Ok(())
    }

    /// Replaces the model directly.
    pub fn load_model(&mut self, model: SimulatorModel) {
        self.model = model;
        self.transitions.clear();
    }

    /// Advances simulated time by `seconds`.
    pub fn advance_time(&mut self, seconds: f64) -> Vec<Outcome> {
        let outcomes = self.model.advance_time(seconds, self.rng.model_mut());
        debug!(
            "  t={:.1}s | +{:.1}s | {} outcomes",
            self.model.elapsed(),
            seconds,
            outcomes.len()
        );
        self.remember(format!("wait:{}", seconds), &outcomes);
        outcomes
    }

    /// Executes an action by id, applying its side effects.
    pub fn execute_action(
        &mut self,
        action_id: &str,
        actor: &str,
        options: ActionOptions,
    ) -> Result<ActionResult, ContentError> {
        let result = self.controller.execute_by_id(
            &mut self.model,
            self.rng.model_mut(),
            action_id,
            actor,
            options,
        )?;
        Ok(self.settle(format!("{}@{}", action_id, actor), result))
    }

    /// Executes a fully specified action, applying its side effects.
    pub fn execute(&mut self, action: &Action) -> Result<ActionResult, ContentError> {
        let result = self
            .controller
            .execute(&mut self.model, self.rng.model_mut(), action)?;
        Ok(self.settle(action.actor_key(), result))
    }

    /// Applies requested side effects and appends their outcomes.
    fn settle(&mut self, label: String, mut result: ActionResult) -> ActionResult {
        for effect in result.effects.clone() {
            let outcomes = self.model.apply_effect(&effect);
            result.state_changes.extend(outcomes);
        }
        if !result.success {
            debug!("  rejected {}: {}", label, result.message.as_deref().unwrap_or(""));
        }
        self.remember(label, &result.state_changes);
        result
    }

    fn remember(&mut self, label: String, outcomes: &[Outcome]) {
        if self.history_limit == 0 {
            return;
        }
        if self.transitions.len() == self.history_limit {
            self.transitions.pop_front();
        }
        self.transitions.push_back(Transition {
            label,
            elapsed: self.model.elapsed(),
            model_draws: self.rng.draw_count(Channel::Model),
            outcomes: outcomes.iter().map(Outcome::encode).collect(),
        });
    }

    pub fn valid_actions(&self) -> Vec<Action> {
        self.controller.valid_actions(&self.model)
    }

    /// Captures the model and both RNG channel states.
    pub fn to_json(&self) -> HarnessSnapshot {
        HarnessSnapshot {
            model: self.model.clone(),
            rng: self.rng.state(),
            history_limit: self.history_limit,
        }
    }

    /// Resumes from a snapshot. The transition ring starts empty.
    pub fn from_json(snapshot: HarnessSnapshot) -> Result<Self, HarnessError> {
        let rng = DualRng::restore(&snapshot.rng)?;
        let mut harness = Self::with_rng(rng);
        harness.model = snapshot.model;
        harness.history_limit = snapshot.history_limit;
        Ok(harness)
    }

    pub fn to_json_string(&self) -> Result<String, HarnessError> {
        Ok(serde_json::to_string(&self.to_json())?)
    }

    pub fn from_json_str(text: &str) -> Result<Self, HarnessError> {
        Self::from_json(serde_json::from_str(text)?)
    }

    pub fn model_json(&self) -> serde_json::Value {
        self.model.model_json()
    }

    pub fn relationships_json(&self) -> serde_json::Value {
        self.model.relationships_json()
    }

    pub fn model_draw_count(&self) -> u64 {
        self.rng.draw_count(Channel::Model)
    }

    pub fn harness_draw_count(&self) -> u64 {
        self.rng.draw_count(Channel::Harness)
    }

    pub fn model_draw_log(&self) -> &[String] {
        self.rng.model().draw_log()
    }

    /// Model-channel labels drawn after draw number `from`.
    pub fn model_log_since(&self, from: u64) -> &[String] {
        self.rng.model_log_since(from)
    }

    /// Oldest first.
    pub fn recent_transitions(&self) -> Vec<Transition> {
        self.transitions.iter().cloned().collect()
    }

    pub fn model(&self) -> &SimulatorModel {
        &self.model
    }

    pub fn rng(&self) -> &DualRng {
        &self.rng
    }

    pub fn rng_mut(&mut self) -> &mut DualRng {
        &mut self.rng
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{GrievanceConfig, PartConfig, ProtectionConfig};
    use conclave_core::PartId;

    fn household() -> Scenario {
        let mut scenario = Scenario::new("household");
        scenario.parts.push(PartConfig::new("guard").trust(0.4));
        scenario.parts.push(PartConfig::new("kid").trust(0.3));
        scenario.parts.push(PartConfig::new("critic").need_attention(0.1).in_conference());
        scenario.relationships.protections.push(ProtectionConfig {
            protector: "guard".into(),
            protectee: "kid".into(),
        });
        scenario.relationships.grievances.push(GrievanceConfig {
            source: "critic".into(),
            targets: vec!["kid".into()],
            dialogues: vec!["You never do anything right".into()],
        });
        scenario
    }

    #[test]
    fn test_join_then_blend() {
        let mut harness = HeadlessHarness::new(42);
        harness.setup_from_scenario(&household()).unwrap();

        let join = harness
            .execute_action("join_conference", "guard", ActionOptions::default())
            .unwrap();
        assert!(join.success);
        let blend = harness.execute_action("blend", "guard", ActionOptions::default()).unwrap();
        assert!(blend.success);

        let guard = PartId::new("guard");
        assert!(!harness.model().is_target(&guard));
        assert!(harness.model().is_blended(&guard));
    }

    #[test]
    fn test_backlash_effect_is_applied() {
        let mut harness = HeadlessHarness::new(3);
        harness.setup_from_scenario(&household()).unwrap();

        let result = harness
            .execute_action("join_conference", "kid", ActionOptions::default())
            .unwrap();
        let backlash = result.codes().contains(&"guard:backlash:kid".to_string());
        assert_eq!(backlash, harness.model().is_blended(&PartId::new("guard")));
        assert_eq!(harness.model_draw_count(), 1);
    }

    #[test]
    fn test_snapshot_resume_matches_uninterrupted_run() {
        let mut original = HeadlessHarness::new(9);
        original.setup_from_scenario(&household()).unwrap();
        original
            .execute_action("join_conference", "kid", ActionOptions::default())
            .unwrap();

        let text = original.to_json_string().unwrap();
        let mut resumed = HeadlessHarness::from_json_str(&text).unwrap();

        for harness in [&mut original, &mut resumed] {
            harness.advance_time(12.0);
            harness
                .execute_action("who_do_you_see", "kid", ActionOptions::default())
                .unwrap();
        }
        assert_eq!(original.to_json(), resumed.to_json());
    }

    #[test]
    fn test_transition_ring_is_bounded() {
        let mut harness = HeadlessHarness::with_config(HarnessConfig {
            seed: 1,
            transition_history: 3,
        });
        harness.setup_from_scenario(&household()).unwrap();
        for _ in 0..5 {
            harness.advance_time(1.0);
        }
        let recent = harness.recent_transitions();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[2].elapsed, 5.0);
    }

    #[test]
    fn test_resume_keeps_ring_size() {
        let mut original = HeadlessHarness::with_config(HarnessConfig {
            seed: 4,
            transition_history: 2,
        });
        original.setup_from_scenario(&household()).unwrap();
        original.advance_time(1.0);

        let mut resumed = HeadlessHarness::from_json_str(&original.to_json_string().unwrap()).unwrap();
        assert!(resumed.recent_transitions().is_empty());
        for harness in [&mut original, &mut resumed] {
            for _ in 0..4 {
                harness.advance_time(1.0);
            }
        }
        assert_eq!(resumed.recent_transitions(), original.recent_transitions());
        assert_eq!(resumed.recent_transitions().len(), 2);
    }

    #[test]
    fn test_snapshot_without_ring_size_uses_default() {
        let harness = HeadlessHarness::new(1);
        let mut value = serde_json::to_value(harness.to_json()).unwrap();
        value.as_object_mut().unwrap().remove("history_limit");

        let snapshot: HarnessSnapshot = serde_json::from_value(value).unwrap();
        assert_eq!(snapshot.history_limit, HarnessConfig::default().transition_history);
    }

    #[test]
    fn test_rejected_action_makes_no_draw() {
        let mut harness = HeadlessHarness::new(1);
        harness.setup_from_scenario(&household()).unwrap();
        let before = harness.to_json();

        let result = harness.execute_action("separate", "kid", ActionOptions::default()).unwrap();
        assert!(!result.success);
        assert_eq!(harness.to_json(), before);
    }
}
