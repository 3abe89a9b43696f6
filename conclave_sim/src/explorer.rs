//! Random-walk explorer.
//!
//! Runs many seeded walks over a scenario's initial state, choosing among
//! the legal actions (plus a `wait` pseudo-action) on the harness channel.
//! Every iteration gets its own harness, so a walk's model decisions depend
//! only on its iteration seed and the moves it made: any victory path can be
//! re-run as a plain scenario with that seed.
//!
//! The explorer collects:
//! - a coverage ledger (actions, pairs, fields, states, transitions, outcomes)
//! - a gap report naming what the walks never reached
//! - the shortest paths that ended in victory

use crate::error::HarnessError;
use crate::harness::{HarnessConfig, HeadlessHarness};
use crate::scenario::{ActionRef, Scenario};

use conclave_core::{
    classify, decode, expected_outcomes, time_outcomes, Action, ActionKind, BiographyField,
    Outcome, OutcomeMatch, SimulatorModel, WAIT_ACTION,
};
use conclave_env::{DualRng, HARNESS_SEED_SALT, ITERATION_SEED_SALT};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Configuration for a batch of random walks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomWalkConfig {
    /// Number of walks
    pub iterations: usize,

    /// Step ceiling per walk
    pub max_actions_per_iteration: usize,

    /// Build the coverage ledger and gap report
    pub coverage_tracking: bool,

    /// Choose moves by softmax over rule scores instead of uniformly
    pub heuristic_scoring: bool,

    /// Keep the moves of walks that reached victory
    pub extract_victory_paths: bool,

    /// Stop the batch at the first content error
    pub stop_on_error: bool,

    /// Stop the batch at the first victory
    pub stop_on_victory: bool,

    /// Restrict choices to these action ids (`wait` included)
    pub allowed_actions: Option<Vec<String>>,

    /// Base seed; falls back to the scenario seed, then 42
    pub seed: Option<u64>,

    /// Seconds advanced by one `wait`
    pub wait_quantum: f64,

    /// Softmax temperature
    pub temperature: f64,

    pub max_victory_paths: usize,

    /// Seeds remembered per coverage entry
    pub seed_samples_per_entry: usize,

    /// Identical consecutive states before a walk counts as stuck
    pub stuck_window: usize,
}

impl Default for RandomWalkConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            max_actions_per_iteration: 50,
            coverage_tracking: true,
            heuristic_scoring: false,
            extract_victory_paths: true,
            stop_on_error: false,
            stop_on_victory: false,
            allowed_actions: None,
            seed: None,
            wait_quantum: 5.0,
            temperature: 0.5,
            max_victory_paths: 5,
            seed_samples_per_entry: 5,
            stuck_window: 4,
        }
    }
}

/// Seed of walk `index` in a batch started from `base`.
pub fn iteration_seed(base: u64, index: usize) -> u64 {
    base.wrapping_add(index as u64).wrapping_mul(ITERATION_SEED_SALT)
}

/// Rough distance-to-victory measure: higher is closer.
pub fn progress_score(model: &SimulatorModel) -> f64 {
    let mut score = 0.0;
    for part in model.parts().parts() {
        score += part.trust() - 0.5 * part.need_attention();
        if part.is_unburdened() {
            score += 2.0;
        }
    }
    if model.victory() {
        score += 100.0;
    }
    score
}

/// How often something was seen, and a few seeds that saw it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageEntry {
    pub count: u64,
    pub seeds: Vec<u64>,
}

impl CoverageEntry {
    fn hit(&mut self, seed: u64, limit: usize) {
        self.count += 1;
        if self.seeds.len() < limit && !self.seeds.contains(&seed) {
            self.seeds.push(seed);
        }
    }
}

/// An observed outcome code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedOutcome {
    pub count: u64,
    pub seeds: Vec<u64>,

    /// Classification against the action that first produced it
    pub classification: OutcomeMatch,
}

/// Everything the walks touched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageLedger {
    /// Chosen actions by key (`ray_field_select:job`, `wait`)
    pub actions: BTreeMap<String, CoverageEntry>,

    /// Chosen actions by actor key (`blend@guard`)
    pub action_actors: BTreeMap<String, CoverageEntry>,

    /// `part:field` pairs asked through the ray
    pub field_accesses: BTreeMap<String, CoverageEntry>,

    /// `from->to` between hashed state keys
    pub transitions: BTreeMap<String, CoverageEntry>,

    /// Visited hashed state keys
    pub states: BTreeMap<String, CoverageEntry>,

    /// Action keys seen among the legal choices
    pub legal_actions: BTreeMap<String, CoverageEntry>,

    /// Outcome codes
    pub outcomes: BTreeMap<String, ObservedOutcome>,

    /// `action->kind` pairs
    pub action_outcomes: BTreeMap<String, CoverageEntry>,

    pub seed_limit: usize,
}

impl CoverageLedger {
    pub fn new(seed_limit: usize) -> Self {
        Self {
            seed_limit,
            ..Default::default()
        }
    }

    fn hit(map: &mut BTreeMap<String, CoverageEntry>, key: String, seed: u64, limit: usize) {
        map.entry(key).or_default().hit(seed, limit);
    }

    pub fn record_state(&mut self, state: &str, seed: u64) {
        Self::hit(&mut self.states, state.to_string(), seed, self.seed_limit);
    }

    pub fn record_legal(&mut self, key: &str, seed: u64) {
        Self::hit(&mut self.legal_actions, key.to_string(), seed, self.seed_limit);
    }

    /// Records a chosen move and everything it produced.
    pub fn record_move(
        &mut self,
        step: &Step,
        outcomes: &[Outcome],
        from: &str,
        to: &str,
        seed: u64,
    ) {
        let limit = self.seed_limit;
        Self::hit(&mut self.actions, step.key(), seed, limit);
        Self::hit(&mut self.action_actors, step.actor_key(), seed, limit);
        if let Step::Act(Action {
            kind: ActionKind::RayFieldSelect,
            actor,
            field: Some(field),
            ..
        }) = step
        {
            Self::hit(&mut self.field_accesses, format!("{}:{}", actor, field), seed, limit);
        }
        Self::hit(&mut self.transitions, format!("{}->{}", from, to), seed, limit);

        let action_id = step.action_id();
        for outcome in outcomes {
            let code = outcome.encode();
            let entry = self.outcomes.entry(code.clone()).or_insert_with(|| ObservedOutcome {
                count: 0,
                seeds: Vec::new(),
                classification: classify(&step.key(), &code),
            });
            entry.count += 1;
            if entry.seeds.len() < limit && !entry.seeds.contains(&seed) {
                entry.seeds.push(seed);
            }
            if let Ok(decoded) = decode(&code) {
                Self::hit(
                    &mut self.action_outcomes,
                    format!("{}->{}", action_id, decoded.kind),
                    seed,
                    limit,
                );
            }
        }
    }

    /// Adds every entry of `other`.
    pub fn merge(&mut self, other: &CoverageLedger) {
        let limit = self.seed_limit;
        let maps = [
            (&mut self.actions, &other.actions),
            (&mut self.action_actors, &other.action_actors),
            (&mut self.field_accesses, &other.field_accesses),
            (&mut self.transitions, &other.transitions),
            (&mut self.states, &other.states),
            (&mut self.legal_actions, &other.legal_actions),
            (&mut self.action_outcomes, &other.action_outcomes),
        ];
        for (mine, theirs) in maps {
            for (key, entry) in theirs {
                let target = mine.entry(key.clone()).or_default();
                target.count += entry.count;
                for seed in &entry.seeds {
                    if target.seeds.len() < limit && !target.seeds.contains(seed) {
                        target.seeds.push(*seed);
                    }
                }
            }
        }
        for (code, observed) in &other.outcomes {
            let target = self
                .outcomes
                .entry(code.clone())
                .or_insert_with(|| ObservedOutcome {
                    count: 0,
                    seeds: Vec::new(),
                    classification: observed.classification,
                });
            target.count += observed.count;
            for seed in &observed.seeds {
                if target.seeds.len() < limit && !target.seeds.contains(seed) {
                    target.seeds.push(*seed);
                }
            }
        }
    }

    /// Names every catalog action, field or expected outcome never reached.
    pub fn gaps(&self) -> Vec<CoverageGap> {
        let mut gaps = Vec::new();
        for kind in ActionKind::all() {
            let keys: Vec<String> = if kind.requires_field() {
                BiographyField::ray_selectable()
                    .iter()
                    .map(|field| format!("{}:{}", kind, field))
                    .collect()
            } else {
                vec![kind.to_string()]
            };
            for key in keys {
                if self.actions.contains_key(&key) {
                    continue;
                }
                match self.legal_actions.get(&key) {
                    Some(entry) => gaps.push(CoverageGap {
                        kind: GapKind::LegalNeverChosen,
                        hint: format!(
                            "legal {} times but never chosen; raise iterations or enable heuristic scoring",
                            entry.count
                        ),
                        key,
                    }),
                    None => gaps.push(CoverageGap {
                        kind: GapKind::NeverLegal,
                        hint: format!("never legal: needs {}", precondition_hint(kind)),
                        key,
                    }),
                }
            }
        }

        let catalog = ActionKind::all()
            .into_iter()
            .map(|kind| (kind.to_string(), expected_outcomes(kind)))
            .chain(std::iter::once((WAIT_ACTION.to_string(), time_outcomes())));
        for (action, expected) in catalog {
            for outcome in expected {
                let key = format!("{}->{}", action, outcome);
                if !self.action_outcomes.contains_key(&key) {
                    gaps.push(CoverageGap {
                        kind: GapKind::OutcomeNeverObserved,
                        hint: format!("{} never produced {}", action, outcome),
                        key,
                    });
                }
            }
        }
        gaps
    }
}

fn precondition_hint(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::JoinConference => "a part outside the conference",
        ActionKind::Blend => "a targeted part",
        ActionKind::StepBack => "a conference member not spontaneously blended",
        ActionKind::Separate => "a blended part",
        ActionKind::SpawnRay => "a targeted part and no existing ray",
        ActionKind::RayFieldSelect => "a ray pointing at a part",
        ActionKind::HelpProtected => "a targeted protector that has not consented",
        ActionKind::WhoDoYouSee => "a targeted part",
        ActionKind::NoticePart => "a targeted part and another conference member",
        ActionKind::DismissRay => "an existing ray",
        ActionKind::AcceptPendingBlend => "a queued pending blend",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    LegalNeverChosen,
    NeverLegal,
    OutcomeNeverObserved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageGap {
    pub kind: GapKind,
    pub key: String,
    pub hint: String,
}

/// One move of a walk.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Act(Action),
    Wait(f64),
}

impl Step {
    pub fn action_id(&self) -> String {
        match self {
            Step::Act(action) => action.kind.to_string(),
            Step::Wait(_) => WAIT_ACTION.to_string(),
        }
    }

    pub fn key(&self) -> String {
        match self {
            Step::Act(action) => action.key(),
            Step::Wait(_) => WAIT_ACTION.to_string(),
        }
    }

    pub fn actor_key(&self) -> String {
        match self {
            Step::Act(action) => action.actor_key(),
            Step::Wait(_) => WAIT_ACTION.to_string(),
        }
    }

    pub fn to_action_ref(&self) -> ActionRef {
        match self {
            Step::Wait(seconds) => ActionRef::wait(*seconds),
            Step::Act(action) => {
                let mut step = ActionRef::new(action.kind.as_str(), action.actor.as_str());
                if let Some(target) = &action.target {
                    step = step.targeting(target.as_str());
                }
                if let Some(field) = action.field {
                    step = step.asking(field);
                }
                step
            }
        }
    }
}

/// Moves of a walk that ended in victory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VictoryPath {
    pub iteration: usize,

    /// Model seed to replay with
    pub seed: u64,

    pub steps: Vec<ActionRef>,
}

impl VictoryPath {
    /// The path as a replayable scenario on top of `base`.
    pub fn to_scenario(&self, base: &Scenario) -> Scenario {
        let mut scenario = base.clone();
        scenario.name = format!("{}_victory_{}", base.name, self.iteration);
        scenario.seed = Some(self.seed);
        scenario.actions = self.steps.clone();
        scenario
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkError {
    pub iteration: usize,
    pub seed: u64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalkTiming {
    pub total_ms: f64,
    pub per_iteration_ms: f64,
}

/// Results of a batch of walks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomWalkResults {
    /// Walks actually run
    pub iterations: usize,
    pub victories: usize,
    pub errors: Vec<WalkError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageLedger>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage_gaps: Option<Vec<CoverageGap>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub victory_paths: Option<Vec<VictoryPath>>,

    /// Highest end-of-walk progress score
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_score: Option<f64>,
    pub timing: WalkTiming,
}

/// How one walk ended.
struct WalkReport {
    steps: Vec<Step>,
    victory: bool,
    error: Option<String>,
    score: f64,
}

/// Explores a scenario with seeded random walks.
pub struct RandomWalker {
    scenario: Scenario,
    config: RandomWalkConfig,
}

impl RandomWalker {
    pub fn new(scenario: Scenario, config: RandomWalkConfig) -> Self {
        Self { scenario, config }
    }

    pub fn config(&self) -> &RandomWalkConfig {
        &self.config
    }

    pub fn base_seed(&self) -> u64 {
        self.config
            .seed
            .or(self.scenario.seed)
            .unwrap_or(HarnessConfig::default().seed)
    }

    /// Runs the batch.
    ///
    /// Fails only if the scenario itself is invalid; content errors met
    /// during a walk end that walk and are reported in the results.
    pub fn run(&self) -> Result<RandomWalkResults, HarnessError> {
        let initial = self.scenario.build_model()?;
        let base = self.base_seed();
        let started = Instant::now();

        info!(
            "Exploring '{}': {} walks x {} steps (seed={}, {})",
            self.scenario.name,
            self.config.iterations,
            self.config.max_actions_per_iteration,
            base,
            if self.config.heuristic_scoring { "heuristic" } else { "uniform" }
        );

        let mut ledger = CoverageLedger::new(self.config.seed_samples_per_entry);
        let mut errors = Vec::new();
        let mut paths = Vec::new();
        let mut victories = 0;
        let mut best_score: Option<f64> = None;
        let mut completed = 0;

        for iteration in 0..self.config.iterations {
            let seed = iteration_seed(base, iteration);
            let report = self.walk(&initial, seed, &mut ledger);
            completed += 1;
            best_score = Some(best_score.map_or(report.score, |best| best.max(report.score)));

            debug!(
                "  walk {} (seed={:#x}): {} steps, score {:.2}{}",
                iteration,
                seed,
                report.steps.len(),
                report.score,
                if report.victory { ", victory" } else { "" }
            );

            if let Some(message) = report.error {
                warn!("  walk {} hit a content error: {}", iteration, message);
                errors.push(WalkError {
                    iteration,
                    seed,
                    message,
                });
                if self.config.stop_on_error {
                    break;
                }
                continue;
            }

            if report.victory {
                victories += 1;
                if self.config.extract_victory_paths {
                    paths.push(VictoryPath {
                        iteration,
                        seed,
                        steps: report.steps.iter().map(Step::to_action_ref).collect(),
                    });
                }
                if self.config.stop_on_victory {
                    break;
                }
            }
        }

        paths.sort_by_key(|path| path.steps.len());
        paths.truncate(self.config.max_victory_paths);

        let total_ms = started.elapsed().as_secs_f64() * 1000.0;
        let timing = WalkTiming {
            total_ms,
            per_iteration_ms: if completed > 0 { total_ms / completed as f64 } else { 0.0 },
        };

        let (coverage, coverage_gaps) = if self.config.coverage_tracking {
            let gaps = ledger.gaps();
            (Some(ledger), Some(gaps))
        } else {
            (None, None)
        };

        info!(
            "✓ Explored '{}': {} walks, {} victories, {} errors in {:.1}ms",
            self.scenario.name,
            completed,
            victories,
            errors.len(),
            timing.total_ms
        );

        Ok(RandomWalkResults {
            iterations: completed,
            victories,
            errors,
            coverage,
            coverage_gaps,
            victory_paths: self.config.extract_victory_paths.then_some(paths),
            best_score,
            timing,
        })
    }

    fn allowed(&self, id: &str, key: &str) -> bool {
        match &self.config.allowed_actions {
            Some(allowed) => allowed.iter().any(|a| a == id || a == key),
            None => true,
        }
    }

    fn walk(&self, initial: &SimulatorModel, seed: u64, ledger: &mut CoverageLedger) -> WalkReport {
        let tracking = self.config.coverage_tracking;
        let mut harness =
            HeadlessHarness::with_rng(DualRng::seeded(seed, seed.wrapping_mul(HARNESS_SEED_SALT)));
        harness.load_model(initial.clone());

        let mut steps = Vec::new();
        let mut uses: HashMap<String, u32> = HashMap::new();
        let mut recent: VecDeque<String> = VecDeque::new();
        let mut error = None;

        for _ in 0..self.config.max_actions_per_iteration {
            let state = state_hash(harness.model());
            if tracking {
                ledger.record_state(&state, seed);
            }

            let mut candidates: Vec<Step> = harness.valid_actions().into_iter().map(Step::Act).collect();
            candidates.push(Step::Wait(self.config.wait_quantum));
            if tracking {
                for step in &candidates {
                    ledger.record_legal(&step.key(), seed);
                }
            }
            candidates.retain(|step| self.allowed(&step.action_id(), &step.key()));

            let stuck = self.config.stuck_window > 0
                && recent.len() >= self.config.stuck_window
                && recent.iter().all(|s| *s == state);
            let last = steps.last().map(Step::actor_key);

            let index = if self.config.heuristic_scoring {
                let scores: Vec<f64> = candidates
                    .iter()
                    .map(|step| {
                        let mut score = match step {
                            Step::Act(action) => heuristic_score(harness.model(), action),
                            Step::Wait(_) => 0.0,
                        };
                        let key = step.actor_key();
                        score -= 0.5 * f64::from(uses.get(&key).copied().unwrap_or(0));
                        if stuck {
                            if last.as_deref() == Some(key.as_str()) {
                                score -= 1.0;
                            }
                            if matches!(step, Step::Wait(_)) {
                                score += 1.0;
                            }
                        }
                        score
                    })
                    .collect();
                let roll = harness.rng_mut().harness_mut().random("walk:softmax");
                softmax_pick(&scores, self.config.temperature, roll)
            } else {
                harness
                    .rng_mut()
                    .harness_mut()
                    .pick_index(candidates.len(), "walk:uniform")
            };
            let Some(index) = index else {
                break;
            };
            let step = candidates.swap_remove(index);

            let outcomes = match &step {
                Step::Wait(seconds) => harness.advance_time(*seconds),
                Step::Act(action) => match harness.execute(action) {
                    Ok(result) => result.state_changes,
                    Err(err) => {
                        error = Some(err.to_string());
                        break;
                    }
                },
            };

            let next = state_hash(harness.model());
            if tracking {
                ledger.record_move(&step, &outcomes, &state, &next, seed);
            }
            *uses.entry(step.actor_key()).or_insert(0) += 1;
            if recent.len() == self.config.stuck_window.max(1) {
                recent.pop_front();
            }
            recent.push_back(next);
            steps.push(step);

            if harness.model().victory() {
                break;
            }
        }

        WalkReport {
            victory: harness.model().victory(),
            score: progress_score(harness.model()),
            steps,
            error,
        }
    }
}

fn state_hash(model: &SimulatorModel) -> String {
    key_digest(&model.state_key())
}

/// First 8 bytes of the SHA-256 of `key`, in hex. Stable across builds.
fn key_digest(key: &str) -> String {
    Sha256::digest(key.as_bytes())[..8]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Rule score of a move; zero for moves with no rule.
pub fn heuristic_score(model: &SimulatorModel, action: &Action) -> f64 {
    let relationships = model.relationships();
    let actor = &action.actor;
    match action.kind {
        ActionKind::RayFieldSelect
            if action.field == Some(BiographyField::Job) && relationships.is_protector(actor) =>
        {
            3.0
        }
        ActionKind::JoinConference => {
            let mut score = 0.0;
            let supports = model.conference().iter().any(|member| {
                relationships.is_protecting(actor, member) || relationships.is_protecting(member, actor)
            });
            if supports {
                score += 2.0;
            }
            if relationships.is_protectee(actor) && model.parts().trust(actor) < 0.5 {
                score += 1.5;
            }
            score
        }
        ActionKind::HelpProtected => 2.0,
        ActionKind::NoticePart => match &action.target {
            Some(target)
                if relationships.is_protecting(actor, target)
                    && model.parts().is_revealed(actor, BiographyField::ConsentedToHelp)
                    && model.part(target).is_some_and(|p| p.trust_at_cap()) =>
            {
                10.0
            }
            _ => 0.0,
        },
        ActionKind::SpawnRay => 1.0,
        _ => 0.0,
    }
}

/// Picks an index with probability proportional to `exp((s - max) / t)`.
///
/// `roll` is a uniform value in `[0, 1)`.
pub fn softmax_pick(scores: &[f64], temperature: f64, roll: f64) -> Option<usize> {
    if scores.is_empty() {
        return None;
    }
    let temperature = temperature.max(1e-6);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let weights: Vec<f64> = scores.iter().map(|s| ((s - max) / temperature).exp()).collect();
    let total: f64 = weights.iter().sum();

    let mut threshold = roll * total;
    for (index, weight) in weights.iter().enumerate() {
        if threshold < *weight {
            return Some(index);
        }
        threshold -= weight;
    }
    Some(scores.len() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::PartConfig;
    use crate::scenarios::ScenarioId;

    fn quick(iterations: usize) -> RandomWalkConfig {
        RandomWalkConfig {
            iterations,
            max_actions_per_iteration: 12,
            seed: Some(7),
            ..Default::default()
        }
    }

    #[test]
    fn test_iteration_seeds_follow_the_salt() {
        assert_eq!(iteration_seed(5, 0), 5u64.wrapping_mul(ITERATION_SEED_SALT));
        assert_eq!(iteration_seed(5, 3), 8u64.wrapping_mul(ITERATION_SEED_SALT));
        assert_ne!(iteration_seed(5, 1), iteration_seed(6, 1));
    }

    #[test]
    fn test_same_seed_same_coverage() {
        let scenario = ScenarioId::FullHousehold.scenario();
        let a = RandomWalker::new(scenario.clone(), quick(6)).run().unwrap();
        let b = RandomWalker::new(scenario, quick(6)).run().unwrap();
        assert_eq!(a.coverage, b.coverage);
        assert_eq!(a.victories, b.victories);
        assert_eq!(a.best_score, b.best_score);
    }

    #[test]
    fn test_heuristic_walk_is_deterministic() {
        let config = RandomWalkConfig {
            heuristic_scoring: true,
            ..quick(4)
        };
        let scenario = ScenarioId::FullHousehold.scenario();
        let a = RandomWalker::new(scenario.clone(), config.clone()).run().unwrap();
        let b = RandomWalker::new(scenario, config).run().unwrap();
        assert_eq!(a.coverage, b.coverage);
    }

    #[test]
    fn test_wait_only_walk_records_time_outcomes() {
        let config = RandomWalkConfig {
            iterations: 2,
            max_actions_per_iteration: 4,
            allowed_actions: Some(vec!["wait".into()]),
            ..Default::default()
        };
        let results = RandomWalker::new(ScenarioId::GrievanceClock.scenario(), config)
            .run()
            .unwrap();
        let coverage = results.coverage.unwrap();
        assert_eq!(coverage.actions["wait"].count, 8);
        assert_eq!(coverage.actions.len(), 1);
        assert!(coverage.action_outcomes.contains_key("wait->grievance_sent"));
        assert_eq!(
            coverage.outcomes["critic:grievance_sent:kid"].classification,
            OutcomeMatch::Expected
        );
    }

    #[test]
    fn test_gaps_distinguish_unchosen_from_never_legal() {
        let config = RandomWalkConfig {
            iterations: 1,
            max_actions_per_iteration: 3,
            allowed_actions: Some(vec!["wait".into()]),
            ..Default::default()
        };
        let results = RandomWalker::new(ScenarioId::FirstContact.scenario(), config)
            .run()
            .unwrap();
        let gaps = results.coverage_gaps.unwrap();
        let find = |key: &str| gaps.iter().find(|g| g.key == key).map(|g| g.kind);

        // join_conference was legal but filtered out
        assert_eq!(find("join_conference"), Some(GapKind::LegalNeverChosen));
        assert_eq!(find("blend"), Some(GapKind::NeverLegal));
        assert_eq!(find("help_protected"), Some(GapKind::NeverLegal));
        assert_eq!(find("wait"), None);
        assert_eq!(
            find("join_conference->joined_conference"),
            Some(GapKind::OutcomeNeverObserved)
        );
    }

    #[test]
    fn test_legal_but_unchosen_is_reported() {
        let mut ledger = CoverageLedger::new(3);
        ledger.record_legal("blend", 1);
        ledger.record_legal("blend", 2);
        let gaps = ledger.gaps();
        let blend = gaps.iter().find(|g| g.key == "blend").unwrap();
        assert_eq!(blend.kind, GapKind::LegalNeverChosen);
        assert!(blend.hint.contains("2 times"));
    }

    #[test]
    fn test_content_error_ends_walk() {
        let mut scenario = Scenario::new("mute");
        scenario.parts.push(
            PartConfig::new("ghost")
                .trust(0.9)
                .in_conference()
                .revealed(BiographyField::Unburdened),
        );
        let config = RandomWalkConfig {
            iterations: 3,
            max_actions_per_iteration: 50,
            stop_on_error: true,
            allowed_actions: Some(vec!["spawn_ray".into(), "ray_field_select".into()]),
            seed: Some(1),
            ..Default::default()
        };
        let results = RandomWalker::new(scenario, config).run().unwrap();
        assert_eq!(results.errors.len(), 1);
        assert_eq!(results.iterations, 1);
        assert!(results.errors[0].message.contains("ghost"));
    }

    #[test]
    fn test_invalid_scenario_fails_the_batch() {
        let mut scenario = Scenario::new("broken");
        scenario.parts.push(PartConfig::new("self"));
        assert!(RandomWalker::new(scenario, quick(1)).run().is_err());
    }

    #[test]
    fn test_softmax_prefers_high_scores() {
        assert_eq!(softmax_pick(&[], 0.5, 0.3), None);
        assert_eq!(softmax_pick(&[0.0, 10.0], 0.5, 0.5), Some(1));
        assert_eq!(softmax_pick(&[0.0, 0.0], 0.5, 0.25), Some(0));
        assert_eq!(softmax_pick(&[0.0, 0.0], 0.5, 0.75), Some(1));
    }

    #[test]
    fn test_progress_score() {
        let model = ScenarioId::FirstContact.scenario().build_model().unwrap();
        assert!((progress_score(&model) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_step_to_action_ref() {
        let action = Action::on_field(
            ActionKind::RayFieldSelect,
            &conclave_core::PartId::new("guardian"),
            BiographyField::Job,
        );
        let step = Step::Act(action).to_action_ref();
        assert_eq!(step.action, "ray_field_select");
        assert_eq!(step.cloud_id, "guardian");
        assert_eq!(step.field, Some(BiographyField::Job));
        assert!(Step::Wait(5.0).to_action_ref().is_wait());
    }

    #[test]
    fn test_state_keys_use_a_fixed_digest() {
        // sha256("") = e3b0c442 98fc1c14 ...
        assert_eq!(key_digest(""), "e3b0c44298fc1c14");

        let model = ScenarioId::FirstContact.scenario().build_model().unwrap();
        let hash = state_hash(&model);
        assert_eq!(hash.len(), 16);
        assert_eq!(hash, key_digest(&model.state_key()));
        assert_eq!(hash, state_hash(&model.clone()));
    }
}
