//! Declarative scenarios: initial cast, scripted actions and assertions.

use crate::error::HarnessError;
use conclave_core::{
    Biography, BiographyField, Dialogues, Part, PartId, SimulatorModel, Tuning,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_trust() -> f64 {
    0.5
}

fn default_openness() -> f64 {
    0.5
}

/// A complete, serializable test scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Model seed; runners fall back to their own seed when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    pub parts: Vec<PartConfig>,

    #[serde(default)]
    pub relationships: RelationshipConfig,

    #[serde(default)]
    pub actions: Vec<ActionRef>,

    #[serde(default)]
    pub assertions: Vec<Assertion>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuning: Option<Tuning>,
}

/// Initial configuration of one part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartConfig {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default = "default_trust")]
    pub trust: f64,

    #[serde(default)]
    pub need_attention: f64,

    #[serde(default)]
    pub attacked: bool,

    #[serde(default = "default_openness")]
    pub openness: f64,

    /// Seat the part at the conference as a target
    #[serde(default)]
    pub in_conference: bool,

    #[serde(default)]
    pub biography: BiographyConfig,

    /// Fields revealed before the scenario starts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub revealed: Vec<BiographyField>,

    #[serde(default)]
    pub dialogues: Dialogues,
}

impl PartConfig {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            trust: default_trust(),
            need_attention: 0.0,
            attacked: false,
            openness: default_openness(),
            in_conference: false,
            biography: BiographyConfig::default(),
            revealed: Vec::new(),
            dialogues: Dialogues::new(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn trust(mut self, trust: f64) -> Self {
        self.trust = trust;
        self
    }

    pub fn need_attention(mut self, need: f64) -> Self {
        self.need_attention = need;
        self
    }

    pub fn in_conference(mut self) -> Self {
        self.in_conference = true;
        self
    }

    pub fn revealed(mut self, field: BiographyField) -> Self {
        self.revealed.push(field);
        self
    }

    pub fn job(mut self, job: &str) -> Self {
        self.biography.job = Some(job.to_string());
        self
    }

    pub fn dialogues(mut self, dialogues: Dialogues) -> Self {
        self.dialogues = dialogues;
        self
    }

    fn to_part(&self) -> Part {
        let bio = &self.biography;
        let mut biography = Biography::new();
        for (field, value) in [
            (BiographyField::Age, &bio.age),
            (BiographyField::Identity, &bio.identity),
            (BiographyField::Job, &bio.job),
            (BiographyField::JobAppraisal, &bio.job_appraisal),
            (BiographyField::JobImpact, &bio.job_impact),
        ] {
            if let Some(value) = value {
                biography = biography.with_value(field, value.clone());
            }
        }

        Part::new(self.id.as_str(), self.name.clone().unwrap_or_else(|| self.id.clone()))
            .with_trust(self.trust)
            .with_need_attention(self.need_attention)
            .with_attacked(self.attacked)
            .with_openness(self.openness)
            .with_biography(biography)
            .with_dialogues(self.dialogues.clone())
    }
}

/// Authored biography values (revealed later through the ray).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BiographyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_appraisal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_impact: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipConfig {
    #[serde(default)]
    pub protections: Vec<ProtectionConfig>,
    #[serde(default)]
    pub grievances: Vec<GrievanceConfig>,
    #[serde(default)]
    pub proxies: Vec<ProxyConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectionConfig {
    pub protector: String,
    pub protectee: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrievanceConfig {
    pub source: String,
    pub targets: Vec<String>,
    pub dialogues: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub source: String,
    pub proxy: String,
}

/// One scripted step.
///
/// `action == "wait"` only advances time by `wait` seconds. For any other
/// action a `wait` advances time before the action runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRef {
    pub action: String,

    #[serde(default)]
    pub cloud_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_cloud_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<BiographyField>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait: Option<f64>,
}

impl ActionRef {
    pub fn new(action: &str, cloud_id: &str) -> Self {
        Self {
            action: action.to_string(),
            cloud_id: cloud_id.to_string(),
            target_cloud_id: None,
            field: None,
            wait: None,
        }
    }

    /// A pure time advance.
    pub fn wait(seconds: f64) -> Self {
        Self {
            wait: Some(seconds),
            ..Self::new(conclave_core::WAIT_ACTION, "")
        }
    }

    pub fn targeting(mut self, target: &str) -> Self {
        self.target_cloud_id = Some(target.to_string());
        self
    }

    pub fn asking(mut self, field: BiographyField) -> Self {
        self.field = Some(field);
        self
    }

    pub fn is_wait(&self) -> bool {
        self.action == conclave_core::WAIT_ACTION
    }
}

/// Comparison operator of an assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "eq", alias = "==")]
    Eq,
    #[serde(rename = "ne", alias = "!=")]
    Ne,
    #[serde(rename = "lt", alias = "<")]
    Lt,
    #[serde(rename = "lte", alias = "<=")]
    Lte,
    #[serde(rename = "gt", alias = ">")]
    Gt,
    #[serde(rename = "gte", alias = ">=")]
    Gte,
}

/// Tolerance for numeric equality in assertions.
const NUMERIC_EPSILON: f64 = 1e-9;

impl CompareOp {
    pub fn compare(&self, actual: f64, expected: f64) -> bool {
        let close = (actual - expected).abs() <= NUMERIC_EPSILON;
        match self {
            CompareOp::Eq => close,
            CompareOp::Ne => !close,
            CompareOp::Lt => actual < expected && !close,
            CompareOp::Lte => actual < expected || close,
            CompareOp::Gt => actual > expected && !close,
            CompareOp::Gte => actual > expected || close,
        }
    }

    /// Boolean comparison; ordering operators are not defined on bools.
    pub fn compare_bool(&self, actual: bool, expected: bool) -> Option<bool> {
        match self {
            CompareOp::Eq => Some(actual == expected),
            CompareOp::Ne => Some(actual != expected),
            _ => None,
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
        };
        f.write_str(symbol)
    }
}

/// A check against the final model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Assertion {
    Trust { cloud_id: String, op: CompareOp, value: f64 },
    NeedAttention { cloud_id: String, op: CompareOp, value: f64 },
    Blended { cloud_id: String, op: CompareOp, value: bool },
    Target { cloud_id: String, op: CompareOp, value: bool },
    /// Delivered-message count
    Message {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<String>,
        op: CompareOp,
        value: f64,
    },
    Biography { cloud_id: String, field: BiographyField, op: CompareOp, value: bool },
    Victory { op: CompareOp, value: bool },
}

/// An assertion that did not hold, with the value actually observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionFailure {
    pub assertion: Assertion,
    pub actual: String,
}

impl Assertion {
    /// Evaluates against `model`; `Err` carries the observed value.
    pub fn check(&self, model: &SimulatorModel) -> Result<(), AssertionFailure> {
        let fail = |actual: String| AssertionFailure {
            assertion: self.clone(),
            actual,
        };
        let numeric = |op: &CompareOp, actual: f64, value: f64| {
            if op.compare(actual, value) {
                Ok(())
            } else {
                Err(fail(actual.to_string()))
            }
        };
        let boolean = |op: &CompareOp, actual: bool, value: bool| match op.compare_bool(actual, value) {
            Some(true) => Ok(()),
            Some(false) => Err(fail(actual.to_string())),
            None => Err(fail(format!("{} (operator {} is not defined on booleans)", actual, op))),
        };

        match self {
            Assertion::Trust { cloud_id, op, value } => {
                numeric(op, model.parts().trust(&PartId::new(cloud_id.as_str())), *value)
            }
            Assertion::NeedAttention { cloud_id, op, value } => numeric(
                op,
                model.parts().need_attention(&PartId::new(cloud_id.as_str())),
                *value,
            ),
            Assertion::Blended { cloud_id, op, value } => {
                boolean(op, model.is_blended(&PartId::new(cloud_id.as_str())), *value)
            }
            Assertion::Target { cloud_id, op, value } => {
                boolean(op, model.is_target(&PartId::new(cloud_id.as_str())), *value)
            }
            Assertion::Message { from, to, op, value } => {
                let from = from.as_deref().map(PartId::new);
                let to = to.as_deref().map(PartId::new);
                let count = model.delivered_count(from.as_ref(), to.as_ref());
                numeric(op, count as f64, *value)
            }
            Assertion::Biography { cloud_id, field, op, value } => boolean(
                op,
                model.parts().is_revealed(&PartId::new(cloud_id.as_str()), *field),
                *value,
            ),
            Assertion::Victory { op, value } => boolean(op, model.victory(), *value),
        }
    }
}

impl Scenario {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            seed: None,
            parts: Vec::new(),
            relationships: RelationshipConfig::default(),
            actions: Vec::new(),
            assertions: Vec::new(),
            tuning: None,
        }
    }

    /// Loads a scenario from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, HarnessError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Checks ids before anything is built.
    pub fn validate(&self) -> Result<(), HarnessError> {
        let mut seen = std::collections::BTreeSet::new();
        for part in &self.parts {
            let id = PartId::new(part.id.as_str());
            if !id.is_well_formed() || id.is_self() {
                return Err(HarnessError::scenario(format!("invalid part id '{}'", part.id)));
            }
            if !seen.insert(part.id.as_str()) {
                return Err(HarnessError::scenario(format!("duplicate part id '{}'", part.id)));
            }
        }

        let known = |id: &str| seen.contains(id);
        let rel = &self.relationships;
        let referenced = rel
            .protections
            .iter()
            .flat_map(|p| [p.protector.as_str(), p.protectee.as_str()])
            .chain(rel.proxies.iter().flat_map(|p| [p.source.as_str(), p.proxy.as_str()]))
            .chain(rel.grievances.iter().flat_map(|g| {
                std::iter::once(g.source.as_str()).chain(g.targets.iter().map(String::as_str))
            }));
        for id in referenced {
            if !known(id) {
                return Err(HarnessError::scenario(format!(
                    "relationship references unknown part '{}'",
                    id
                )));
            }
        }
        Ok(())
    }

    /// Builds the initial model.
    pub fn build_model(&self) -> Result<SimulatorModel, HarnessError> {
        self.validate()?;
        let mut model = SimulatorModel::with_tuning(self.tuning.clone().unwrap_or_default());

        for config in &self.parts {
            model.register_part(config.to_part());
        }
        let rel = &self.relationships;
        for edge in &rel.protections {
            model.add_protection(&PartId::new(edge.protector.as_str()), &PartId::new(edge.protectee.as_str()));
        }
        for edge in &rel.grievances {
            let targets = edge.targets.iter().map(|t| PartId::new(t.as_str())).collect();
            model.add_grievance(&PartId::new(edge.source.as_str()), targets, edge.dialogues.clone())?;
        }
        for edge in &rel.proxies {
            model.add_proxy(&PartId::new(edge.source.as_str()), &PartId::new(edge.proxy.as_str()));
        }
        for config in &self.parts {
            let id = PartId::new(config.id.as_str());
            for field in &config.revealed {
                model.reveal_field(&id, *field);
            }
            if config.in_conference {
                model.place_in_conference(&id);
            }
        }
        Ok(model)
    }
}
