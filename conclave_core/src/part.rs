//! Parts: the simulated entities, their biography and their dialogue pools.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Reserved actor id for the implicit "self" entity.
pub const SELF_ID: &str = "self";

/// Trust ceiling for a part in its normal state.
pub const TRUST_CAP: f64 = 1.0;

/// Trust ceiling while a part is marked attacked.
pub const ATTACKED_TRUST_CAP: f64 = 0.8;

/// Identifier of a part (or of the implicit self).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartId(String);

impl PartId {
    /// Creates an id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The implicit self actor.
    pub fn self_id() -> Self {
        Self(SELF_ID.to_string())
    }

    /// Returns true for the implicit self actor.
    pub fn is_self(&self) -> bool {
        self.0 == SELF_ID
    }

    /// Returns true if this id can round-trip through the outcome codec.
    pub fn is_well_formed(&self) -> bool {
        !self.0.is_empty() && !self.0.contains(':')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PartId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PartId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PartId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Independently revealable biography fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiographyField {
    Age,
    Identity,
    Job,
    JobAppraisal,
    JobImpact,
    Relationships,
    Protects,
    Unburdened,
    ConsentedToHelp,
}

impl BiographyField {
    /// Every field, in declaration order.
    pub fn all() -> [BiographyField; 9] {
        [
            BiographyField::Age,
            BiographyField::Identity,
            BiographyField::Job,
            BiographyField::JobAppraisal,
            BiographyField::JobImpact,
            BiographyField::Relationships,
            BiographyField::Protects,
            BiographyField::Unburdened,
            BiographyField::ConsentedToHelp,
        ]
    }

    /// Fields that can be asked about through the self-ray.
    pub fn ray_selectable() -> [BiographyField; 7] {
        [
            BiographyField::Age,
            BiographyField::Identity,
            BiographyField::Job,
            BiographyField::JobAppraisal,
            BiographyField::JobImpact,
            BiographyField::Relationships,
            BiographyField::Protects,
        ]
    }

    pub fn is_ray_selectable(&self) -> bool {
        Self::ray_selectable().contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BiographyField::Age => "age",
            BiographyField::Identity => "identity",
            BiographyField::Job => "job",
            BiographyField::JobAppraisal => "job_appraisal",
            BiographyField::JobImpact => "job_impact",
            BiographyField::Relationships => "relationships",
            BiographyField::Protects => "protects",
            BiographyField::Unburdened => "unburdened",
            BiographyField::ConsentedToHelp => "consented_to_help",
        }
    }
}

impl std::fmt::Display for BiographyField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BiographyField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "age" => Ok(BiographyField::Age),
            "identity" => Ok(BiographyField::Identity),
            "job" => Ok(BiographyField::Job),
            "job_appraisal" | "jobappraisal" => Ok(BiographyField::JobAppraisal),
            "job_impact" | "jobimpact" => Ok(BiographyField::JobImpact),
            "relationships" => Ok(BiographyField::Relationships),
            "protects" => Ok(BiographyField::Protects),
            "unburdened" => Ok(BiographyField::Unburdened),
            "consented_to_help" | "consentedtohelp" => Ok(BiographyField::ConsentedToHelp),
            _ => Err(format!("Unknown biography field: {}", s)),
        }
    }
}

/// Revealed flags plus optional authored values.
///
/// Revealing is monotone: there is no operation that clears a flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Biography {
    #[serde(default)]
    revealed: BTreeSet<BiographyField>,
    #[serde(default)]
    values: BTreeMap<BiographyField, String>,
}

impl Biography {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the authored value of a field (does not reveal it).
    pub fn with_value(mut self, field: BiographyField, value: impl Into<String>) -> Self {
        self.values.insert(field, value.into());
        self
    }

    pub fn is_revealed(&self, field: BiographyField) -> bool {
        self.revealed.contains(&field)
    }

    pub fn value(&self, field: BiographyField) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    pub fn revealed_count(&self) -> usize {
        self.revealed.len()
    }

    pub fn revealed_fields(&self) -> impl Iterator<Item = BiographyField> + '_ {
        self.revealed.iter().copied()
    }

    /// Returns true if the flag changed.
    pub(crate) fn reveal(&mut self, field: BiographyField) -> bool {
        self.revealed.insert(field)
    }
}

/// Situations a part can speak in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueSituation {
    Blended,
    AlreadyTold,
    Deflect,
    AttackedDeflect,
    HelpConsent,
    HelpRefusal,
    Job,
    JobAppraisal,
    JobImpact,
    UnburdenedJob,
    Recognition,
    Gratitude,
}

impl DialogueSituation {
    /// The pool a biography answer is drawn from, if the field has one.
    pub fn for_field(field: BiographyField) -> Option<DialogueSituation> {
        match field {
            BiographyField::Job => Some(DialogueSituation::Job),
            BiographyField::JobAppraisal => Some(DialogueSituation::JobAppraisal),
            BiographyField::JobImpact => Some(DialogueSituation::JobImpact),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DialogueSituation::Blended => "blended",
            DialogueSituation::AlreadyTold => "already_told",
            DialogueSituation::Deflect => "deflect",
            DialogueSituation::AttackedDeflect => "attacked_deflect",
            DialogueSituation::HelpConsent => "help_consent",
            DialogueSituation::HelpRefusal => "help_refusal",
            DialogueSituation::Job => "job",
            DialogueSituation::JobAppraisal => "job_appraisal",
            DialogueSituation::JobImpact => "job_impact",
            DialogueSituation::UnburdenedJob => "unburdened_job",
            DialogueSituation::Recognition => "recognition",
            DialogueSituation::Gratitude => "gratitude",
        }
    }
}

/// Named pools of candidate utterances.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dialogues(BTreeMap<DialogueSituation, Vec<String>>);

impl Dialogues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lines<I, S>(mut self, situation: DialogueSituation, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .entry(situation)
            .or_default()
            .extend(lines.into_iter().map(Into::into));
        self
    }

    /// Candidate lines for a situation (empty slice if none authored).
    pub fn lines(&self, situation: DialogueSituation) -> &[String] {
        self.0.get(&situation).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, situation: DialogueSituation) -> bool {
        !self.lines(situation).is_empty()
    }
}

/// A simulated part.
///
/// Fields are private: all mutation goes through
/// [`crate::PartStateManager`], which enforces the trust cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    id: PartId,
    name: String,
    trust: f64,
    need_attention: f64,
    attacked: bool,
    was_proxy: bool,
    openness: f64,
    biography: Biography,
    dialogues: Dialogues,
}

impl Part {
    /// Creates a part with neutral defaults (trust 0.5, openness 0.5).
    pub fn new(id: impl Into<PartId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            trust: 0.5,
            need_attention: 0.0,
            attacked: false,
            was_proxy: false,
            openness: 0.5,
            biography: Biography::new(),
            dialogues: Dialogues::new(),
        }
    }

    pub fn with_trust(mut self, trust: f64) -> Self {
        self.trust = trust;
        self
    }

    pub fn with_need_attention(mut self, need: f64) -> Self {
        self.need_attention = need;
        self
    }

    pub fn with_attacked(mut self, attacked: bool) -> Self {
        self.attacked = attacked;
        self
    }

    pub fn with_openness(mut self, openness: f64) -> Self {
        self.openness = openness;
        self
    }

    pub fn with_biography(mut self, biography: Biography) -> Self {
        self.biography = biography;
        self
    }

    pub fn with_dialogues(mut self, dialogues: Dialogues) -> Self {
        self.dialogues = dialogues;
        self
    }

    pub fn id(&self) -> &PartId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn trust(&self) -> f64 {
        self.trust
    }

    /// Current trust ceiling.
    pub fn trust_cap(&self) -> f64 {
        if self.attacked {
            ATTACKED_TRUST_CAP
        } else {
            TRUST_CAP
        }
    }

    /// True when trust sits at its current ceiling.
    pub fn trust_at_cap(&self) -> bool {
        self.trust >= self.trust_cap() - 1e-9
    }

    pub fn need_attention(&self) -> f64 {
        self.need_attention
    }

    pub fn attacked(&self) -> bool {
        self.attacked
    }

    pub fn was_proxy(&self) -> bool {
        self.was_proxy
    }

    pub fn openness(&self) -> f64 {
        self.openness
    }

    pub fn biography(&self) -> &Biography {
        &self.biography
    }

    pub fn dialogues(&self) -> &Dialogues {
        &self.dialogues
    }

    pub fn is_unburdened(&self) -> bool {
        self.biography.is_revealed(BiographyField::Unburdened)
    }

    pub(crate) fn set_trust_clamped(&mut self, trust: f64) {
        let trust = if trust.is_finite() { trust } else { 0.0 };
        self.trust = trust.clamp(0.0, self.trust_cap());
    }

    pub(crate) fn set_attacked(&mut self, attacked: bool) {
        self.attacked = attacked;
        self.set_trust_clamped(self.trust);
    }

    pub(crate) fn set_need_attention(&mut self, need: f64) {
        self.need_attention = if need.is_finite() { need.max(0.0) } else { 0.0 };
    }

    pub(crate) fn set_was_proxy(&mut self, was_proxy: bool) {
        self.was_proxy = was_proxy;
    }

    pub(crate) fn biography_mut(&mut self) -> &mut Biography {
        &mut self.biography
    }

    /// Re-applies the clamps to externally authored values.
    pub(crate) fn normalize(&mut self) {
        self.openness = self.openness.clamp(0.0, 1.0);
        self.set_need_attention(self.need_attention);
        self.set_trust_clamped(self.trust);
    }
}
