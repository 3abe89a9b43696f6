//! Actions, their results and the side-effect requests they carry.

use crate::outcome::Outcome;
use crate::part::{BiographyField, PartId};
use serde::{Deserialize, Serialize};

/// Id of the explorer's time-advancing pseudo-action.
pub const WAIT_ACTION: &str = "wait";

/// Every transition the controller knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    JoinConference,
    Blend,
    StepBack,
    Separate,
    SpawnRay,
    RayFieldSelect,
    HelpProtected,
    WhoDoYouSee,
    NoticePart,
    DismissRay,
    AcceptPendingBlend,
}

impl ActionKind {
    pub fn all() -> [ActionKind; 11] {
        [
            ActionKind::JoinConference,
            ActionKind::Blend,
            ActionKind::StepBack,
            ActionKind::Separate,
            ActionKind::SpawnRay,
            ActionKind::RayFieldSelect,
            ActionKind::HelpProtected,
            ActionKind::WhoDoYouSee,
            ActionKind::NoticePart,
            ActionKind::DismissRay,
            ActionKind::AcceptPendingBlend,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::JoinConference => "join_conference",
            ActionKind::Blend => "blend",
            ActionKind::StepBack => "step_back",
            ActionKind::Separate => "separate",
            ActionKind::SpawnRay => "spawn_ray",
            ActionKind::RayFieldSelect => "ray_field_select",
            ActionKind::HelpProtected => "help_protected",
            ActionKind::WhoDoYouSee => "who_do_you_see",
            ActionKind::NoticePart => "notice_part",
            ActionKind::DismissRay => "dismiss_ray",
            ActionKind::AcceptPendingBlend => "accept_pending_blend",
        }
    }

    /// True for actions performed by the implicit self.
    pub fn is_self_action(&self) -> bool {
        matches!(self, ActionKind::DismissRay | ActionKind::AcceptPendingBlend)
    }

    pub fn requires_target(&self) -> bool {
        matches!(self, ActionKind::NoticePart)
    }

    pub fn requires_field(&self) -> bool {
        matches!(self, ActionKind::RayFieldSelect)
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::all()
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("Unknown action: {}", s))
    }
}

/// A fully specified legal move.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub actor: PartId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<PartId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<BiographyField>,
}

impl Action {
    pub fn new(kind: ActionKind, actor: &PartId) -> Self {
        Self {
            kind,
            actor: actor.clone(),
            target: None,
            field: None,
        }
    }

    pub fn on_target(kind: ActionKind, actor: &PartId, target: &PartId) -> Self {
        Self {
            target: Some(target.clone()),
            ..Self::new(kind, actor)
        }
    }

    pub fn on_field(kind: ActionKind, actor: &PartId, field: BiographyField) -> Self {
        Self {
            field: Some(field),
            ..Self::new(kind, actor)
        }
    }

    /// Coverage key: the action id, with `:field` for field-scoped actions.
    pub fn key(&self) -> String {
        match self.field {
            Some(field) => format!("{}:{}", self.kind, field),
            None => self.kind.to_string(),
        }
    }

    /// Coverage key including the actor (and target, if any).
    pub fn actor_key(&self) -> String {
        match &self.target {
            Some(target) => format!("{}@{}>{}", self.key(), self.actor, target),
            None => format!("{}@{}", self.key(), self.actor),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}", self.key(), self.actor)?;
        if let Some(target) = &self.target {
            write!(f, " -> {}", target)?;
        }
        write!(f, ")")
    }
}

/// Extra arguments for [`crate::ActionController::execute_by_id`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<PartId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<BiographyField>,
}

/// Declarative feedback for a rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiFeedback {
    /// Show `text` near `actor`
    Dialogue { actor: PartId, text: String },
    /// Narration not tied to a part
    Notice { text: String },
}

/// Side effects the caller must carry out.
///
/// The controller only describes them; [`crate::SimulatorModel::apply_effect`]
/// is the reference interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SideEffect {
    ReduceBlending { actor: PartId, amount: f64 },
    TriggerBacklash { protector: PartId, protectee: PartId },
    CreateSelfRay { actor: PartId },
}

/// Result of executing one action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub state_changes: Vec<Outcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_feedback: Option<UiFeedback>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<SideEffect>,
}

impl ActionResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// Locally recoverable failure: nothing was mutated.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.state_changes.push(outcome);
        self
    }

    pub fn with_effect(mut self, effect: SideEffect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn say(mut self, actor: &PartId, text: impl Into<String>) -> Self {
        self.ui_feedback = Some(UiFeedback::Dialogue {
            actor: actor.clone(),
            text: text.into(),
        });
        self
    }

    pub fn narrate(mut self, text: impl Into<String>) -> Self {
        self.ui_feedback = Some(UiFeedback::Notice { text: text.into() });
        self
    }

    /// Canonical outcome strings.
    pub fn codes(&self) -> Vec<String> {
        self.state_changes.iter().map(Outcome::encode).collect()
    }
}
