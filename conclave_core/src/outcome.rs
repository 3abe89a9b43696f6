//! Canonical outcome codec.
//!
//! Every state change is named `actor:kind` or `actor:kind:target`. The
//! codec is a bijection on well-formed outcomes (`decode(encode(o)) == o`),
//! which lets coverage bookkeeping and assertions key on plain strings.

use crate::action::{ActionKind, WAIT_ACTION};
use crate::error::CodecError;
use crate::part::PartId;
use serde::{Deserialize, Serialize};

/// What changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OutcomeKind {
    JoinedConference,
    Backlash,
    Blended,
    SteppedBack,
    StepBackRefused,
    Separating,
    Unblended,
    RayCreated,
    RayDismissed,
    FieldRevealed,
    AlreadyRevealed,
    FieldDeflected,
    UnburdenedJobTold,
    TrustGained,
    TrustLost,
    HelpConsented,
    HelpRefused,
    BlendedIdentified,
    ProxyCleared,
    ProxyBlended,
    SeesSelf,
    SelfRecognized,
    MutualRecognition,
    AttackerRecognized,
    VictimRecognized,
    Noticed,
    Unburdened,
    Victory,
    GrievanceSent,
    GrievanceDelivered,
    PendingBlendQueued,
    SpontaneousBlend,
}

const ALL_KINDS: [OutcomeKind; 32] = [
    OutcomeKind::JoinedConference,
    OutcomeKind::Backlash,
    OutcomeKind::Blended,
    OutcomeKind::SteppedBack,
    OutcomeKind::StepBackRefused,
    OutcomeKind::Separating,
    OutcomeKind::Unblended,
    OutcomeKind::RayCreated,
    OutcomeKind::RayDismissed,
    OutcomeKind::FieldRevealed,
    OutcomeKind::AlreadyRevealed,
    OutcomeKind::FieldDeflected,
    OutcomeKind::UnburdenedJobTold,
    OutcomeKind::TrustGained,
    OutcomeKind::TrustLost,
    OutcomeKind::HelpConsented,
    OutcomeKind::HelpRefused,
    OutcomeKind::BlendedIdentified,
    OutcomeKind::ProxyCleared,
    OutcomeKind::ProxyBlended,
    OutcomeKind::SeesSelf,
    OutcomeKind::SelfRecognized,
    OutcomeKind::MutualRecognition,
    OutcomeKind::AttackerRecognized,
    OutcomeKind::VictimRecognized,
    OutcomeKind::Noticed,
    OutcomeKind::Unburdened,
    OutcomeKind::Victory,
    OutcomeKind::GrievanceSent,
    OutcomeKind::GrievanceDelivered,
    OutcomeKind::PendingBlendQueued,
    OutcomeKind::SpontaneousBlend,
];

impl OutcomeKind {
    pub fn all() -> &'static [OutcomeKind] {
        &ALL_KINDS
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::JoinedConference => "joined_conference",
            OutcomeKind::Backlash => "backlash",
            OutcomeKind::Blended => "blended",
            OutcomeKind::SteppedBack => "stepped_back",
            OutcomeKind::StepBackRefused => "step_back_refused",
            OutcomeKind::Separating => "separating",
            OutcomeKind::Unblended => "unblended",
            OutcomeKind::RayCreated => "ray_created",
            OutcomeKind::RayDismissed => "ray_dismissed",
            OutcomeKind::FieldRevealed => "field_revealed",
            OutcomeKind::AlreadyRevealed => "already_revealed",
            OutcomeKind::FieldDeflected => "field_deflected",
            OutcomeKind::UnburdenedJobTold => "unburdened_job_told",
            OutcomeKind::TrustGained => "trust_gained",
            OutcomeKind::TrustLost => "trust_lost",
            OutcomeKind::HelpConsented => "help_consented",
            OutcomeKind::HelpRefused => "help_refused",
            OutcomeKind::BlendedIdentified => "blended_identified",
            OutcomeKind::ProxyCleared => "proxy_cleared",
            OutcomeKind::ProxyBlended => "proxy_blended",
            OutcomeKind::SeesSelf => "sees_self",
            OutcomeKind::SelfRecognized => "self_recognized",
            OutcomeKind::MutualRecognition => "mutual_recognition",
            OutcomeKind::AttackerRecognized => "attacker_recognized",
            OutcomeKind::VictimRecognized => "victim_recognized",
            OutcomeKind::Noticed => "noticed",
            OutcomeKind::Unburdened => "unburdened",
            OutcomeKind::Victory => "victory",
            OutcomeKind::GrievanceSent => "grievance_sent",
            OutcomeKind::GrievanceDelivered => "grievance_delivered",
            OutcomeKind::PendingBlendQueued => "pending_blend_queued",
            OutcomeKind::SpontaneousBlend => "spontaneous_blend",
        }
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OutcomeKind {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_KINDS
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| CodecError::UnknownKind(s.to_string()))
    }
}

/// A canonical state change: `actor:kind[:target]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Outcome {
    pub actor: PartId,
    pub kind: OutcomeKind,
    pub target: Option<PartId>,
}

impl Outcome {
    pub fn new(actor: &PartId, kind: OutcomeKind) -> Self {
        Self {
            actor: actor.clone(),
            kind,
            target: None,
        }
    }

    pub fn with_target(actor: &PartId, kind: OutcomeKind, target: &PartId) -> Self {
        Self {
            actor: actor.clone(),
            kind,
            target: Some(target.clone()),
        }
    }

    /// Canonical string form.
    pub fn encode(&self) -> String {
        encode(&self.actor, self.kind, self.target.as_ref())
    }

    /// Parses a canonical string.
    pub fn decode(code: &str) -> Result<Self, CodecError> {
        decode(code)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

impl From<Outcome> for String {
    fn from(outcome: Outcome) -> Self {
        outcome.encode()
    }
}

impl TryFrom<String> for Outcome {
    type Error = CodecError;

    fn try_from(code: String) -> Result<Self, Self::Error> {
        decode(&code)
    }
}

/// Encodes `actor:kind[:target]`.
pub fn encode(actor: &PartId, kind: OutcomeKind, target: Option<&PartId>) -> String {
    match target {
        Some(target) => format!("{}:{}:{}", actor, kind, target),
        None => format!("{}:{}", actor, kind),
    }
}

/// Decodes a canonical outcome string.
pub fn decode(code: &str) -> Result<Outcome, CodecError> {
    let mut pieces = code.split(':');
    let actor = pieces.next().filter(|s| !s.is_empty());
    let kind = pieces.next();
    let target = pieces.next();

    if pieces.next().is_some() {
        return Err(CodecError::malformed(code));
    }
    let (actor, kind) = match (actor, kind) {
        (Some(actor), Some(kind)) => (actor, kind),
        _ => return Err(CodecError::malformed(code)),
    };
    if target == Some("") {
        return Err(CodecError::malformed(code));
    }

    Ok(Outcome {
        actor: PartId::new(actor),
        kind: kind.parse()?,
        target: target.map(PartId::new),
    })
}

/// Splits `action:field` into the action id and the optional field suffix.
pub fn strip_field_suffix(action_key: &str) -> (&str, Option<&str>) {
    match action_key.split_once(':') {
        Some((action, field)) => (action, Some(field)),
        None => (action_key, None),
    }
}

/// Outcome kinds that advancing time may produce.
pub fn time_outcomes() -> &'static [OutcomeKind] {
    &[
        OutcomeKind::GrievanceSent,
        OutcomeKind::GrievanceDelivered,
        OutcomeKind::PendingBlendQueued,
        OutcomeKind::SpontaneousBlend,
        OutcomeKind::Unblended,
    ]
}

/// Outcome kinds an action is expected to produce.
pub fn expected_outcomes(kind: ActionKind) -> &'static [OutcomeKind] {
    match kind {
        ActionKind::JoinConference => &[OutcomeKind::JoinedConference, OutcomeKind::Backlash],
        ActionKind::Blend => &[OutcomeKind::Blended],
        ActionKind::StepBack => &[OutcomeKind::SteppedBack, OutcomeKind::StepBackRefused],
        ActionKind::Separate => &[OutcomeKind::Separating, OutcomeKind::Unblended],
        ActionKind::SpawnRay => &[OutcomeKind::RayCreated],
        ActionKind::RayFieldSelect => &[
            OutcomeKind::FieldRevealed,
            OutcomeKind::AlreadyRevealed,
            OutcomeKind::FieldDeflected,
            OutcomeKind::UnburdenedJobTold,
            OutcomeKind::TrustGained,
            OutcomeKind::TrustLost,
        ],
        ActionKind::HelpProtected => &[OutcomeKind::HelpConsented, OutcomeKind::HelpRefused],
        ActionKind::WhoDoYouSee => &[
            OutcomeKind::BlendedIdentified,
            OutcomeKind::ProxyCleared,
            OutcomeKind::ProxyBlended,
            OutcomeKind::SeesSelf,
            OutcomeKind::TrustGained,
        ],
        ActionKind::NoticePart => &[
            OutcomeKind::SelfRecognized,
            OutcomeKind::MutualRecognition,
            OutcomeKind::AttackerRecognized,
            OutcomeKind::VictimRecognized,
            OutcomeKind::Noticed,
            OutcomeKind::Unburdened,
            OutcomeKind::Victory,
            OutcomeKind::TrustGained,
        ],
        ActionKind::DismissRay => &[OutcomeKind::RayDismissed],
        ActionKind::AcceptPendingBlend => &[OutcomeKind::SpontaneousBlend],
    }
}

/// How an observed outcome string relates to what its action should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeMatch {
    /// Decodes, and the kind is in the action's expected table
    Expected,
    /// Decodes, but the action is not expected to produce this kind
    Unexpected,
    /// Does not decode (unknown kind or legacy message)
    Unrecognized,
}

/// Classifies `code` against the expected table of `action_key`.
///
/// `action_key` may carry a field suffix (`ray_field_select:job`); it is
/// stripped before the lookup.
pub fn classify(action_key: &str, code: &str) -> OutcomeMatch {
    let outcome = match decode(code) {
        Ok(outcome) => outcome,
        Err(_) => return OutcomeMatch::Unrecognized,
    };
    let (action, _) = strip_field_suffix(action_key);
    let expected: &[OutcomeKind] = if action == WAIT_ACTION {
        time_outcomes()
    } else {
        match action.parse::<ActionKind>() {
            Ok(kind) => expected_outcomes(kind),
            Err(_) => &[],
        }
    };
    if expected.contains(&outcome.kind) {
        OutcomeMatch::Expected
    } else {
        OutcomeMatch::Unexpected
    }
}
