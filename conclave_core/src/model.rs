//! The model aggregate: parts, relationships and the scene around them.

use crate::action::SideEffect;
use crate::error::ContentError;
use crate::outcome::{Outcome, OutcomeKind};
use crate::part::{BiographyField, Part, PartId};
use crate::relationships::CloudRelationshipManager;
use crate::state::PartStateManager;
use crate::tuning::Tuning;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Why a part is blended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendReason {
    /// Asked to blend by the subject
    Invited,
    /// Took over on its own (attention overflow, proxy promotion)
    Spontaneous,
    /// A protector lashing back
    Backlash,
}

impl BlendReason {
    /// Spontaneous blends cannot simply be asked to step back.
    pub fn is_spontaneous(&self) -> bool {
        !matches!(self, BlendReason::Invited)
    }
}

/// Degree and reason of one blended part.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendState {
    pub degree: f64,
    pub reason: BlendReason,
}

/// A blend waiting to happen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingBlend {
    pub id: PartId,
    pub reason: BlendReason,
    pub ready_at: f64,
}

/// The single pointer from the subject to the part being interrogated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfRay {
    pub target: PartId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<BiographyField>,
}

/// A grievance line travelling between parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub from: PartId,
    pub to: PartId,
    pub text: String,
    pub sent_at: f64,
    pub deliver_at: f64,
    pub delivered: bool,
}

/// The whole mutable world of one run.
///
/// Constructed empty, populated by scenario setup, then mutated only by the
/// action controller, [`SimulatorModel::apply_effect`] and
/// [`SimulatorModel::advance_time`]. `Clone` is a deep copy and is the
/// sanctioned way to fork a world for what-if exploration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulatorModel {
    pub(crate) parts: PartStateManager,
    pub(crate) relationships: CloudRelationshipManager,
    pub(crate) targets: BTreeSet<PartId>,
    pub(crate) blended: BTreeMap<PartId, BlendState>,
    pub(crate) pending_blends: VecDeque<PendingBlend>,
    pub(crate) self_ray: Option<SelfRay>,
    pub(crate) messages: Vec<Message>,
    pub(crate) grievance_clocks: BTreeMap<PartId, f64>,
    pub(crate) elapsed: f64,
    pub(crate) victory: bool,
    #[serde(default)]
    pub(crate) tuning: Tuning,
}

impl SimulatorModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tuning(tuning: Tuning) -> Self {
        Self {
            tuning,
            ..Self::default()
        }
    }

    // ---------------------------------------------------------------------
    // Setup
    // ---------------------------------------------------------------------

    pub fn register_part(&mut self, part: Part) {
        self.parts.register_part(part);
    }

    pub fn add_protection(&mut self, protector: &PartId, protectee: &PartId) {
        self.relationships.add_protection(protector, protectee);
    }

    pub fn add_grievance(
        &mut self,
        source: &PartId,
        targets: Vec<PartId>,
        dialogues: Vec<String>,
    ) -> Result<(), ContentError> {
        self.relationships.add_grievance(source, targets, dialogues)
    }

    pub fn add_proxy(&mut self, source: &PartId, proxy: &PartId) {
        self.relationships.add_proxy(source, proxy);
    }

    /// Reveals a field during setup (e.g. a protector that already consented).
    pub fn reveal_field(&mut self, id: &PartId, field: BiographyField) -> bool {
        self.parts.reveal(id, field)
    }

    /// Seats a registered part at the conference as a target.
    pub fn place_in_conference(&mut self, id: &PartId) {
        if self.parts.contains(id) && !self.blended.contains_key(id) {
            self.targets.insert(id.clone());
        }
    }

    /// Removes a part and every reference to it.
    pub fn remove_cloud(&mut self, id: &PartId) {
        self.parts.remove_part(id);
        self.relationships.remove_cloud(id);
        self.targets.remove(id);
        self.blended.remove(id);
        self.pending_blends.retain(|p| &p.id != id);
        self.grievance_clocks.remove(id);
        self.messages
            .retain(|m| m.delivered || (&m.from != id && &m.to != id));
        if self.self_ray.as_ref().map(|r| &r.target) == Some(id) {
            self.self_ray = None;
        }
    }

    // ---------------------------------------------------------------------
    // Read-only queries
    // ---------------------------------------------------------------------

    pub fn parts(&self) -> &PartStateManager {
        &self.parts
    }

    pub fn relationships(&self) -> &CloudRelationshipManager {
        &self.relationships
    }

    pub fn part(&self, id: &PartId) -> Option<&Part> {
        self.parts.part(id)
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn targets(&self) -> &BTreeSet<PartId> {
        &self.targets
    }

    pub fn blended(&self) -> &BTreeMap<PartId, BlendState> {
        &self.blended
    }

    pub fn pending_blends(&self) -> &VecDeque<PendingBlend> {
        &self.pending_blends
    }

    pub fn self_ray(&self) -> Option<&SelfRay> {
        self.self_ray.as_ref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn victory(&self) -> bool {
        self.victory
    }

    pub fn is_target(&self, id: &PartId) -> bool {
        self.targets.contains(id)
    }

    pub fn is_blended(&self, id: &PartId) -> bool {
        self.blended.contains_key(id)
    }

    pub fn blend_degree(&self, id: &PartId) -> f64 {
        self.blended.get(id).map(|b| b.degree).unwrap_or(0.0)
    }

    /// Targets and blended parts.
    pub fn in_conference(&self, id: &PartId) -> bool {
        self.is_target(id) || self.is_blended(id)
    }

    /// Conference members, ascending.
    pub fn conference(&self) -> BTreeSet<PartId> {
        self.targets
            .iter()
            .chain(self.blended.keys())
            .cloned()
            .collect()
    }

    pub fn is_pending(&self, id: &PartId) -> bool {
        self.pending_blends.iter().any(|p| &p.id == id)
    }

    /// Most-blended part (ties go to the lowest id).
    pub fn most_blended(&self) -> Option<&PartId> {
        let mut best: Option<(&PartId, f64)> = None;
        for (id, state) in &self.blended {
            match best {
                Some((_, degree)) if degree >= state.degree => {}
                _ => best = Some((id, state.degree)),
            }
        }
        best.map(|(id, _)| id)
    }

    /// Delivered messages matching the optional endpoints.
    pub fn delivered_count(&self, from: Option<&PartId>, to: Option<&PartId>) -> usize {
        self.messages
            .iter()
            .filter(|m| m.delivered)
            .filter(|m| from.map_or(true, |f| &m.from == f))
            .filter(|m| to.map_or(true, |t| &m.to == t))
            .count()
    }

    /// Compact summary of the discrete state, used as a coverage key.
    pub fn state_key(&self) -> String {
        let ray = match &self.self_ray {
            Some(SelfRay { target, field: Some(field) }) => format!("{}:{}", target, field),
            Some(SelfRay { target, field: None }) => target.to_string(),
            None => String::new(),
        };
        let parts = self
            .parts
            .parts()
            .map(|p| {
                format!(
                    "{}={}/{}{}",
                    p.id(),
                    p.biography().revealed_count(),
                    (p.trust() * 10.0).floor() as u8,
                    if p.attacked() { "!" } else { "" }
                )
            })
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "t[{}]|b[{}]|r[{}]|v{}|{}",
            join_ids(self.targets.iter()),
            join_ids(self.blended.keys()),
            ray,
            u8::from(self.victory),
            parts
        )
    }

    /// Read-only JSON view for rendering layers.
    pub fn model_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Read-only JSON view of the relationship arenas.
    pub fn relationships_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.relationships).unwrap_or(serde_json::Value::Null)
    }

    // ---------------------------------------------------------------------
    // Scene mutation (crate-internal)
    // ---------------------------------------------------------------------

    pub(crate) fn add_target(&mut self, id: &PartId) {
        self.blended.remove(id);
        self.targets.insert(id.clone());
    }

    /// Removes a part from the targets, dropping a ray that pointed at it.
    pub(crate) fn remove_target(&mut self, id: &PartId) {
        self.targets.remove(id);
        if self.self_ray.as_ref().map(|r| &r.target) == Some(id) {
            self.self_ray = None;
        }
    }

    pub(crate) fn blend(&mut self, id: &PartId, degree: f64, reason: BlendReason) {
        self.remove_target(id);
        self.pending_blends.retain(|p| &p.id != id);
        self.blended.insert(
            id.clone(),
            BlendState {
                degree: degree.clamp(0.0, 1.0),
                reason,
            },
        );
    }

    /// Unblends back into the targets.
    pub(crate) fn unblend(&mut self, id: &PartId) {
        if self.blended.remove(id).is_some() {
            self.targets.insert(id.clone());
        }
    }

    pub(crate) fn leave_conference(&mut self, id: &PartId) {
        self.remove_target(id);
        self.blended.remove(id);
    }

    pub(crate) fn enqueue_pending(&mut self, id: &PartId, reason: BlendReason, ready_at: f64) {
        if !self.is_pending(id) {
            self.pending_blends.push_back(PendingBlend {
                id: id.clone(),
                reason,
                ready_at,
            });
        }
    }

    pub(crate) fn push_message(&mut self, from: &PartId, to: &PartId, text: String, sent_at: f64) {
        let id = self.messages.last().map(|m| m.id + 1).unwrap_or(1);
        self.messages.push(Message {
            id,
            from: from.clone(),
            to: to.clone(),
            text,
            sent_at,
            deliver_at: sent_at + self.tuning.message_travel_time,
            delivered: false,
        });
    }

    /// Sets the victory flag once every protectee is unburdened.
    pub(crate) fn check_victory(&mut self) -> bool {
        if self.victory {
            return false;
        }
        let protectees = self.relationships.all_protectees();
        let won = !protectees.is_empty()
            && protectees
                .iter()
                .all(|id| self.parts.is_revealed(id, BiographyField::Unburdened));
        if won {
            self.victory = true;
        }
        won
    }

    // ---------------------------------------------------------------------
    // Side effects
    // ---------------------------------------------------------------------

    /// Carries out a side-effect request and reports what changed.
    pub fn apply_effect(&mut self, effect: &SideEffect) -> Vec<Outcome> {
        match effect {
            SideEffect::ReduceBlending { actor, amount } => {
                let Some(state) = self.blended.get_mut(actor) else {
                    return Vec::new();
                };
                state.degree -= amount.max(0.0);
                if state.degree <= 1e-9 {
                    self.unblend(actor);
                    vec![Outcome::new(actor, OutcomeKind::Unblended)]
                } else {
                    Vec::new()
                }
            }
            SideEffect::TriggerBacklash { protector, protectee } => {
                if !self.parts.contains(protector) {
                    return Vec::new();
                }
                self.blend(protector, 1.0, BlendReason::Backlash);
                self.parts
                    .add_trust(protectee, -self.tuning.backlash_trust_loss);
                vec![Outcome::with_target(protector, OutcomeKind::Backlash, protectee)]
            }
            SideEffect::CreateSelfRay { actor } => {
                if self.self_ray.is_some() || !self.is_target(actor) {
                    return Vec::new();
                }
                self.self_ray = Some(SelfRay {
                    target: actor.clone(),
                    field: None,
                });
                vec![Outcome::new(actor, OutcomeKind::RayCreated)]
            }
        }
    }
}

fn join_ids<'a>(ids: impl Iterator<Item = &'a PartId>) -> String {
    ids.map(PartId::as_str).collect::<Vec<_>>().join(",")
}
