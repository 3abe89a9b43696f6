//! Action controller: legal-move enumeration and transition semantics.
//!
//! The controller is stateless. Every decision that needs randomness draws
//! from the `RandomSource` it is handed (the model channel), and side effects
//! that touch other parts of the scene are returned as [`SideEffect`]
//! requests rather than applied.

use crate::action::{Action, ActionKind, ActionOptions, ActionResult, SideEffect};
use crate::error::ContentError;
use crate::model::{BlendReason, SimulatorModel};
use crate::outcome::{Outcome, OutcomeKind};
use crate::part::{BiographyField, DialogueSituation, PartId};
use conclave_env::{RandomSource, RandomSourceExt};

/// Fields that stay closed until trust passes the high-trust gate.
const GATED_FIELDS: [BiographyField; 3] = [
    BiographyField::JobImpact,
    BiographyField::Relationships,
    BiographyField::Protects,
];

/// Fields an attacked part refuses to talk about.
const GUARDED_WHEN_ATTACKED: [BiographyField; 2] =
    [BiographyField::Relationships, BiographyField::Protects];

#[derive(Debug, Clone, Copy, Default)]
pub struct ActionController;

impl ActionController {
    pub fn new() -> Self {
        Self
    }

    /// Every legal action in the current state.
    ///
    /// Order: self actions, then parts by ascending id, each in
    /// [`ActionKind::all`] order (fields and notice targets ascending).
    pub fn valid_actions(&self, model: &SimulatorModel) -> Vec<Action> {
        let mut actions = Vec::new();
        let me = PartId::self_id();

        if model.self_ray().is_some() {
            actions.push(Action::new(ActionKind::DismissRay, &me));
        }
        if !model.pending_blends().is_empty() {
            actions.push(Action::new(ActionKind::AcceptPendingBlend, &me));
        }

        let conference = model.conference();
        for id in model.parts().ids() {
            for kind in ActionKind::all() {
                match kind {
                    ActionKind::DismissRay | ActionKind::AcceptPendingBlend => {}
                    ActionKind::RayFieldSelect => {
                        if Self::ray_points_at(model, id) {
                            for field in BiographyField::ray_selectable() {
                                actions.push(Action::on_field(kind, id, field));
                            }
                        }
                    }
                    ActionKind::NoticePart => {
                        if model.is_target(id) {
                            for other in conference.iter().filter(|other| *other != id) {
                                actions.push(Action::on_target(kind, id, other));
                            }
                        }
                    }
                    _ => {
                        if Self::precondition(model, &Action::new(kind, id)).is_ok() {
                            actions.push(Action::new(kind, id));
                        }
                    }
                }
            }
        }
        actions
    }

    /// Parses an action id and executes it.
    ///
    /// Unknown ids and missing options are rejected through the result.
    pub fn execute_by_id(
        &self,
        model: &mut SimulatorModel,
        rng: &mut dyn RandomSource,
        action_id: &str,
        actor: &str,
        options: ActionOptions,
    ) -> Result<ActionResult, ContentError> {
        let kind = match action_id.parse::<ActionKind>() {
            Ok(kind) => kind,
            Err(message) => return Ok(ActionResult::rejected(message)),
        };
        if kind.requires_target() && options.target.is_none() {
            return Ok(ActionResult::rejected(format!("{} requires a target", kind)));
        }
        if kind.requires_field() && options.field.is_none() {
            return Ok(ActionResult::rejected(format!("{} requires a field", kind)));
        }

        let action = Action {
            kind,
            actor: PartId::new(actor),
            target: options.target,
            field: options.field,
        };
        self.execute(model, rng, &action)
    }

    /// Executes one action against the model.
    ///
    /// Returns `Ok` with `success == false` (and an untouched model) when the
    /// action is not legal, and `Err` only for content-authoring violations.
    pub fn execute(
        &self,
        model: &mut SimulatorModel,
        rng: &mut dyn RandomSource,
        action: &Action,
    ) -> Result<ActionResult, ContentError> {
        if let Err(reason) = Self::precondition(model, action) {
            return Ok(ActionResult::rejected(reason));
        }

        let id = &action.actor;
        let result = match action.kind {
            ActionKind::JoinConference => Self::join_conference(model, rng, id),
            ActionKind::Blend => Self::blend(model, rng, id),
            ActionKind::StepBack => Self::step_back(model, rng, id),
            ActionKind::Separate => ActionResult::ok()
                .with_outcome(Outcome::new(id, OutcomeKind::Separating))
                .with_effect(SideEffect::ReduceBlending {
                    actor: id.clone(),
                    amount: model.tuning().separate_amount,
                }),
            ActionKind::SpawnRay => {
                ActionResult::ok().with_effect(SideEffect::CreateSelfRay { actor: id.clone() })
            }
            ActionKind::RayFieldSelect => match action.field {
                Some(field) => Self::ray_field_select(model, rng, id, field)?,
                None => ActionResult::rejected("ray_field_select requires a field"),
            },
            ActionKind::HelpProtected => Self::help_protected(model, rng, id),
            ActionKind::WhoDoYouSee => Self::who_do_you_see(model, rng, id),
            ActionKind::NoticePart => match &action.target {
                Some(target) => Self::notice_part(model, rng, id, target),
                None => ActionResult::rejected("notice_part requires a target"),
            },
            ActionKind::DismissRay => Self::dismiss_ray(model),
            ActionKind::AcceptPendingBlend => Self::accept_pending_blend(model),
        };
        Ok(result)
    }

    // ---------------------------------------------------------------------
    // Preconditions
    // ---------------------------------------------------------------------

    fn ray_points_at(model: &SimulatorModel, id: &PartId) -> bool {
        model.self_ray().map(|ray| &ray.target) == Some(id)
    }

    fn precondition(model: &SimulatorModel, action: &Action) -> Result<(), String> {
        let id = &action.actor;
        if action.kind.is_self_action() {
            return match action.kind {
                ActionKind::DismissRay if model.self_ray().is_none() => {
                    Err("No ray is active".to_string())
                }
                ActionKind::AcceptPendingBlend if model.pending_blends().is_empty() => {
                    Err("No blend is pending".to_string())
                }
                _ => Ok(()),
            };
        }
        if model.part(id).is_none() {
            return Err(format!("Unknown part: {}", id));
        }

        let ok = match action.kind {
            ActionKind::JoinConference => !model.in_conference(id),
            ActionKind::Blend => model.is_target(id),
            ActionKind::StepBack => {
                model.in_conference(id)
                    && !model
                        .blended()
                        .get(id)
                        .is_some_and(|b| b.reason.is_spontaneous())
            }
            ActionKind::Separate => model.is_blended(id),
            ActionKind::SpawnRay => model.is_target(id) && model.self_ray().is_none(),
            ActionKind::RayFieldSelect => {
                Self::ray_points_at(model, id)
                    && action.field.is_some_and(|f| f.is_ray_selectable())
            }
            ActionKind::HelpProtected => {
                model.is_target(id)
                    && model.relationships().is_protector(id)
                    && !model.parts().is_revealed(id, BiographyField::ConsentedToHelp)
            }
            ActionKind::WhoDoYouSee => model.is_target(id),
            ActionKind::NoticePart => match &action.target {
                Some(target) => {
                    model.is_target(id) && target != id && model.in_conference(target)
                }
                None => false,
            },
            ActionKind::DismissRay | ActionKind::AcceptPendingBlend => true,
        };

        if ok {
            Ok(())
        } else {
            Err(format!("{} is not available", action))
        }
    }

    // ---------------------------------------------------------------------
    // Transitions
    // ---------------------------------------------------------------------

    /// Draws a line from a part's pool. An empty pool makes no draw.
    fn line(
        model: &SimulatorModel,
        rng: &mut dyn RandomSource,
        id: &PartId,
        situation: DialogueSituation,
    ) -> Option<String> {
        let pool = model.parts().dialogue(id, situation);
        let label = format!("dialogue:{}:{}", situation.as_str(), id);
        rng.pick_random(pool, &label).cloned()
    }

    fn speak(
        result: ActionResult,
        model: &SimulatorModel,
        rng: &mut dyn RandomSource,
        id: &PartId,
        situation: DialogueSituation,
    ) -> ActionResult {
        match Self::line(model, rng, id, situation) {
            Some(text) => result.say(id, text),
            None => result,
        }
    }

    fn join_conference(
        model: &mut SimulatorModel,
        rng: &mut dyn RandomSource,
        id: &PartId,
    ) -> ActionResult {
        model.add_target(id);
        let mut result = ActionResult::ok().with_outcome(Outcome::new(id, OutcomeKind::JoinedConference));

        for protector in model.relationships().protected_by(id) {
            if model.parts().is_revealed(&protector, BiographyField::ConsentedToHelp) {
                continue;
            }
            let threshold = 1.0 - model.parts().trust(&protector);
            let roll = rng.random(&format!("backlash:{}>{}", protector, id));
            if roll < threshold {
                result = result.with_effect(SideEffect::TriggerBacklash {
                    protector,
                    protectee: id.clone(),
                });
            }
        }
        result
    }

    fn blend(model: &mut SimulatorModel, rng: &mut dyn RandomSource, id: &PartId) -> ActionResult {
        model.blend(id, 1.0, BlendReason::Invited);
        let result = ActionResult::ok().with_outcome(Outcome::new(id, OutcomeKind::Blended));
        Self::speak(result, model, rng, id, DialogueSituation::Blended)
    }

    fn step_back(model: &mut SimulatorModel, rng: &mut dyn RandomSource, id: &PartId) -> ActionResult {
        let guarding = model
            .relationships()
            .protecting(id)
            .iter()
            .any(|protectee| model.in_conference(protectee));

        if guarding {
            let trust = model.parts().trust(id);
            if !rng.chance(trust, &format!("step_back:{}", id)) {
                return ActionResult::ok()
                    .with_outcome(Outcome::new(id, OutcomeKind::StepBackRefused))
                    .narrate(format!("{} will not leave while it is guarding someone", id));
            }
        }

        model.leave_conference(id);
        ActionResult::ok().with_outcome(Outcome::new(id, OutcomeKind::SteppedBack))
    }

    fn ray_field_select(
        model: &mut SimulatorModel,
        rng: &mut dyn RandomSource,
        id: &PartId,
        field: BiographyField,
    ) -> Result<ActionResult, ContentError> {
        if let Some(ray) = model.self_ray.as_mut() {
            ray.field = Some(field);
        }
        let tuning = model.tuning().clone();
        let part_unburdened = model.part(id).is_some_and(|p| p.is_unburdened());

        if part_unburdened && field == BiographyField::Job {
            let Some(text) = Self::line(model, rng, id, DialogueSituation::UnburdenedJob) else {
                return Err(ContentError::MissingUnburdenedJobDialogue { part: id.clone() });
            };
            model.parts.reveal(id, field);
            return Ok(ActionResult::ok()
                .with_outcome(Outcome::new(id, OutcomeKind::UnburdenedJobTold))
                .say(id, text));
        }

        if model.parts().is_revealed(id, field) {
            model.parts.add_trust(id, -tuning.already_told_penalty);
            let result = ActionResult::ok()
                .with_outcome(Outcome::new(id, OutcomeKind::AlreadyRevealed))
                .with_outcome(Outcome::new(id, OutcomeKind::TrustLost));
            return Ok(Self::speak(result, model, rng, id, DialogueSituation::AlreadyTold));
        }

        if model.parts().is_attacked(id) && GUARDED_WHEN_ATTACKED.contains(&field) {
            return Ok(Self::deflect(model, rng, id, DialogueSituation::AttackedDeflect));
        }

        let trust = model.parts().trust(id);
        if GATED_FIELDS.contains(&field) && trust < tuning.high_trust_gate {
            return Ok(Self::deflect(model, rng, id, DialogueSituation::Deflect));
        }

        let roll = rng.random(&format!("deflect:{}:{}", id, field));
        if roll < (1.0 - trust) * tuning.deflect_scale {
            return Ok(Self::deflect(model, rng, id, DialogueSituation::Deflect));
        }

        model.parts.reveal(id, field);
        let openness = model.part(id).map(|p| p.openness()).unwrap_or(0.0);
        let crowd = model.targets().len().max(1) as f64;
        let gained = model
            .parts
            .add_trust(id, tuning.ray_trust_gain * openness / crowd);

        let mut result = ActionResult::ok().with_outcome(Outcome::new(id, OutcomeKind::FieldRevealed));
        if gained > 0.0 {
            result = result.with_outcome(Outcome::new(id, OutcomeKind::TrustGained));
        }
        let text = DialogueSituation::for_field(field)
            .and_then(|situation| Self::line(model, rng, id, situation))
            .or_else(|| model.parts().field_value(id, field).map(str::to_string));
        Ok(match text {
            Some(text) => result.say(id, text),
            None => result,
        })
    }

    fn deflect(
        model: &SimulatorModel,
        rng: &mut dyn RandomSource,
        id: &PartId,
        situation: DialogueSituation,
    ) -> ActionResult {
        let result = ActionResult::ok().with_outcome(Outcome::new(id, OutcomeKind::FieldDeflected));
        Self::speak(result, model, rng, id, situation)
    }

    fn help_protected(
        model: &mut SimulatorModel,
        rng: &mut dyn RandomSource,
        id: &PartId,
    ) -> ActionResult {
        let trust = model.parts().trust(id);
        if rng.chance(trust, &format!("help:{}", id)) {
            model.parts.reveal(id, BiographyField::ConsentedToHelp);
            let result = ActionResult::ok().with_outcome(Outcome::new(id, OutcomeKind::HelpConsented));
            Self::speak(result, model, rng, id, DialogueSituation::HelpConsent)
        } else {
            let result = ActionResult::ok().with_outcome(Outcome::new(id, OutcomeKind::HelpRefused));
            Self::speak(result, model, rng, id, DialogueSituation::HelpRefusal)
        }
    }

    fn who_do_you_see(
        model: &mut SimulatorModel,
        rng: &mut dyn RandomSource,
        id: &PartId,
    ) -> ActionResult {
        if let Some(seen) = model.most_blended().cloned() {
            return ActionResult::ok()
                .with_outcome(Outcome::with_target(id, OutcomeKind::BlendedIdentified, &seen))
                .narrate(format!("{} sees {}", id, seen));
        }

        let proxies = model.relationships().proxies_of(id);
        if proxies.is_empty() {
            let gained = model.parts.add_trust(id, model.tuning().sees_self_gain);
            let mut result = ActionResult::ok().with_outcome(Outcome::new(id, OutcomeKind::SeesSelf));
            if gained > 0.0 {
                result = result.with_outcome(Outcome::new(id, OutcomeKind::TrustGained));
            }
            return result;
        }

        let trust = model.parts().trust(id);
        let clear_chance = model.tuning().proxy_clear_base + trust / 2.0;
        let clears = rng.chance(clear_chance, &format!("proxy_check:{}", id));

        let absent: Vec<PartId> = proxies
            .iter()
            .filter(|proxy| !model.in_conference(proxy))
            .cloned()
            .collect();

        if clears || absent.is_empty() {
            let Some(proxy) = rng.pick_random(&proxies, &format!("proxy_clear:{}", id)).cloned() else {
                return ActionResult::ok();
            };
            model.relationships.remove_proxy(id, &proxy);
            model.parts.set_was_proxy(&proxy, true);
            return ActionResult::ok()
                .with_outcome(Outcome::with_target(id, OutcomeKind::ProxyCleared, &proxy))
                .narrate(format!("{} was only standing in for the self", proxy));
        }

        let Some(proxy) = rng.pick_random(&absent, &format!("proxy_blend:{}", id)).cloned() else {
            return ActionResult::ok();
        };
        let degree = model.tuning().spontaneous_degree;
        model.blend(&proxy, degree, BlendReason::Spontaneous);
        model.parts.set_was_proxy(&proxy, true);
        ActionResult::ok().with_outcome(Outcome::with_target(id, OutcomeKind::ProxyBlended, &proxy))
    }

    fn notice_part(
        model: &mut SimulatorModel,
        rng: &mut dyn RandomSource,
        actor: &PartId,
        target: &PartId,
    ) -> ActionResult {
        let tuning = model.tuning().clone();

        // Self-recognition: the target was fronting for the actor.
        if model.relationships().is_proxy_for(target, actor) {
            model.relationships.remove_proxy(actor, target);
            model.parts.set_was_proxy(target, true);
            return ActionResult::ok()
                .with_outcome(Outcome::with_target(actor, OutcomeKind::SelfRecognized, target));
        }

        let actor_protects = model.relationships().is_protecting(actor, target);
        if actor_protects || model.relationships().is_protecting(target, actor) {
            return Self::mutual_recognition(model, rng, actor, target, actor_protects);
        }

        if model.relationships().has_grievance(actor, target) && model.parts().is_attacked(target) {
            model.parts.set_attacked(target, false);
            model.relationships.remove_grievance_target(actor, target);
            return ActionResult::ok()
                .with_outcome(Outcome::with_target(actor, OutcomeKind::AttackerRecognized, target));
        }

        if model.relationships().has_grievance(target, actor) && model.parts().is_attacked(actor) {
            let gained = model.parts.add_trust(actor, tuning.recognition_base);
            let mut result = ActionResult::ok()
                .with_outcome(Outcome::with_target(actor, OutcomeKind::VictimRecognized, target));
            if gained > 0.0 {
                result = result.with_outcome(Outcome::new(actor, OutcomeKind::TrustGained));
            }
            return result;
        }

        let gained = model.parts.add_trust(target, tuning.notice_gain);
        let mut result =
            ActionResult::ok().with_outcome(Outcome::with_target(actor, OutcomeKind::Noticed, target));
        if gained > 0.0 {
            result = result.with_outcome(Outcome::new(target, OutcomeKind::TrustGained));
        }
        result
    }

    fn mutual_recognition(
        model: &mut SimulatorModel,
        rng: &mut dyn RandomSource,
        actor: &PartId,
        target: &PartId,
        actor_protects: bool,
    ) -> ActionResult {
        let tuning = model.tuning().clone();
        let target_at_cap = model.part(target).is_some_and(|p| p.trust_at_cap());

        let actor_trust = model.parts().trust(actor);
        let target_trust = model.parts().trust(target);
        let (lower, gap) = if actor_trust < target_trust {
            (actor, target_trust - actor_trust)
        } else {
            (target, actor_trust - target_trust)
        };
        let gained = model
            .parts
            .add_trust(lower, tuning.recognition_base + tuning.recognition_rate * gap);

        let mut result = ActionResult::ok()
            .with_outcome(Outcome::with_target(actor, OutcomeKind::MutualRecognition, target));
        if gained > 0.0 {
            result = result.with_outcome(Outcome::new(lower, OutcomeKind::TrustGained));
        }

        let consented = model.parts().is_revealed(actor, BiographyField::ConsentedToHelp);
        let already_free = model.part(target).is_some_and(|p| p.is_unburdened());
        if !(actor_protects && consented && target_at_cap && !already_free) {
            return Self::speak(result, model, rng, target, DialogueSituation::Recognition);
        }

        model.parts.reveal(target, BiographyField::Unburdened);
        model.parts.set_need_attention(target, 0.0);
        result = result.with_outcome(Outcome::with_target(actor, OutcomeKind::Unburdened, target));

        let all_free = model
            .relationships()
            .protecting(actor)
            .iter()
            .all(|p| model.parts().is_revealed(p, BiographyField::Unburdened));
        if all_free && model.parts.reveal(actor, BiographyField::Unburdened) {
            model.parts.set_need_attention(actor, 0.0);
            result = result.with_outcome(Outcome::new(actor, OutcomeKind::Unburdened));
        }

        if model.check_victory() {
            result = result.with_outcome(Outcome::new(&PartId::self_id(), OutcomeKind::Victory));
        }
        Self::speak(result, model, rng, target, DialogueSituation::Gratitude)
    }

    fn dismiss_ray(model: &mut SimulatorModel) -> ActionResult {
        match model.self_ray.take() {
            Some(ray) => ActionResult::ok().with_outcome(Outcome::with_target(
                &PartId::self_id(),
                OutcomeKind::RayDismissed,
                &ray.target,
            )),
            None => ActionResult::rejected("No ray is active"),
        }
    }

    fn accept_pending_blend(model: &mut SimulatorModel) -> ActionResult {
        let Some(next) = model.pending_blends.front().map(|p| p.id.clone()) else {
            return ActionResult::rejected("No blend is pending");
        };
        if !model.parts().contains(&next) {
            return ActionResult::rejected(format!("Unknown part: {}", next));
        }
        if let Some(pending) = model.pending_blends.pop_front() {
            let degree = model.tuning().spontaneous_degree;
            model.blend(&pending.id, degree, pending.reason);
        }
        ActionResult::ok().with_outcome(Outcome::new(&next, OutcomeKind::SpontaneousBlend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::part::{Dialogues, Part};
    use approx::assert_relative_eq;
    use conclave_env::SeededRng;

    /// Source that replays a fixed list of values.
    struct Scripted {
        values: Vec<f64>,
        log: Vec<String>,
    }

    impl Scripted {
        fn new(values: &[f64]) -> Self {
            Self {
                values: values.to_vec(),
                log: Vec::new(),
            }
        }
    }

    impl RandomSource for Scripted {
        fn random(&mut self, label: &str) -> f64 {
            let value = self.values.get(self.log.len()).copied().unwrap_or(0.5);
            self.log.push(label.to_string());
            value
        }

        fn draw_count(&self) -> u64 {
            self.log.len() as u64
        }

        fn draw_log(&self) -> &[String] {
            &self.log
        }

        fn state(&self) -> conclave_env::RngState {
            conclave_env::RngState::Entropy {
                draws: self.log.len() as u64,
                log: self.log.clone(),
            }
        }

        fn seed(&self) -> Option<u64> {
            None
        }
    }

    fn id(s: &str) -> PartId {
        PartId::new(s)
    }

    fn run(model: &mut SimulatorModel, rng: &mut dyn RandomSource, action: Action) -> ActionResult {
        let result = ActionController::new().execute(model, rng, &action).unwrap();
        for effect in &result.effects {
            model.apply_effect(effect);
        }
        result
    }

    fn household() -> SimulatorModel {
        let mut model = SimulatorModel::new();
        model.register_part(Part::new("guard", "Guard").with_trust(0.4));
        model.register_part(
            Part::new("kid", "Kid")
                .with_trust(0.3)
                .with_dialogues(Dialogues::new().with_lines(DialogueSituation::Blended, ["it hurts"])),
        );
        model.add_protection(&id("guard"), &id("kid"));
        model
    }

    #[test]
    fn test_join_then_blend() {
        let mut model = household();
        let mut rng = SeededRng::new(7);
        let controller = ActionController::new();

        let join = controller
            .execute_by_id(&mut model, &mut rng, "join_conference", "guard", ActionOptions::default())
            .unwrap();
        assert!(join.success);
        let blend = controller
            .execute_by_id(&mut model, &mut rng, "blend", "guard", ActionOptions::default())
            .unwrap();
        assert!(blend.success);

        assert!(!model.is_target(&id("guard")));
        assert!(model.is_blended(&id("guard")));
    }

    #[test]
    fn test_unknown_and_illegal_actions_are_rejected() {
        let mut model = household();
        let before = model.clone();
        let mut rng = SeededRng::new(1);
        let controller = ActionController::new();

        let unknown = controller
            .execute_by_id(&mut model, &mut rng, "dance", "guard", ActionOptions::default())
            .unwrap();
        assert!(!unknown.success);

        let missing = controller
            .execute_by_id(&mut model, &mut rng, "notice_part", "guard", ActionOptions::default())
            .unwrap();
        assert!(!missing.success);

        let illegal = controller
            .execute_by_id(&mut model, &mut rng, "separate", "guard", ActionOptions::default())
            .unwrap();
        assert!(!illegal.success);

        let ghost = controller
            .execute_by_id(&mut model, &mut rng, "join_conference", "ghost", ActionOptions::default())
            .unwrap();
        assert!(!ghost.success);

        assert_eq!(model, before);
        assert_eq!(rng.draw_count(), 0);
    }

    #[test]
    fn test_valid_actions_are_all_executable() {
        let mut model = household();
        model.place_in_conference(&id("guard"));
        model.place_in_conference(&id("kid"));
        let controller = ActionController::new();

        let actions = controller.valid_actions(&model);
        assert!(!actions.is_empty());
        for action in actions {
            let mut fork = model.clone();
            let mut rng = SeededRng::new(2);
            let result = controller.execute(&mut fork, &mut rng, &action).unwrap();
            assert!(result.success, "{} should be legal", action);
        }
    }

    #[test]
    fn test_valid_actions_order_self_first() {
        let mut model = household();
        model.place_in_conference(&id("kid"));
        model.apply_effect(&SideEffect::CreateSelfRay { actor: id("kid") });

        let actions = ActionController::new().valid_actions(&model);
        assert_eq!(actions[0].kind, ActionKind::DismissRay);
        assert_eq!(actions[1].actor, id("guard"));
        assert!(actions
            .iter()
            .any(|a| a.key() == "ray_field_select:protects" && a.actor == id("kid")));
    }

    #[test]
    fn test_backlash_requested_for_low_trust_protector() {
        let mut model = household();
        let mut rng = Scripted::new(&[0.1]);

        let result = ActionController::new()
            .execute(&mut model, &mut rng, &Action::new(ActionKind::JoinConference, &id("kid")))
            .unwrap();
        assert_eq!(
            result.effects,
            vec![SideEffect::TriggerBacklash {
                protector: id("guard"),
                protectee: id("kid"),
            }]
        );
        assert_eq!(rng.draw_log(), &["backlash:guard>kid".to_string()]);
    }

    #[test]
    fn test_step_back_refused_while_guarding() {
        let mut model = household();
        model.place_in_conference(&id("guard"));
        model.place_in_conference(&id("kid"));
        let mut rng = Scripted::new(&[0.9]);

        let result = run(&mut model, &mut rng, Action::new(ActionKind::StepBack, &id("guard")));
        assert_eq!(result.codes(), vec!["guard:step_back_refused"]);
        assert!(model.in_conference(&id("guard")));
    }

    #[test]
    fn test_spontaneous_blend_cannot_step_back() {
        let mut model = household();
        model.blend(&id("kid"), 0.7, BlendReason::Spontaneous);
        let mut rng = SeededRng::new(1);

        let result = run(&mut model, &mut rng, Action::new(ActionKind::StepBack, &id("kid")));
        assert!(!result.success);
    }

    #[test]
    fn test_gated_field_deflects_at_low_trust() {
        let mut model = household();
        model.place_in_conference(&id("guard"));
        let mut rng = SeededRng::new(1);
        run(&mut model, &mut rng, Action::new(ActionKind::SpawnRay, &id("guard")));

        let result = run(
            &mut model,
            &mut rng,
            Action::on_field(ActionKind::RayFieldSelect, &id("guard"), BiographyField::Protects),
        );
        assert_eq!(result.codes(), vec!["guard:field_deflected"]);
        assert!(!model.parts().is_revealed(&id("guard"), BiographyField::Protects));
        assert_eq!(model.self_ray().and_then(|r| r.field), Some(BiographyField::Protects));
    }

    #[test]
    fn test_reveal_then_already_told() {
        let mut model = household();
        model.place_in_conference(&id("guard"));
        let mut rng = Scripted::new(&[0.99]);
        run(&mut model, &mut rng, Action::new(ActionKind::SpawnRay, &id("guard")));

        let ask = Action::on_field(ActionKind::RayFieldSelect, &id("guard"), BiographyField::Age);
        let first = run(&mut model, &mut rng, ask.clone());
        assert_eq!(first.codes(), vec!["guard:field_revealed", "guard:trust_gained"]);
        // 0.4 + 0.2 * 0.5 / 1
        assert_relative_eq!(model.parts().trust(&id("guard")), 0.5, epsilon = 1e-12);

        let second = run(&mut model, &mut rng, ask);
        assert_eq!(second.codes(), vec!["guard:already_revealed", "guard:trust_lost"]);
        assert_relative_eq!(model.parts().trust(&id("guard")), 0.45, epsilon = 1e-12);
    }

    #[test]
    fn test_unburdened_job_requires_dialogue() {
        let mut model = household();
        model.parts.reveal(&id("guard"), BiographyField::Unburdened);
        model.place_in_conference(&id("guard"));
        model.apply_effect(&SideEffect::CreateSelfRay { actor: id("guard") });
        let mut rng = SeededRng::new(1);

        let err = ActionController::new()
            .execute(
                &mut model,
                &mut rng,
                &Action::on_field(ActionKind::RayFieldSelect, &id("guard"), BiographyField::Job),
            )
            .unwrap_err();
        assert_eq!(err, ContentError::MissingUnburdenedJobDialogue { part: id("guard") });
    }

    #[test]
    fn test_who_do_you_see_prefers_blended() {
        let mut model = household();
        model.place_in_conference(&id("guard"));
        model.blend(&id("kid"), 0.5, BlendReason::Invited);
        let mut rng = SeededRng::new(1);

        let result = run(&mut model, &mut rng, Action::new(ActionKind::WhoDoYouSee, &id("guard")));
        assert_eq!(result.codes(), vec!["guard:blended_identified:kid"]);
    }

    #[test]
    fn test_proxy_promoted_on_failed_clear() {
        let mut model = household();
        model.register_part(Part::new("mask", "Mask"));
        model.add_proxy(&id("guard"), &id("mask"));
        model.place_in_conference(&id("guard"));
        let mut rng = Scripted::new(&[0.99, 0.0]);

        let result = run(&mut model, &mut rng, Action::new(ActionKind::WhoDoYouSee, &id("guard")));
        assert_eq!(result.codes(), vec!["guard:proxy_blended:mask"]);
        assert!(model.is_blended(&id("mask")));
        assert!(model.part(&id("mask")).unwrap().was_proxy());
    }

    #[test]
    fn test_notice_path_to_victory() {
        let mut model = household();
        model.parts.set_trust(&id("kid"), 1.0);
        model.parts.reveal(&id("guard"), BiographyField::ConsentedToHelp);
        model.place_in_conference(&id("guard"));
        model.place_in_conference(&id("kid"));
        let mut rng = SeededRng::new(1);

        let result = run(
            &mut model,
            &mut rng,
            Action::on_target(ActionKind::NoticePart, &id("guard"), &id("kid")),
        );
        let codes = result.codes();
        assert!(codes.contains(&"guard:mutual_recognition:kid".to_string()));
        assert!(codes.contains(&"guard:unburdened:kid".to_string()));
        assert!(codes.contains(&"guard:unburdened".to_string()));
        assert_eq!(codes.last().map(String::as_str), Some("self:victory"));
        assert!(model.victory());
        assert_eq!(model.parts().need_attention(&id("kid")), 0.0);
    }

    #[test]
    fn test_attacker_recognition_clears_attack() {
        let mut model = household();
        model
            .add_grievance(&id("guard"), vec![id("kid")], vec!["stop".into()])
            .unwrap();
        model.relationships.remove_protection(&id("guard"), &id("kid"));
        model.parts.set_attacked(&id("kid"), true);
        model.place_in_conference(&id("guard"));
        model.place_in_conference(&id("kid"));
        let mut rng = SeededRng::new(1);

        let result = run(
            &mut model,
            &mut rng,
            Action::on_target(ActionKind::NoticePart, &id("guard"), &id("kid")),
        );
        assert_eq!(result.codes(), vec!["guard:attacker_recognized:kid"]);
        assert!(!model.parts().is_attacked(&id("kid")));
        assert!(!model.relationships().has_grievance(&id("guard"), &id("kid")));
    }

    #[test]
    fn test_accept_pending_blend() {
        let mut model = household();
        model.enqueue_pending(&id("kid"), BlendReason::Spontaneous, 10.0);
        let mut rng = SeededRng::new(1);

        let result = run(
            &mut model,
            &mut rng,
            Action::new(ActionKind::AcceptPendingBlend, &PartId::self_id()),
        );
        assert_eq!(result.codes(), vec!["kid:spontaneous_blend"]);
        assert!(model.pending_blends().is_empty());
    }

    fn protector_with_lines() -> SimulatorModel {
        let mut model = SimulatorModel::new();
        model.register_part(
            Part::new("guard", "Guard").with_trust(0.4).with_dialogues(
                Dialogues::new()
                    .with_lines(DialogueSituation::HelpConsent, ["Fine, you can try"])
                    .with_lines(DialogueSituation::HelpRefusal, ["Not yet"])
                    .with_lines(DialogueSituation::AttackedDeflect, ["Leave me alone"]),
            ),
        );
        model.register_part(Part::new("kid", "Kid"));
        model.add_protection(&id("guard"), &id("kid"));
        model.place_in_conference(&id("guard"));
        model
    }

    fn said(result: &ActionResult) -> Option<&str> {
        match &result.ui_feedback {
            Some(crate::action::UiFeedback::Dialogue { text, .. }) => Some(text.as_str()),
            _ => None,
        }
    }

    #[test]
    fn test_help_consented_reveals_consent() {
        let mut model = protector_with_lines();
        let mut rng = Scripted::new(&[0.1, 0.0]);

        let result = run(&mut model, &mut rng, Action::new(ActionKind::HelpProtected, &id("guard")));
        assert_eq!(result.codes(), vec!["guard:help_consented"]);
        assert_eq!(said(&result), Some("Fine, you can try"));
        assert!(model.parts().is_revealed(&id("guard"), BiographyField::ConsentedToHelp));
        assert_eq!(
            rng.draw_log(),
            &["help:guard".to_string(), "dialogue:help_consent:guard".to_string()]
        );

        // consent is asked once
        let again = run(&mut model, &mut rng, Action::new(ActionKind::HelpProtected, &id("guard")));
        assert!(!again.success);
        assert!(!ActionController::new()
            .valid_actions(&model)
            .iter()
            .any(|a| a.kind == ActionKind::HelpProtected));
    }

    #[test]
    fn test_help_refused_leaves_consent_closed() {
        let mut model = protector_with_lines();
        let mut rng = Scripted::new(&[0.9, 0.0]);

        let result = run(&mut model, &mut rng, Action::new(ActionKind::HelpProtected, &id("guard")));
        assert!(result.success);
        assert_eq!(result.codes(), vec!["guard:help_refused"]);
        assert_eq!(said(&result), Some("Not yet"));
        assert!(!model.parts().is_revealed(&id("guard"), BiographyField::ConsentedToHelp));
        assert_eq!(
            rng.draw_log(),
            &["help:guard".to_string(), "dialogue:help_refusal:guard".to_string()]
        );
        assert!(ActionController::new()
            .valid_actions(&model)
            .iter()
            .any(|a| a.kind == ActionKind::HelpProtected && a.actor == id("guard")));
    }

    #[test]
    fn test_attacked_part_deflects_guarded_field() {
        let mut model = protector_with_lines();
        model.parts.set_attacked(&id("guard"), true);
        model.parts.set_trust(&id("guard"), 0.8);
        let mut rng = Scripted::new(&[0.99, 0.0]);
        run(&mut model, &mut rng, Action::new(ActionKind::SpawnRay, &id("guard")));

        let age = run(
            &mut model,
            &mut rng,
            Action::on_field(ActionKind::RayFieldSelect, &id("guard"), BiographyField::Age),
        );
        assert_eq!(age.codes()[0], "guard:field_revealed");
        assert_eq!(model.self_ray().and_then(|r| r.field), Some(BiographyField::Age));

        let draws = rng.draw_count();
        let result = run(
            &mut model,
            &mut rng,
            Action::on_field(ActionKind::RayFieldSelect, &id("guard"), BiographyField::Relationships),
        );
        assert_eq!(result.codes(), vec!["guard:field_deflected"]);
        assert_eq!(said(&result), Some("Leave me alone"));
        assert!(!model.parts().is_revealed(&id("guard"), BiographyField::Relationships));
        assert_eq!(model.self_ray().and_then(|r| r.field), Some(BiographyField::Relationships));
        // no deflect roll, only the line
        assert_eq!(
            rng.draw_log()[draws as usize..],
            ["dialogue:attacked_deflect:guard".to_string()]
        );
    }

    #[test]
    fn test_who_do_you_see_clears_proxy() {
        let mut model = household();
        model.register_part(Part::new("mask", "Mask"));
        model.add_proxy(&id("guard"), &id("mask"));
        model.place_in_conference(&id("guard"));
        let trust = model.parts().trust(&id("guard"));
        let mut rng = Scripted::new(&[0.0, 0.0]);

        let result = run(&mut model, &mut rng, Action::new(ActionKind::WhoDoYouSee, &id("guard")));
        assert_eq!(result.codes(), vec!["guard:proxy_cleared:mask"]);
        assert!(model.relationships().proxies_of(&id("guard")).is_empty());
        assert!(model.part(&id("mask")).unwrap().was_proxy());
        assert!(!model.is_blended(&id("mask")));
        assert_eq!(model.parts().trust(&id("guard")), trust);
        assert_eq!(
            rng.draw_log(),
            &["proxy_check:guard".to_string(), "proxy_clear:guard".to_string()]
        );
    }

    #[test]
    fn test_failed_clear_with_no_absent_proxy_still_clears() {
        let mut model = household();
        model.register_part(Part::new("mask", "Mask"));
        model.add_proxy(&id("guard"), &id("mask"));
        model.place_in_conference(&id("guard"));
        model.place_in_conference(&id("mask"));
        let mut rng = Scripted::new(&[0.99, 0.0]);

        let result = run(&mut model, &mut rng, Action::new(ActionKind::WhoDoYouSee, &id("guard")));
        assert_eq!(result.codes(), vec!["guard:proxy_cleared:mask"]);
        assert!(model.relationships().proxies_of(&id("guard")).is_empty());
    }

    #[test]
    fn test_notice_own_proxy_is_self_recognition() {
        let mut model = household();
        model.register_part(Part::new("mask", "Mask"));
        model.add_proxy(&id("guard"), &id("mask"));
        model.place_in_conference(&id("guard"));
        model.place_in_conference(&id("mask"));
        let before = (model.parts().trust(&id("guard")), model.parts().trust(&id("mask")));
        let mut rng = SeededRng::new(1);

        let result = run(
            &mut model,
            &mut rng,
            Action::on_target(ActionKind::NoticePart, &id("guard"), &id("mask")),
        );
        assert_eq!(result.codes(), vec!["guard:self_recognized:mask"]);
        assert!(!model.relationships().is_proxy_for(&id("mask"), &id("guard")));
        assert!(model.part(&id("mask")).unwrap().was_proxy());
        assert_eq!(
            (model.parts().trust(&id("guard")), model.parts().trust(&id("mask"))),
            before
        );
        assert_eq!(rng.draw_count(), 0);
    }

    fn victim_and_critic() -> SimulatorModel {
        let mut model = household();
        model.register_part(Part::new("critic", "Critic"));
        model
            .add_grievance(&id("critic"), vec![id("kid")], vec!["useless".into()])
            .unwrap();
        model.place_in_conference(&id("kid"));
        model.place_in_conference(&id("critic"));
        model
    }

    #[test]
    fn test_attacked_victim_recognizes_attacker() {
        let mut model = victim_and_critic();
        model.parts.set_attacked(&id("kid"), true);
        let mut rng = SeededRng::new(1);

        let result = run(
            &mut model,
            &mut rng,
            Action::on_target(ActionKind::NoticePart, &id("kid"), &id("critic")),
        );
        assert_eq!(result.codes(), vec!["kid:victim_recognized:critic", "kid:trust_gained"]);
        // 0.3 + recognition_base
        assert_relative_eq!(model.parts().trust(&id("kid")), 0.35, epsilon = 1e-12);
        assert!(model.parts().is_attacked(&id("kid")));
        assert!(model.relationships().has_grievance(&id("critic"), &id("kid")));
    }

    #[test]
    fn test_unattacked_victim_falls_through_to_notice() {
        let mut model = victim_and_critic();
        let mut rng = SeededRng::new(1);

        let result = run(
            &mut model,
            &mut rng,
            Action::on_target(ActionKind::NoticePart, &id("kid"), &id("critic")),
        );
        assert_eq!(result.codes(), vec!["kid:noticed:critic", "critic:trust_gained"]);
        assert_relative_eq!(model.parts().trust(&id("kid")), 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_rejected_accept_leaves_queue_untouched() {
        let mut model = household();
        model.enqueue_pending(&id("kid"), BlendReason::Spontaneous, 10.0);
        model.pending_blends.push_front(crate::model::PendingBlend {
            id: id("gone"),
            reason: BlendReason::Spontaneous,
            ready_at: 5.0,
        });
        let before = model.clone();
        let mut rng = SeededRng::new(1);

        let result = run(
            &mut model,
            &mut rng,
            Action::new(ActionKind::AcceptPendingBlend, &PartId::self_id()),
        );
        assert!(!result.success);
        assert_eq!(model, before);
        assert_eq!(model.pending_blends().len(), 2);
    }
}
