//! Analytic time advancement.
//!
//! Advancing by `dt` is a single discrete jump: attention accrual, grievance
//! emission and message delivery are computed in closed form for the whole
//! interval instead of being stepped frame by frame, so
//! `advance_time(a); advance_time(b)` matches `advance_time(a + b)` except
//! for effects that are only checked at interval boundaries (pending-blend
//! queueing and blend decay) and for jumps past `grievance_burst_limit`
//! intervals, which drop the oldest emissions.

use crate::model::{BlendReason, SimulatorModel};
use crate::outcome::{Outcome, OutcomeKind};
use crate::part::PartId;
use conclave_env::{RandomSource, RandomSourceExt};

impl SimulatorModel {
    /// Advances the world by `seconds` and reports what changed.
    ///
    /// Non-positive or non-finite intervals are ignored.
    pub fn advance_time(&mut self, seconds: f64, rng: &mut dyn RandomSource) -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        if !(seconds.is_finite() && seconds > 0.0) {
            return outcomes;
        }
        let start = self.elapsed;
        let end = start + seconds;

        self.accrue_attention(seconds);
        self.emit_grievances(start, seconds, rng, &mut outcomes);
        self.deliver_messages(end, &mut outcomes);
        self.queue_overflowing_parts(end, &mut outcomes);
        self.release_pending_blends(end, &mut outcomes);
        self.decay_blends(seconds, &mut outcomes);

        self.elapsed = end;
        outcomes
    }

    /// Every grievance holder gains need-attention at a fixed rate.
    fn accrue_attention(&mut self, seconds: f64) {
        let rate = self.tuning.grievance_attention_rate;
        for source in self.relationships.grievance_sources() {
            self.parts.add_need_attention(&source, rate * seconds);
        }
    }

    /// Emits one message per target every `grievance_interval` seconds while
    /// both ends are in conference.
    fn emit_grievances(
        &mut self,
        start: f64,
        seconds: f64,
        rng: &mut dyn RandomSource,
        outcomes: &mut Vec<Outcome>,
    ) {
        let interval = self.tuning.grievance_interval;
        if !(interval.is_finite() && interval > 0.0) {
            return;
        }

        for source in self.relationships.grievance_sources() {
            let clock = self.grievance_clocks.get(&source).copied().unwrap_or(0.0);
            let total = clock + seconds;
            let emissions = (total / interval).floor() as u64;
            self.grievance_clocks
                .insert(source.clone(), total - emissions as f64 * interval);

            if emissions == 0 || !self.in_conference(&source) {
                continue;
            }
            let targets: Vec<PartId> = self
                .relationships
                .grievance_targets(&source)
                .into_iter()
                .filter(|t| self.in_conference(t))
                .collect();

            let burst = self.tuning.grievance_burst_limit;
            let first = emissions.saturating_sub(burst) + 1;
            for k in first..=emissions {
                let sent_at = start + (k as f64 * interval - clock);
                for target in &targets {
                    let lines = self.relationships.grievance_dialogues(&source, target);
                    let label = format!("grievance_line:{}>{}", source, target);
                    let text = rng
                        .pick_random(&lines, &label)
                        .cloned()
                        .unwrap_or_default();
                    self.push_message(&source, target, text, sent_at);
                    outcomes.push(Outcome::with_target(&source, OutcomeKind::GrievanceSent, target));
                }
            }
        }
    }

    /// Delivered grievances mark the recipient attacked.
    fn deliver_messages(&mut self, now: f64, outcomes: &mut Vec<Outcome>) {
        let attention = self.tuning.attack_attention;
        let mut arrivals = Vec::new();
        for message in self.messages.iter_mut() {
            if !message.delivered && message.deliver_at <= now + 1e-9 {
                message.delivered = true;
                arrivals.push((message.from.clone(), message.to.clone()));
            }
        }
        for (from, to) in arrivals {
            self.parts.set_attacked(&to, true);
            self.parts.add_need_attention(&to, attention);
            outcomes.push(Outcome::with_target(&from, OutcomeKind::GrievanceDelivered, &to));
        }
    }

    /// Absent parts whose need-attention overflows push their way in.
    fn queue_overflowing_parts(&mut self, now: f64, outcomes: &mut Vec<Outcome>) {
        let threshold = self.tuning.attention_blend_threshold;
        let ready_at = now + self.tuning.pending_blend_delay;
        let overflowing: Vec<PartId> = self
            .parts
            .parts()
            .filter(|p| p.need_attention() >= threshold && !p.is_unburdened())
            .map(|p| p.id().clone())
            .filter(|id| !self.in_conference(id) && !self.is_pending(id))
            .collect();

        for id in overflowing {
            self.enqueue_pending(&id, BlendReason::Spontaneous, ready_at);
            outcomes.push(Outcome::new(&id, OutcomeKind::PendingBlendQueued));
        }
    }

    fn release_pending_blends(&mut self, now: f64, outcomes: &mut Vec<Outcome>) {
        let degree = self.tuning.spontaneous_degree;
        let (ready, waiting): (Vec<_>, Vec<_>) = self
            .pending_blends
            .drain(..)
            .partition(|p| p.ready_at <= now + 1e-9);
        self.pending_blends = waiting.into();

        for pending in ready {
            if !self.parts.contains(&pending.id) {
                continue;
            }
            self.blend(&pending.id, degree, pending.reason);
            outcomes.push(Outcome::new(&pending.id, OutcomeKind::SpontaneousBlend));
        }
    }

    fn decay_blends(&mut self, seconds: f64, outcomes: &mut Vec<Outcome>) {
        let decay = self.tuning.blend_decay_rate * seconds;
        if decay <= 0.0 {
            return;
        }
        let mut released = Vec::new();
        for (id, state) in self.blended.iter_mut() {
            state.degree -= decay;
            if state.degree <= 1e-9 {
                released.push(id.clone());
            }
        }
        for id in released {
            self.unblend(&id);
            outcomes.push(Outcome::new(&id, OutcomeKind::Unblended));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::part::Part;
    use approx::assert_relative_eq;
    use conclave_env::SeededRng;

    fn id(s: &str) -> PartId {
        PartId::new(s)
    }

    fn grievance_model() -> SimulatorModel {
        let mut model = SimulatorModel::new();
        model.register_part(Part::new("critic", "Critic").with_need_attention(0.1));
        model.register_part(Part::new("kid", "Kid"));
        model
            .add_grievance(&id("critic"), vec![id("kid")], vec!["You ruin everything".into()])
            .unwrap();
        model
    }

    #[test]
    fn test_grievance_attention_accrual_is_linear() {
        let mut model = grievance_model();
        let mut rng = SeededRng::new(1);

        model.advance_time(10.0, &mut rng);

        let rate = model.tuning().grievance_attention_rate;
        assert_relative_eq!(
            model.parts().need_attention(&id("critic")),
            0.1 + rate * 10.0,
            epsilon = 1e-12
        );
        assert_eq!(model.elapsed(), 10.0);
    }

    #[test]
    fn test_no_emission_when_absent() {
        let mut model = grievance_model();
        let mut rng = SeededRng::new(1);

        model.advance_time(25.0, &mut rng);
        assert!(model.messages().is_empty());
        assert_eq!(rng.draw_count(), 0);
    }

    #[test]
    fn test_emission_and_delivery() {
        let mut model = grievance_model();
        model.place_in_conference(&id("critic"));
        model.place_in_conference(&id("kid"));
        let mut rng = SeededRng::new(1);

        let outcomes = model.advance_time(10.0, &mut rng);
        assert_eq!(outcomes, vec![Outcome::with_target(&id("critic"), OutcomeKind::GrievanceSent, &id("kid"))]);
        assert_eq!(model.messages().len(), 1);
        assert!(!model.messages()[0].delivered);
        assert_eq!(rng.draw_log(), &["grievance_line:critic>kid".to_string()]);

        let outcomes = model.advance_time(1.0, &mut rng);
        assert!(outcomes.contains(&Outcome::with_target(
            &id("critic"),
            OutcomeKind::GrievanceDelivered,
            &id("kid")
        )));
        assert!(model.parts().is_attacked(&id("kid")));
        assert_eq!(model.delivered_count(Some(&id("critic")), None), 1);
    }

    #[test]
    fn test_one_long_jump_emits_every_interval() {
        let mut model = grievance_model();
        model.place_in_conference(&id("critic"));
        model.place_in_conference(&id("kid"));
        let mut rng = SeededRng::new(1);

        model.advance_time(35.0, &mut rng);
        let sent: Vec<f64> = model.messages().iter().map(|m| m.sent_at).collect();
        assert_eq!(sent, vec![10.0, 20.0, 30.0]);
        assert_eq!(model.delivered_count(None, None), 3);
    }

    #[test]
    fn test_split_jumps_match_single_jump_emissions() {
        let mut whole = grievance_model();
        let mut split = grievance_model();
        for model in [&mut whole, &mut split] {
            model.place_in_conference(&id("critic"));
            model.place_in_conference(&id("kid"));
        }
        let mut rng_a = SeededRng::new(3);
        let mut rng_b = SeededRng::new(3);

        whole.advance_time(24.0, &mut rng_a);
        split.advance_time(7.0, &mut rng_b);
        split.advance_time(17.0, &mut rng_b);

        let times = |m: &SimulatorModel| m.messages().iter().map(|x| x.sent_at).collect::<Vec<_>>();
        assert_eq!(times(&whole), times(&split));
    }

    #[test]
    fn test_huge_jump_emits_at_most_the_burst_limit() {
        let mut model = grievance_model();
        model.place_in_conference(&id("critic"));
        model.place_in_conference(&id("kid"));
        let mut rng = SeededRng::new(1);

        let outcomes = model.advance_time(1e7, &mut rng);
        let burst = model.tuning().grievance_burst_limit;
        let sent = outcomes
            .iter()
            .filter(|o| o.kind == OutcomeKind::GrievanceSent)
            .count() as u64;
        assert_eq!(sent, burst);
        assert_eq!(model.messages().len() as u64, burst);
        assert_eq!(rng.draw_count(), burst);

        // the latest intervals survive
        let times: Vec<f64> = model.messages().iter().map(|m| m.sent_at).collect();
        assert_eq!(times.last().copied(), Some(1e7));
        assert_eq!(times.first().copied(), Some(1e7 - 10.0 * (burst - 1) as f64));

        // the clock residue is unaffected
        let outcomes = model.advance_time(10.0, &mut rng);
        assert!(outcomes.contains(&Outcome::with_target(&id("critic"), OutcomeKind::GrievanceSent, &id("kid"))));
        assert_eq!(model.messages().last().map(|m| m.sent_at), Some(1e7 + 10.0));
    }

    #[test]
    fn test_overflowing_absent_part_blends_after_delay() {
        let mut model = SimulatorModel::new();
        model.register_part(Part::new("loud", "Loud").with_need_attention(2.0));
        let mut rng = SeededRng::new(1);

        let first = model.advance_time(1.0, &mut rng);
        assert_eq!(first, vec![Outcome::new(&id("loud"), OutcomeKind::PendingBlendQueued)]);
        assert!(model.is_pending(&id("loud")));

        let second = model.advance_time(2.0, &mut rng);
        assert!(second.contains(&Outcome::new(&id("loud"), OutcomeKind::SpontaneousBlend)));
        assert!(model.is_blended(&id("loud")));
    }

    #[test]
    fn test_blend_decays_to_unblend() {
        let mut model = SimulatorModel::new();
        model.register_part(Part::new("a", "A"));
        model.blend(&id("a"), 0.05, BlendReason::Invited);
        let mut rng = SeededRng::new(1);

        let outcomes = model.advance_time(10.0, &mut rng);
        assert_eq!(outcomes, vec![Outcome::new(&id("a"), OutcomeKind::Unblended)]);
        assert!(model.is_target(&id("a")));
    }

    #[test]
    fn test_ignores_bad_intervals() {
        let mut model = grievance_model();
        let mut rng = SeededRng::new(1);
        assert!(model.advance_time(-1.0, &mut rng).is_empty());
        assert!(model.advance_time(f64::NAN, &mut rng).is_empty());
        assert_eq!(model.elapsed(), 0.0);
    }
}
