//! Part registry and bounded mutation.

use crate::part::{BiographyField, DialogueSituation, Part, PartId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Owns every registered part.
///
/// All mutators are total: an unknown id is a no-op, and every trust write
/// is clamped to `[0, cap]` where `cap` depends on the attacked flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartStateManager {
    parts: BTreeMap<PartId, Part>,
}

impl PartStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a part, replacing any previous part with the same id.
    pub fn register_part(&mut self, mut part: Part) {
        part.normalize();
        self.parts.insert(part.id().clone(), part);
    }

    /// Removes a part. Relationship pruning is the caller's concern
    /// (see [`crate::SimulatorModel::remove_cloud`]).
    pub fn remove_part(&mut self, id: &PartId) -> Option<Part> {
        self.parts.remove(id)
    }

    pub fn part(&self, id: &PartId) -> Option<&Part> {
        self.parts.get(id)
    }

    pub fn contains(&self, id: &PartId) -> bool {
        self.parts.contains_key(id)
    }

    /// Ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = &PartId> {
        self.parts.keys()
    }

    pub fn parts(&self) -> impl Iterator<Item = &Part> {
        self.parts.values()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn trust(&self, id: &PartId) -> f64 {
        self.parts.get(id).map(Part::trust).unwrap_or(0.0)
    }

    pub fn trust_cap(&self, id: &PartId) -> f64 {
        self.parts.get(id).map(Part::trust_cap).unwrap_or(0.0)
    }

    pub fn set_trust(&mut self, id: &PartId, trust: f64) {
        if let Some(part) = self.parts.get_mut(id) {
            part.set_trust_clamped(trust);
        }
    }

    /// Multiplies trust by `factor`.
    pub fn adjust_trust(&mut self, id: &PartId, factor: f64) {
        if let Some(part) = self.parts.get_mut(id) {
            part.set_trust_clamped(part.trust() * factor);
        }
    }

    /// Adds `delta` to trust and returns the change actually applied.
    pub fn add_trust(&mut self, id: &PartId, delta: f64) -> f64 {
        match self.parts.get_mut(id) {
            Some(part) => {
                let before = part.trust();
                part.set_trust_clamped(before + delta);
                part.trust() - before
            }
            None => 0.0,
        }
    }

    pub fn is_attacked(&self, id: &PartId) -> bool {
        self.parts.get(id).map(Part::attacked).unwrap_or(false)
    }

    /// Marking attacked clamps trust to the lowered cap; clearing restores
    /// the cap but not the trust that was clipped.
    pub fn set_attacked(&mut self, id: &PartId, attacked: bool) {
        if let Some(part) = self.parts.get_mut(id) {
            part.set_attacked(attacked);
        }
    }

    pub fn need_attention(&self, id: &PartId) -> f64 {
        self.parts.get(id).map(Part::need_attention).unwrap_or(0.0)
    }

    pub fn set_need_attention(&mut self, id: &PartId, need: f64) {
        if let Some(part) = self.parts.get_mut(id) {
            part.set_need_attention(need);
        }
    }

    pub fn add_need_attention(&mut self, id: &PartId, delta: f64) {
        if let Some(part) = self.parts.get_mut(id) {
            part.set_need_attention(part.need_attention() + delta);
        }
    }

    pub fn set_was_proxy(&mut self, id: &PartId, was_proxy: bool) {
        if let Some(part) = self.parts.get_mut(id) {
            part.set_was_proxy(was_proxy);
        }
    }

    /// Reveals a biography field. Returns true if the flag changed;
    /// revealing twice is a no-op.
    pub fn reveal(&mut self, id: &PartId, field: BiographyField) -> bool {
        self.parts
            .get_mut(id)
            .map(|part| part.biography_mut().reveal(field))
            .unwrap_or(false)
    }

    pub fn is_revealed(&self, id: &PartId, field: BiographyField) -> bool {
        self.parts
            .get(id)
            .map(|part| part.biography().is_revealed(field))
            .unwrap_or(false)
    }

    pub fn field_value(&self, id: &PartId, field: BiographyField) -> Option<&str> {
        self.parts.get(id).and_then(|part| part.biography().value(field))
    }

    pub fn dialogue(&self, id: &PartId, situation: DialogueSituation) -> &[String] {
        self.parts
            .get(id)
            .map(|part| part.dialogues().lines(situation))
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::part::{ATTACKED_TRUST_CAP, TRUST_CAP};
    use approx::assert_relative_eq;

    fn manager_with(id: &str, trust: f64) -> (PartStateManager, PartId) {
        let mut manager = PartStateManager::new();
        manager.register_part(Part::new(id, id).with_trust(trust));
        (manager, PartId::new(id))
    }

    #[test]
    fn test_register_clamps_authored_trust() {
        let (manager, id) = manager_with("a", 1.7);
        assert_eq!(manager.trust(&id), TRUST_CAP);

        let (manager, id) = manager_with("b", -0.2);
        assert_eq!(manager.trust(&id), 0.0);
    }

    #[test]
    fn test_add_trust_reports_applied_delta() {
        let (mut manager, id) = manager_with("a", 0.9);
        let applied = manager.add_trust(&id, 0.5);
        assert_relative_eq!(applied, 0.1, epsilon = 1e-12);
        assert_eq!(manager.trust(&id), TRUST_CAP);
    }

    #[test]
    fn test_adjust_trust_multiplies() {
        let (mut manager, id) = manager_with("a", 0.4);
        manager.adjust_trust(&id, 0.5);
        assert_relative_eq!(manager.trust(&id), 0.2, epsilon = 1e-12);
        manager.adjust_trust(&id, 10.0);
        assert_eq!(manager.trust(&id), TRUST_CAP);
    }

    #[test]
    fn test_attacked_cap_applies_to_every_setter() {
        let (mut manager, id) = manager_with("a", 0.5);
        manager.set_attacked(&id, true);

        manager.set_trust(&id, 0.95);
        assert_eq!(manager.trust(&id), ATTACKED_TRUST_CAP);
        manager.add_trust(&id, 0.3);
        assert_eq!(manager.trust(&id), ATTACKED_TRUST_CAP);

        manager.set_attacked(&id, false);
        manager.add_trust(&id, 0.3);
        assert_eq!(manager.trust(&id), TRUST_CAP);
    }

    #[test]
    fn test_need_attention_never_negative() {
        let (mut manager, id) = manager_with("a", 0.5);
        manager.add_need_attention(&id, -3.0);
        assert_eq!(manager.need_attention(&id), 0.0);
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let mut manager = PartStateManager::new();
        let ghost = PartId::new("ghost");
        manager.set_trust(&ghost, 1.0);
        assert_eq!(manager.add_trust(&ghost, 1.0), 0.0);
        assert!(!manager.reveal(&ghost, BiographyField::Age));
        assert!(manager.dialogue(&ghost, DialogueSituation::Blended).is_empty());
    }

    #[test]
    fn test_reveal_once() {
        let (mut manager, id) = manager_with("a", 0.5);
        assert!(manager.reveal(&id, BiographyField::Identity));
        assert!(!manager.reveal(&id, BiographyField::Identity));
        assert!(manager.is_revealed(&id, BiographyField::Identity));
    }
}
