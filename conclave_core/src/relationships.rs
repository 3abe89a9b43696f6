//! Protection, grievance and proxy relationships between parts.
//!
//! Each relation kind is a flat edge list indexed by part id. Removing a
//! part is a filter pass over all three lists, so no edge can outlive a
//! part it references.

use crate::error::ContentError;
use crate::part::PartId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// `protector` shields `protectee`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProtectionEdge {
    pub protector: PartId,
    pub protectee: PartId,
}

/// `source` resents every id in `targets` and voices it through `dialogues`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrievanceEdge {
    pub source: PartId,
    pub targets: BTreeSet<PartId>,
    pub dialogues: Vec<String>,
}

/// `proxy` fronts for `source`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProxyEdge {
    pub source: PartId,
    pub proxy: PartId,
}

/// Owner of all three relationship arenas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudRelationshipManager {
    protections: Vec<ProtectionEdge>,
    grievances: Vec<GrievanceEdge>,
    proxies: Vec<ProxyEdge>,
}

impl CloudRelationshipManager {
    pub fn new() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------------
    // Protection
    // ---------------------------------------------------------------------

    /// Adds a protection edge. Duplicates and self-loops are ignored.
    pub fn add_protection(&mut self, protector: &PartId, protectee: &PartId) {
        if protector == protectee || self.is_protecting(protector, protectee) {
            return;
        }
        self.protections.push(ProtectionEdge {
            protector: protector.clone(),
            protectee: protectee.clone(),
        });
    }

    pub fn remove_protection(&mut self, protector: &PartId, protectee: &PartId) {
        self.protections
            .retain(|e| !(&e.protector == protector && &e.protectee == protectee));
    }

    pub fn is_protecting(&self, protector: &PartId, protectee: &PartId) -> bool {
        self.protections
            .iter()
            .any(|e| &e.protector == protector && &e.protectee == protectee)
    }

    /// Parts shielded by `protector`, ascending.
    pub fn protecting(&self, protector: &PartId) -> BTreeSet<PartId> {
        self.protections
            .iter()
            .filter(|e| &e.protector == protector)
            .map(|e| e.protectee.clone())
            .collect()
    }

    /// Parts shielding `protectee`, ascending.
    pub fn protected_by(&self, protectee: &PartId) -> BTreeSet<PartId> {
        self.protections
            .iter()
            .filter(|e| &e.protectee == protectee)
            .map(|e| e.protector.clone())
            .collect()
    }

    pub fn is_protector(&self, id: &PartId) -> bool {
        self.protections.iter().any(|e| &e.protector == id)
    }

    pub fn is_protectee(&self, id: &PartId) -> bool {
        self.protections.iter().any(|e| &e.protectee == id)
    }

    /// Every part that is protected by someone, ascending.
    pub fn all_protectees(&self) -> BTreeSet<PartId> {
        self.protections.iter().map(|e| e.protectee.clone()).collect()
    }

    pub fn protections(&self) -> &[ProtectionEdge] {
        &self.protections
    }

    // ---------------------------------------------------------------------
    // Grievance
    // ---------------------------------------------------------------------

    /// Adds a grievance edge.
    ///
    /// A grievance must have a voice and somebody to aim at: an empty
    /// dialogue list or an empty target set is a content error.
    pub fn add_grievance<I>(
        &mut self,
        source: &PartId,
        targets: I,
        dialogues: Vec<String>,
    ) -> Result<(), ContentError>
    where
        I: IntoIterator<Item = PartId>,
    {
        if dialogues.is_empty() {
            return Err(ContentError::EmptyGrievanceDialogue { source_id: source.clone() });
        }
        let targets: BTreeSet<PartId> = targets.into_iter().filter(|t| t != source).collect();
        if targets.is_empty() {
            return Err(ContentError::EmptyGrievanceTargets { source_id: source.clone() });
        }
        self.grievances.push(GrievanceEdge {
            source: source.clone(),
            targets,
            dialogues,
        });
        Ok(())
    }

    /// Prunes `target` from every grievance held by `source`.
    pub fn remove_grievance_target(&mut self, source: &PartId, target: &PartId) {
        for edge in self.grievances.iter_mut().filter(|e| &e.source == source) {
            edge.targets.remove(target);
        }
        self.grievances.retain(|e| !e.targets.is_empty());
    }

    pub fn has_grievance(&self, source: &PartId, target: &PartId) -> bool {
        self.grievances
            .iter()
            .any(|e| &e.source == source && e.targets.contains(target))
    }

    /// Every part `source` holds a grievance against, ascending.
    pub fn grievance_targets(&self, source: &PartId) -> BTreeSet<PartId> {
        self.grievances
            .iter()
            .filter(|e| &e.source == source)
            .flat_map(|e| e.targets.iter().cloned())
            .collect()
    }

    /// Dialogue lines `source` uses against `target`, in authoring order.
    pub fn grievance_dialogues(&self, source: &PartId, target: &PartId) -> Vec<String> {
        self.grievances
            .iter()
            .filter(|e| &e.source == source && e.targets.contains(target))
            .flat_map(|e| e.dialogues.iter().cloned())
            .collect()
    }

    /// Parts holding at least one grievance, ascending.
    pub fn grievance_sources(&self) -> BTreeSet<PartId> {
        self.grievances.iter().map(|e| e.source.clone()).collect()
    }

    pub fn grievances(&self) -> &[GrievanceEdge] {
        &self.grievances
    }

    // ---------------------------------------------------------------------
    // Proxy
    // ---------------------------------------------------------------------

    /// Adds a proxy edge. Duplicates and self-loops are ignored.
    pub fn add_proxy(&mut self, source: &PartId, proxy: &PartId) {
        if source == proxy || self.is_proxy_for(proxy, source) {
            return;
        }
        self.proxies.push(ProxyEdge {
            source: source.clone(),
            proxy: proxy.clone(),
        });
    }

    pub fn remove_proxy(&mut self, source: &PartId, proxy: &PartId) {
        self.proxies
            .retain(|e| !(&e.source == source && &e.proxy == proxy));
    }

    /// True if `proxy` fronts for `source`.
    pub fn is_proxy_for(&self, proxy: &PartId, source: &PartId) -> bool {
        self.proxies
            .iter()
            .any(|e| &e.source == source && &e.proxy == proxy)
    }

    /// Stand-ins fronting for `source`, ascending.
    pub fn proxies_of(&self, source: &PartId) -> Vec<PartId> {
        let set: BTreeSet<PartId> = self
            .proxies
            .iter()
            .filter(|e| &e.source == source)
            .map(|e| e.proxy.clone())
            .collect();
        set.into_iter().collect()
    }

    pub fn proxies(&self) -> &[ProxyEdge] {
        &self.proxies
    }

    // ---------------------------------------------------------------------
    // Removal
    // ---------------------------------------------------------------------

    /// Drops every edge touching `id`. Grievance target sets are pruned
    /// and an edge survives only if a target remains.
    pub fn remove_cloud(&mut self, id: &PartId) {
        self.protections
            .retain(|e| &e.protector != id && &e.protectee != id);
        self.proxies.retain(|e| &e.source != id && &e.proxy != id);
        self.grievances.retain(|e| &e.source != id);
        for edge in self.grievances.iter_mut() {
            edge.targets.remove(id);
        }
        self.grievances.retain(|e| !e.targets.is_empty());
    }

    /// True if any edge mentions `id`.
    pub fn references(&self, id: &PartId) -> bool {
        self.protections
            .iter()
            .any(|e| &e.protector == id || &e.protectee == id)
            || self.proxies.iter().any(|e| &e.source == id || &e.proxy == id)
            || self
                .grievances
                .iter()
                .any(|e| &e.source == id || e.targets.contains(id))
    }
}
