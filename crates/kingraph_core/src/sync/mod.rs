//! Bidirectional relationship synchronization.
//!
//! # Responsibility
//! - Propose the reciprocal record edits a relationship change requires.
//! - Allow proposals to be switched off during bulk loads.
//!
//! # Invariants
//! - Proposals are pure functions of the graph snapshot and the change.
//! - While suspended, proposals are dropped, not queued.

mod reciprocal;

pub use reciprocal::{propose_reciprocal, reconcile, Proposal, RelationshipChange};

use crate::graph::FamilyGraph;
use log::{debug, info};

/// Suspendable front for `propose_reciprocal`.
#[derive(Debug, Default)]
pub struct Synchronizer {
    suspended: bool,
    dropped: usize,
}

impl Synchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops proposing until `resume` is called.
    pub fn suspend(&mut self) {
        if !self.suspended {
            info!("event=sync_suspend module=sync status=ok");
        }
        self.suspended = true;
    }

    /// Re-enables proposals and returns how many were dropped meanwhile.
    pub fn resume(&mut self) -> usize {
        let dropped = std::mem::take(&mut self.dropped);
        if self.suspended {
            info!("event=sync_resume module=sync status=ok dropped={dropped}");
        }
        self.suspended = false;
        dropped
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn propose(&mut self, graph: &FamilyGraph, change: &RelationshipChange) -> Proposal {
        if self.suspended {
            self.dropped += 1;
            debug!("event=propose_reciprocal module=sync status=dropped reason=suspended");
            return Proposal::default();
        }
        propose_reciprocal(graph, change)
    }
}

#[cfg(test)]
mod tests {
    use super::{RelationshipChange, Synchronizer};
    use crate::graph::build;
    use crate::model::person::PersonRecord;
    use crate::model::update::ParentRole;

    #[test]
    fn suspended_synchronizer_drops_proposals() {
        let graph = build(vec![PersonRecord::new("c"), PersonRecord::new("m")]);
        let change = RelationshipChange::SetParent {
            child: "c".into(),
            parent: "m".into(),
            role: ParentRole::Mother,
        };
        let mut sync = Synchronizer::new();
        sync.suspend();
        assert!(sync.propose(&graph, &change).is_empty());
        assert!(sync.propose(&graph, &change).is_empty());
        assert_eq!(sync.resume(), 2);
        assert!(!sync.is_suspended());
        assert_eq!(sync.propose(&graph, &change).updates.len(), 2);
    }
}
