//! Family use-case service.
//!
//! # Responsibility
//! - Wire the record store to graph build, component detection, tree
//!   derivation and layout.
//! - Turn relationship changes into persisted reciprocal updates.
//!
//! # Invariants
//! - The cached graph is dropped whenever the store reports changed ids.
//! - Store errors are returned unchanged inside `FamilyServiceError::Repo`.
//! - Bulk imports run with synchronization suspended and reconcile once.

use crate::finding::Finding;
use crate::graph::cache::GraphCache;
use crate::graph::components::{components, FamilyComponent};
use crate::graph::FamilyGraph;
use crate::layout::{layout, Layout, LayoutParams};
use crate::model::person::{PersonId, PersonRecord};
use crate::repo::person_repo::{PersonRepository, RepoError};
use crate::sync::{reconcile, Proposal, RelationshipChange, Synchronizer};
use crate::tree::{derive_with_cancel, CancelToken, Tree, TreeError, TreeOptions};
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum FamilyServiceError {
    /// Record store failure, as reported by the store.
    Repo(RepoError),
    /// Tree derivation failure (missing root, filtered root, cancelled).
    Tree(TreeError),
}

impl Display for FamilyServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Tree(err) => write!(f, "{err}"),
        }
    }
}

impl Error for FamilyServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Tree(err) => Some(err),
        }
    }
}

impl From<RepoError> for FamilyServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<TreeError> for FamilyServiceError {
    fn from(value: TreeError) -> Self {
        Self::Tree(value)
    }
}

pub type FamilyServiceResult<T> = Result<T, FamilyServiceError>;

/// What `apply_change` proposed and which stored records it changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeOutcome {
    pub proposal: Proposal,
    pub changed: BTreeSet<PersonId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub written: usize,
    /// Proposals dropped while synchronization was suspended.
    pub dropped_proposals: usize,
    /// Ids touched by the post-import reconciliation pass.
    pub reconciled: BTreeSet<PersonId>,
    /// Graph and reconciliation findings after the import.
    pub findings: Vec<Finding>,
}

/// A derived tree with its computed layout.
#[derive(Debug, Clone, Serialize)]
pub struct TreeLayout {
    pub tree: Tree,
    pub layout: Layout,
}

/// Family service facade over one record store.
pub struct FamilyService<R: PersonRepository> {
    repo: R,
    cache: GraphCache,
    sync: Synchronizer,
}

impl<R: PersonRepository> FamilyService<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            cache: GraphCache::new(),
            sync: Synchronizer::new(),
        }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Current graph, rebuilt from a full snapshot when the cache is cold.
    pub fn graph(&mut self) -> FamilyServiceResult<&FamilyGraph> {
        let repo = &self.repo;
        Ok(self.cache.get_or_try_build(|| repo.read_all())?)
    }

    /// Snapshot counter of the cached graph.
    pub fn graph_generation(&self) -> u64 {
        self.cache.generation()
    }

    /// Change notification from outside writers.
    pub fn on_changed(&mut self, ids: &BTreeSet<PersonId>) {
        self.cache.on_changed(ids);
    }

    pub fn components(&mut self) -> FamilyServiceResult<Vec<FamilyComponent>> {
        Ok(components(self.graph()?))
    }

    pub fn derive_tree(&mut self, root: &PersonId, options: &TreeOptions) -> FamilyServiceResult<Tree> {
        self.derive_tree_with_cancel(root, options, &CancelToken::new())
    }

    pub fn derive_tree_with_cancel(
        &mut self,
        root: &PersonId,
        options: &TreeOptions,
        cancel: &CancelToken,
    ) -> FamilyServiceResult<Tree> {
        let graph = self.graph()?;
        Ok(derive_with_cancel(graph, root, options, cancel)?)
    }

    /// Derives the tree for `root` and lays it out.
    pub fn layout_tree(
        &mut self,
        root: &PersonId,
        options: &TreeOptions,
        params: &LayoutParams,
    ) -> FamilyServiceResult<TreeLayout> {
        let tree = self.derive_tree(root, options)?;
        let layout = layout(&tree, params);
        Ok(TreeLayout { tree, layout })
    }

    /// Proposes the reciprocal edits for `change`, persists them, and drops
    /// the cached graph for the touched ids.
    ///
    /// While synchronization is suspended the change is dropped and nothing
    /// is written.
    pub fn apply_change(&mut self, change: &RelationshipChange) -> FamilyServiceResult<ChangeOutcome> {
        let repo = &self.repo;
        let graph = self.cache.get_or_try_build(|| repo.read_all())?;
        let proposal = self.sync.propose(graph, change);
        if proposal.is_empty() {
            return Ok(ChangeOutcome {
                proposal,
                changed: BTreeSet::new(),
            });
        }

        let changed = match self.repo.apply_updates(&proposal.updates) {
            Ok(changed) => changed,
            Err(err) => {
                warn!(
                    "event=apply_change module=service status=error updates={} error={}",
                    proposal.updates.len(),
                    err
                );
                return Err(err.into());
            }
        };
        self.cache.on_changed(&changed);

        info!(
            "event=apply_change module=service status=ok updates={} changed={} findings={}",
            proposal.updates.len(),
            changed.len(),
            proposal.findings.len()
        );
        Ok(ChangeOutcome { proposal, changed })
    }

    pub fn suspend_sync(&mut self) {
        self.sync.suspend();
    }

    /// Returns how many proposals were dropped while suspended.
    pub fn resume_sync(&mut self) -> usize {
        self.sync.resume()
    }

    pub fn is_sync_suspended(&self) -> bool {
        self.sync.is_suspended()
    }

    /// Writes `records`, rebuilds once, and persists one reconciliation pass.
    pub fn bulk_import(&mut self, records: &[PersonRecord]) -> FamilyServiceResult<ImportReport> {
        let was_suspended = self.sync.is_suspended();
        self.sync.suspend();
        let written = self.repo.upsert_all(records);
        let dropped_proposals = if was_suspended { 0 } else { self.sync.resume() };
        let written = written?;

        self.cache.invalidate();
        let repo = &self.repo;
        let graph = self.cache.get_or_try_build(|| repo.read_all())?;
        let proposal = reconcile(graph);
        let mut findings = graph.findings().to_vec();
        findings.extend(proposal.findings.iter().cloned());

        let reconciled = if proposal.is_empty() {
            BTreeSet::new()
        } else {
            self.repo.apply_updates(&proposal.updates)?
        };
        self.cache.on_changed(&reconciled);

        info!(
            "event=bulk_import module=service status=ok written={} reconciled={} findings={}",
            written,
            reconciled.len(),
            findings.len()
        );
        Ok(ImportReport {
            written,
            dropped_proposals,
            reconciled,
            findings,
        })
    }
}
