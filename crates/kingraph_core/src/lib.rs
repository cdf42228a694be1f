//! Core domain logic for kingraph.
//!
//! Builds a relationship graph from person records, finds family components,
//! derives bounded trees, keeps reciprocal links in step and lays trees out.
//! Every derivation stage is a pure, synchronous function; storage sits
//! behind `repo::PersonRepository`.

pub mod db;
pub mod finding;
pub mod graph;
pub mod layout;
pub mod logging;
pub mod model;
pub mod privacy;
pub mod repo;
pub mod service;
pub mod sync;
pub mod tree;

pub use finding::{Finding, RelationField};
pub use graph::cache::GraphCache;
pub use graph::components::{component_of, components, FamilyComponent};
pub use graph::{build, Edge, FamilyGraph, GraphNode, ParentKind};
pub use layout::{
    layout, Anchor, EdgeRoute, Layout, LayoutDirection, LayoutParams, LayoutStrategy, NodePlacement,
    Rect,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::date::{DatePrecision, PrecisionDate};
pub use model::person::{
    MarriageMetadata, PersonId, PersonRecord, Sex, SpouseRelation, SpouseStatus,
};
pub use model::update::{ParentRole, RecordUpdate};
pub use privacy::{anonymize, AnonymizeOptions};
pub use repo::{PersonRepository, RepoError, RepoResult, SqlitePersonRepository};
pub use service::{FamilyService, FamilyServiceError};
pub use sync::{propose_reciprocal, reconcile, Proposal, RelationshipChange, Synchronizer};
pub use tree::{
    derive, derive_with_cancel, CancelToken, Tree, TreeDirection, TreeError, TreeOptions,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
