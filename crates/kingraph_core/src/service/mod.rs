//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate record store calls and the pure derivation stages into
//!   use-case level APIs.
//! - Keep CLI callers decoupled from storage details.

pub mod family_service;

pub use family_service::{
    ChangeOutcome, FamilyService, FamilyServiceError, FamilyServiceResult, ImportReport, TreeLayout,
};
