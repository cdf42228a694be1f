//! Record store adapters.
//!
//! # Responsibility
//! - Define the `PersonRepository` contract the core reads snapshots from and
//!   writes proposed updates to.
//! - Keep SQLite details behind that contract.
//!
//! # Invariants
//! - Adapters return semantic errors (`NotFound`, `InvalidData`) alongside
//!   transport errors; the core passes them through untouched.

pub mod person_repo;

pub use person_repo::{PersonRepository, RepoError, RepoResult, SqlitePersonRepository};
