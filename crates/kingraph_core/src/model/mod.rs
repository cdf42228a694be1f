//! Record model shared by the graph core and its adapters.
//!
//! # Responsibility
//! - Define person records, precision-tagged dates and proposed updates.
//! - Keep one canonical shape for every stage of derivation.
//!
//! # Invariants
//! - Every person is identified by a stable `PersonId`.
//! - The core never mutates stored records in place; it emits `RecordUpdate`s.

pub mod date;
pub mod person;
pub mod update;
