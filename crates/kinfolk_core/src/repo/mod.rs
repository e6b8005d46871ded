//! Repository layer: persistence of entity snapshots.
//!
//! # Responsibility
//! - Define the storage contract used by the entity store.
//! - Isolate SQLite query details from store/service orchestration.
//!
//! # Invariants
//! - A change set is applied in one transaction or not at all.
//! - Repository APIs return semantic errors (`InvalidData`, schema checks) in
//!   addition to DB transport errors.

pub mod entity_repo;
