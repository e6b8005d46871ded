//! Domain model for person/family records.
//!
//! # Responsibility
//! - Define canonical record shapes used by store, query and mutation layers.
//! - Provide typed ids so person and family handles cannot be mixed up.
//!
//! # Invariants
//! - Every record is identified by a stable, never-reused integer id.
//! - `Person::family_id` and `Family::members` mirror each other.
//! - Deletion is physical; there is no tombstone state.

pub mod entity;
pub mod family;
pub mod person;
