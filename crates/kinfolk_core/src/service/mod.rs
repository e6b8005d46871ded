//! Write-side use-case services.
//!
//! # Responsibility
//! - Turn named mutations into all-or-nothing store operations.
//! - Resolve configurable defaults (age, names, member counts).
//! - Offer command objects that mutate and commit in one step.

pub mod command;
pub mod mutation_service;
