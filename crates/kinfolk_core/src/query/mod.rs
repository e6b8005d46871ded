//! Read-side projections over committed records.
//!
//! # Responsibility
//! - Provide filtered, ordered snapshot lists for presentation callers.
//!
//! # Invariants
//! - Queries only observe committed state.
//! - Returned sequences are owned copies, never live views.

pub mod list;
