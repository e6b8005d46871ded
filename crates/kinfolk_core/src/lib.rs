//! Core data-access layer for Kinfolk person/family records.
//! This crate is the single source of truth for relationship invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod service;
pub mod store;

pub use config::{AgePolicy, ConfigError, MemberCountRange, StoreConfig};
pub use logging::{init_logging, logging_status, LogLevel, LoggingError};
pub use model::entity::{EntityKind, EntityRef, Record, RecordPatch};
pub use model::family::{Family, FamilyId, FamilyPatch};
pub use model::person::{Person, PersonId, PersonPatch};
pub use query::list::{ListQuery, QueryError, QueryResult, QueryService, SortKey};
pub use repo::entity_repo::{EntityRepository, RepoError, RepoResult, SqliteEntityRepository};
pub use service::command::{Command, CommandOutcome, Effect};
pub use service::mutation_service::{MutationPolicy, MutationService, NewPerson};
pub use store::snapshot::{ChangeSet, Snapshot};
pub use store::{
    CommitSummary, CommittedView, DeletePolicy, EntityStore, StoreError, StoreResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
