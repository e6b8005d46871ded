//! Entity store: working state, relationship integrity and commit.
//!
//! # Responsibility
//! - Hold person/family records and enforce bidirectional membership.
//! - Stage mutations in a working snapshot until an explicit `commit`.
//! - Publish committed snapshots to readers through `CommittedView`.
//!
//! # Invariants
//! - Every failing operation leaves the working snapshot untouched.
//! - `person.family_id == Some(f)` iff `person.id ∈ family(f).members`.
//! - Ids are allocated from monotonic high-water marks and never reused,
//!   including ids handed out by mutations that were later rolled back.
//!   `rollback` and a failed `commit` persist the marks alone, so a reopened
//!   store continues past them.
//! - Commit failures are returned to the caller; pending changes are kept.

pub mod snapshot;
mod view;

pub use view::CommittedView;

use crate::config::StoreConfig;
use crate::db::{open_db, open_db_in_memory, DbError, StorageMode};
use crate::model::entity::{EntityKind, EntityRef, Record, RecordPatch};
use crate::model::family::{Family, FamilyId, FamilyPatch};
use crate::model::person::{Person, PersonId, PersonPatch};
use crate::repo::entity_repo::{EntityRepository, RepoError, SqliteEntityRepository};
use log::{error, info};
use rusqlite::Connection;
use snapshot::{ChangeSet, Snapshot};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by store, mutation and commit operations.
#[derive(Debug)]
pub enum StoreError {
    /// Referenced record does not exist.
    NotFound(EntityRef),
    /// Family deletion blocked because members remain.
    HasMembers {
        family_id: FamilyId,
        member_count: usize,
    },
    /// Person is not a member of the given family.
    NotAMember {
        family_id: FamilyId,
        person_id: PersonId,
    },
    /// Patch kind does not match the addressed record kind.
    KindMismatch {
        target: EntityKind,
        patch: EntityKind,
    },
    /// Durable storage failed to open, load or flush.
    Storage(RepoError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(target) => write!(f, "{} not found: {}", target.kind(), target.raw_id()),
            Self::HasMembers {
                family_id,
                member_count,
            } => write!(
                f,
                "family {family_id} still has {member_count} member(s); detach them or enable cascade delete"
            ),
            Self::NotAMember {
                family_id,
                person_id,
            } => write!(f, "person {person_id} is not a member of family {family_id}"),
            Self::KindMismatch { target, patch } => {
                write!(f, "cannot apply {patch} patch to {target} record")
            }
            Self::Storage(err) => write!(f, "storage error: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        Self::Storage(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Storage(RepoError::Db(value))
    }
}

/// How `delete_family` treats remaining members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    /// Fail with `HasMembers` while members remain.
    #[default]
    Restrict,
    /// Detach every member (clear `family_id`), then delete.
    Cascade,
}

impl DeletePolicy {
    pub fn from_cascade(cascade: bool) -> Self {
        if cascade {
            Self::Cascade
        } else {
            Self::Restrict
        }
    }
}

/// Row counts written by one commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub persons_written: usize,
    pub persons_deleted: usize,
    pub families_written: usize,
    pub families_deleted: usize,
}

impl CommitSummary {
    /// Whether the commit had nothing to flush.
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Person/family store backed by a single SQLite connection.
pub struct EntityStore {
    conn: Connection,
    mode: StorageMode,
    working: Snapshot,
    committed: Arc<Snapshot>,
    view: CommittedView,
}

impl EntityStore {
    /// Opens the configured storage and loads all persisted records.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        if config.in_memory {
            Self::from_connection(open_db_in_memory()?, StorageMode::Memory)
        } else {
            Self::from_connection(open_db(config.resolved_db_path())?, StorageMode::File)
        }
    }

    /// Opens a volatile store; shorthand used by tests and previews.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(open_db_in_memory()?, StorageMode::Memory)
    }

    /// Wraps an already-migrated connection.
    pub fn from_connection(mut conn: Connection, mode: StorageMode) -> StoreResult<Self> {
        let snapshot = SqliteEntityRepository::try_new(&mut conn)?.load_snapshot()?;
        info!(
            "event=store_open module=store status=ok mode={} persons={} families={}",
            mode.as_str(),
            snapshot.person_count(),
            snapshot.family_count()
        );

        let committed = Arc::new(snapshot.clone());
        Ok(Self {
            conn,
            mode,
            working: snapshot,
            view: CommittedView::new(Arc::clone(&committed)),
            committed,
        })
    }

    pub fn mode(&self) -> StorageMode {
        self.mode
    }

    /// Working state, including uncommitted mutations.
    pub fn working(&self) -> &Snapshot {
        &self.working
    }

    /// Handle readers use to observe committed state only.
    pub fn committed_view(&self) -> CommittedView {
        self.view.clone()
    }

    /// Whether records differ from the last committed state.
    pub fn has_changes(&self) -> bool {
        self.working.persons != self.committed.persons
            || self.working.families != self.committed.families
    }

    // ---- person -----------------------------------------------------------

    pub fn create_person(&mut self) -> PersonId {
        let id = PersonId(self.working.next_person_id);
        self.working.next_person_id += 1;
        self.working.persons.insert(id, Person::new(id));
        id
    }

    pub fn get_person(&self, id: PersonId) -> StoreResult<&Person> {
        self.working
            .persons
            .get(&id)
            .ok_or(StoreError::NotFound(EntityRef::Person(id)))
    }

    pub fn update_person(&mut self, id: PersonId, patch: &PersonPatch) -> StoreResult<()> {
        let person = self
            .working
            .persons
            .get_mut(&id)
            .ok_or(StoreError::NotFound(EntityRef::Person(id)))?;
        person.apply(patch);
        Ok(())
    }

    /// Removes the person and detaches it from its family.
    pub fn delete_person(&mut self, id: PersonId) -> StoreResult<()> {
        let person = self
            .working
            .persons
            .remove(&id)
            .ok_or(StoreError::NotFound(EntityRef::Person(id)))?;
        if let Some(family_id) = person.family_id {
            if let Some(family) = self.working.families.get_mut(&family_id) {
                family.members.remove(&id);
            }
        }
        Ok(())
    }

    // ---- family -----------------------------------------------------------

    pub fn create_family(&mut self) -> FamilyId {
        let id = FamilyId(self.working.next_family_id);
        self.working.next_family_id += 1;
        self.working.families.insert(id, Family::new(id));
        id
    }

    pub fn get_family(&self, id: FamilyId) -> StoreResult<&Family> {
        self.working
            .families
            .get(&id)
            .ok_or(StoreError::NotFound(EntityRef::Family(id)))
    }

    pub fn update_family(&mut self, id: FamilyId, patch: &FamilyPatch) -> StoreResult<()> {
        let family = self
            .working
            .families
            .get_mut(&id)
            .ok_or(StoreError::NotFound(EntityRef::Family(id)))?;
        family.apply(patch);
        Ok(())
    }

    /// Deletes a family according to `policy`.
    ///
    /// # Errors
    /// - `NotFound` when the family does not exist.
    /// - `HasMembers` under `Restrict` while members remain.
    pub fn delete_family(&mut self, id: FamilyId, policy: DeletePolicy) -> StoreResult<()> {
        let family = self.get_family(id)?;
        if policy == DeletePolicy::Restrict && !family.members.is_empty() {
            return Err(StoreError::HasMembers {
                family_id: id,
                member_count: family.member_count(),
            });
        }

        let Some(family) = self.working.families.remove(&id) else {
            return Err(StoreError::NotFound(EntityRef::Family(id)));
        };
        for member in &family.members {
            if let Some(person) = self.working.persons.get_mut(member) {
                person.family_id = None;
            }
        }
        Ok(())
    }

    /// Makes `person_id` a member of `family_id`, moving it out of any
    /// previous family. Idempotent.
    pub fn add_member(&mut self, family_id: FamilyId, person_id: PersonId) -> StoreResult<()> {
        self.get_family(family_id)?;
        let previous = self.get_person(person_id)?.family_id;

        if let Some(old_family_id) = previous.filter(|old| *old != family_id) {
            if let Some(old_family) = self.working.families.get_mut(&old_family_id) {
                old_family.members.remove(&person_id);
            }
        }
        if let Some(family) = self.working.families.get_mut(&family_id) {
            family.members.insert(person_id);
        }
        if let Some(person) = self.working.persons.get_mut(&person_id) {
            person.family_id = Some(family_id);
        }
        Ok(())
    }

    /// Detaches `person_id` from `family_id`.
    pub fn remove_member(&mut self, family_id: FamilyId, person_id: PersonId) -> StoreResult<()> {
        let is_member = self.get_family(family_id)?.has_member(person_id);
        self.get_person(person_id)?;
        if !is_member {
            return Err(StoreError::NotAMember {
                family_id,
                person_id,
            });
        }

        if let Some(family) = self.working.families.get_mut(&family_id) {
            family.members.remove(&person_id);
        }
        if let Some(person) = self.working.persons.get_mut(&person_id) {
            person.family_id = None;
        }
        Ok(())
    }

    // ---- kind-generic contract -------------------------------------------

    pub fn create(&mut self, kind: EntityKind) -> EntityRef {
        match kind {
            EntityKind::Person => EntityRef::Person(self.create_person()),
            EntityKind::Family => EntityRef::Family(self.create_family()),
        }
    }

    /// Returns an owned copy of the addressed record.
    pub fn get(&self, target: EntityRef) -> StoreResult<Record> {
        match target {
            EntityRef::Person(id) => self.get_person(id).cloned().map(Record::Person),
            EntityRef::Family(id) => self.get_family(id).cloned().map(Record::Family),
        }
    }

    pub fn update(&mut self, target: EntityRef, patch: &RecordPatch) -> StoreResult<()> {
        match (target, patch) {
            (EntityRef::Person(id), RecordPatch::Person(patch)) => self.update_person(id, patch),
            (EntityRef::Family(id), RecordPatch::Family(patch)) => self.update_family(id, patch),
            _ => Err(StoreError::KindMismatch {
                target: target.kind(),
                patch: patch.kind(),
            }),
        }
    }

    /// Deletes the addressed record. `policy` only applies to families.
    pub fn delete(&mut self, target: EntityRef, policy: DeletePolicy) -> StoreResult<()> {
        match target {
            EntityRef::Person(id) => self.delete_person(id),
            EntityRef::Family(id) => self.delete_family(id, policy),
        }
    }

    // ---- transactions -----------------------------------------------------

    /// Runs `f` all-or-nothing against the working snapshot.
    pub fn transact<T>(&mut self, f: impl FnOnce(&mut Self) -> StoreResult<T>) -> StoreResult<T> {
        let checkpoint = self.working.clone();
        match f(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.restore(checkpoint);
                Err(err)
            }
        }
    }

    /// Flushes pending changes to storage and publishes them to readers.
    ///
    /// # Errors
    /// - `Storage` when the write transaction fails. Pending changes stay in
    ///   the working snapshot so the caller can retry or `rollback`.
    pub fn commit(&mut self) -> StoreResult<CommitSummary> {
        let changes = self.committed.diff(&self.working);
        if changes.is_empty() {
            return Ok(CommitSummary::default());
        }

        let started_at = Instant::now();
        let result = SqliteEntityRepository::try_new(&mut self.conn)
            .and_then(|mut repo| repo.apply_changes(&changes));
        if let Err(err) = result {
            error!(
                "event=commit module=store status=error mode={} duration_ms={} error={}",
                self.mode.as_str(),
                started_at.elapsed().as_millis(),
                err
            );
            if let Err(mark_err) = self.persist_id_marks() {
                error!(
                    "event=commit module=store status=error step=id_marks mode={} error={}",
                    self.mode.as_str(),
                    mark_err
                );
            }
            return Err(StoreError::Storage(err));
        }

        let summary = CommitSummary {
            persons_written: changes.upsert_persons.len(),
            persons_deleted: changes.delete_persons.len(),
            families_written: changes.upsert_families.len(),
            families_deleted: changes.delete_families.len(),
        };
        let committed = Arc::new(self.working.clone());
        self.committed = Arc::clone(&committed);
        self.view.publish(committed);

        info!(
            "event=commit module=store status=ok mode={} duration_ms={} persons_written={} persons_deleted={} families_written={} families_deleted={}",
            self.mode.as_str(),
            started_at.elapsed().as_millis(),
            summary.persons_written,
            summary.persons_deleted,
            summary.families_written,
            summary.families_deleted
        );
        Ok(summary)
    }

    /// Discards pending changes, resetting working state to committed state.
    ///
    /// Ids allocated by the discarded changes stay retired, also across a
    /// reopen.
    ///
    /// # Errors
    /// - `Storage` when the id high-water marks cannot be written. Pending
    ///   record changes are discarded either way.
    pub fn rollback(&mut self) -> StoreResult<()> {
        let committed = (*self.committed).clone();
        self.restore(committed);
        match self.persist_id_marks() {
            Ok(()) => {
                info!("event=rollback module=store status=ok");
                Ok(())
            }
            Err(err) => {
                error!("event=rollback module=store status=error error={err}");
                Err(err)
            }
        }
    }

    /// Writes id high-water marks that are ahead of committed state, without
    /// touching records.
    fn persist_id_marks(&mut self) -> StoreResult<()> {
        let changes = ChangeSet {
            next_person_id: (self.working.next_person_id > self.committed.next_person_id)
                .then_some(self.working.next_person_id),
            next_family_id: (self.working.next_family_id > self.committed.next_family_id)
                .then_some(self.working.next_family_id),
            ..ChangeSet::default()
        };
        if changes.is_empty() {
            return Ok(());
        }

        SqliteEntityRepository::try_new(&mut self.conn)
            .and_then(|mut repo| repo.apply_changes(&changes))?;

        let mut committed = (*self.committed).clone();
        committed.next_person_id = self.working.next_person_id.max(committed.next_person_id);
        committed.next_family_id = self.working.next_family_id.max(committed.next_family_id);
        let committed = Arc::new(committed);
        self.committed = Arc::clone(&committed);
        self.view.publish(committed);
        Ok(())
    }

    pub(crate) fn restore(&mut self, mut snapshot: Snapshot) {
        // Keep high-water marks so ids handed out before the restore stay
        // retired.
        snapshot.next_person_id = snapshot.next_person_id.max(self.working.next_person_id);
        snapshot.next_family_id = snapshot.next_family_id.max(self.working.next_family_id);
        self.working = snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::{DeletePolicy, EntityStore, StoreError};
    use crate::model::entity::EntityRef;

    #[test]
    fn transact_restores_records_but_not_id_counters() {
        let mut store = EntityStore::open_in_memory().unwrap();
        let err = store
            .transact(|store| {
                let family = store.create_family();
                let person = store.create_person();
                store.add_member(family, person)?;
                store.delete_family(family, DeletePolicy::Restrict)
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::HasMembers { member_count: 1, .. }));

        assert_eq!(store.working().person_count(), 0);
        assert_eq!(store.working().family_count(), 0);
        assert!(!store.has_changes());

        let next = store.create_person();
        assert_eq!(next.get(), 2);
    }

    #[test]
    fn commit_without_changes_is_noop() {
        let mut store = EntityStore::open_in_memory().unwrap();
        assert!(store.commit().unwrap().is_noop());

        store.create_person();
        let summary = store.commit().unwrap();
        assert!(!summary.is_noop());
        assert_eq!(summary.persons_written, 1);
    }

    #[test]
    fn failed_add_member_applies_nothing() {
        let mut store = EntityStore::open_in_memory().unwrap();
        let person = store.create_person();
        let missing_family = crate::model::family::FamilyId(99);

        let err = store.add_member(missing_family, person).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(EntityRef::Family(id)) if id == missing_family));
        assert_eq!(store.get_person(person).unwrap().family_id, None);
    }
}
