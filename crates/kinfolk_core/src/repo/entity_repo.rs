//! Entity repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Load the full person/family record set from storage.
//! - Apply a computed change set atomically.
//!
//! # Invariants
//! - Read paths reject inconsistent persisted state instead of masking it.
//! - Writes run in a single immediate transaction, ordered so foreign keys
//!   hold after every statement: family upserts, person upserts, person
//!   deletes, family deletes, sequence updates.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::entity::EntityKind;
use crate::model::family::{Family, FamilyId};
use crate::model::person::{Person, PersonId};
use crate::store::snapshot::{ChangeSet, Snapshot};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

const REQUIRED_TABLES: [&str; 4] = ["persons", "person_tags", "families", "id_sequences"];

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for snapshot load and change set persistence.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Persisted data violates record invariants.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "entity repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "entity repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted entity data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::UninitializedConnection { .. } => None,
            Self::MissingRequiredTable(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Storage contract used by the entity store.
pub trait EntityRepository {
    /// Loads every persisted record and the id high-water marks.
    fn load_snapshot(&self) -> RepoResult<Snapshot>;
    /// Persists the change set atomically.
    fn apply_changes(&mut self, changes: &ChangeSet) -> RepoResult<()>;
}

/// SQLite-backed entity repository.
pub struct SqliteEntityRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteEntityRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when `user_version` is not the latest.
    /// - `MissingRequiredTable` when the schema is incomplete.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl EntityRepository for SqliteEntityRepository<'_> {
    fn load_snapshot(&self) -> RepoResult<Snapshot> {
        let mut snapshot = Snapshot::default();

        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM families ORDER BY id ASC;")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut family = Family::new(FamilyId(row.get("id")?));
            family.name = row.get("name")?;
            snapshot.families.insert(family.id, family);
        }

        let mut stmt = self.conn.prepare(
            "SELECT id, name, gender, age, family_id FROM persons ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut person = Person::new(PersonId(row.get("id")?));
            person.name = row.get("name")?;
            person.gender = row.get("gender")?;
            person.age = row.get("age")?;
            person.family_id = row.get::<_, Option<i64>>("family_id")?.map(FamilyId);

            if let Some(family_id) = person.family_id {
                let family = snapshot.families.get_mut(&family_id).ok_or_else(|| {
                    RepoError::InvalidData(format!(
                        "person {} references missing family {family_id}",
                        person.id
                    ))
                })?;
                family.members.insert(person.id);
            }
            snapshot.persons.insert(person.id, person);
        }

        let mut stmt = self.conn.prepare(
            "SELECT person_id, tag FROM person_tags ORDER BY person_id ASC, position ASC;",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let person_id = PersonId(row.get("person_id")?);
            let tag: String = row.get("tag")?;
            let person = snapshot.persons.get_mut(&person_id).ok_or_else(|| {
                RepoError::InvalidData(format!("tag row references missing person {person_id}"))
            })?;
            person.tags.push(tag);
        }

        snapshot.next_person_id = load_next_id(self.conn, EntityKind::Person)?;
        snapshot.next_family_id = load_next_id(self.conn, EntityKind::Family)?;
        snapshot
            .check_integrity()
            .map_err(RepoError::InvalidData)?;

        Ok(snapshot)
    }

    fn apply_changes(&mut self, changes: &ChangeSet) -> RepoResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        for family in &changes.upsert_families {
            tx.execute(
                "INSERT INTO families (id, name) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name;",
                params![family.id.get(), family.name.as_deref()],
            )?;
        }

        for person in &changes.upsert_persons {
            upsert_person(&tx, person)?;
        }

        for person_id in &changes.delete_persons {
            let changed = tx.execute("DELETE FROM persons WHERE id = ?1;", [person_id.get()])?;
            if changed == 0 {
                return Err(RepoError::InvalidData(format!(
                    "person {person_id} scheduled for delete is not persisted"
                )));
            }
        }

        for family_id in &changes.delete_families {
            let changed = tx.execute("DELETE FROM families WHERE id = ?1;", [family_id.get()])?;
            if changed == 0 {
                return Err(RepoError::InvalidData(format!(
                    "family {family_id} scheduled for delete is not persisted"
                )));
            }
        }

        if let Some(next_id) = changes.next_person_id {
            store_next_id(&tx, EntityKind::Person, next_id)?;
        }
        if let Some(next_id) = changes.next_family_id {
            store_next_id(&tx, EntityKind::Family, next_id)?;
        }

        tx.commit()?;
        Ok(())
    }
}

fn upsert_person(tx: &Transaction<'_>, person: &Person) -> RepoResult<()> {
    tx.execute(
        "INSERT INTO persons (id, name, gender, age, family_id)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            gender = excluded.gender,
            age = excluded.age,
            family_id = excluded.family_id;",
        params![
            person.id.get(),
            person.name.as_deref(),
            person.gender.as_deref(),
            person.age,
            person.family_id.map(FamilyId::get),
        ],
    )?;

    tx.execute(
        "DELETE FROM person_tags WHERE person_id = ?1;",
        [person.id.get()],
    )?;
    for (position, tag) in person.tags.iter().enumerate() {
        tx.execute(
            "INSERT INTO person_tags (person_id, position, tag) VALUES (?1, ?2, ?3);",
            params![person.id.get(), position as i64, tag.as_str()],
        )?;
    }

    Ok(())
}

fn load_next_id(conn: &Connection, kind: EntityKind) -> RepoResult<i64> {
    let next_id: Option<i64> = conn
        .query_row(
            "SELECT next_id FROM id_sequences WHERE kind = ?1;",
            [kind.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    next_id.ok_or_else(|| {
        RepoError::InvalidData(format!("missing id sequence for kind `{}`", kind.as_str()))
    })
}

fn store_next_id(tx: &Transaction<'_>, kind: EntityKind, next_id: i64) -> RepoResult<()> {
    let changed = tx.execute(
        "UPDATE id_sequences SET next_id = ?2 WHERE kind = ?1 AND next_id <= ?2;",
        params![kind.as_str(), next_id],
    )?;
    if changed == 0 {
        return Err(RepoError::InvalidData(format!(
            "refusing to move `{}` id sequence backwards to {next_id}",
            kind.as_str()
        )));
    }
    Ok(())
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in REQUIRED_TABLES {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
