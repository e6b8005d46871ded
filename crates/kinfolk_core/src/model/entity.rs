//! Kind-generic handles over person and family records.
//!
//! # Responsibility
//! - Let store/query callers address either record kind through one API.
//! - Keep the typed ids as the source of truth; these enums only wrap them.

use crate::model::family::{Family, FamilyId, FamilyPatch};
use crate::model::person::{Person, PersonId, PersonPatch};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Record kind managed by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Person,
    Family,
}

impl EntityKind {
    /// Stable lowercase label used in logs, errors and persisted sequences.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Family => "family",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed reference to one record of either kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    Person(PersonId),
    Family(FamilyId),
}

impl EntityRef {
    pub fn kind(self) -> EntityKind {
        match self {
            Self::Person(_) => EntityKind::Person,
            Self::Family(_) => EntityKind::Family,
        }
    }

    /// Returns the raw id without its kind.
    pub fn raw_id(self) -> i64 {
        match self {
            Self::Person(id) => id.get(),
            Self::Family(id) => id.get(),
        }
    }
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.kind(), self.raw_id())
    }
}

impl From<PersonId> for EntityRef {
    fn from(value: PersonId) -> Self {
        Self::Person(value)
    }
}

impl From<FamilyId> for EntityRef {
    fn from(value: FamilyId) -> Self {
        Self::Family(value)
    }
}

/// One record of either kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Person(Person),
    Family(Family),
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Person(_) => EntityKind::Person,
            Self::Family(_) => EntityKind::Family,
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        match self {
            Self::Person(person) => EntityRef::Person(person.id),
            Self::Family(family) => EntityRef::Family(family.id),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Person(person) => person.name.as_deref(),
            Self::Family(family) => family.name.as_deref(),
        }
    }

    pub fn as_person(&self) -> Option<&Person> {
        match self {
            Self::Person(person) => Some(person),
            Self::Family(_) => None,
        }
    }

    pub fn as_family(&self) -> Option<&Family> {
        match self {
            Self::Family(family) => Some(family),
            Self::Person(_) => None,
        }
    }
}

/// Field patch for either kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordPatch {
    Person(PersonPatch),
    Family(FamilyPatch),
}

impl RecordPatch {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Person(_) => EntityKind::Person,
            Self::Family(_) => EntityKind::Family,
        }
    }
}
