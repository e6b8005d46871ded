//! Family domain model.
//!
//! # Invariants
//! - `members` has set semantics and enumerates in ascending person id.
//! - Member count is always `members.len()`; it is never stored separately.

use crate::model::person::PersonId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// Stable identifier of a family record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FamilyId(pub i64);

impl FamilyId {
    /// Returns the raw integer id.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl Display for FamilyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical family record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Family {
    pub id: FamilyId,
    pub name: Option<String>,
    pub members: BTreeSet<PersonId>,
}

impl Family {
    /// Creates an unnamed family without members.
    pub fn new(id: FamilyId) -> Self {
        Self {
            id,
            name: None,
            members: BTreeSet::new(),
        }
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn has_member(&self, person_id: PersonId) -> bool {
        self.members.contains(&person_id)
    }

    pub fn apply(&mut self, patch: &FamilyPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
    }
}

/// Partial update for family fields. Members are managed by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FamilyPatch {
    pub name: Option<Option<String>>,
}

impl FamilyPatch {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(Some(name.into())),
        }
    }
}
