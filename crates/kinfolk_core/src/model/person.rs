//! Person domain model.
//!
//! # Responsibility
//! - Define the person record and its field-level patch shape.
//!
//! # Invariants
//! - `id` is assigned by the store and never reused for another person.
//! - `family_id` is only changed by store membership operations.
//! - `age` has no enforced range; negative values are accepted.

use crate::model::family::FamilyId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Stable identifier of a person record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(pub i64);

impl PersonId {
    /// Returns the raw integer id.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl Display for PersonId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical person record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: Option<String>,
    pub gender: Option<String>,
    pub age: i64,
    /// Ordered free-form labels.
    pub tags: Vec<String>,
    /// Back-reference to the owning family, if any.
    pub family_id: Option<FamilyId>,
}

impl Person {
    /// Creates an empty person with the given id.
    ///
    /// # Invariants
    /// - Optional fields start as `None`, `age` as `0`, `tags` empty.
    /// - The person starts detached from any family.
    pub fn new(id: PersonId) -> Self {
        Self {
            id,
            name: None,
            gender: None,
            age: 0,
            tags: Vec::new(),
            family_id: None,
        }
    }

    /// Returns the name or the placeholder shown for unnamed persons.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("No name")
    }

    /// Applies every `Some` field of the patch.
    pub fn apply(&mut self, patch: &PersonPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(gender) = &patch.gender {
            self.gender = gender.clone();
        }
        if let Some(age) = patch.age {
            self.age = age;
        }
        if let Some(tags) = &patch.tags {
            self.tags = tags.clone();
        }
    }
}

/// Partial update for person fields.
///
/// Outer `None` leaves a field unchanged; `Some(None)` clears an optional one.
/// Membership is not patchable here; use the store membership operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonPatch {
    pub name: Option<Option<String>>,
    pub gender: Option<Option<String>>,
    pub age: Option<i64>,
    pub tags: Option<Vec<String>>,
}

impl PersonPatch {
    /// Patch that only sets the name.
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(Some(name.into())),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Person, PersonId, PersonPatch};

    #[test]
    fn patch_only_touches_provided_fields() {
        let mut person = Person::new(PersonId(1));
        person.age = 33;
        person.gender = Some("f".to_string());

        person.apply(&PersonPatch {
            name: Some(Some("Ann".to_string())),
            gender: Some(None),
            ..PersonPatch::default()
        });

        assert_eq!(person.name.as_deref(), Some("Ann"));
        assert_eq!(person.gender, None);
        assert_eq!(person.age, 33);
    }

    #[test]
    fn display_name_falls_back_for_unnamed_person() {
        let person = Person::new(PersonId(7));
        assert_eq!(person.display_name(), "No name");
    }
}
