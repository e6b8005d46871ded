//! Immutable-by-convention record sets and the diff between two of them.
//!
//! # Invariants
//! - `next_person_id` / `next_family_id` are strictly greater than every id
//!   ever allocated for that kind.
//! - Family membership is consistent with person back-references.

use crate::model::family::{Family, FamilyId};
use crate::model::person::{Person, PersonId};
use std::collections::BTreeMap;

/// Complete set of records of both kinds plus id high-water marks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub(crate) persons: BTreeMap<PersonId, Person>,
    pub(crate) families: BTreeMap<FamilyId, Family>,
    pub(crate) next_person_id: i64,
    pub(crate) next_family_id: i64,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            persons: BTreeMap::new(),
            families: BTreeMap::new(),
            next_person_id: 1,
            next_family_id: 1,
        }
    }
}

impl Snapshot {
    /// Persons in ascending id order.
    pub fn persons(&self) -> impl Iterator<Item = &Person> {
        self.persons.values()
    }

    /// Families in ascending id order.
    pub fn families(&self) -> impl Iterator<Item = &Family> {
        self.families.values()
    }

    pub fn person(&self, id: PersonId) -> Option<&Person> {
        self.persons.get(&id)
    }

    pub fn family(&self, id: FamilyId) -> Option<&Family> {
        self.families.get(&id)
    }

    pub fn person_count(&self) -> usize {
        self.persons.len()
    }

    pub fn family_count(&self) -> usize {
        self.families.len()
    }

    /// Checks the bidirectional membership invariant and id high-water marks.
    ///
    /// Returns a description of the first violation found.
    pub fn check_integrity(&self) -> Result<(), String> {
        for person in self.persons.values() {
            if person.id.get() >= self.next_person_id {
                return Err(format!(
                    "person {} is not below next_person_id {}",
                    person.id, self.next_person_id
                ));
            }
            if let Some(family_id) = person.family_id {
                let family = self.families.get(&family_id).ok_or_else(|| {
                    format!("person {} references missing family {family_id}", person.id)
                })?;
                if !family.has_member(person.id) {
                    return Err(format!(
                        "person {} references family {family_id} which does not list it",
                        person.id
                    ));
                }
            }
        }

        for family in self.families.values() {
            if family.id.get() >= self.next_family_id {
                return Err(format!(
                    "family {} is not below next_family_id {}",
                    family.id, self.next_family_id
                ));
            }
            for member in &family.members {
                let back_ref = self.persons.get(member).and_then(|person| person.family_id);
                if back_ref != Some(family.id) {
                    return Err(format!(
                        "family {} lists person {member} without matching back-reference",
                        family.id
                    ));
                }
            }
        }

        Ok(())
    }

    /// Computes the writes needed to turn `self` (persisted) into `target`.
    pub fn diff(&self, target: &Snapshot) -> ChangeSet {
        let upsert_families = target
            .families
            .values()
            .filter(|family| {
                self.families
                    .get(&family.id)
                    .map_or(true, |old| old.name != family.name)
            })
            .cloned()
            .collect();
        let delete_families = self
            .families
            .keys()
            .filter(|id| !target.families.contains_key(id))
            .copied()
            .collect();

        let upsert_persons = target
            .persons
            .values()
            .filter(|person| self.persons.get(&person.id) != Some(*person))
            .cloned()
            .collect();
        let delete_persons = self
            .persons
            .keys()
            .filter(|id| !target.persons.contains_key(id))
            .copied()
            .collect();

        ChangeSet {
            upsert_families,
            upsert_persons,
            delete_persons,
            delete_families,
            next_person_id: (target.next_person_id != self.next_person_id)
                .then_some(target.next_person_id),
            next_family_id: (target.next_family_id != self.next_family_id)
                .then_some(target.next_family_id),
        }
    }
}

/// Pending writes between a persisted snapshot and a working one.
///
/// Family membership is not listed; it is carried by `Person::family_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub upsert_families: Vec<Family>,
    pub upsert_persons: Vec<Person>,
    pub delete_persons: Vec<PersonId>,
    pub delete_families: Vec<FamilyId>,
    pub next_person_id: Option<i64>,
    pub next_family_id: Option<i64>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.upsert_families.is_empty()
            && self.upsert_persons.is_empty()
            && self.delete_persons.is_empty()
            && self.delete_families.is_empty()
            && self.next_person_id.is_none()
            && self.next_family_id.is_none()
    }
}
