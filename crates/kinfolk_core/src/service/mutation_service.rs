//! Mutation use-case service.
//!
//! # Responsibility
//! - Provide named create/rename/delete/membership operations.
//! - Resolve demo defaults from `MutationPolicy` instead of hardcoding them.
//! - Execute `Command`s as mutate-then-commit units.
//!
//! # Invariants
//! - Every operation is atomic on the working snapshot.
//! - A failed `execute` restores the working snapshot it started from.
//! - Commit errors are always returned, never swallowed.

use crate::config::{AgePolicy, MemberCountRange, StoreConfig};
use crate::model::entity::EntityRef;
use crate::model::family::{FamilyId, FamilyPatch};
use crate::model::person::{PersonId, PersonPatch};
use crate::service::command::{Command, CommandOutcome, Effect};
use crate::store::{CommitSummary, DeletePolicy, EntityStore, StoreResult};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::time::Instant;

/// Input for creating one person. Missing fields use policy defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPerson {
    pub name: Option<String>,
    pub gender: Option<String>,
    /// Resolved by `AgePolicy` when `None`.
    pub age: Option<i64>,
    pub tags: Vec<String>,
}

impl NewPerson {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_age(mut self, age: i64) -> Self {
        self.age = Some(age);
        self
    }
}

/// Defaults and policies applied by the mutation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationPolicy {
    pub delete_policy: DeletePolicy,
    pub member_count_range: MemberCountRange,
    pub default_age: AgePolicy,
    pub default_person_name: Option<String>,
    pub sample_names: Vec<String>,
}

impl From<&StoreConfig> for MutationPolicy {
    fn from(config: &StoreConfig) -> Self {
        Self {
            delete_policy: DeletePolicy::from_cascade(config.cascade_delete_family),
            member_count_range: config.default_member_count_range,
            default_age: config.default_age,
            default_person_name: config.default_person_name.clone(),
            sample_names: config.sample_names.clone(),
        }
    }
}

/// Write-side service over an explicitly passed store.
pub struct MutationService<'store> {
    store: &'store mut EntityStore,
    policy: MutationPolicy,
    rng: StdRng,
}

impl<'store> MutationService<'store> {
    /// Creates a service with policy and RNG seed taken from `config`.
    pub fn new(store: &'store mut EntityStore, config: &StoreConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_policy(store, MutationPolicy::from(config), rng)
    }

    pub fn with_policy(store: &'store mut EntityStore, policy: MutationPolicy, rng: StdRng) -> Self {
        Self { store, policy, rng }
    }

    pub fn policy(&self) -> &MutationPolicy {
        &self.policy
    }

    /// Read access to the underlying store (working state).
    pub fn store(&self) -> &EntityStore {
        self.store
    }

    /// Creates one person; `age` and `name` fall back to policy defaults.
    pub fn create_person(&mut self, request: NewPerson) -> StoreResult<PersonId> {
        let age = match request.age {
            Some(age) => age,
            None => self.draw_age(),
        };
        let patch = PersonPatch {
            name: Some(request.name.or_else(|| self.policy.default_person_name.clone())),
            gender: Some(request.gender),
            age: Some(age),
            tags: Some(request.tags),
        };

        self.store.transact(|store| {
            let id = store.create_person();
            store.update_person(id, &patch)?;
            Ok(id)
        })
    }

    /// Creates a person with a random sample name and policy age.
    pub fn create_sample_person(&mut self) -> StoreResult<PersonId> {
        let name = self.policy.sample_names.choose(&mut self.rng).cloned();
        let age = self.draw_age();
        self.create_person(NewPerson {
            name,
            age: Some(age),
            ..NewPerson::default()
        })
    }

    /// Creates a family and `member_count` default persons inside it.
    ///
    /// When `member_count` is `None` the count is drawn from
    /// `MutationPolicy::member_count_range`.
    pub fn create_family(
        &mut self,
        name: Option<String>,
        member_count: Option<u32>,
    ) -> StoreResult<FamilyId> {
        let count = match member_count {
            Some(count) => count,
            None => self.draw_member_count(),
        };
        let members: Vec<PersonPatch> = (0..count)
            .map(|_| PersonPatch {
                name: Some(self.policy.default_person_name.clone()),
                age: Some(draw_age(self.policy.default_age, &mut self.rng)),
                ..PersonPatch::default()
            })
            .collect();

        self.store.transact(|store| {
            let family_id = store.create_family();
            store.update_family(family_id, &FamilyPatch { name: Some(name) })?;
            for patch in &members {
                let person_id = store.create_person();
                store.update_person(person_id, patch)?;
                store.add_member(family_id, person_id)?;
            }
            Ok(family_id)
        })
    }

    pub fn rename_person(&mut self, id: PersonId, new_name: impl Into<String>) -> StoreResult<()> {
        self.store.update_person(id, &PersonPatch::rename(new_name))
    }

    pub fn rename_family(&mut self, id: FamilyId, new_name: impl Into<String>) -> StoreResult<()> {
        self.store.update_family(id, &FamilyPatch::rename(new_name))
    }

    /// Applies gender/age/tags/name changes in one step.
    pub fn update_person(&mut self, id: PersonId, patch: &PersonPatch) -> StoreResult<()> {
        self.store.update_person(id, patch)
    }

    pub fn delete_person(&mut self, id: PersonId) -> StoreResult<()> {
        self.store.delete_person(id)
    }

    /// Deletes a family using the configured `DeletePolicy`.
    pub fn delete_family(&mut self, id: FamilyId) -> StoreResult<()> {
        self.store.delete_family(id, self.policy.delete_policy)
    }

    pub fn add_member(&mut self, family_id: FamilyId, person_id: PersonId) -> StoreResult<()> {
        self.store.add_member(family_id, person_id)
    }

    pub fn remove_member(&mut self, family_id: FamilyId, person_id: PersonId) -> StoreResult<()> {
        self.store.remove_member(family_id, person_id)
    }

    pub fn has_changes(&self) -> bool {
        self.store.has_changes()
    }

    pub fn commit(&mut self) -> StoreResult<CommitSummary> {
        self.store.commit()
    }

    pub fn rollback(&mut self) -> StoreResult<()> {
        self.store.rollback()
    }

    /// Applies `command` and commits it.
    ///
    /// On any failure the working snapshot is restored to what it was before
    /// the call and the error is returned.
    pub fn execute(&mut self, command: Command) -> StoreResult<CommandOutcome> {
        let label = command.label();
        let started_at = Instant::now();
        let checkpoint = self.store.working().clone();

        let applied = self.apply(command);
        let result = match applied {
            Ok((target, effect)) => self.store.commit().map(|commit| CommandOutcome {
                target,
                effect,
                commit,
            }),
            Err(err) => Err(err),
        };

        match result {
            Ok(outcome) => {
                info!(
                    "event=command_execute module=service status=ok command={} target={} duration_ms={}",
                    label,
                    outcome.target,
                    started_at.elapsed().as_millis()
                );
                Ok(outcome)
            }
            Err(err) => {
                self.store.restore(checkpoint);
                warn!(
                    "event=command_execute module=service status=error command={} duration_ms={} error={}",
                    label,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn apply(&mut self, command: Command) -> StoreResult<(EntityRef, Effect)> {
        match command {
            Command::CreatePerson(request) => {
                let id = self.create_person(request)?;
                Ok((id.into(), Effect::Created))
            }
            Command::CreateSamplePerson => {
                let id = self.create_sample_person()?;
                Ok((id.into(), Effect::Created))
            }
            Command::CreateFamily { name, member_count } => {
                let id = self.create_family(name, member_count)?;
                Ok((id.into(), Effect::Created))
            }
            Command::RenamePerson { id, new_name } => {
                self.rename_person(id, new_name)?;
                Ok((id.into(), Effect::Updated))
            }
            Command::RenameFamily { id, new_name } => {
                self.rename_family(id, new_name)?;
                Ok((id.into(), Effect::Updated))
            }
            Command::DeletePerson { id } => {
                self.delete_person(id)?;
                Ok((id.into(), Effect::Deleted))
            }
            Command::DeleteFamily { id } => {
                self.delete_family(id)?;
                Ok((id.into(), Effect::Deleted))
            }
            Command::AddMember {
                family_id,
                person_id,
            } => {
                self.add_member(family_id, person_id)?;
                Ok((family_id.into(), Effect::Updated))
            }
        }
    }

    fn draw_age(&mut self) -> i64 {
        draw_age(self.policy.default_age, &mut self.rng)
    }

    fn draw_member_count(&mut self) -> u32 {
        let MemberCountRange { min, max } = self.policy.member_count_range;
        if min >= max {
            return min;
        }
        self.rng.gen_range(min..=max)
    }
}

fn draw_age(policy: AgePolicy, rng: &mut StdRng) -> i64 {
    match policy {
        AgePolicy::Fixed(age) => age,
        AgePolicy::Random { min, max } if min >= max => min,
        AgePolicy::Random { min, max } => rng.gen_range(min..=max),
    }
}
