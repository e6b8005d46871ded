//! Explicit mutation commands for presentation callers.
//!
//! A presentation layer builds a `Command` from a user action and hands it to
//! `MutationService::execute`, which applies it and commits.

use crate::model::entity::EntityRef;
use crate::model::family::FamilyId;
use crate::model::person::PersonId;
use crate::service::mutation_service::NewPerson;
use crate::store::CommitSummary;

/// One user-level mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    CreatePerson(NewPerson),
    /// Person with a random sample name and default age.
    CreateSamplePerson,
    CreateFamily {
        name: Option<String>,
        member_count: Option<u32>,
    },
    RenamePerson {
        id: PersonId,
        new_name: String,
    },
    RenameFamily {
        id: FamilyId,
        new_name: String,
    },
    DeletePerson {
        id: PersonId,
    },
    DeleteFamily {
        id: FamilyId,
    },
    AddMember {
        family_id: FamilyId,
        person_id: PersonId,
    },
}

impl Command {
    /// Stable snake_case label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::CreatePerson(_) => "create_person",
            Self::CreateSamplePerson => "create_sample_person",
            Self::CreateFamily { .. } => "create_family",
            Self::RenamePerson { .. } => "rename_person",
            Self::RenameFamily { .. } => "rename_family",
            Self::DeletePerson { .. } => "delete_person",
            Self::DeleteFamily { .. } => "delete_family",
            Self::AddMember { .. } => "add_member",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Created,
    Updated,
    Deleted,
}

/// Result of an executed and committed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Record the command was about. For `AddMember` this is the family.
    pub target: EntityRef,
    pub effect: Effect,
    pub commit: CommitSummary,
}
