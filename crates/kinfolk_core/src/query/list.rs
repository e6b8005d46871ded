//! Committed-state list queries with substring filter and sort key.
//!
//! # Invariants
//! - `filter` is a case-sensitive substring match on `name`; unnamed records
//!   never match a present filter, including the empty string.
//! - Ties always break by id ascending, regardless of sort direction.
//! - Without a sort key the order is store enumeration order (id ascending).

use crate::model::entity::{EntityKind, Record};
use crate::model::family::{Family, FamilyId};
use crate::model::person::{Person, PersonId};
use crate::store::CommittedView;
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub type QueryResult<T> = Result<T, QueryError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Sort key does not exist on the listed kind.
    UnsupportedSortKey { kind: EntityKind, key: SortKey },
    /// Sort key text could not be parsed.
    UnknownSortKey(String),
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedSortKey { kind, key } => {
                write!(f, "cannot sort {kind} records by `{}`", key.as_str())
            }
            Self::UnknownSortKey(value) => write!(
                f,
                "unknown sort key `{value}`; expected id|name|age|gender|member_count"
            ),
        }
    }
}

impl Error for QueryError {}

/// Field a list can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortKey {
    Id,
    Name,
    /// Person only.
    Age,
    /// Person only.
    Gender,
    /// Family only.
    MemberCount,
}

impl SortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Age => "age",
            Self::Gender => "gender",
            Self::MemberCount => "member_count",
        }
    }

    pub fn applies_to(self, kind: EntityKind) -> bool {
        match self {
            Self::Id | Self::Name => true,
            Self::Age | Self::Gender => kind == EntityKind::Person,
            Self::MemberCount => kind == EntityKind::Family,
        }
    }
}

impl FromStr for SortKey {
    type Err = QueryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "id" => Ok(Self::Id),
            "name" => Ok(Self::Name),
            "age" => Ok(Self::Age),
            "gender" => Ok(Self::Gender),
            "member_count" | "member-count" | "members" => Ok(Self::MemberCount),
            other => Err(QueryError::UnknownSortKey(other.to_string())),
        }
    }
}

/// List options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Case-sensitive substring matched against `name`.
    pub filter: Option<String>,
    pub sort: Option<SortKey>,
    /// Reverses the sort key comparison; id tie-break stays ascending.
    pub descending: bool,
}

impl ListQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn sorted_by(mut self, key: SortKey) -> Self {
        self.sort = Some(key);
        self
    }

    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    fn check_sort_key(&self, kind: EntityKind) -> QueryResult<()> {
        match self.sort {
            Some(key) if !key.applies_to(kind) => Err(QueryError::UnsupportedSortKey { kind, key }),
            _ => Ok(()),
        }
    }

    fn apply_direction(&self, ordering: Ordering) -> Ordering {
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

/// Read service over committed records. Cheap to clone; `Send + Sync`.
#[derive(Debug, Clone)]
pub struct QueryService {
    view: CommittedView,
}

impl QueryService {
    pub fn new(view: CommittedView) -> Self {
        Self { view }
    }

    /// Lists records of `kind` as kind-generic records.
    pub fn list(&self, kind: EntityKind, query: &ListQuery) -> QueryResult<Vec<Record>> {
        match kind {
            EntityKind::Person => Ok(self
                .list_persons(query)?
                .into_iter()
                .map(Record::Person)
                .collect()),
            EntityKind::Family => Ok(self
                .list_families(query)?
                .into_iter()
                .map(Record::Family)
                .collect()),
        }
    }

    pub fn list_persons(&self, query: &ListQuery) -> QueryResult<Vec<Person>> {
        query.check_sort_key(EntityKind::Person)?;
        let snapshot = self.view.snapshot();
        let filter = query.filter.as_deref();
        let mut persons: Vec<Person> = snapshot
            .persons()
            .filter(|person| name_matches(person.name.as_deref(), filter))
            .cloned()
            .collect();

        if let Some(key) = query.sort {
            persons.sort_by(|left, right| {
                let ordering = match key {
                    SortKey::Name => left.name.cmp(&right.name),
                    SortKey::Age => left.age.cmp(&right.age),
                    SortKey::Gender => left.gender.cmp(&right.gender),
                    SortKey::Id | SortKey::MemberCount => Ordering::Equal,
                };
                query
                    .apply_direction(ordering)
                    .then_with(|| tie_break_id(key, query, left.id.get(), right.id.get()))
            });
        }

        Ok(persons)
    }

    pub fn list_families(&self, query: &ListQuery) -> QueryResult<Vec<Family>> {
        query.check_sort_key(EntityKind::Family)?;
        let snapshot = self.view.snapshot();
        let filter = query.filter.as_deref();
        let mut families: Vec<Family> = snapshot
            .families()
            .filter(|family| name_matches(family.name.as_deref(), filter))
            .cloned()
            .collect();

        if let Some(key) = query.sort {
            families.sort_by(|left, right| {
                let ordering = match key {
                    SortKey::Name => left.name.cmp(&right.name),
                    SortKey::MemberCount => left.member_count().cmp(&right.member_count()),
                    SortKey::Id | SortKey::Age | SortKey::Gender => Ordering::Equal,
                };
                query
                    .apply_direction(ordering)
                    .then_with(|| tie_break_id(key, query, left.id.get(), right.id.get()))
            });
        }

        Ok(families)
    }

    /// Committed copy of one person.
    pub fn get_person(&self, id: PersonId) -> Option<Person> {
        self.view.snapshot().person(id).cloned()
    }

    /// Committed copy of one family.
    pub fn get_family(&self, id: FamilyId) -> Option<Family> {
        self.view.snapshot().family(id).cloned()
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        let snapshot = self.view.snapshot();
        match kind {
            EntityKind::Person => snapshot.person_count(),
            EntityKind::Family => snapshot.family_count(),
        }
    }
}

fn name_matches(name: Option<&str>, filter: Option<&str>) -> bool {
    match filter {
        None => true,
        Some(needle) => name.is_some_and(|name| name.contains(needle)),
    }
}

// Sorting by id itself honors the direction; every other key falls back to
// ascending id.
fn tie_break_id(key: SortKey, query: &ListQuery, left: i64, right: i64) -> Ordering {
    if key == SortKey::Id {
        query.apply_direction(left.cmp(&right))
    } else {
        left.cmp(&right)
    }
}
