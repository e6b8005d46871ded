use kinfolk_core::db::open_db;
use kinfolk_core::{
    DeletePolicy, EntityKind, EntityRef, EntityStore, FamilyId, FamilyPatch, PersonId,
    PersonPatch, Record, RecordPatch, StoreConfig, StoreError,
};
use rusqlite::Connection;
use std::path::Path;

#[test]
fn renamed_person_reads_back_new_name() {
    let mut store = EntityStore::open_in_memory().unwrap();
    let id = store.create_person();

    store.update_person(id, &PersonPatch::rename("Joe")).unwrap();

    assert_eq!(store.get_person(id).unwrap().name.as_deref(), Some("Joe"));
}

#[test]
fn ids_are_sequential_per_kind() {
    let mut store = EntityStore::open_in_memory().unwrap();
    let first = store.create_person();
    let family = store.create_family();
    let second = store.create_person();

    assert_eq!(first, PersonId(1));
    assert_eq!(second, PersonId(2));
    assert_eq!(family, FamilyId(1));
}

#[test]
fn add_member_sets_both_sides_and_is_idempotent() {
    let mut store = EntityStore::open_in_memory().unwrap();
    let family = store.create_family();
    let person = store.create_person();

    store.add_member(family, person).unwrap();
    store.add_member(family, person).unwrap();

    let loaded = store.get_family(family).unwrap();
    assert_eq!(loaded.members.iter().filter(|id| **id == person).count(), 1);
    assert_eq!(loaded.member_count(), 1);
    assert_eq!(store.get_person(person).unwrap().family_id, Some(family));
    store.working().check_integrity().unwrap();
}

#[test]
fn add_member_moves_person_between_families() {
    let mut store = EntityStore::open_in_memory().unwrap();
    let first = store.create_family();
    let second = store.create_family();
    let person = store.create_person();

    store.add_member(first, person).unwrap();
    store.add_member(second, person).unwrap();

    assert!(!store.get_family(first).unwrap().has_member(person));
    assert!(store.get_family(second).unwrap().has_member(person));
    assert_eq!(store.get_person(person).unwrap().family_id, Some(second));
    store.working().check_integrity().unwrap();
}

#[test]
fn add_member_with_missing_person_changes_nothing() {
    let mut store = EntityStore::open_in_memory().unwrap();
    let family = store.create_family();

    let err = store.add_member(family, PersonId(42)).unwrap_err();

    assert!(matches!(err, StoreError::NotFound(EntityRef::Person(PersonId(42)))));
    assert_eq!(store.get_family(family).unwrap().member_count(), 0);
}

#[test]
fn delete_person_detaches_from_family_and_is_terminal() {
    let mut store = EntityStore::open_in_memory().unwrap();
    let family = store.create_family();
    let person = store.create_person();
    store.add_member(family, person).unwrap();

    store.delete_person(person).unwrap();

    assert!(!store.get_family(family).unwrap().has_member(person));
    assert!(matches!(
        store.get_person(person),
        Err(StoreError::NotFound(EntityRef::Person(id))) if id == person
    ));
    assert!(matches!(
        store.delete_person(person),
        Err(StoreError::NotFound(_))
    ));
}

#[test]
fn delete_family_with_members_is_blocked_under_restrict() {
    let mut store = EntityStore::open_in_memory().unwrap();
    let family = store.create_family();
    let person = store.create_person();
    store.add_member(family, person).unwrap();

    let err = store
        .delete_family(family, DeletePolicy::Restrict)
        .unwrap_err();

    assert!(matches!(
        err,
        StoreError::HasMembers {
            family_id,
            member_count: 1
        } if family_id == family
    ));
    assert!(store.get_family(family).is_ok());
    assert_eq!(store.get_person(person).unwrap().family_id, Some(family));
}

#[test]
fn delete_family_under_cascade_detaches_every_member() {
    let mut store = EntityStore::open_in_memory().unwrap();
    let family = store.create_family();
    let members: Vec<PersonId> = (0..3).map(|_| store.create_person()).collect();
    for member in &members {
        store.add_member(family, *member).unwrap();
    }

    store.delete_family(family, DeletePolicy::Cascade).unwrap();

    assert!(matches!(
        store.get_family(family),
        Err(StoreError::NotFound(EntityRef::Family(_)))
    ));
    for member in members {
        assert_eq!(store.get_person(member).unwrap().family_id, None);
    }
    store.working().check_integrity().unwrap();
}

#[test]
fn empty_family_deletes_under_restrict() {
    let mut store = EntityStore::open_in_memory().unwrap();
    let family = store.create_family();

    store.delete_family(family, DeletePolicy::Restrict).unwrap();

    assert_eq!(store.working().family_count(), 0);
}

#[test]
fn remove_member_requires_membership() {
    let mut store = EntityStore::open_in_memory().unwrap();
    let family = store.create_family();
    let person = store.create_person();

    let err = store.remove_member(family, person).unwrap_err();
    assert!(matches!(err, StoreError::NotAMember { .. }));

    store.add_member(family, person).unwrap();
    store.remove_member(family, person).unwrap();
    assert_eq!(store.get_person(person).unwrap().family_id, None);
    assert_eq!(store.get_family(family).unwrap().member_count(), 0);
}

#[test]
fn kind_generic_contract_round_trips_both_kinds() {
    let mut store = EntityStore::open_in_memory().unwrap();
    let person = store.create(EntityKind::Person);
    let family = store.create(EntityKind::Family);
    assert_eq!(person.kind(), EntityKind::Person);
    assert_eq!(family.kind(), EntityKind::Family);

    store
        .update(family, &RecordPatch::Family(FamilyPatch::rename("Smith")))
        .unwrap();
    match store.get(family).unwrap() {
        Record::Family(loaded) => assert_eq!(loaded.name.as_deref(), Some("Smith")),
        other => panic!("unexpected record: {other:?}"),
    }

    let mismatch = store
        .update(person, &RecordPatch::Family(FamilyPatch::rename("x")))
        .unwrap_err();
    assert!(matches!(
        mismatch,
        StoreError::KindMismatch {
            target: EntityKind::Person,
            patch: EntityKind::Family
        }
    ));

    store.delete(person, DeletePolicy::Restrict).unwrap();
    assert!(matches!(store.get(person), Err(StoreError::NotFound(_))));
}

#[test]
fn commit_persists_records_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(&dir.path().join("kinfolk.db"));

    let (family, person) = {
        let mut store = EntityStore::open(&config).unwrap();
        let family = store.create_family();
        store
            .update_family(family, &FamilyPatch::rename("Smith"))
            .unwrap();
        let person = store.create_person();
        store
            .update_person(
                person,
                &PersonPatch {
                    name: Some(Some("Tom".to_string())),
                    gender: Some(Some("male".to_string())),
                    age: Some(-4),
                    tags: Some(vec!["b".to_string(), "a".to_string()]),
                },
            )
            .unwrap();
        store.add_member(family, person).unwrap();

        let summary = store.commit().unwrap();
        assert_eq!(summary.persons_written, 1);
        assert_eq!(summary.families_written, 1);
        (family, person)
    };

    let store = EntityStore::open(&config).unwrap();
    let loaded = store.get_person(person).unwrap();
    assert_eq!(loaded.name.as_deref(), Some("Tom"));
    assert_eq!(loaded.gender.as_deref(), Some("male"));
    assert_eq!(loaded.age, -4);
    assert_eq!(loaded.tags, vec!["b".to_string(), "a".to_string()]);
    assert_eq!(loaded.family_id, Some(family));
    assert!(store.get_family(family).unwrap().has_member(person));
    assert!(!store.has_changes());
}

#[test]
fn uncommitted_changes_are_not_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(&dir.path().join("kinfolk.db"));

    {
        let mut store = EntityStore::open(&config).unwrap();
        store.create_person();
        assert!(store.has_changes());
    }

    let store = EntityStore::open(&config).unwrap();
    assert_eq!(store.working().person_count(), 0);
}

#[test]
fn ids_are_not_reused_after_deleting_newest_record() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(&dir.path().join("kinfolk.db"));

    {
        let mut store = EntityStore::open(&config).unwrap();
        let first = store.create_person();
        let newest = store.create_person();
        store.commit().unwrap();
        store.delete_person(newest).unwrap();
        store.commit().unwrap();
        assert!(store.get_person(first).is_ok());
    }

    let mut store = EntityStore::open(&config).unwrap();
    assert_eq!(store.create_person(), PersonId(3));
}

#[test]
fn rolled_back_ids_stay_retired() {
    let mut store = EntityStore::open_in_memory().unwrap();
    let discarded = store.create_person();
    store.rollback().unwrap();

    let next = store.create_person();
    assert!(next > discarded);
    assert!(store.get_person(discarded).is_err());
}

#[test]
fn ids_from_a_failed_commit_stay_retired_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kinfolk.db");
    let config = file_config(&path);

    let discarded = {
        let mut store = EntityStore::open(&config).unwrap();
        reject_person_inserts(&path);

        let discarded = store.create_person();
        assert!(store.commit().is_err());
        store.rollback().unwrap();
        discarded
    };

    allow_person_inserts(&path);
    let mut store = EntityStore::open(&config).unwrap();
    let next = store.create_person();
    assert!(next > discarded, "reopened store reused {discarded}");
}

#[test]
fn rolled_back_family_ids_stay_retired_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(&dir.path().join("kinfolk.db"));

    let discarded = {
        let mut store = EntityStore::open(&config).unwrap();
        let discarded = store.create_family();
        store.rollback().unwrap();
        discarded
    };

    let mut store = EntityStore::open(&config).unwrap();
    assert_eq!(store.working().family_count(), 0);
    assert!(store.create_family() > discarded);
}

#[test]
fn failed_commit_reports_storage_error_and_keeps_pending_changes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kinfolk.db");
    let mut store = EntityStore::open(&file_config(&path)).unwrap();

    reject_person_inserts(&path);

    let person = store.create_person();
    let err = store.commit().unwrap_err();
    assert!(matches!(err, StoreError::Storage(_)));
    assert!(err.to_string().contains("storage unavailable"));
    assert!(store.has_changes());
    assert!(store.get_person(person).is_ok());

    store.rollback().unwrap();
    assert!(!store.has_changes());
    drop(store);

    let conn = open_db(&path).unwrap();
    let persisted: i64 = conn
        .query_row("SELECT COUNT(*) FROM persons;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(persisted, 0);
}

fn file_config(path: &Path) -> StoreConfig {
    StoreConfig {
        db_path: Some(path.to_path_buf()),
        ..StoreConfig::default()
    }
}

/// Makes every later person insert fail, through a second connection.
fn reject_person_inserts(path: &Path) {
    Connection::open(path)
        .unwrap()
        .execute_batch(
            "CREATE TRIGGER reject_person_insert BEFORE INSERT ON persons
             BEGIN
                 SELECT RAISE(ABORT, 'storage unavailable');
             END;",
        )
        .unwrap();
}

fn allow_person_inserts(path: &Path) {
    Connection::open(path)
        .unwrap()
        .execute_batch("DROP TRIGGER reject_person_insert;")
        .unwrap();
}
