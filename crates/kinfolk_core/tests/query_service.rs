use kinfolk_core::{
    EntityKind, EntityStore, FamilyPatch, ListQuery, PersonId, PersonPatch, QueryError,
    QueryService, Record, SortKey,
};

fn add_person(store: &mut EntityStore, name: Option<&str>, age: i64) -> PersonId {
    let id = store.create_person();
    store
        .update_person(
            id,
            &PersonPatch {
                name: Some(name.map(str::to_string)),
                age: Some(age),
                ..PersonPatch::default()
            },
        )
        .unwrap();
    id
}

fn names(persons: &[kinfolk_core::Person]) -> Vec<&str> {
    persons.iter().map(|person| person.display_name()).collect()
}

#[test]
fn filter_returns_exact_substring_matches_in_id_order() {
    let mut store = EntityStore::open_in_memory().unwrap();
    let zoe = add_person(&mut store, Some("Zoe"), 30);
    add_person(&mut store, Some("Tom"), 20);
    let joe = add_person(&mut store, Some("Joe"), 40);
    add_person(&mut store, Some("JOEY"), 10);
    add_person(&mut store, None, 50);
    store.commit().unwrap();

    let queries = QueryService::new(store.committed_view());
    let matched = queries
        .list_persons(&ListQuery::all().with_filter("oe"))
        .unwrap();

    let ids: Vec<PersonId> = matched.iter().map(|person| person.id).collect();
    assert_eq!(ids, vec![zoe, joe]);
}

#[test]
fn empty_filter_still_excludes_unnamed_records() {
    let mut store = EntityStore::open_in_memory().unwrap();
    add_person(&mut store, None, 1);
    let tom = add_person(&mut store, Some("Tom"), 2);
    store.commit().unwrap();

    let queries = QueryService::new(store.committed_view());
    let matched = queries
        .list_persons(&ListQuery::all().with_filter(""))
        .unwrap();

    let ids: Vec<PersonId> = matched.iter().map(|person| person.id).collect();
    assert_eq!(ids, vec![tom]);
}

#[test]
fn absent_filter_and_sort_return_everything_in_id_order() {
    let mut store = EntityStore::open_in_memory().unwrap();
    add_person(&mut store, Some("b"), 2);
    add_person(&mut store, None, 1);
    add_person(&mut store, Some("a"), 3);
    store.commit().unwrap();

    let queries = QueryService::new(store.committed_view());
    let listed = queries.list_persons(&ListQuery::all()).unwrap();

    let ids: Vec<i64> = listed.iter().map(|person| person.id.get()).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn sort_by_age_breaks_ties_by_ascending_id_in_both_directions() {
    let mut store = EntityStore::open_in_memory().unwrap();
    let a = add_person(&mut store, Some("a"), 30);
    let b = add_person(&mut store, Some("b"), 10);
    let c = add_person(&mut store, Some("c"), 30);
    let d = add_person(&mut store, Some("d"), 10);
    store.commit().unwrap();
    let queries = QueryService::new(store.committed_view());

    let ascending = queries
        .list_persons(&ListQuery::all().sorted_by(SortKey::Age))
        .unwrap();
    let ids: Vec<PersonId> = ascending.iter().map(|person| person.id).collect();
    assert_eq!(ids, vec![b, d, a, c]);

    let descending = queries
        .list_persons(&ListQuery::all().sorted_by(SortKey::Age).descending())
        .unwrap();
    let ids: Vec<PersonId> = descending.iter().map(|person| person.id).collect();
    assert_eq!(ids, vec![a, c, b, d]);
}

#[test]
fn sort_by_name_places_unnamed_first() {
    let mut store = EntityStore::open_in_memory().unwrap();
    add_person(&mut store, Some("Tom"), 1);
    add_person(&mut store, None, 1);
    add_person(&mut store, Some("Ann"), 1);
    store.commit().unwrap();

    let queries = QueryService::new(store.committed_view());
    let sorted = queries
        .list_persons(&ListQuery::all().sorted_by(SortKey::Name))
        .unwrap();
    assert_eq!(names(&sorted), vec!["No name", "Ann", "Tom"]);
}

#[test]
fn queries_only_observe_committed_state() {
    let mut store = EntityStore::open_in_memory().unwrap();
    let queries = QueryService::new(store.committed_view());
    let id = add_person(&mut store, Some("Tom"), 20);

    assert!(queries.list_persons(&ListQuery::all()).unwrap().is_empty());
    assert_eq!(queries.get_person(id), None);

    store.commit().unwrap();
    assert_eq!(queries.count(EntityKind::Person), 1);
    assert_eq!(
        queries.get_person(id).and_then(|person| person.name),
        Some("Tom".to_string())
    );
}

#[test]
fn returned_lists_are_snapshots() {
    let mut store = EntityStore::open_in_memory().unwrap();
    let id = add_person(&mut store, Some("Tom"), 20);
    store.commit().unwrap();
    let queries = QueryService::new(store.committed_view());

    let before = queries.list_persons(&ListQuery::all()).unwrap();
    store.update_person(id, &PersonPatch::rename("Joe")).unwrap();
    add_person(&mut store, Some("Sam"), 5);
    store.commit().unwrap();

    assert_eq!(names(&before), vec!["Tom"]);
    let after = queries.list_persons(&ListQuery::all()).unwrap();
    assert_eq!(names(&after), vec!["Joe", "Sam"]);
}

#[test]
fn families_sort_by_member_count_and_expose_cardinality() {
    let mut store = EntityStore::open_in_memory().unwrap();
    let big = store.create_family();
    let small = store.create_family();
    store.update_family(big, &FamilyPatch::rename("Big")).unwrap();
    store
        .update_family(small, &FamilyPatch::rename("Small"))
        .unwrap();
    for _ in 0..3 {
        let person = store.create_person();
        store.add_member(big, person).unwrap();
    }
    let person = store.create_person();
    store.add_member(small, person).unwrap();
    store.commit().unwrap();

    let queries = QueryService::new(store.committed_view());
    let sorted = queries
        .list_families(&ListQuery::all().sorted_by(SortKey::MemberCount))
        .unwrap();

    let counts: Vec<(Option<&str>, usize)> = sorted
        .iter()
        .map(|family| (family.name.as_deref(), family.member_count()))
        .collect();
    assert_eq!(counts, vec![(Some("Small"), 1), (Some("Big"), 3)]);
}

#[test]
fn kind_generic_list_wraps_records() {
    let mut store = EntityStore::open_in_memory().unwrap();
    add_person(&mut store, Some("Tom"), 20);
    let family = store.create_family();
    store.commit().unwrap();
    let queries = QueryService::new(store.committed_view());

    let families = queries
        .list(EntityKind::Family, &ListQuery::all())
        .unwrap();
    assert_eq!(families.len(), 1);
    assert!(matches!(&families[0], Record::Family(loaded) if loaded.id == family));
}

#[test]
fn sort_key_from_other_kind_is_rejected() {
    let store = EntityStore::open_in_memory().unwrap();
    let queries = QueryService::new(store.committed_view());

    let err = queries
        .list_families(&ListQuery::all().sorted_by(SortKey::Age))
        .unwrap_err();
    assert_eq!(
        err,
        QueryError::UnsupportedSortKey {
            kind: EntityKind::Family,
            key: SortKey::Age
        }
    );
    assert!(queries
        .list(EntityKind::Person, &ListQuery::all().sorted_by(SortKey::MemberCount))
        .is_err());
}
