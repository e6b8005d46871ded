use kinfolk_core::{EntityStore, ListQuery, PersonPatch, QueryService};
use std::sync::mpsc;
use std::thread;

#[test]
fn reader_thread_sees_every_effect_of_a_finished_commit() {
    let mut store = EntityStore::open_in_memory().unwrap();
    let queries = QueryService::new(store.committed_view());
    let (committed_tx, committed_rx) = mpsc::channel::<usize>();

    let reader = thread::spawn(move || {
        let mut observed = Vec::new();
        while let Ok(expected) = committed_rx.recv() {
            let listed = queries.list_persons(&ListQuery::all()).unwrap();
            observed.push((expected, listed.len()));
        }
        observed
    });

    for round in 1..=5 {
        for _ in 0..round {
            let id = store.create_person();
            store.update_person(id, &PersonPatch::rename("Tom")).unwrap();
        }
        store.commit().unwrap();
        committed_tx.send(store.working().person_count()).unwrap();
    }
    drop(committed_tx);

    let observed = reader.join().unwrap();
    assert_eq!(observed.len(), 5);
    for (expected, seen) in observed {
        assert!(seen >= expected, "reader saw {seen} of {expected} committed persons");
    }
}

#[test]
fn reader_thread_never_sees_pending_mutations() {
    let mut store = EntityStore::open_in_memory().unwrap();
    let id = store.create_person();
    store.commit().unwrap();

    store.update_person(id, &PersonPatch::rename("Joe")).unwrap();
    store.create_person();

    let queries = QueryService::new(store.committed_view());
    let listed = thread::spawn(move || queries.list_persons(&ListQuery::all()).unwrap())
        .join()
        .unwrap();

    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, None);
}
