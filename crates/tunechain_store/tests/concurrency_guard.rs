use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tunechain_store::{Collection, DocumentStore, LockPolicy, Record, StoreConfig, StoreError};

const WRITERS: usize = 8;
const WRITES_PER_THREAD: usize = 20;

#[test]
fn concurrent_creates_are_never_lost() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DocumentStore::open_dir(dir.path()).unwrap());
    let barrier = Arc::new(Barrier::new(WRITERS));

    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for n in 0..WRITES_PER_THREAD {
                    store
                        .create::<Value>(
                            Collection::Transactions,
                            &json!({ "writer": writer, "seq": n }),
                        )
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let all = store.get_all::<Value>(Collection::Transactions).unwrap();
    assert_eq!(all.len(), WRITERS * WRITES_PER_THREAD);
    let ids: HashSet<&str> = all.iter().map(|record| record.id.as_str()).collect();
    assert_eq!(ids.len(), all.len());
}

#[test]
fn concurrent_updates_to_distinct_fields_all_apply() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DocumentStore::open_dir(dir.path()).unwrap());
    let created: Record<Value> = store
        .create(Collection::Analytics, &json!({ "trackId": "t-1" }))
        .unwrap();

    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let store = Arc::clone(&store);
            let id = created.id.clone();
            thread::spawn(move || {
                let field = format!("counter_{writer}");
                store
                    .update::<Value, _>(Collection::Analytics, &id, &json!({ field: writer }))
                    .unwrap()
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let loaded: Record<Value> = store
        .get(Collection::Analytics, &created.id)
        .unwrap()
        .unwrap();
    for writer in 0..WRITERS {
        assert_eq!(loaded.payload[format!("counter_{writer}")], json!(writer));
    }
    assert_eq!(loaded.payload["trackId"], "t-1");
}

#[test]
fn readers_see_complete_snapshots_during_writes() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DocumentStore::open_dir(dir.path()).unwrap());

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for n in 0..50 {
                store
                    .create::<Value>(Collection::Votes, &json!({ "n": n }))
                    .unwrap();
            }
        })
    };

    let mut last_seen = 0;
    while !writer.is_finished() {
        let count = store.get_all::<Value>(Collection::Votes).unwrap().len();
        assert!(count >= last_seen);
        last_seen = count;
    }
    writer.join().unwrap();
    assert_eq!(store.get_all::<Value>(Collection::Votes).unwrap().len(), 50);
}

#[test]
fn try_lock_policy_surfaces_busy_instead_of_dropping_write() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(dir.path())
        .with_lock_policy(LockPolicy::TryFor(Duration::from_millis(0)));
    let store = Arc::new(DocumentStore::open(config).unwrap());

    let start = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|writer| {
            let store = Arc::clone(&store);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                let mut outcomes = Vec::new();
                for n in 0..200 {
                    outcomes.push(
                        store
                            .create::<Value>(Collection::Tracks, &json!({ "writer": writer, "n": n }))
                            .map(|record| record.id),
                    );
                }
                outcomes
            })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        for outcome in handle.join().unwrap() {
            match outcome {
                Ok(_) => succeeded += 1,
                Err(StoreError::Busy { collection }) => {
                    assert_eq!(collection, Collection::Tracks)
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
    }

    let persisted = store.get_all::<Value>(Collection::Tracks).unwrap().len();
    assert_eq!(persisted, succeeded);
}

#[test]
fn separate_instances_on_one_directory_keep_the_artifact_readable() {
    let dir = tempfile::tempdir().unwrap();
    let stores: Vec<Arc<DocumentStore>> = (0..2)
        .map(|_| Arc::new(DocumentStore::open_dir(dir.path()).unwrap()))
        .collect();
    let start = Arc::new(Barrier::new(stores.len()));

    let handles: Vec<_> = stores
        .iter()
        .enumerate()
        .map(|(writer, store)| {
            let store = Arc::clone(store);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                for n in 0..40 {
                    store
                        .create::<Value>(Collection::Playlists, &json!({ "writer": writer, "n": n }))
                        .unwrap();
                    store.export(Collection::Playlists).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let persisted = stores[0].get_all::<Value>(Collection::Playlists).unwrap();
    assert!(!persisted.is_empty());
    let leftovers: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "stray temp files: {leftovers:?}");
}
