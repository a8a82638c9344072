//! End-to-end tests for the layers over real backends
//!
//! - Time-series appends from concurrent writers and range queries
//! - Queue paging over a large prefix
//! - Schema enforcement over the file backend
//!
//! Range queries and paging run against the memory, file and versioned
//! file backends, since listing order comes from a different place in each.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use serde_json::{json, Value};
use stow_core::Store;
use stow_primitives::{
    BroadcastLog, SchemaDirectory, SchemaRegistry, TimeSeriesExt, TypedStore,
};
use stow_storage::{AnyStore, FileStore, MemoryStore, StorageConfig};
use tempfile::TempDir;

// ============================================================================
// Helper Functions
// ============================================================================

/// Memory, file and versioned file stores, each with a fresh `bucket`
fn backends(dir: &TempDir, bucket: &str) -> Vec<(&'static str, Arc<AnyStore>)> {
    [
        ("memory", StorageConfig::memory()),
        ("file", StorageConfig::file(dir.path().join("plain"))),
        ("versioned-file", StorageConfig::file(dir.path().join("versioned")).versioned()),
    ]
    .into_iter()
    .map(|(name, config)| {
        let store = config.open().unwrap();
        assert!(store.create_bucket(bucket, "", false), "{name}: create bucket");
        (name, Arc::new(store))
    })
    .collect()
}

// ============================================================================
// Time Series
// ============================================================================

mod time_series {
    use super::*;

    fn check_concurrent_appends<S: Store>(name: &str, store: &Arc<S>) {
        let log = store.time_series("ts", "foo", "MS").unwrap();
        let raw = b"hello".to_vec();

        let start = Utc::now().timestamp_millis();
        thread::scope(|s| {
            for _ in 0..5 {
                let log = log.clone();
                let raw = raw.clone();
                s.spawn(move || {
                    log.append(".txt", "hello").unwrap();
                    log.append(".bin", raw).unwrap();
                    log.append(".json", json!(["hello", "world"])).unwrap();
                    log.append(".json", json!({"a": 42})).unwrap();
                });
            }
        });
        assert_eq!(store.list("ts", "").count(), 20, "{name}");

        let distinct: HashSet<String> = store.all_text("ts", "").collect();
        assert_eq!(distinct.len(), 3, "{name}");

        let window_start = start - 1000;
        assert!(log.range_query(window_start, window_start - 1).is_empty(), "{name}");
        assert!(log.range_query(window_start, window_start).is_empty(), "{name}");

        let found = log.range_query(window_start, Utc::now().timestamp_millis() + 5000);
        assert_eq!(found.len(), 20, "{name}");
        let objects = found.iter().filter(|(_, v)| *v == json!({"a": 42})).count();
        assert_eq!(objects, 5, "{name}");
        let keys: HashSet<&String> = found.iter().map(|(k, _)| k).collect();
        assert_eq!(keys.len(), 20, "{name}");
    }

    #[test]
    fn test_concurrent_appends_and_range_query() {
        let dir = TempDir::new().unwrap();
        for (name, store) in backends(&dir, "ts") {
            check_concurrent_appends(name, &store);
        }
    }

    #[test]
    fn test_file_backend_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileStore::open(dir.path()).unwrap());
        store.create_bucket("events", "", false);
        let log = store.time_series("events", "app", "sec").unwrap();

        let start = Utc::now().timestamp_millis();
        let key = log.append("json", json!({"n": 1})).unwrap();
        assert!(store.exists("events", &key));

        let found = log.range_query(start, Utc::now().timestamp_millis() + 1);
        assert_eq!(found, vec![(key, json!({"n": 1}))]);
    }
}

// ============================================================================
// Broadcast Queue
// ============================================================================

mod broadcast {
    use super::*;

    /// Publish `total` messages from 4 writers, then read them back in two pages
    fn check_batched_read<S: Store>(name: &str, store: Arc<S>, total: usize) {
        let queue = BroadcastLog::new(store);
        let page = total / 2;

        thread::scope(|s| {
            for w in 0..4 {
                let queue = queue.clone();
                s.spawn(move || {
                    for i in 0..total / 4 {
                        queue.publish("topic", &format!("{w}-{i}")).unwrap();
                    }
                });
            }
        });
        assert_eq!(queue.store().list("topic", "").count(), total, "{name}");

        // Every key starts with a digit of the year, so "" covers them all
        let first = queue.consume("topic", "", page as u64, 0).unwrap();
        assert_eq!(first.data.len(), page, "{name}");
        assert_eq!(first.read_offset, Some(page as u64), "{name}");
        assert!(first.has_more_data, "{name}");

        let second = queue.consume("topic", "", page as u64, page as u64).unwrap();
        assert_eq!(second.data.len(), page, "{name}");
        assert_eq!(second.read_offset, None, "{name}");
        assert!(!second.has_more_data, "{name}");

        let keys: HashSet<&String> = first.data.iter().chain(second.data.iter()).map(|(k, _)| k).collect();
        assert_eq!(keys.len(), total, "{name}");
        let bodies: HashSet<&String> = first.data.iter().chain(second.data.iter()).map(|(_, v)| v).collect();
        assert_eq!(bodies.len(), total, "{name}");
    }

    #[test]
    fn test_batched_read() {
        let store = Arc::new(MemoryStore::new());
        store.create_bucket("topic", "", false);
        check_batched_read("memory", store, 10_000);
    }

    #[test]
    fn test_batched_read_durable_backends() {
        let dir = TempDir::new().unwrap();
        for (name, store) in backends(&dir, "topic") {
            if name != "memory" {
                check_batched_read(name, store, 2_000);
            }
        }
    }

    #[test]
    fn test_consume_prefix_counts_everything() {
        let store = Arc::new(MemoryStore::new());
        store.create_bucket("topic", "", false);
        let queue = BroadcastLog::with_node_id(Arc::clone(&store), "node-a");

        for i in 0..250 {
            queue.publish("topic", &i.to_string()).unwrap();
        }
        let mut bodies = HashSet::new();
        let total = queue
            .consume_prefix("topic", "", 100, |_, (_, body)| {
                bodies.insert(body);
                Ok::<_, String>(())
            })
            .unwrap();
        assert_eq!(total, 250);
        assert_eq!(bodies.len(), 250);
    }

    #[test]
    fn test_second_prefix_narrows() {
        let store = Arc::new(MemoryStore::new());
        store.create_bucket("topic", "", false);
        let queue = BroadcastLog::new(store);
        let key = queue.publish("topic", "x").unwrap();
        let (prefix, _) = key.rsplit_once('/').unwrap();

        let page = queue.consume("topic", prefix, 10, 0).unwrap();
        assert_eq!(page.data, vec![(key, "x".to_string())]);
        assert!(queue.consume("topic", "1999/", 10, 0).unwrap().data.is_empty());
    }
}

// ============================================================================
// Typed Store
// ============================================================================

mod typed {
    use super::*;

    const PERSON: &str = r#"{
        "type": "object",
        "required": ["name", "age"],
        "properties": {
            "name": {"type": "string"},
            "age": {"type": "integer", "minimum": 0}
        }
    }"#;

    fn typed_store(dir: &TempDir, verify_read: bool) -> TypedStore<FileStore, SchemaDirectory> {
        let schemas = dir.path().join("schemas");
        std::fs::create_dir_all(&schemas).unwrap();
        std::fs::write(schemas.join("Person.json"), PERSON).unwrap();

        let inner = FileStore::open(dir.path().join("data")).unwrap();
        inner.create_bucket("people", "", false);
        let registry = SchemaRegistry::new([("people/.*\\.json", "Person.json")], "/").unwrap();
        TypedStore::new(inner, registry, SchemaDirectory::new(schemas), verify_read)
    }

    #[test]
    fn test_valid_write_reaches_inner_store() {
        let dir = TempDir::new().unwrap();
        let store = typed_store(&dir, true);
        let ada = json!({"name": "ada", "age": 36});
        assert!(store.write_json("people", "ada.json", &ada).unwrap());
        assert_eq!(store.inner().load_json("people", "ada.json").unwrap(), Some(ada.clone()));
        assert_eq!(store.load_json("people", "ada.json").unwrap(), Some(ada));
    }

    #[test]
    fn test_invalid_write_leaves_inner_store_unmodified() {
        let dir = TempDir::new().unwrap();
        let store = typed_store(&dir, false);
        assert!(store.write_text("people", "bob.json", r#"{"name":"bob","age":1}"#).unwrap());

        let err = store
            .write_text("people", "bob.json", r#"{"name":"bob","age":-1}"#)
            .unwrap_err();
        assert!(err.is_schema_violation());
        let kept: Value = store.inner().load_json("people", "bob.json").unwrap().unwrap();
        assert_eq!(kept["age"], 1);
    }

    #[test]
    fn test_unmatched_keys_never_error() {
        let dir = TempDir::new().unwrap();
        let store = typed_store(&dir, true);
        assert!(store.write_text("people", "notes.txt", "free text").unwrap());
        assert_eq!(store.load_text("people", "notes.txt").unwrap().as_deref(), Some("free text"));
    }

    #[test]
    fn test_listing_passes_through() {
        let dir = TempDir::new().unwrap();
        let store = typed_store(&dir, false);
        store.write_json("people", "a.json", &json!({"name": "a", "age": 1})).unwrap();
        store.write_text("people", "b.txt", "b").unwrap();
        assert_eq!(store.list("people", "").count(), 2);
    }
}
