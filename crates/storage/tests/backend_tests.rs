//! Behaviour shared by every storage backend
//!
//! Each test runs against all four bundled backends:
//! - Round-trip of bytes, text and JSON
//! - Bucket lifecycle idempotence
//! - Prefix filtering of listings
//! - Version growth, sequential and concurrent

use std::collections::HashSet;
use std::thread;

use serde_json::json;
use stow_core::Store;
use stow_storage::{AnyStore, StorageConfig};
use tempfile::TempDir;

// ============================================================================
// Helper Functions
// ============================================================================

/// Every backend, each with a fresh bucket named "b"
fn all_backends(dir: &TempDir) -> Vec<(&'static str, AnyStore)> {
    let backends = vec![
        ("memory", StorageConfig::memory()),
        ("versioned-memory", StorageConfig::memory().versioned()),
        ("file", StorageConfig::file(dir.path().join("plain"))),
        ("versioned-file", StorageConfig::file(dir.path().join("versioned")).versioned()),
    ];
    backends
        .into_iter()
        .map(|(name, config)| {
            let store = config.open().unwrap();
            assert!(store.create_bucket("b", "", false), "{name}: create bucket");
            (name, store)
        })
        .collect()
}

fn versioned_backends(dir: &TempDir) -> Vec<(&'static str, AnyStore)> {
    all_backends(dir)
        .into_iter()
        .filter(|(_, store)| store.is_versioned())
        .collect()
}

// ============================================================================
// Round Trip
// ============================================================================

mod round_trip {
    use super::*;

    #[test]
    fn test_bytes_are_exact() {
        let dir = TempDir::new().unwrap();
        let data: Vec<u8> = (0..=255u8).collect();
        for (name, store) in all_backends(&dir) {
            assert!(store.write_bytes("b", "bin", &data).unwrap(), "{name}");
            assert_eq!(store.load_bytes("b", "bin").unwrap().unwrap(), data, "{name}");
        }
    }

    #[test]
    fn test_text_is_exact() {
        let dir = TempDir::new().unwrap();
        let text = "line one\nline two ünïcödé";
        for (name, store) in all_backends(&dir) {
            assert!(store.write_text("b", "nested/key.txt", text).unwrap(), "{name}");
            assert_eq!(store.load_text("b", "nested/key.txt").unwrap().as_deref(), Some(text), "{name}");
            assert!(store.exists("b", "nested/key.txt"), "{name}");
        }
    }

    #[test]
    fn test_json_and_text_fallback() {
        let dir = TempDir::new().unwrap();
        for (name, store) in all_backends(&dir) {
            let doc = json!({"name": "ada", "tags": [1, 2]});
            assert!(store.write_json("b", "doc.json", &doc).unwrap(), "{name}");
            store.write_text("b", "plain", "not json").unwrap();
            assert_eq!(store.load_json("b", "doc.json").unwrap().unwrap(), doc, "{name}");
            assert_eq!(store.load_json("b", "plain").unwrap().unwrap(), json!("not json"), "{name}");
        }
    }

    #[test]
    fn test_missing_key_is_none() {
        let dir = TempDir::new().unwrap();
        for (name, store) in all_backends(&dir) {
            assert!(store.read("b", "missing").unwrap().is_none(), "{name}");
            assert!(!store.exists("b", "missing"), "{name}");
            assert!(!store.delete("b", "missing"), "{name}");
        }
    }

    #[test]
    fn test_overwrite_replaces_value() {
        let dir = TempDir::new().unwrap();
        for (name, store) in all_backends(&dir) {
            store.write_text("b", "k", "first").unwrap();
            store.write_text("b", "k", "second").unwrap();
            assert_eq!(store.load_text("b", "k").unwrap().as_deref(), Some("second"), "{name}");
            assert_eq!(store.list("b", "").count(), 1, "{name}");
        }
    }
}

// ============================================================================
// Buckets
// ============================================================================

mod buckets {
    use super::*;

    #[test]
    fn test_create_is_idempotent() {
        let dir = TempDir::new().unwrap();
        for (name, store) in all_backends(&dir) {
            store.write_text("b", "k", "kept").unwrap();
            assert!(!store.create_bucket("b", "", false), "{name}");
            assert_eq!(store.load_text("b", "k").unwrap().as_deref(), Some("kept"), "{name}");
        }
    }

    #[test]
    fn test_delete_absent_is_false() {
        let dir = TempDir::new().unwrap();
        for (name, store) in all_backends(&dir) {
            assert!(store.delete_bucket("b"), "{name}");
            assert!(!store.delete_bucket("b"), "{name}");
            assert!(!store.write_text("b", "k", "v").unwrap(), "{name}");
            assert_eq!(store.list("b", "").count(), 0, "{name}");
        }
    }
}

// ============================================================================
// Listing
// ============================================================================

mod listing {
    use super::*;

    #[test]
    fn test_prefix_filter() {
        let dir = TempDir::new().unwrap();
        for (name, store) in all_backends(&dir) {
            for i in 0..20 {
                let key = format!("{}/{}", i % 2, i);
                assert!(store.write_text("b", &key, &i.to_string()).unwrap(), "{name}");
            }
            let ones: Vec<(String, String)> = store.entries("b", "1/").collect();
            assert_eq!(ones.len(), 10, "{name}");
            assert!(ones.iter().all(|(k, _)| k.starts_with("1/")), "{name}");
            assert_eq!(store.list("b", "").count(), 20, "{name}");
        }
    }

    #[test]
    fn test_listing_is_restartable() {
        let dir = TempDir::new().unwrap();
        for (name, store) in all_backends(&dir) {
            for k in ["a", "b", "c"] {
                store.write_text("b", k, k).unwrap();
            }
            let first: HashSet<String> = store.list("b", "").map(|e| store.key_of(&e)).collect();
            let second: HashSet<String> = store.list("b", "").map(|e| store.key_of(&e)).collect();
            assert_eq!(first, second, "{name}");
            assert_eq!(first.len(), 3, "{name}");
        }
    }
}

// ============================================================================
// Versions
// ============================================================================

mod versions {
    use super::*;

    #[test]
    fn test_sequential_growth() {
        let dir = TempDir::new().unwrap();
        for (name, store) in versioned_backends(&dir) {
            for i in 0..10 {
                store.write_text("b", "k", &format!("v{i}")).unwrap();
            }
            let versioned = store.as_versioned().unwrap();
            let ids: Vec<_> = versioned.versions("b", "k").collect();
            assert_eq!(ids.len(), 10, "{name}");
            assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 10, "{name}");

            let latest = versioned.data_at_version("b", "k", &ids[0]).unwrap();
            assert_eq!(
                store.decode_text(&latest),
                store.load_text("b", "k").unwrap().unwrap(),
                "{name}"
            );
            // Oldest generation is still intact
            assert_eq!(versioned.text_at_version("b", "k", &ids[9]).as_deref(), Some("v0"), "{name}");
        }
    }

    #[test]
    fn test_concurrent_writers_keep_every_version() {
        let dir = TempDir::new().unwrap();
        for (name, store) in versioned_backends(&dir) {
            let writers = 8;
            let per_writer = 25;
            thread::scope(|s| {
                for w in 0..writers {
                    let store = &store;
                    s.spawn(move || {
                        for i in 0..per_writer {
                            assert!(store.write_text("b", "hot", &format!("{w}-{i}")).unwrap());
                        }
                    });
                }
            });
            let versioned = store.as_versioned().unwrap();
            let contents: HashSet<String> = versioned
                .versions("b", "hot")
                .filter_map(|id| versioned.text_at_version("b", "hot", &id))
                .collect();
            assert_eq!(contents.len(), writers * per_writer, "{name}");
        }
    }

    #[test]
    fn test_delete_drops_history() {
        let dir = TempDir::new().unwrap();
        for (name, store) in versioned_backends(&dir) {
            store.write_text("b", "k", "1").unwrap();
            store.write_text("b", "k", "2").unwrap();
            assert!(store.delete("b", "k"), "{name}");
            let versioned = store.as_versioned().unwrap();
            assert!(versioned.latest_version("b", "k").is_none(), "{name}");
            assert!(store.read("b", "k").unwrap().is_none(), "{name}");
        }
    }
}
