//! Property-Based Tests for the Cache Pool
//!
//! Uses proptest to check the pool contract against every backend.

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

use crate::cache::remote::tests::FakeKv;
use crate::cache::{
    Backend, CacheItem, CachePool, FileBackend, MemoryBackend, MemoryStore, RemoteBackend,
};

// == Strategies ==
/// Generates valid cache keys
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_.-]{1,48}"
}

/// Generates string values, including empty and whitespace-heavy ones
fn valid_value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 \n\t]{0,128}"
}

/// Generates structured JSON values
fn json_value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z ]{0,16}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

#[derive(Debug, Clone)]
enum CacheOp {
    Save { key: String, value: String },
    Get { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    let key = "[a-e]{1,2}";
    prop_oneof![
        (key, valid_value_strategy()).prop_map(|(key, value)| CacheOp::Save { key, value }),
        key.prop_map(|key| CacheOp::Get { key }),
        key.prop_map(|key| CacheOp::Delete { key }),
    ]
}

// == Helpers ==
fn item(key: &str, value: impl serde::Serialize) -> CacheItem {
    let mut item = CacheItem::new(key);
    item.set(value).unwrap();
    item
}

fn memory_pool(namespace: &str) -> CachePool<MemoryBackend> {
    let store = Arc::new(MemoryStore::new());
    CachePool::new(MemoryBackend::with_store(store, namespace).unwrap())
}

/// Saves then reads back through `pool`, returning the read item.
fn roundtrip<B: Backend>(pool: &mut CachePool<B>, key: &str, value: &Value) -> CacheItem {
    assert!(pool.save(item(key, value)).unwrap());
    pool.get_item(key).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Saving then reading returns a hit carrying the same value.
    #[test]
    fn prop_roundtrip_memory(key in valid_key_strategy(), value in json_value_strategy()) {
        let mut pool = memory_pool("props");
        let got = roundtrip(&mut pool, &key, &value);
        prop_assert!(got.is_hit());
        prop_assert_eq!(got.get(), &value);
    }

    #[test]
    fn prop_roundtrip_remote(key in valid_key_strategy(), value in json_value_strategy()) {
        let mut pool = CachePool::new(RemoteBackend::new(FakeKv::default(), "props").unwrap());
        let got = roundtrip(&mut pool, &key, &value);
        prop_assert!(got.is_hit());
        prop_assert_eq!(got.get(), &value);
    }

    // Overwriting a key makes the later value visible.
    #[test]
    fn prop_overwrite(key in valid_key_strategy(), first in valid_value_strategy(), second in valid_value_strategy()) {
        let mut pool = memory_pool("props");
        pool.save(item(&key, &first)).unwrap();
        pool.save(item(&key, &second)).unwrap();
        let got = pool.get_item(&key).unwrap();
        prop_assert_eq!(got.get(), &Value::from(second));
    }

    // Deleting an existing key makes the next lookup a miss.
    #[test]
    fn prop_delete_removes_entry(key in valid_key_strategy(), value in valid_value_strategy()) {
        let mut pool = memory_pool("props");
        pool.save(item(&key, &value)).unwrap();
        prop_assert!(pool.has_item(&key).unwrap());

        prop_assert!(pool.delete_item(&key).unwrap());
        let got = pool.get_item(&key).unwrap();
        prop_assert!(!got.is_hit());
        prop_assert!(got.get().is_null());
    }

    // A key saved in one namespace is invisible from another.
    #[test]
    fn prop_namespace_isolation(key in valid_key_strategy(), value in valid_value_strategy()) {
        let store = Arc::new(MemoryStore::new());
        let mut left = CachePool::new(MemoryBackend::with_store(Arc::clone(&store), "left").unwrap());
        let mut right = CachePool::new(MemoryBackend::with_store(store, "right").unwrap());

        left.save(item(&key, &value)).unwrap();
        prop_assert!(!right.get_item(&key).unwrap().is_hit());

        let kv = FakeKv::default();
        let mut left = CachePool::new(RemoteBackend::new(kv.clone(), "left").unwrap());
        let mut right = CachePool::new(RemoteBackend::new(kv, "right").unwrap());
        left.save(item(&key, &value)).unwrap();
        prop_assert!(!right.get_item(&key).unwrap().is_hit());
    }

    // Hit and miss counters match what callers observed.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let mut pool = memory_pool("props");
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Save { key, value } => {
                    pool.save(item(&key, value)).unwrap();
                }
                CacheOp::Get { key } => {
                    if pool.get_item(&key).unwrap().is_hit() {
                        expected_hits += 1;
                    } else {
                        expected_misses += 1;
                    }
                }
                CacheOp::Delete { key } => {
                    pool.delete_item(&key).unwrap();
                }
            }
        }

        let stats = pool.stats();
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
    }

    // Items queued with save_deferred only reach storage on commit.
    #[test]
    fn prop_deferred_commit(keys in prop::collection::hash_set(valid_key_strategy(), 1..10)) {
        let store = Arc::new(MemoryStore::new());
        let mut writer = CachePool::new(MemoryBackend::with_store(Arc::clone(&store), "props").unwrap());
        let mut reader = CachePool::new(MemoryBackend::with_store(store, "props").unwrap());

        for key in &keys {
            prop_assert!(writer.save_deferred(item(key, key)).unwrap());
        }
        for key in &keys {
            prop_assert!(!reader.has_item(key).unwrap());
        }

        prop_assert!(writer.commit().unwrap());
        for key in &keys {
            let got = reader.get_item(key).unwrap();
            prop_assert_eq!(got.get(), &Value::from(key.as_str()));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    // Encrypted records survive a write and a read from a fresh instance.
    #[test]
    fn prop_roundtrip_file(key in valid_key_strategy(), value in json_value_strategy()) {
        let dir = TempDir::new().unwrap();
        let mut writer = CachePool::new(FileBackend::new(dir.path(), "props").unwrap());
        prop_assert!(writer.save(item(&key, &value)).unwrap());
        drop(writer);

        let mut reader = CachePool::new(FileBackend::new(dir.path(), "props").unwrap());
        let got = reader.get_item(&key).unwrap();
        prop_assert!(got.is_hit());
        prop_assert_eq!(got.get(), &value);
    }
}
