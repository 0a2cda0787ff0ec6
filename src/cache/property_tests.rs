//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check bound, liveness and notification properties over
//! random operation sequences.

use futures::{FutureExt, StreamExt};
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

use crate::cache::KeyedCache;
use crate::config::CacheConfig;
use crate::stream::EntryStream;

// == Strategies ==
fn key_strategy() -> impl Strategy<Value = u8> {
    0u8..32
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,8}".prop_map(|s| s)
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: u8, value: String },
    Get { key: u8 },
    Remove { key: u8 },
    Watch { key: u8 },
    Unwatch { key: u8 },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        4 => (key_strategy(), value_strategy()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        2 => key_strategy().prop_map(|key| CacheOp::Get { key }),
        1 => key_strategy().prop_map(|key| CacheOp::Remove { key }),
        1 => key_strategy().prop_map(|key| CacheOp::Watch { key }),
        1 => key_strategy().prop_map(|key| CacheOp::Unwatch { key }),
    ]
}

fn orphan_count(cache: &KeyedCache<u8, String>) -> usize {
    let stats = cache.stats();
    stats.total_entries - stats.listened_entries
}

/// Drains every item that is ready right now.
fn drain_ready(stream: &mut EntryStream<String>) -> Vec<String> {
    let mut items = Vec::new();
    while let Some(Some(item)) = stream.next().now_or_never() {
        items.push(item.expect("no loader in these tests"));
    }
    items
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Orphaned entries never exceed the size bound once a write creates an entry.
    // Cancelling a subscription orphans its entry without a pass, so the bound is
    // re-established by the next creating write.
    #[test]
    fn prop_orphan_bound_respected(
        size in 1usize..8,
        ops in prop::collection::vec(cache_op_strategy(), 1..80)
    ) {
        let cache: KeyedCache<u8, String> = KeyedCache::new(CacheConfig::new().with_size(size));
        let mut watchers: HashMap<u8, Vec<EntryStream<String>>> = HashMap::new();

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    let creating = !cache.contains_key(&key);
                    cache.set(key, value);
                    prop_assert!(
                        !creating || orphan_count(&cache) <= size,
                        "orphans {} exceed bound {}",
                        orphan_count(&cache),
                        size
                    );
                }
                CacheOp::Get { key } => {
                    cache.get(&key);
                }
                CacheOp::Remove { key } => {
                    cache.remove(&key);
                    watchers.remove(&key);
                }
                CacheOp::Watch { key } => {
                    watchers.entry(key).or_default().push(cache.watch(key));
                }
                CacheOp::Unwatch { key } => {
                    if let Some(streams) = watchers.get_mut(&key) {
                        streams.pop();
                    }
                }
            }
        }
    }

    // Entries with an active subscriber survive any number of writes.
    #[test]
    fn prop_listened_entries_never_evicted(
        size in 1usize..4,
        watched in prop::collection::hash_set(key_strategy(), 1..6),
        writes in prop::collection::vec((key_strategy(), value_strategy()), 1..100)
    ) {
        let cache: KeyedCache<u8, String> = KeyedCache::new(CacheConfig::new().with_size(size));
        let _streams: Vec<_> = watched.iter().map(|key| cache.watch(*key)).collect();

        for (key, value) in writes {
            cache.set(key, value);
            for key in &watched {
                prop_assert!(cache.contains_key(key), "watched key {} evicted", key);
            }
        }
    }

    // A subscriber sees exactly the distinct consecutive values, in write order.
    #[test]
    fn prop_notifications_follow_distinct_writes(
        values in prop::collection::vec("[ab]", 1..30)
    ) {
        let cache: KeyedCache<u8, String> = KeyedCache::new(CacheConfig::default());
        let mut stream = cache.watch(0);

        let mut expected: Vec<String> = Vec::new();
        for value in values {
            if expected.last() != Some(&value) {
                expected.push(value.clone());
            }
            cache.set(0, value);
        }

        prop_assert_eq!(drain_ready(&mut stream), expected);
    }

    // The last write wins and no duplicate entries are created.
    #[test]
    fn prop_overwrite_semantics(
        key in key_strategy(),
        value1 in value_strategy(),
        value2 in value_strategy()
    ) {
        let cache: KeyedCache<u8, String> = KeyedCache::new(CacheConfig::new().with_size(4));
        cache.set(key, value1);
        cache.set(key, value2.clone());

        prop_assert_eq!(cache.get(&key), Some(value2));
        prop_assert_eq!(cache.len(), 1);
    }

    // Without a bound nothing is evicted.
    #[test]
    fn prop_unbounded_keeps_every_key(
        writes in prop::collection::vec((key_strategy(), value_strategy()), 1..60)
    ) {
        let cache: KeyedCache<u8, String> = KeyedCache::new(CacheConfig::default());
        let mut keys = HashSet::new();
        for (key, value) in writes {
            keys.insert(key);
            cache.set(key, value);
        }

        prop_assert_eq!(cache.len(), keys.len());
        prop_assert_eq!(cache.stats().evictions, 0);
    }
}
