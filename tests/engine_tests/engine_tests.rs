//! Tests for Engine
//!
//! These tests verify:
//! - Every structure a tag call writes
//! - Repeated tag/untag and the global counter asymmetry
//! - Tag/untag round trips
//! - Argument resolution errors
//! - Serialized mode under concurrent callers, and the lost cache update
//!   it prevents
//! - Store errors surfacing mid-mutation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use tagsmith::config::{Atomicity, Config};
use tagsmith::engine::Engine;
use tagsmith::error::{Result, TagError};
use tagsmith::registry::{Registry, ResourceKind};
use tagsmith::resource::Resource;
use tagsmith::store::{MemoryStore, ScoredMember, Store, StoreOp};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_engine() -> Engine<MemoryStore> {
    Engine::with_store(MemoryStore::new())
}

fn members(engine: &Engine<MemoryStore>, key: &str) -> Vec<String> {
    let mut members = engine.store().smembers(key).unwrap();
    members.sort();
    members
}

fn score(engine: &Engine<MemoryStore>, key: &str, member: &str) -> Option<f64> {
    engine.store().zscore(key, member).unwrap()
}

fn cache(engine: &Engine<MemoryStore>, user: &str, item: &str) -> Option<Vec<String>> {
    let key = format!("USERS:{}:ITEMS:TAGS", user);
    engine
        .store()
        .hget(&key, item)
        .unwrap()
        .map(|json| serde_json::from_str(&json).unwrap())
}

fn ruby() -> (Resource, Resource, Resource) {
    (Resource::user("1"), Resource::item("5"), Resource::tag("ruby"))
}

// =============================================================================
// Tag Tests
// =============================================================================

#[test]
fn test_tag_writes_every_structure() {
    let engine = setup_engine();
    let (user, item, tag) = ruby();

    engine.tag(&user, &item, &tag).unwrap();

    assert_eq!(members(&engine, "USERS:1:ITEMS"), vec!["5"]);
    assert_eq!(members(&engine, "ITEMS:5:USERS"), vec!["1"]);
    assert_eq!(members(&engine, "TAGS:ruby:USERS"), vec!["1"]);
    assert_eq!(members(&engine, "TAGS:ruby:ITEMS"), vec!["5"]);
    assert_eq!(members(&engine, "USERS:1:tag:ruby:ITEMS"), vec!["5"]);
    assert_eq!(score(&engine, "USERS:1:TAGS", "ruby"), Some(1.0));
    assert_eq!(score(&engine, "ITEMS:5:TAGS", "ruby"), Some(1.0));
    assert_eq!(score(&engine, "TAGS:tags", "ruby"), Some(1.0));
    assert_eq!(cache(&engine, "1", "5"), Some(vec!["ruby".to_string()]));
}

#[test]
fn test_tag_accepts_any_argument_order() {
    let engine = setup_engine();
    let (user, item, tag) = ruby();

    engine.tag(&tag, &user, &item).unwrap();

    assert_eq!(members(&engine, "USERS:1:tag:ruby:ITEMS"), vec!["5"]);
    assert_eq!(score(&engine, "ITEMS:5:TAGS", "ruby"), Some(1.0));
}

#[test]
fn test_tag_twice_counts_once_per_user_and_item() {
    let engine = setup_engine();
    let (user, item, tag) = ruby();

    engine.tag(&user, &item, &tag).unwrap();
    engine.tag(&user, &item, &tag).unwrap();

    assert_eq!(members(&engine, "USERS:1:ITEMS"), vec!["5"]);
    assert_eq!(members(&engine, "ITEMS:5:USERS"), vec!["1"]);
    assert_eq!(members(&engine, "USERS:1:tag:ruby:ITEMS"), vec!["5"]);
    assert_eq!(score(&engine, "USERS:1:TAGS", "ruby"), Some(1.0));
    assert_eq!(score(&engine, "ITEMS:5:TAGS", "ruby"), Some(1.0));
    // The global counter moves on every call
    assert_eq!(score(&engine, "TAGS:tags", "ruby"), Some(2.0));
    assert_eq!(cache(&engine, "1", "5"), Some(vec!["ruby".to_string()]));
}

#[test]
fn test_popularity_counts_distinct_items_and_users() {
    let engine = setup_engine();
    let tag = Resource::tag("rust");

    engine.tag(&Resource::user("1"), &Resource::item("5"), &tag).unwrap();
    engine.tag(&Resource::user("1"), &Resource::item("6"), &tag).unwrap();
    engine.tag(&Resource::user("2"), &Resource::item("5"), &tag).unwrap();

    assert_eq!(score(&engine, "USERS:1:TAGS", "rust"), Some(2.0));
    assert_eq!(score(&engine, "USERS:2:TAGS", "rust"), Some(1.0));
    assert_eq!(score(&engine, "ITEMS:5:TAGS", "rust"), Some(2.0));
    assert_eq!(score(&engine, "ITEMS:6:TAGS", "rust"), Some(1.0));
    assert_eq!(score(&engine, "TAGS:tags", "rust"), Some(3.0));
    assert_eq!(members(&engine, "TAGS:rust:USERS"), vec!["1", "2"]);
}

#[test]
fn test_cache_collects_several_tags() {
    let engine = setup_engine();
    let (user, item) = (Resource::user("1"), Resource::item("5"));

    engine.tag(&user, &item, &Resource::tag("ruby")).unwrap();
    engine.tag(&user, &item, &Resource::tag("git")).unwrap();
    engine.tag(&user, &item, &Resource::tag("ruby")).unwrap();

    let mut tags = cache(&engine, "1", "5").unwrap();
    tags.sort();
    assert_eq!(tags, vec!["git", "ruby"]);
}

// =============================================================================
// Untag Tests
// =============================================================================

#[test]
fn test_tag_then_untag_restores_state() {
    let engine = setup_engine();
    let (user, item, tag) = ruby();

    engine.tag(&user, &item, &tag).unwrap();
    engine.untag(&user, &item, &tag).unwrap();

    assert!(members(&engine, "USERS:1:ITEMS").is_empty());
    assert!(members(&engine, "ITEMS:5:USERS").is_empty());
    assert!(members(&engine, "TAGS:ruby:USERS").is_empty());
    assert!(members(&engine, "TAGS:ruby:ITEMS").is_empty());
    assert!(members(&engine, "USERS:1:tag:ruby:ITEMS").is_empty());
    assert_eq!(score(&engine, "USERS:1:TAGS", "ruby"), None);
    assert_eq!(score(&engine, "ITEMS:5:TAGS", "ruby"), None);
    assert_eq!(score(&engine, "TAGS:tags", "ruby"), None);
    assert_eq!(cache(&engine, "1", "5"), None);
    assert_eq!(engine.store().key_count(), 0);
}

#[test]
fn test_untag_keeps_other_tags_in_cache() {
    let engine = setup_engine();
    let (user, item) = (Resource::user("1"), Resource::item("5"));

    engine.tag(&user, &item, &Resource::tag("ruby")).unwrap();
    engine.tag(&user, &item, &Resource::tag("git")).unwrap();
    engine.untag(&user, &item, &Resource::tag("ruby")).unwrap();

    assert_eq!(cache(&engine, "1", "5"), Some(vec!["git".to_string()]));
    assert_eq!(score(&engine, "USERS:1:TAGS", "git"), Some(1.0));
    assert_eq!(score(&engine, "USERS:1:TAGS", "ruby"), None);
}

#[test]
fn test_untag_removes_pair_membership_even_with_other_tags_left() {
    let engine = setup_engine();
    let (user, item) = (Resource::user("1"), Resource::item("5"));

    engine.tag(&user, &item, &Resource::tag("ruby")).unwrap();
    engine.tag(&user, &item, &Resource::tag("git")).unwrap();
    engine.untag(&user, &item, &Resource::tag("ruby")).unwrap();

    // Plain memberships follow the last call, not the remaining tags
    assert!(members(&engine, "USERS:1:ITEMS").is_empty());
    assert!(members(&engine, "ITEMS:5:USERS").is_empty());
    assert_eq!(members(&engine, "TAGS:git:ITEMS"), vec!["5"]);
    assert_eq!(members(&engine, "USERS:1:tag:git:ITEMS"), vec!["5"]);
}

#[test]
fn test_double_untag_only_moves_global_counter() {
    let engine = setup_engine();
    let (user, item, tag) = ruby();

    engine.tag(&user, &item, &tag).unwrap();
    engine.tag(&Resource::user("2"), &Resource::item("6"), &tag).unwrap();
    engine.tag(&Resource::user("2"), &Resource::item("6"), &tag).unwrap();
    assert_eq!(score(&engine, "TAGS:tags", "ruby"), Some(3.0));

    engine.untag(&user, &item, &tag).unwrap();
    assert_eq!(score(&engine, "TAGS:tags", "ruby"), Some(2.0));

    engine.untag(&user, &item, &tag).unwrap();
    assert_eq!(score(&engine, "TAGS:tags", "ruby"), Some(1.0));
    assert_eq!(score(&engine, "USERS:2:TAGS", "ruby"), Some(1.0));
    assert_eq!(score(&engine, "ITEMS:6:TAGS", "ruby"), Some(1.0));

    engine.untag(&user, &item, &tag).unwrap();
    assert_eq!(score(&engine, "TAGS:tags", "ruby"), None);
}

#[test]
fn test_untag_never_tagged_leaves_no_residue() {
    let engine = setup_engine();
    let (user, item, tag) = ruby();

    engine.untag(&user, &item, &tag).unwrap();

    assert_eq!(score(&engine, "USERS:1:TAGS", "ruby"), None);
    assert_eq!(score(&engine, "TAGS:tags", "ruby"), None);
    assert_eq!(engine.store().key_count(), 0);
}

// =============================================================================
// Resolution Errors
// =============================================================================

#[test]
fn test_tag_rejects_duplicate_kinds() {
    let engine = setup_engine();

    let result = engine.tag(&Resource::user("1"), &Resource::user("2"), &Resource::tag("ruby"));

    assert!(matches!(result, Err(TagError::InvalidResourceKind(_))));
    assert_eq!(engine.store().key_count(), 0);
}

#[test]
fn test_tag_rejects_unregistered_kind() {
    let registry = Registry::builder()
        .register(ResourceKind::User, "id", "USERS")
        .register(ResourceKind::Tag, "name", "TAGS")
        .build();
    let engine = Engine::new(Config::builder().registry(registry).build(), MemoryStore::new());
    let (user, item, tag) = ruby();

    let result = engine.untag(&user, &item, &tag);

    assert!(matches!(result, Err(TagError::InvalidResourceKind(_))));
    assert_eq!(engine.store().key_count(), 0);
}

#[test]
fn test_custom_namespaces_shape_keys() {
    let registry = Registry::builder()
        .register(ResourceKind::User, "login", "U")
        .register(ResourceKind::Item, "sku", "I")
        .register(ResourceKind::Tag, "label", "T")
        .build();
    let engine = Engine::new(Config::builder().registry(registry).build(), MemoryStore::new());

    engine
        .tag(&Resource::user("ann"), &Resource::item("x1"), &Resource::tag("new"))
        .unwrap();

    assert_eq!(
        engine.store().keys(),
        vec![
            "I:x1:T", "I:x1:U", "T:new:I", "T:new:U", "T:tags", "U:ann:I", "U:ann:I:T",
            "U:ann:T", "U:ann:tag:new:I",
        ]
    );
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_serialized_mode_keeps_every_cache_update() {
    let config = Config::builder().atomicity(Atomicity::Serialized).build();
    let engine = Arc::new(Engine::new(config, MemoryStore::new()));

    let mut handles = vec![];
    for t in 0..8 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            for round in 0..25 {
                let tag = Resource::tag(format!("t{}-{}", t, round % 5));
                engine.tag(&Resource::user("1"), &Resource::item("5"), &tag).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache(&engine, "1", "5").unwrap().len(), 40);
    let ranked = engine.store().zrevrange("USERS:1:TAGS", 0, -1).unwrap();
    assert_eq!(ranked.len(), 40);
    assert!(ranked.iter().all(|s| s.score == 1.0));
}

#[test]
fn test_concurrent_distinct_pairs_best_effort() {
    let engine = Arc::new(setup_engine());

    let mut handles = vec![];
    for u in 0..4 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            for i in 0..10 {
                engine
                    .tag(
                        &Resource::user(u.to_string()),
                        &Resource::item(i.to_string()),
                        &Resource::tag("shared"),
                    )
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // Distinct (user, item) pairs never contend on the same cache field
    assert_eq!(score(&engine, "TAGS:tags", "shared"), Some(40.0));
    assert_eq!(members(&engine, "TAGS:shared:USERS").len(), 4);
    assert_eq!(members(&engine, "TAGS:shared:ITEMS").len(), 10);
    assert_eq!(score(&engine, "ITEMS:3:TAGS", "shared"), Some(4.0));
}

/// Delegates to a MemoryStore; every `hget` pauses for `hold` and then
/// waits at `gate` once it has read
struct GatedCacheStore {
    inner: MemoryStore,
    gate: Option<Barrier>,
    hold: Duration,
}

impl Store for GatedCacheStore {
    fn sadd(&self, key: &str, member: &str) -> Result<bool> {
        self.inner.sadd(key, member)
    }
    fn srem(&self, key: &str, member: &str) -> Result<bool> {
        self.inner.srem(key, member)
    }
    fn smembers(&self, key: &str) -> Result<Vec<String>> {
        self.inner.smembers(key)
    }
    fn sinter(&self, keys: &[String]) -> Result<Vec<String>> {
        self.inner.sinter(keys)
    }
    fn zincrby(&self, key: &str, delta: f64, member: &str) -> Result<f64> {
        self.inner.zincrby(key, delta, member)
    }
    fn zrem(&self, key: &str, member: &str) -> Result<bool> {
        self.inner.zrem(key, member)
    }
    fn zrevrange(&self, key: &str, start: usize, stop: i64) -> Result<Vec<ScoredMember>> {
        self.inner.zrevrange(key, start, stop)
    }
    fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>> {
        self.inner.zscore(key, member)
    }
    fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let value = self.inner.hget(key, field)?;
        thread::sleep(self.hold);
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        Ok(value)
    }
    fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        self.inner.hset(key, field, value)
    }
    fn hdel(&self, key: &str, field: &str) -> Result<bool> {
        self.inner.hdel(key, field)
    }
    fn atomic(&self, ops: Vec<StoreOp>) -> Result<()> {
        self.inner.atomic(ops)
    }
}

/// Tag (user 1, item 5) with "a" and "b" from two threads at once
fn tag_pair_concurrently(engine: Engine<GatedCacheStore>) -> Engine<GatedCacheStore> {
    let engine = Arc::new(engine);

    let handles: Vec<_> = ["a", "b"]
        .into_iter()
        .map(|name| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                engine
                    .tag(&Resource::user("1"), &Resource::item("5"), &Resource::tag(name))
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    match Arc::try_unwrap(engine) {
        Ok(engine) => engine,
        Err(_) => panic!("engine still shared"),
    }
}

fn cached_tags(engine: &Engine<GatedCacheStore>) -> Vec<String> {
    let json = engine.store().inner.hget("USERS:1:ITEMS:TAGS", "5").unwrap().unwrap();
    serde_json::from_str(&json).unwrap()
}

#[test]
fn test_best_effort_cache_loses_interleaved_update() {
    let store = GatedCacheStore {
        inner: MemoryStore::new(),
        gate: Some(Barrier::new(2)),
        hold: Duration::ZERO,
    };

    // Both callers read the empty cache before either writes it back
    let engine = tag_pair_concurrently(Engine::with_store(store));

    let tags = cached_tags(&engine);
    assert_eq!(tags.len(), 1);
    assert!(tags[0] == "a" || tags[0] == "b");

    // Every other structure saw both taggings
    let inner = &engine.store().inner;
    assert_eq!(inner.zscore("USERS:1:TAGS", "a").unwrap(), Some(1.0));
    assert_eq!(inner.zscore("USERS:1:TAGS", "b").unwrap(), Some(1.0));
}

#[test]
fn test_serialized_cache_keeps_interleaved_update() {
    let store = GatedCacheStore {
        inner: MemoryStore::new(),
        gate: None,
        hold: Duration::from_millis(20),
    };
    let config = Config::builder().atomicity(Atomicity::Serialized).build();

    let engine = tag_pair_concurrently(Engine::new(config, store));

    let mut tags = cached_tags(&engine);
    tags.sort();
    assert_eq!(tags, vec!["a", "b"]);
}

// =============================================================================
// Store Failure Tests
// =============================================================================

/// Delegates to a MemoryStore but fails every atomic batch once armed
struct FailingBatchStore {
    inner: MemoryStore,
    fail: AtomicBool,
}

impl Store for FailingBatchStore {
    fn sadd(&self, key: &str, member: &str) -> Result<bool> {
        self.inner.sadd(key, member)
    }
    fn srem(&self, key: &str, member: &str) -> Result<bool> {
        self.inner.srem(key, member)
    }
    fn smembers(&self, key: &str) -> Result<Vec<String>> {
        self.inner.smembers(key)
    }
    fn sinter(&self, keys: &[String]) -> Result<Vec<String>> {
        self.inner.sinter(keys)
    }
    fn zincrby(&self, key: &str, delta: f64, member: &str) -> Result<f64> {
        self.inner.zincrby(key, delta, member)
    }
    fn zrem(&self, key: &str, member: &str) -> Result<bool> {
        self.inner.zrem(key, member)
    }
    fn zrevrange(&self, key: &str, start: usize, stop: i64) -> Result<Vec<ScoredMember>> {
        self.inner.zrevrange(key, start, stop)
    }
    fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>> {
        self.inner.zscore(key, member)
    }
    fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.inner.hget(key, field)
    }
    fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        self.inner.hset(key, field, value)
    }
    fn hdel(&self, key: &str, field: &str) -> Result<bool> {
        self.inner.hdel(key, field)
    }
    fn atomic(&self, ops: Vec<StoreOp>) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TagError::Store("connection reset".to_string()));
        }
        self.inner.atomic(ops)
    }
}

#[test]
fn test_store_error_propagates_and_earlier_steps_stay_applied() {
    let store = FailingBatchStore {
        inner: MemoryStore::new(),
        fail: AtomicBool::new(true),
    };
    let engine = Engine::with_store(store);
    let (user, item, tag) = ruby();

    let result = engine.tag(&user, &item, &tag);

    match result {
        Err(TagError::Store(message)) => assert_eq!(message, "connection reset"),
        other => panic!("expected store error, got {:?}", other),
    }
    let inner = &engine.store().inner;
    assert_eq!(inner.smembers("USERS:1:tag:ruby:ITEMS").unwrap(), vec!["5"]);
    assert!(inner.smembers("USERS:1:ITEMS").unwrap().is_empty());
    assert_eq!(inner.hget("USERS:1:ITEMS:TAGS", "5").unwrap(), None);
}

#[test]
fn test_retry_after_failed_batch_skips_per_user_counter() {
    let store = FailingBatchStore {
        inner: MemoryStore::new(),
        fail: AtomicBool::new(true),
    };
    let engine = Engine::with_store(store);
    let (user, item, tag) = ruby();

    assert!(engine.tag(&user, &item, &tag).is_err());
    engine.store().fail.store(false, Ordering::SeqCst);
    engine.tag(&user, &item, &tag).unwrap();

    // The scoped add already happened, so the retry is not "new for user"
    let inner = &engine.store().inner;
    assert_eq!(inner.zscore("USERS:1:TAGS", "ruby").unwrap(), None);
    assert_eq!(inner.zscore("TAGS:tags", "ruby").unwrap(), Some(1.0));
    assert_eq!(inner.smembers("USERS:1:ITEMS").unwrap(), vec!["5"]);
}

#[test]
fn test_engine_over_shared_store() {
    let store = Arc::new(MemoryStore::new());
    let writer = Engine::with_store(Arc::clone(&store));
    let reader = Engine::with_store(Arc::clone(&store));
    let (user, item, tag) = ruby();

    writer.tag(&user, &item, &tag).unwrap();

    let ranked = reader
        .get_for(&user, ResourceKind::Tag, tagsmith::Conditions::new())
        .unwrap();
    assert_eq!(ranked.scored().unwrap(), &[ScoredMember::new("ruby", 1.0)]);
}
