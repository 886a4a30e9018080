//! Engine Module
//!
//! The association engine that coordinates every write and read.
//!
//! ## Responsibilities
//! - Record and remove user/item/tag associations across six structures
//! - Keep popularity counters free of zero or negative residue
//! - Maintain the per-(user, item) tag cache
//! - Route queries to the dispatcher

use parking_lot::{Mutex, MutexGuard};

use crate::config::{Atomicity, Config};
use crate::error::{Result, TagError};
use crate::keys::KeyBuilder;
use crate::query::{Conditions, Dispatcher, QueryResult};
use crate::registry::{Registry, ResourceKind};
use crate::resource::{Resource, Target};
use crate::store::{Store, StoreOp};

/// The tagging engine
///
/// ## Mutation Model
///
/// A tag/untag call is three steps against the store:
/// 1. Check-and-add (or remove) on the user's scoped set for the tag
/// 2. One atomic batch of membership (and, on tag, counter) updates
/// 3. Read-modify-write of the per-(user, item) tag cache
///
/// Under `Atomicity::BestEffort` the steps are separate round trips and
/// concurrent calls may interleave between them. Under
/// `Atomicity::Serialized` the whole call holds `write_lock`.
///
/// The global tag counter moves on every call, while per-user and per-item
/// counters only move when step 1 changed the scoped set.
pub struct Engine<S: Store> {
    /// Engine configuration
    config: Config,

    /// Backing store
    store: S,

    /// Serializes whole mutations when configured to
    write_lock: Mutex<()>,
}

/// One user, one item and one tag, sorted into place by kind
#[derive(Debug)]
struct Association<'a> {
    user: &'a Resource,
    item: &'a Resource,
    tag: &'a Resource,
}

impl<'a> Association<'a> {
    /// Sort three resources into user/item/tag slots
    ///
    /// Fails unless there is exactly one registered resource of each kind.
    fn resolve(registry: &Registry, resources: [&'a Resource; 3]) -> Result<Self> {
        let (mut user, mut item, mut tag) = (None, None, None);

        for resource in resources {
            if !registry.is_registered(resource.kind()) {
                return Err(TagError::InvalidResourceKind(format!(
                    "{} is not a registered kind",
                    resource.kind()
                )));
            }
            let slot = match resource.kind() {
                ResourceKind::User => &mut user,
                ResourceKind::Item => &mut item,
                ResourceKind::Tag => &mut tag,
            };
            if slot.replace(resource).is_some() {
                return Err(TagError::InvalidResourceKind(format!(
                    "more than one {} given",
                    resource.kind()
                )));
            }
        }

        match (user, item, tag) {
            (Some(user), Some(item), Some(tag)) => Ok(Self { user, item, tag }),
            _ => Err(TagError::InvalidResourceKind(
                "a tagging needs one user, one item and one tag".to_string(),
            )),
        }
    }
}

impl<S: Store> Engine<S> {
    /// Create an engine over `store`
    pub fn new(config: Config, store: S) -> Self {
        Self {
            config,
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Create an engine with the default config
    pub fn with_store(store: S) -> Self {
        Self::new(Config::default(), store)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Record that a user tagged an item with a tag
    ///
    /// The three resources may come in any order.
    pub fn tag(&self, a: &Resource, b: &Resource, c: &Resource) -> Result<()> {
        let Association { user, item, tag } = Association::resolve(&self.config.registry, [a, b, c])?;
        let _guard = self.serialize();
        let keys = self.keys();

        tracing::debug!(user = user.id(), item = item.id(), tag = tag.id(), "tag");

        // Step 1: Check-and-add the item on the user's scoped set for this tag
        let is_new_for_user = self
            .store
            .sadd(&keys.scoped_items(user, tag.id())?, item.id())?;

        // Step 2: Memberships and counters as one batch
        let mut batch = vec![
            StoreOp::sadd(keys.members(user, ResourceKind::Item)?, item.id()),
            StoreOp::sadd(keys.members(item, ResourceKind::User)?, user.id()),
            StoreOp::sadd(keys.members(tag, ResourceKind::User)?, user.id()),
            StoreOp::sadd(keys.members(tag, ResourceKind::Item)?, item.id()),
        ];
        if is_new_for_user {
            batch.push(StoreOp::zincrby(keys.popularity(user)?, 1.0, tag.id()));
            batch.push(StoreOp::zincrby(keys.popularity(item)?, 1.0, tag.id()));
        }
        batch.push(StoreOp::zincrby(keys.global_tags()?, 1.0, tag.id()));
        self.store.atomic(batch)?;

        // Step 3: Add the tag to the (user, item) cache
        let mut tags = self.dispatcher().cached_tags(user, item)?;
        if !tags.iter().any(|t| t == tag.id()) {
            tags.push(tag.id().to_string());
        }
        self.store
            .hset(&keys.tag_cache(user)?, item.id(), &serde_json::to_string(&tags)?)?;

        Ok(())
    }

    /// Remove a user's tagging of an item with a tag
    ///
    /// The three resources may come in any order.
    pub fn untag(&self, a: &Resource, b: &Resource, c: &Resource) -> Result<()> {
        let Association { user, item, tag } = Association::resolve(&self.config.registry, [a, b, c])?;
        let _guard = self.serialize();
        let keys = self.keys();

        tracing::debug!(user = user.id(), item = item.id(), tag = tag.id(), "untag");

        // Step 1: Check-and-remove the item from the user's scoped set
        let was_removed = self
            .store
            .srem(&keys.scoped_items(user, tag.id())?, item.id())?;

        // Step 2: Memberships as one batch
        self.store.atomic(vec![
            StoreOp::srem(keys.members(user, ResourceKind::Item)?, item.id()),
            StoreOp::srem(keys.members(item, ResourceKind::User)?, user.id()),
            StoreOp::srem(keys.members(tag, ResourceKind::User)?, user.id()),
            StoreOp::srem(keys.members(tag, ResourceKind::Item)?, item.id()),
        ])?;

        // Step 3: Per-user and per-item counters, only if the scoped set changed
        if was_removed {
            self.decrement(&keys.popularity(user)?, tag.id())?;
            self.decrement(&keys.popularity(item)?, tag.id())?;
        }

        // Step 4: Global counter, always
        self.decrement(&keys.global_tags()?, tag.id())?;

        // Step 5: Drop the tag from the (user, item) cache
        let cache_key = keys.tag_cache(user)?;
        let mut tags = self.dispatcher().cached_tags(user, item)?;
        tags.retain(|t| t != tag.id());
        if tags.is_empty() {
            self.store.hdel(&cache_key, item.id())?;
        } else {
            self.store
                .hset(&cache_key, item.id(), &serde_json::to_string(&tags)?)?;
        }

        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Query for resources of `response` kind
    pub fn get(&self, response: ResourceKind, conditions: &Conditions) -> Result<QueryResult> {
        self.dispatcher().dispatch(response, conditions)
    }

    /// Query with the response kind given by name
    pub fn get_str(&self, response: &str, conditions: &Conditions) -> Result<QueryResult> {
        self.dispatcher().dispatch_named(response, conditions)
    }

    /// Query asked from one resource: `scope` is set to `resource`
    ///
    /// `get_for(&user, Tag, via item)` reads the tags user put on item.
    pub fn get_for(
        &self,
        resource: &Resource,
        response: ResourceKind,
        conditions: Conditions,
    ) -> Result<QueryResult> {
        let conditions = Conditions {
            scope: Some(Target::One(resource.clone())),
            ..conditions
        };
        self.get(response, &conditions)
    }

    /// Query asked from a whole kind, returning that kind
    ///
    /// `get_all(Tag, ..)` reads the global tag ranking.
    pub fn get_all(&self, kind: ResourceKind, conditions: Conditions) -> Result<QueryResult> {
        let conditions = Conditions {
            scope: Some(Target::Kind(kind)),
            ..conditions
        };
        self.get(kind, &conditions)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the backing store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Key builder over this engine's registry
    pub fn keys(&self) -> KeyBuilder<'_> {
        KeyBuilder::new(&self.config.registry)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn dispatcher(&self) -> Dispatcher<'_, S> {
        Dispatcher::new(&self.store, &self.config.registry)
    }

    fn serialize(&self) -> Option<MutexGuard<'_, ()>> {
        match self.config.atomicity {
            Atomicity::Serialized => Some(self.write_lock.lock()),
            Atomicity::BestEffort => None,
        }
    }

    /// Decrement a tag's score, removing it once it reaches zero or below
    fn decrement(&self, key: &str, tag: &str) -> Result<()> {
        if self.store.zincrby(key, -1.0, tag)? <= 0.0 {
            self.store.zrem(key, tag)?;
        }
        Ok(())
    }
}
