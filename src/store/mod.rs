//! Store Module
//!
//! The key-value store the association engine writes to and reads from.
//!
//! ## Responsibilities
//! - Set, sorted-set and hash primitives over string keys
//! - All-or-nothing execution of a batch of writes
//! - An in-process implementation with snapshot persistence
//!
//! ## Primitive Map
//! ```text
//! SET_ADD / SET_REMOVE          sadd / srem        (bool: membership changed)
//! SET_MEMBERS / SET_INTERSECT   smembers / sinter
//! SORTED_SET_INCR / _REMOVE     zincrby / zrem
//! SORTED_SET_REVERSE_RANGE      zrevrange
//! HASH_GET / HASH_SET           hget / hset
//! ATOMIC_BATCH                  atomic(Vec<StoreOp>)
//! ```

mod memory;
mod op;
mod snapshot;

pub use memory::MemoryStore;
pub use op::{OpType, StoreOp};
pub use snapshot::{MAGIC, SNAPSHOT_HEADER_SIZE};

use crate::error::Result;

/// A sorted-set member with its score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    pub member: String,
    pub score: f64,
}

impl ScoredMember {
    pub fn new(member: impl Into<String>, score: f64) -> Self {
        Self {
            member: member.into(),
            score,
        }
    }
}

/// Request/response primitives of the backing store
///
/// Every method is a single round trip. Only `atomic` groups writes; there
/// is no other isolation between calls. Errors are whatever the
/// implementation produces and are passed through callers untouched.
pub trait Store: Send + Sync {
    /// Add `member` to a set; `true` if it was not already present
    fn sadd(&self, key: &str, member: &str) -> Result<bool>;

    /// Remove `member` from a set; `true` if it was present
    fn srem(&self, key: &str, member: &str) -> Result<bool>;

    /// All members of a set, in no particular order
    fn smembers(&self, key: &str) -> Result<Vec<String>>;

    /// Members present in every one of `keys`; empty for no keys
    fn sinter(&self, keys: &[String]) -> Result<Vec<String>>;

    /// Add `delta` to a member's score (creating it at 0) and return the new score
    fn zincrby(&self, key: &str, delta: f64, member: &str) -> Result<f64>;

    /// Remove a member from a sorted set; `true` if it was present
    fn zrem(&self, key: &str, member: &str) -> Result<bool>;

    /// Members by descending score between ranks `start` and `stop` inclusive
    ///
    /// A negative `stop` counts from the end (`-1` is the last member).
    fn zrevrange(&self, key: &str, start: usize, stop: i64) -> Result<Vec<ScoredMember>>;

    /// Score of one member
    fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>>;

    /// Value of one hash field
    fn hget(&self, key: &str, field: &str) -> Result<Option<String>>;

    /// Set one hash field
    fn hset(&self, key: &str, field: &str, value: &str) -> Result<()>;

    /// Delete one hash field; `true` if it existed
    fn hdel(&self, key: &str, field: &str) -> Result<bool>;

    /// Apply every op or none of them; no observer sees a partial batch
    fn atomic(&self, ops: Vec<StoreOp>) -> Result<()>;
}

impl<S: Store + ?Sized> Store for std::sync::Arc<S> {
    fn sadd(&self, key: &str, member: &str) -> Result<bool> {
        (**self).sadd(key, member)
    }

    fn srem(&self, key: &str, member: &str) -> Result<bool> {
        (**self).srem(key, member)
    }

    fn smembers(&self, key: &str) -> Result<Vec<String>> {
        (**self).smembers(key)
    }

    fn sinter(&self, keys: &[String]) -> Result<Vec<String>> {
        (**self).sinter(keys)
    }

    fn zincrby(&self, key: &str, delta: f64, member: &str) -> Result<f64> {
        (**self).zincrby(key, delta, member)
    }

    fn zrem(&self, key: &str, member: &str) -> Result<bool> {
        (**self).zrem(key, member)
    }

    fn zrevrange(&self, key: &str, start: usize, stop: i64) -> Result<Vec<ScoredMember>> {
        (**self).zrevrange(key, start, stop)
    }

    fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>> {
        (**self).zscore(key, member)
    }

    fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        (**self).hget(key, field)
    }

    fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        (**self).hset(key, field, value)
    }

    fn hdel(&self, key: &str, field: &str) -> Result<bool> {
        (**self).hdel(key, field)
    }

    fn atomic(&self, ops: Vec<StoreOp>) -> Result<()> {
        (**self).atomic(ops)
    }
}
