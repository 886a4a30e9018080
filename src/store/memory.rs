//! In-memory store
//!
//! BTreeMap-based store with a RwLock, mirroring the remote store's
//! semantics closely enough for the engine not to tell the difference.

use std::collections::{BTreeMap, HashMap, HashSet};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TagError};

use super::{OpType, ScoredMember, Store, StoreOp};

/// A value held under one key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum StoredValue {
    Set(HashSet<String>),
    SortedSet(HashMap<String, f64>),
    Hash(HashMap<String, String>),
}

impl StoredValue {
    fn is_empty(&self) -> bool {
        match self {
            StoredValue::Set(s) => s.is_empty(),
            StoredValue::SortedSet(z) => z.is_empty(),
            StoredValue::Hash(h) => h.is_empty(),
        }
    }

    fn type_of(&self) -> ValueType {
        match self {
            StoredValue::Set(_) => ValueType::Set,
            StoredValue::SortedSet(_) => ValueType::SortedSet,
            StoredValue::Hash(_) => ValueType::Hash,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueType {
    Set,
    SortedSet,
    Hash,
}

impl From<OpType> for ValueType {
    fn from(op: OpType) -> Self {
        match op {
            OpType::SAdd | OpType::SRem => ValueType::Set,
            OpType::ZIncrBy | OpType::ZRem => ValueType::SortedSet,
            OpType::HSet | OpType::HDel => ValueType::Hash,
        }
    }
}

type Data = BTreeMap<String, StoredValue>;

/// Store kept entirely in process memory
///
/// ## Concurrency:
/// - `data`: Protected by RwLock (many concurrent readers, exclusive writer)
/// - Each primitive takes the lock once, so every primitive is atomic
/// - `atomic` holds the write lock across the whole batch
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub(super) data: RwLock<Data>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn from_data(data: Data) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Number of non-empty keys
    pub fn key_count(&self) -> usize {
        self.data.read().len()
    }

    /// Whether `key` currently holds a value
    pub fn exists(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    /// All keys, sorted (for debugging and tests)
    pub fn keys(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn wrong_type(key: &str) -> TagError {
        TagError::WrongType {
            key: key.to_string(),
        }
    }

    fn set<'a>(data: &'a Data, key: &str) -> Result<Option<&'a HashSet<String>>> {
        match data.get(key) {
            None => Ok(None),
            Some(StoredValue::Set(s)) => Ok(Some(s)),
            Some(_) => Err(Self::wrong_type(key)),
        }
    }

    fn sorted_set<'a>(data: &'a Data, key: &str) -> Result<Option<&'a HashMap<String, f64>>> {
        match data.get(key) {
            None => Ok(None),
            Some(StoredValue::SortedSet(z)) => Ok(Some(z)),
            Some(_) => Err(Self::wrong_type(key)),
        }
    }

    fn hash<'a>(data: &'a Data, key: &str) -> Result<Option<&'a HashMap<String, String>>> {
        match data.get(key) {
            None => Ok(None),
            Some(StoredValue::Hash(h)) => Ok(Some(h)),
            Some(_) => Err(Self::wrong_type(key)),
        }
    }

    /// Type check every op of a batch, including keys the batch itself creates
    fn validate(data: &Data, ops: &[StoreOp]) -> Result<()> {
        let mut created: HashMap<&str, ValueType> = HashMap::new();
        for op in ops {
            let wanted = ValueType::from(op.op_type());
            let existing = match data.get(op.key()) {
                Some(value) => Some(value.type_of()),
                None => created.get(op.key()).copied(),
            };
            match existing {
                Some(found) if found != wanted => return Err(Self::wrong_type(op.key())),
                Some(_) => {}
                None => {
                    created.insert(op.key(), wanted);
                }
            }
        }
        Ok(())
    }

    /// Apply one write; the caller holds the write lock
    fn apply(data: &mut Data, op: StoreOp) -> Result<OpOutcome> {
        let outcome = match op {
            StoreOp::SAdd { key, member } => {
                Self::set(data, &key)?;
                let entry = data
                    .entry(key)
                    .or_insert_with(|| StoredValue::Set(HashSet::new()));
                match entry {
                    StoredValue::Set(s) => OpOutcome::Changed(s.insert(member)),
                    _ => unreachable!("type checked above"),
                }
            }
            StoreOp::SRem { key, member } => {
                let changed = match data.get_mut(&key) {
                    None => false,
                    Some(StoredValue::Set(s)) => s.remove(&member),
                    Some(_) => return Err(Self::wrong_type(&key)),
                };
                Self::drop_if_empty(data, &key);
                OpOutcome::Changed(changed)
            }
            StoreOp::ZIncrBy { key, delta, member } => {
                Self::sorted_set(data, &key)?;
                let entry = data
                    .entry(key)
                    .or_insert_with(|| StoredValue::SortedSet(HashMap::new()));
                match entry {
                    StoredValue::SortedSet(z) => {
                        let score = z.entry(member).or_insert(0.0);
                        *score += delta;
                        OpOutcome::Score(*score)
                    }
                    _ => unreachable!("type checked above"),
                }
            }
            StoreOp::ZRem { key, member } => {
                let changed = match data.get_mut(&key) {
                    None => false,
                    Some(StoredValue::SortedSet(z)) => z.remove(&member).is_some(),
                    Some(_) => return Err(Self::wrong_type(&key)),
                };
                Self::drop_if_empty(data, &key);
                OpOutcome::Changed(changed)
            }
            StoreOp::HSet { key, field, value } => {
                Self::hash(data, &key)?;
                let entry = data
                    .entry(key)
                    .or_insert_with(|| StoredValue::Hash(HashMap::new()));
                match entry {
                    StoredValue::Hash(h) => OpOutcome::Changed(h.insert(field, value).is_none()),
                    _ => unreachable!("type checked above"),
                }
            }
            StoreOp::HDel { key, field } => {
                let changed = match data.get_mut(&key) {
                    None => false,
                    Some(StoredValue::Hash(h)) => h.remove(&field).is_some(),
                    Some(_) => return Err(Self::wrong_type(&key)),
                };
                Self::drop_if_empty(data, &key);
                OpOutcome::Changed(changed)
            }
        };
        Ok(outcome)
    }

    fn drop_if_empty(data: &mut Data, key: &str) {
        if data.get(key).is_some_and(StoredValue::is_empty) {
            data.remove(key);
        }
    }

    fn write(&self, op: StoreOp) -> Result<OpOutcome> {
        let mut data = self.data.write();
        Self::apply(&mut data, op)
    }
}

/// What a single applied write reports back
enum OpOutcome {
    Changed(bool),
    Score(f64),
}

impl OpOutcome {
    fn changed(self) -> bool {
        match self {
            OpOutcome::Changed(changed) => changed,
            OpOutcome::Score(_) => true,
        }
    }
}

impl Store for MemoryStore {
    fn sadd(&self, key: &str, member: &str) -> Result<bool> {
        self.write(StoreOp::sadd(key, member)).map(OpOutcome::changed)
    }

    fn srem(&self, key: &str, member: &str) -> Result<bool> {
        self.write(StoreOp::srem(key, member)).map(OpOutcome::changed)
    }

    fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let data = self.data.read();
        Ok(Self::set(&data, key)?
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn sinter(&self, keys: &[String]) -> Result<Vec<String>> {
        let data = self.data.read();

        let mut sets = Vec::with_capacity(keys.len());
        for key in keys {
            match Self::set(&data, key)? {
                Some(s) => sets.push(s),
                // A missing key is an empty set, so the intersection is empty
                None => return Ok(Vec::new()),
            }
        }

        // Walk the smallest set, probe the rest
        sets.sort_by_key(|s| s.len());
        let Some((smallest, rest)) = sets.split_first() else {
            return Ok(Vec::new());
        };
        Ok(smallest
            .iter()
            .filter(|member| rest.iter().all(|s| s.contains(*member)))
            .cloned()
            .collect())
    }

    fn zincrby(&self, key: &str, delta: f64, member: &str) -> Result<f64> {
        match self.write(StoreOp::zincrby(key, delta, member))? {
            OpOutcome::Score(score) => Ok(score),
            OpOutcome::Changed(_) => Err(TagError::Store("ZINCRBY returned no score".to_string())),
        }
    }

    fn zrem(&self, key: &str, member: &str) -> Result<bool> {
        self.write(StoreOp::ZRem {
            key: key.to_string(),
            member: member.to_string(),
        })
        .map(OpOutcome::changed)
    }

    fn zrevrange(&self, key: &str, start: usize, stop: i64) -> Result<Vec<ScoredMember>> {
        let data = self.data.read();
        let Some(zset) = Self::sorted_set(&data, key)? else {
            return Ok(Vec::new());
        };

        let mut entries: Vec<ScoredMember> = zset
            .iter()
            .map(|(member, score)| ScoredMember::new(member.clone(), *score))
            .collect();
        // Highest score first; equal scores in reverse lexicographic order
        entries.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.member.cmp(&a.member))
        });

        let len = entries.len() as i64;
        let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
        if stop < 0 || start as i64 > stop {
            return Ok(Vec::new());
        }

        Ok(entries
            .into_iter()
            .skip(start)
            .take((stop - start as i64 + 1) as usize)
            .collect())
    }

    fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>> {
        let data = self.data.read();
        Ok(Self::sorted_set(&data, key)?.and_then(|z| z.get(member).copied()))
    }

    fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let data = self.data.read();
        Ok(Self::hash(&data, key)?.and_then(|h| h.get(field).cloned()))
    }

    fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        self.write(StoreOp::HSet {
            key: key.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        })
        .map(|_| ())
    }

    fn hdel(&self, key: &str, field: &str) -> Result<bool> {
        self.write(StoreOp::HDel {
            key: key.to_string(),
            field: field.to_string(),
        })
        .map(OpOutcome::changed)
    }

    fn atomic(&self, ops: Vec<StoreOp>) -> Result<()> {
        let mut data = self.data.write();

        // Nothing is applied unless every op can be
        Self::validate(&data, &ops)?;

        tracing::trace!(ops = ops.len(), "applying atomic batch");
        for op in ops {
            Self::apply(&mut data, op)?;
        }
        Ok(())
    }
}
