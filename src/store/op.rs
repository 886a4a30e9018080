//! Batchable store operations
//!
//! Writes that can be grouped into one `Store::atomic` call.

/// Operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpType {
    SAdd,
    SRem,
    ZIncrBy,
    ZRem,
    HSet,
    HDel,
}

/// A single write inside an atomic batch
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    /// Add a member to a set
    SAdd { key: String, member: String },

    /// Remove a member from a set
    SRem { key: String, member: String },

    /// Add to a member's score in a sorted set
    ZIncrBy { key: String, delta: f64, member: String },

    /// Remove a member from a sorted set
    ZRem { key: String, member: String },

    /// Set a hash field
    HSet { key: String, field: String, value: String },

    /// Delete a hash field
    HDel { key: String, field: String },
}

impl StoreOp {
    pub fn sadd(key: impl Into<String>, member: impl Into<String>) -> Self {
        StoreOp::SAdd {
            key: key.into(),
            member: member.into(),
        }
    }

    pub fn srem(key: impl Into<String>, member: impl Into<String>) -> Self {
        StoreOp::SRem {
            key: key.into(),
            member: member.into(),
        }
    }

    pub fn zincrby(key: impl Into<String>, delta: f64, member: impl Into<String>) -> Self {
        StoreOp::ZIncrBy {
            key: key.into(),
            delta,
            member: member.into(),
        }
    }

    /// Get the operation type
    pub fn op_type(&self) -> OpType {
        match self {
            StoreOp::SAdd { .. } => OpType::SAdd,
            StoreOp::SRem { .. } => OpType::SRem,
            StoreOp::ZIncrBy { .. } => OpType::ZIncrBy,
            StoreOp::ZRem { .. } => OpType::ZRem,
            StoreOp::HSet { .. } => OpType::HSet,
            StoreOp::HDel { .. } => OpType::HDel,
        }
    }

    /// Key this operation writes to
    pub fn key(&self) -> &str {
        match self {
            StoreOp::SAdd { key, .. }
            | StoreOp::SRem { key, .. }
            | StoreOp::ZIncrBy { key, .. }
            | StoreOp::ZRem { key, .. }
            | StoreOp::HSet { key, .. }
            | StoreOp::HDel { key, .. } => key,
        }
    }
}
