//! Query Module
//!
//! Read side of the association engine.
//!
//! ## Responsibilities
//! - Carry query conditions (scope, via, limit, scores, similar)
//! - Sort condition targets into per-kind buckets
//! - Pick one retrieval strategy per request and run it
//!
//! ## Dispatch Table
//! ```text
//! response   via       similar   strategy
//! tag        absent    -         tags
//! tag        present   -         tags_via
//! item       -         true      similar_items
//! item       present   false     items_via
//! item       absent    false     collection
//! user       present   -         users_via
//! user       absent    -         collection
//! ```

mod dispatch;
mod strategies;

pub use dispatch::{Dispatcher, Strategy};

use crate::error::Result;
use crate::registry::{Registry, ResourceKind};
use crate::resource::{Resource, Target};
use crate::store::ScoredMember;

/// Conditions narrowing a query
#[derive(Debug, Clone, PartialEq)]
pub struct Conditions {
    /// Resource (or kind) the query is asked from
    pub scope: Option<Target>,

    /// Other resources the results must be associated with
    pub via: Option<Target>,

    /// Maximum number of results; `None` or `Some(0)` means unbounded
    pub limit: Option<usize>,

    /// Include popularity scores in tag rankings
    pub with_scores: bool,

    /// Ask for items similar to the item in scope/via
    pub similar: bool,
}

impl Default for Conditions {
    fn default() -> Self {
        Self {
            scope: None,
            via: None,
            limit: None,
            with_scores: true,
            similar: false,
        }
    }
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope(mut self, scope: impl Into<Target>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn via(mut self, via: impl Into<Target>) -> Self {
        self.via = Some(via.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn without_scores(mut self) -> Self {
        self.with_scores = false;
        self
    }

    pub fn similar(mut self) -> Self {
        self.similar = true;
        self
    }

    /// Effective limit: zero counts as no limit
    pub fn effective_limit(&self) -> Option<usize> {
        self.limit.filter(|&n| n > 0)
    }

    /// Scope if present, otherwise via
    pub fn scope_or_via(&self) -> Option<&Target> {
        self.scope.as_ref().or(self.via.as_ref())
    }
}

/// What a query returns
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Plain identifiers
    Ids(Vec<String>),

    /// Tag names with popularity, highest first
    Scored(Vec<ScoredMember>),
}

impl QueryResult {
    /// Identifiers, dropping scores if any
    pub fn into_ids(self) -> Vec<String> {
        match self {
            QueryResult::Ids(ids) => ids,
            QueryResult::Scored(scored) => scored.into_iter().map(|s| s.member).collect(),
        }
    }

    /// Scored entries, if this is a scored result
    pub fn scored(&self) -> Option<&[ScoredMember]> {
        match self {
            QueryResult::Scored(scored) => Some(scored),
            QueryResult::Ids(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            QueryResult::Ids(ids) => ids.len(),
            QueryResult::Scored(scored) => scored.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Condition targets grouped by kind
///
/// A target of kind K fills bucket K. When scope and via share a kind the
/// via target wins. Kind-level targets contribute no instances.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Buckets {
    pub users: Vec<Resource>,
    pub items: Vec<Resource>,
    pub tags: Vec<Resource>,
}

impl Buckets {
    /// Sort `scope` and `via` into buckets
    pub fn sort(conditions: &Conditions, registry: &Registry) -> Result<Self> {
        let mut buckets = Buckets::default();
        for target in [&conditions.scope, &conditions.via].into_iter().flatten() {
            if let Some(kind) = target.resolve_kind(registry)? {
                *buckets.bucket_mut(kind) = target.instances().to_vec();
            }
        }
        Ok(buckets)
    }

    pub fn get(&self, kind: ResourceKind) -> &[Resource] {
        match kind {
            ResourceKind::User => &self.users,
            ResourceKind::Item => &self.items,
            ResourceKind::Tag => &self.tags,
        }
    }

    fn bucket_mut(&mut self, kind: ResourceKind) -> &mut Vec<Resource> {
        match kind {
            ResourceKind::User => &mut self.users,
            ResourceKind::Item => &mut self.items,
            ResourceKind::Tag => &mut self.tags,
        }
    }
}

/// Cut `ids` down to the effective limit
pub(crate) fn apply_limit(mut ids: Vec<String>, limit: Option<usize>) -> Vec<String> {
    if let Some(n) = limit {
        ids.truncate(n);
    }
    ids
}
