//! Retrieval strategies
//!
//! One method per row of the dispatch table. Each reads a handful of keys
//! and never writes.

use crate::error::{Result, TagError};
use crate::keys::Segment;
use crate::registry::ResourceKind;
use crate::resource::{Resource, Target};
use crate::store::Store;

use super::{apply_limit, Buckets, Conditions, Dispatcher, QueryResult};

/// Number of top tags an item must have to find similar items
const SIMILAR_TAG_COUNT: usize = 3;

impl<S: Store + ?Sized> Dispatcher<'_, S> {
    /// Members of the scope's set of `kind`, e.g. `USERS:1:ITEMS`
    pub fn collection(&self, kind: ResourceKind, conditions: &Conditions) -> Result<Vec<String>> {
        let scope = Self::require_scope(conditions)?;
        let Some(key) = self.keys().target(scope, &[Segment::Kind(kind)])? else {
            return Ok(Vec::new());
        };

        let members = self.store.smembers(&key)?;
        Ok(apply_limit(members, conditions.effective_limit()))
    }

    /// Scope's tag ranking, highest first
    ///
    /// A kind-level tag scope reads the global ranking.
    pub fn tags(&self, conditions: &Conditions) -> Result<QueryResult> {
        let scope = Self::require_scope(conditions)?;
        let Some(key) = self.keys().target(scope, &[Segment::Kind(ResourceKind::Tag)])? else {
            return Ok(QueryResult::Ids(Vec::new()));
        };

        // Limits past i64::MAX cover every rank anyway
        let stop = match conditions.effective_limit() {
            Some(n) => i64::try_from(n).map_or(-1, |n| n - 1),
            None => -1,
        };
        let ranked = self.store.zrevrange(&key, 0, stop)?;

        if conditions.with_scores {
            Ok(QueryResult::Scored(ranked))
        } else {
            Ok(QueryResult::Ids(ranked.into_iter().map(|s| s.member).collect()))
        }
    }

    /// Tags the user put on the item, sorted by name; ignores the limit
    pub fn tags_via(&self, conditions: &Conditions) -> Result<Vec<String>> {
        let buckets = Buckets::sort(conditions, self.registry)?;
        let (Some(user), Some(item)) = (buckets.users.first(), buckets.items.first()) else {
            return Err(TagError::InvalidViaKind(
                "tags via needs one user and one item".to_string(),
            ));
        };

        self.cached_tags(user, item)
    }

    /// Items carrying every tag in the tag bucket
    ///
    /// With a user instance present, only that user's taggings count.
    pub fn items_via(&self, conditions: &Conditions) -> Result<Vec<String>> {
        let buckets = Buckets::sort(conditions, self.registry)?;
        let keys = self.keys();

        let set_keys = match buckets.users.first() {
            Some(user) => buckets
                .tags
                .iter()
                .map(|tag| keys.scoped_items(user, tag.id()))
                .collect::<Result<Vec<_>>>()?,
            None => buckets
                .tags
                .iter()
                .map(|tag| keys.members(tag, ResourceKind::Item))
                .collect::<Result<Vec<_>>>()?,
        };

        let items = self.store.sinter(&set_keys)?;
        Ok(apply_limit(items, conditions.effective_limit()))
    }

    /// Users associated with every tag and every item given
    pub fn users_via(&self, conditions: &Conditions) -> Result<Vec<String>> {
        let buckets = Buckets::sort(conditions, self.registry)?;
        let keys = self.keys();

        let set_keys = buckets
            .tags
            .iter()
            .chain(buckets.items.iter())
            .map(|resource| keys.members(resource, ResourceKind::User))
            .collect::<Result<Vec<_>>>()?;

        let users = self.store.sinter(&set_keys)?;
        Ok(apply_limit(users, conditions.effective_limit()))
    }

    /// Items that also carry all three of the seed item's top tags
    ///
    /// The seed is the first item in the conditions. Fewer than three ranked
    /// tags on the seed means no result.
    pub fn similar_items(&self, conditions: &Conditions) -> Result<Vec<String>> {
        let buckets = Buckets::sort(conditions, self.registry)?;
        let Some(seed) = buckets.items.first() else {
            return Ok(Vec::new());
        };

        let top = self
            .tags(
                &Conditions::new()
                    .scope(Target::One(seed.clone()))
                    .limit(SIMILAR_TAG_COUNT)
                    .without_scores(),
            )?
            .into_ids();

        let keys = self.keys();
        let mut set_keys = top
            .iter()
            .map(|name| keys.members(&Resource::tag(name.as_str()), ResourceKind::Item))
            .collect::<Result<Vec<_>>>()?;
        set_keys.sort();
        set_keys.dedup();
        if set_keys.len() != SIMILAR_TAG_COUNT {
            return Ok(Vec::new());
        }

        let mut items = self.store.sinter(&set_keys)?;
        items.retain(|id| id != seed.id());
        Ok(apply_limit(items, conditions.effective_limit()))
    }

    /// Decoded per-(user, item) tag cache, sorted by name
    pub(crate) fn cached_tags(&self, user: &Resource, item: &Resource) -> Result<Vec<String>> {
        let key = self.keys().tag_cache(user)?;
        let mut tags: Vec<String> = match self.store.hget(&key, item.id())? {
            Some(json) => serde_json::from_str(&json)?,
            None => Vec::new(),
        };
        tags.sort();
        Ok(tags)
    }

    fn require_scope(conditions: &Conditions) -> Result<&Target> {
        conditions
            .scope_or_via()
            .ok_or_else(|| TagError::InvalidViaKind("query needs a scope or via".to_string()))
    }
}
