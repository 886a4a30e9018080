//! Query dispatch
//!
//! Maps a (response kind, via present, similar) request onto one strategy.

use crate::error::{Result, TagError};
use crate::keys::KeyBuilder;
use crate::registry::{Registry, ResourceKind};
use crate::store::Store;

use super::{Conditions, QueryResult};

/// Retrieval strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Ranked tags of the scope, highest popularity first
    Tags,

    /// Tags one user put on one item
    TagsVia,

    /// Items sharing the seed item's top three tags
    SimilarItems,

    /// Items carrying every given tag, optionally for one user
    ItemsVia,

    /// Users associated with every given tag and item
    UsersVia,

    /// Plain members of the scope's set of this kind
    Collection(ResourceKind),
}

impl Strategy {
    /// Pick the strategy for a request
    pub fn select(response: ResourceKind, via: Option<ResourceKind>, similar: bool) -> Self {
        match (response, via.is_some(), similar) {
            (ResourceKind::Tag, false, _) => Strategy::Tags,
            (ResourceKind::Tag, true, _) => Strategy::TagsVia,
            (ResourceKind::Item, _, true) => Strategy::SimilarItems,
            (ResourceKind::Item, true, false) => Strategy::ItemsVia,
            (ResourceKind::User, true, _) => Strategy::UsersVia,
            (kind, false, _) => Strategy::Collection(kind),
        }
    }
}

/// Stateless query executor over a store
///
/// Every call is a function of its conditions and the store's current
/// contents; nothing is kept between calls.
pub struct Dispatcher<'a, S: Store + ?Sized> {
    pub(super) store: &'a S,
    pub(super) registry: &'a Registry,
}

impl<'a, S: Store + ?Sized> Dispatcher<'a, S> {
    pub fn new(store: &'a S, registry: &'a Registry) -> Self {
        Self { store, registry }
    }

    pub(super) fn keys(&self) -> KeyBuilder<'a> {
        KeyBuilder::new(self.registry)
    }

    /// Resolve the request to a strategy and run it
    pub fn dispatch(&self, response: ResourceKind, conditions: &Conditions) -> Result<QueryResult> {
        let strategy = self.plan(response, conditions)?;
        tracing::debug!(response = %response, strategy = ?strategy, "dispatching query");

        match strategy {
            Strategy::Tags => self.tags(conditions),
            Strategy::TagsVia => self.tags_via(conditions).map(QueryResult::Ids),
            Strategy::SimilarItems => self.similar_items(conditions).map(QueryResult::Ids),
            Strategy::ItemsVia => self.items_via(conditions).map(QueryResult::Ids),
            Strategy::UsersVia => self.users_via(conditions).map(QueryResult::Ids),
            Strategy::Collection(kind) => self.collection(kind, conditions).map(QueryResult::Ids),
        }
    }

    /// Dispatch with the response kind given by name
    pub fn dispatch_named(&self, response: &str, conditions: &Conditions) -> Result<QueryResult> {
        let kind = response
            .parse::<ResourceKind>()
            .map_err(|_| TagError::InvalidResponseKind(response.to_string()))?;
        self.dispatch(kind, conditions)
    }

    /// Validate the request and choose a strategy without touching the store
    pub fn plan(&self, response: ResourceKind, conditions: &Conditions) -> Result<Strategy> {
        if !self.registry.is_registered(response) {
            return Err(TagError::InvalidResourceKind(format!(
                "response kind {} is not registered",
                response
            )));
        }

        let via = match &conditions.via {
            Some(target) => target.resolve_kind(self.registry)?,
            None => None,
        };
        if let Some(scope) = &conditions.scope {
            scope.resolve_kind(self.registry)?;
        }

        Ok(Strategy::select(response, via, conditions.similar))
    }
}
