//! Key builder
//!
//! Store keys are `<namespace>:<identifier>[:<segment>]*`. The delimiter is
//! stripped from every component before joining, so an identifier such as
//! `"a:b"` can never forge a key belonging to another resource.
//!
//! ## Layout (standard namespaces)
//! ```text
//! USERS:<u>:ITEMS           set         items tagged by u
//! ITEMS:<i>:USERS           set         users who tagged i
//! TAGS:<t>:USERS            set         users who applied t
//! TAGS:<t>:ITEMS            set         items carrying t
//! USERS:<u>:tag:<t>:ITEMS   set         items u tagged with t
//! USERS:<u>:TAGS            zset        tag -> items u tagged with it
//! ITEMS:<i>:TAGS            zset        tag -> users who tagged i with it
//! TAGS:tags                 zset        tag -> every tag call, global
//! USERS:<u>:ITEMS:TAGS      hash        item -> JSON array of tag names
//! ```

use crate::error::Result;
use crate::registry::{Registry, ResourceKind};
use crate::resource::{Resource, Target};

/// Reserved key delimiter
pub const DELIMITER: char = ':';

/// Literal segment naming a user's per-tag scoped sets
const SCOPED_SEGMENT: &str = "tag";

/// Strip the delimiter from each part and join with it
pub fn join_key<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let separator = DELIMITER.to_string();
    parts
        .into_iter()
        .map(|part| part.as_ref().replace(DELIMITER, ""))
        .collect::<Vec<_>>()
        .join(separator.as_str())
}

/// One path segment after the identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Rendered as the kind's namespace in instance keys, and as its plural
    /// name in kind-level keys
    Kind(ResourceKind),

    /// Rendered verbatim
    Literal(&'a str),
}

impl From<ResourceKind> for Segment<'_> {
    fn from(kind: ResourceKind) -> Self {
        Segment::Kind(kind)
    }
}

impl<'a> From<&'a str> for Segment<'a> {
    fn from(literal: &'a str) -> Self {
        Segment::Literal(literal)
    }
}

/// Builds store keys against a registry's namespaces
#[derive(Debug, Clone, Copy)]
pub struct KeyBuilder<'r> {
    registry: &'r Registry,
}

impl<'r> KeyBuilder<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Key below a single instance: `<ns>:<id>[:<segment>]*`
    pub fn instance(&self, resource: &Resource, segments: &[Segment<'_>]) -> Result<String> {
        let mut parts = Vec::with_capacity(segments.len() + 2);
        parts.push(self.registry.namespace(resource.kind())?.to_string());
        parts.push(resource.id().to_string());
        for segment in segments {
            parts.push(match segment {
                Segment::Kind(kind) => self.registry.namespace(*kind)?.to_string(),
                Segment::Literal(literal) => literal.to_string(),
            });
        }
        Ok(join_key(parts))
    }

    /// Kind-level key: `<ns>[:<segment>]*`, segments never mapped to namespaces
    pub fn kind(&self, kind: ResourceKind, segments: &[Segment<'_>]) -> Result<String> {
        let mut parts = Vec::with_capacity(segments.len() + 1);
        parts.push(self.registry.namespace(kind)?.to_string());
        for segment in segments {
            parts.push(match segment {
                Segment::Kind(kind) => kind.plural().to_string(),
                Segment::Literal(literal) => literal.to_string(),
            });
        }
        Ok(join_key(parts))
    }

    /// Key below whatever a query target names
    ///
    /// Groups use their first instance; an empty group has no key.
    pub fn target(&self, target: &Target, segments: &[Segment<'_>]) -> Result<Option<String>> {
        match target {
            Target::Kind(kind) => self.kind(*kind, segments).map(Some),
            _ => match target.first() {
                Some(resource) => self.instance(resource, segments).map(Some),
                None => Ok(None),
            },
        }
    }

    // =========================================================================
    // Named keys of the association layout
    // =========================================================================

    /// `<resource>:<kind>` membership set, e.g. `USERS:1:ITEMS`
    pub fn members(&self, resource: &Resource, of: ResourceKind) -> Result<String> {
        self.instance(resource, &[Segment::Kind(of)])
    }

    /// Per-resource tag popularity sorted set, e.g. `ITEMS:5:TAGS`
    pub fn popularity(&self, resource: &Resource) -> Result<String> {
        self.instance(resource, &[Segment::Kind(ResourceKind::Tag)])
    }

    /// Items `user` tagged with `tag` specifically
    pub fn scoped_items(&self, user: &Resource, tag: &str) -> Result<String> {
        self.instance(
            user,
            &[
                Segment::Literal(SCOPED_SEGMENT),
                Segment::Literal(tag),
                Segment::Kind(ResourceKind::Item),
            ],
        )
    }

    /// Hash of item -> JSON tag array for one user
    pub fn tag_cache(&self, user: &Resource) -> Result<String> {
        self.instance(
            user,
            &[Segment::Kind(ResourceKind::Item), Segment::Kind(ResourceKind::Tag)],
        )
    }

    /// Global tag popularity sorted set
    pub fn global_tags(&self) -> Result<String> {
        self.kind(ResourceKind::Tag, &[Segment::Kind(ResourceKind::Tag)])
    }
}
