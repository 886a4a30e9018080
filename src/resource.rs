//! Resources and query targets
//!
//! A `Resource` is one instance of a kind with its identifier already
//! extracted. A `Target` is what a query's `scope` or `via` condition can
//! name: a whole kind, a single instance, or an ordered group of instances
//! of one kind.

use std::fmt;
use std::slice;

use crate::error::{Result, TagError};
use crate::registry::{Registry, ResourceKind};

/// One user, item or tag, identified by its registered identifier value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Resource {
    kind: ResourceKind,
    id: String,
}

impl Resource {
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self::new(ResourceKind::User, id)
    }

    pub fn item(id: impl Into<String>) -> Self {
        Self::new(ResourceKind::Item, id)
    }

    pub fn tag(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Tag, name)
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// The identifier value (id for users/items, name for tags by default)
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// Value of a `scope` or `via` query condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A kind as a whole (kind-level keys, e.g. the global tag ranking)
    Kind(ResourceKind),

    /// A single instance
    One(Resource),

    /// An ordered group of instances; all must share one kind
    Many(Vec<Resource>),
}

impl Target {
    /// Resolve the kind this target stands for
    ///
    /// Returns `Ok(None)` for an empty group, which counts as an absent
    /// condition. Unregistered kinds and mixed groups are rejected.
    pub fn resolve_kind(&self, registry: &Registry) -> Result<Option<ResourceKind>> {
        let kind = match self {
            Target::Kind(kind) => *kind,
            Target::One(resource) => resource.kind(),
            Target::Many(resources) => {
                let Some(first) = resources.first() else {
                    return Ok(None);
                };
                if let Some(other) = resources.iter().find(|r| r.kind() != first.kind()) {
                    return Err(TagError::InvalidViaKind(format!(
                        "group mixes {} and {}",
                        first.kind(),
                        other.kind()
                    )));
                }
                first.kind()
            }
        };

        if !registry.is_registered(kind) {
            return Err(TagError::InvalidViaKind(format!(
                "{} is not a registered resource kind",
                kind
            )));
        }
        Ok(Some(kind))
    }

    /// Instances named by this target (none for a kind-level target)
    pub fn instances(&self) -> &[Resource] {
        match self {
            Target::Kind(_) => &[],
            Target::One(resource) => slice::from_ref(resource),
            Target::Many(resources) => resources.as_slice(),
        }
    }

    /// First instance, if any
    pub fn first(&self) -> Option<&Resource> {
        self.instances().first()
    }
}

impl From<Resource> for Target {
    fn from(resource: Resource) -> Self {
        Target::One(resource)
    }
}

impl From<&Resource> for Target {
    fn from(resource: &Resource) -> Self {
        Target::One(resource.clone())
    }
}

impl From<Vec<Resource>> for Target {
    fn from(resources: Vec<Resource>) -> Self {
        Target::Many(resources)
    }
}

impl From<ResourceKind> for Target {
    fn from(kind: ResourceKind) -> Self {
        Target::Kind(kind)
    }
}
