//! Resource Registry
//!
//! Maps each resource kind to the field that identifies its instances and
//! the namespace its keys live under.
//!
//! ## Responsibilities
//! - Name the three resource kinds (user, item, tag)
//! - Hold per-kind settings, built once and read-only afterwards
//! - Resolve identifiers out of loosely-typed records

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TagError};
use crate::resource::Resource;

/// The three kinds of resource that take part in a tagging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    User,
    Item,
    Tag,
}

impl ResourceKind {
    /// All kinds, in bucket order
    pub const ALL: [ResourceKind; 3] = [ResourceKind::User, ResourceKind::Item, ResourceKind::Tag];

    /// Lowercase singular name ("user", "item", "tag")
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::User => "user",
            ResourceKind::Item => "item",
            ResourceKind::Tag => "tag",
        }
    }

    /// Lowercase plural name, used as a literal segment in kind-level keys
    pub fn plural(&self) -> &'static str {
        match self {
            ResourceKind::User => "users",
            ResourceKind::Item => "items",
            ResourceKind::Tag => "tags",
        }
    }

    /// Namespace used when nothing else is registered
    pub fn default_namespace(&self) -> &'static str {
        match self {
            ResourceKind::User => "USERS",
            ResourceKind::Item => "ITEMS",
            ResourceKind::Tag => "TAGS",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = TagError;

    /// Accepts singular and plural spellings, case-insensitive
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" | "users" => Ok(ResourceKind::User),
            "item" | "items" => Ok(ResourceKind::Item),
            "tag" | "tags" => Ok(ResourceKind::Tag),
            _ => Err(TagError::InvalidResourceKind(format!(
                "'{}', can only use user, item or tag",
                s
            ))),
        }
    }
}

/// Settings registered for one resource kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindSettings {
    /// Field of a record that identifies an instance ("id", "name", ...)
    pub identifier_field: String,

    /// Key namespace for this kind ("USERS", ...)
    pub namespace: String,
}

/// Immutable kind → settings table
///
/// Built once at startup and handed to the engine inside `Config`.
/// There is no way to mutate it afterwards, so sharing it between threads
/// needs no locking.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    kinds: HashMap<ResourceKind, KindSettings>,
}

impl Registry {
    /// Create a new registry builder
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Look up a kind's settings, failing if it was never registered
    pub fn lookup(&self, kind: ResourceKind) -> Result<&KindSettings> {
        self.kinds.get(&kind).ok_or(TagError::UnregisteredKind(kind))
    }

    /// Non-strict lookup: `None` for an unregistered kind
    pub fn try_lookup(&self, kind: ResourceKind) -> Option<&KindSettings> {
        self.kinds.get(&kind)
    }

    /// Whether `kind` has been registered
    pub fn is_registered(&self, kind: ResourceKind) -> bool {
        self.kinds.contains_key(&kind)
    }

    /// Namespace of a registered kind
    pub fn namespace(&self, kind: ResourceKind) -> Result<&str> {
        self.lookup(kind).map(|s| s.namespace.as_str())
    }

    /// Build a resource from a record by reading the kind's identifier field
    ///
    /// String and number fields are accepted; anything else is rejected as
    /// an invalid resource.
    pub fn identify(&self, kind: ResourceKind, record: &serde_json::Value) -> Result<Resource> {
        let settings = self.lookup(kind)?;
        let id = match record.get(&settings.identifier_field) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => {
                return Err(TagError::InvalidResourceKind(format!(
                    "record has no usable '{}' field for kind {}",
                    settings.identifier_field, kind
                )))
            }
        };
        Ok(Resource::new(kind, id))
    }
}

/// Builder for Registry
#[derive(Default)]
pub struct RegistryBuilder {
    kinds: HashMap<ResourceKind, KindSettings>,
}

impl RegistryBuilder {
    /// Register a kind with its identifier field and namespace
    pub fn register(
        mut self,
        kind: ResourceKind,
        identifier_field: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        self.kinds.insert(
            kind,
            KindSettings {
                identifier_field: identifier_field.into(),
                namespace: namespace.into(),
            },
        );
        self
    }

    /// Register a kind given by name; fails for anything but user/item/tag
    pub fn register_named(
        self,
        kind: &str,
        identifier_field: impl Into<String>,
        namespace: Option<&str>,
    ) -> Result<Self> {
        let kind: ResourceKind = kind.parse()?;
        let namespace = namespace.unwrap_or(kind.default_namespace()).to_string();
        Ok(self.register(kind, identifier_field, namespace))
    }

    pub fn build(self) -> Registry {
        Registry { kinds: self.kinds }
    }
}

impl Registry {
    /// user(id) under USERS, item(id) under ITEMS, tag(name) under TAGS
    pub fn standard() -> Self {
        Registry::builder()
            .register(ResourceKind::User, "id", ResourceKind::User.default_namespace())
            .register(ResourceKind::Item, "id", ResourceKind::Item.default_namespace())
            .register(ResourceKind::Tag, "name", ResourceKind::Tag.default_namespace())
            .build()
    }
}
