//! Configuration for Tagsmith
//!
//! Centralized configuration with sensible defaults. Built once and owned by
//! the engine; nothing in it changes after construction.

use crate::registry::Registry;

/// Main configuration for an engine instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Resource Configuration
    // -------------------------------------------------------------------------
    /// Kind → identifier field and key namespace
    pub registry: Registry,

    // -------------------------------------------------------------------------
    // Mutation Configuration
    // -------------------------------------------------------------------------
    /// How much of a tag/untag call runs as one unit
    pub atomicity: Atomicity,
}

/// Isolation of a tag/untag call
///
/// Only the membership batch is ever atomic at the store. The scoped-set
/// check and the per-pair tag cache update are separate round trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Atomicity {
    /// Each step is its own round trip. Concurrent calls can double count a
    /// popularity change or lose a cache update.
    #[default]
    BestEffort,

    /// The whole call runs under an engine-wide write lock. Closes both
    /// windows for callers sharing one engine; other processes writing to
    /// the same store are not covered.
    Serialized,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry: Registry::standard(),
            atomicity: Atomicity::BestEffort,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the resource registry
    pub fn registry(mut self, registry: Registry) -> Self {
        self.config.registry = registry;
        self
    }

    /// Set the mutation atomicity
    pub fn atomicity(mut self, atomicity: Atomicity) -> Self {
        self.config.atomicity = atomicity;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
