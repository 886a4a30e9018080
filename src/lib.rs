//! # Tagsmith
//!
//! Many-to-many tagging between users, items and tags over a key-value
//! store with sets, sorted sets, hashes and atomic batches:
//! - Six denormalized structures kept in step on every tag/untag
//! - Per-user, per-item and global tag popularity rankings
//! - Seven query shapes served from those structures
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Engine                              │
//! │              tag / untag            get                      │
//! └───────────────┬─────────────────────────┬───────────────────┘
//!                 │                         │
//!                 ▼                         ▼
//!   ┌──────────────────────┐     ┌──────────────────────┐
//!   │   Association writes │     │   Query Dispatcher   │
//!   │  (scoped set, batch, │     │  (six strategies)    │
//!   │   tag cache)         │     │                      │
//!   └──────────┬───────────┘     └──────────┬───────────┘
//!              │                            │
//!              └─────────────┬──────────────┘
//!                            ▼
//!                   ┌─────────────────┐
//!                   │   Key Builder   │
//!                   │   (Registry)    │
//!                   └────────┬────────┘
//!                            ▼
//!                   ┌─────────────────┐
//!                   │      Store      │
//!                   │ (MemoryStore /  │
//!                   │   snapshot)     │
//!                   └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod registry;
pub mod resource;
pub mod keys;
pub mod store;
pub mod query;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{TagError, Result};
pub use config::{Atomicity, Config};
pub use engine::Engine;
pub use query::{Conditions, QueryResult};
pub use registry::{Registry, ResourceKind};
pub use resource::{Resource, Target};
pub use store::{MemoryStore, Store};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of Tagsmith
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
