//! The knowledge store: declarative descriptors on disk.
//!
//! ```text
//! <root>/tables/*.json      table descriptors
//! <root>/business/*.json    metrics, business rules, gotchas
//! <root>/queries/*.sql      validated query patterns
//! <root>/learnings/*.json   discoveries saved by the agent
//! ```
//!
//! [`KnowledgeLoader`] reads the tree into a typed [`Knowledge`] value.
//! [`KnowledgeStore`] performs the few writes the system allows: auto-fix
//! descriptors, saved queries and learnings.
//!
//! [`Knowledge`]: sqlkeeper_core::Knowledge

pub mod layout;
pub mod loader;
pub mod patterns;
pub mod store;

pub use layout::StoreLayout;
pub use loader::{KnowledgeLoader, load_knowledge};
pub use patterns::{parse_query_patterns, render_query_block};
pub use store::KnowledgeStore;
