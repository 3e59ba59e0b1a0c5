//! # SQLKeeper Core
//!
//! Domain types, traits, and error definitions for SQLKeeper, the knowledge
//! and schema side of a natural-language-to-SQL agent. This crate has
//! **zero framework dependencies** — it defines the domain model that all
//! other crates implement against.
//!
//! ## Design Philosophy
//!
//! Descriptors loaded from disk are mapped to explicit typed records at the
//! load boundary. Live catalogs and drift reports are plain values rebuilt
//! on every run. Agent-facing capabilities sit behind the [`Tool`] trait.

pub mod catalog;
pub mod drift;
pub mod error;
pub mod knowledge;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use catalog::{LiveCatalog, LiveColumn, LiveTable};
pub use drift::{ColumnDiff, DriftReport, TypeMismatch, TypeVerdict};
pub use error::{Error, Result};
pub use knowledge::{
    BusinessRules, ColumnDescriptor, Gotcha, Knowledge, Learning, LearningCategory, Metric,
    TableDescriptor, ValidatedQuery,
};
pub use tool::{Tool, ToolCall, ToolDefinition, ToolRegistry, ToolResult};
