//! Error types for the SQLKeeper domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for all SQLKeeper operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Knowledge store errors ---
    #[error("Knowledge error: {0}")]
    Knowledge(#[from] KnowledgeError),

    // --- Database errors ---
    #[error("Introspection error: {0}")]
    Introspect(#[from] IntrospectError),

    // --- Knowledge store writes ---
    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Problems found while loading the knowledge store.
///
/// Bad query-pattern and learnings files are skipped and kept as warnings
/// on the loaded value. Bad table or business files fail the load, but only
/// after every file has been visited.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KnowledgeError {
    #[error("Malformed descriptor {path}: {reason}")]
    MalformedDescriptor { path: PathBuf, reason: String },

    #[error("Duplicate table '{table}' declared in {first} and {second}")]
    DuplicateTable {
        table: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Malformed query pattern {path}: {reason}")]
    MalformedQueryPattern { path: PathBuf, reason: String },

    #[error("Failed to read {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("{}", describe_aggregate(.0))]
    Aggregate(Vec<KnowledgeError>),
}

impl KnowledgeError {
    /// Flatten into the individual problems.
    pub fn problems(&self) -> Vec<&KnowledgeError> {
        match self {
            Self::Aggregate(all) => all.iter().flat_map(|e| e.problems()).collect(),
            other => vec![other],
        }
    }
}

fn describe_aggregate(errors: &[KnowledgeError]) -> String {
    let joined = errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    format!("{} knowledge problem(s): {joined}", errors.len())
}

/// Failures talking to the live database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntrospectError {
    #[error("Database connection failed: {0}")]
    ConnectionError(String),

    #[error("Database did not respond within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Catalog query failed: {0}")]
    QueryFailed(String),

    #[error("Statement rejected: {0}")]
    Rejected(String),

    #[error("Unsupported database URL: {0}")]
    Unsupported(String),
}

/// Failures writing into the knowledge store.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Refusing to overwrite existing descriptor {0}")]
    AlreadyExists(PathBuf),

    #[error("Failed to write {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("Failed to serialize descriptor: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}
