//! Knowledge descriptors — the typed form of the on-disk knowledge store.
//!
//! The JSON key names (`table_description`, `table_columns`, `type`) are the
//! store's file format and must stay stable; field names on the Rust side
//! are free to read better.

use crate::error::KnowledgeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Metadata for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub table_name: String,

    #[serde(rename = "table_description")]
    pub description: String,

    #[serde(default)]
    pub use_cases: Vec<String>,

    #[serde(default)]
    pub data_quality_notes: Vec<String>,

    #[serde(rename = "table_columns", default)]
    pub columns: Vec<ColumnDescriptor>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<String>,
}

impl TableDescriptor {
    /// Look up a column by exact name.
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Metadata for one column of a [`TableDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,

    #[serde(rename = "type", default = "default_column_type")]
    pub declared_type: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
}

fn default_column_type() -> String {
    "unknown".into()
}

/// A named business metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub definition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculation: Option<String>,
}

/// A known pitfall when querying the data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gotcha {
    pub issue: String,
    #[serde(default)]
    pub tables_affected: Vec<String>,
    pub solution: String,
}

/// Business-rule records merged from every file under `business/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessRules {
    #[serde(default)]
    pub metrics: Vec<Metric>,

    #[serde(default)]
    pub business_rules: Vec<String>,

    #[serde(default)]
    pub common_gotchas: Vec<Gotcha>,
}

impl BusinessRules {
    /// Append another file's records after this one's.
    pub fn merge(&mut self, other: BusinessRules) {
        self.metrics.extend(other.metrics);
        self.business_rules.extend(other.business_rules);
        self.common_gotchas.extend(other.common_gotchas);
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty() && self.business_rules.is_empty() && self.common_gotchas.is_empty()
    }
}

/// A SQL query known to work, parsed from a tagged `.sql` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedQuery {
    pub name: String,
    pub description: String,
    pub sql: String,
    /// File the block was read from.
    pub source: PathBuf,
}

/// Category of a saved learning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningCategory {
    SchemaQuirk,
    TypeGotcha,
    ErrorFix,
    DataPattern,
    Performance,
}

impl LearningCategory {
    pub const ALL: [LearningCategory; 5] = [
        Self::SchemaQuirk,
        Self::TypeGotcha,
        Self::ErrorFix,
        Self::DataPattern,
        Self::Performance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SchemaQuirk => "schema_quirk",
            Self::TypeGotcha => "type_gotcha",
            Self::ErrorFix => "error_fix",
            Self::DataPattern => "data_pattern",
            Self::Performance => "performance",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

impl std::fmt::Display for LearningCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovery saved by the agent so later sessions don't repeat it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Learning {
    pub category: LearningCategory,
    pub description: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables_affected: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovered_at: Option<DateTime<Utc>>,
}

/// Everything loaded from one knowledge root.
///
/// Built once per invocation and passed by reference to the components
/// that need it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Knowledge {
    /// Table descriptors keyed (and therefore ordered) by table name.
    pub tables: BTreeMap<String, TableDescriptor>,
    pub business: BusinessRules,
    pub queries: Vec<ValidatedQuery>,
    pub learnings: Vec<Learning>,
    /// Recoverable problems: files that were skipped.
    pub warnings: Vec<KnowledgeError>,
}

impl Knowledge {
    pub fn table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.get(name)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}
