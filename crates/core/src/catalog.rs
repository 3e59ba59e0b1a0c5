//! Live catalog — what the database actually contains right now.
//!
//! Rebuilt from the database on every introspection call and never
//! persisted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveColumn {
    pub name: String,
    /// Type as reported by the database catalog.
    pub data_type: String,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveTable {
    pub name: String,
    /// Columns in ordinal position order.
    pub columns: Vec<LiveColumn>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<String>,
}

impl LiveTable {
    pub fn column(&self, name: &str) -> Option<&LiveColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Every table visible to the configured user, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveCatalog {
    pub tables: BTreeMap<String, LiveTable>,
}

impl LiveCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a table, replacing any previous table with the same name.
    pub fn insert(&mut self, table: LiveTable) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn table(&self, name: &str) -> Option<&LiveTable> {
        self.tables.get(name)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl FromIterator<LiveTable> for LiveCatalog {
    fn from_iter<I: IntoIterator<Item = LiveTable>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for table in iter {
            catalog.insert(table);
        }
        catalog
    }
}
