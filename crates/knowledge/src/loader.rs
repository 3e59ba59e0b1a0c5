//! Knowledge Loader — reads a knowledge root into a typed [`Knowledge`].
//!
//! Validation happens here, at the load boundary:
//! - table files need a non-empty `table_name` and `table_description`
//! - a table name may be declared by only one file
//! - query pattern files must contain complete blocks
//!
//! Bad table and business files are collected and reported together once
//! every file has been read. Bad query-pattern and learnings files are
//! skipped and kept as warnings, so one bad file never blocks the rest.

use crate::layout::{StoreLayout, list_files};
use crate::patterns::parse_query_patterns;
use serde::Deserialize;
use sqlkeeper_core::error::KnowledgeError;
use sqlkeeper_core::knowledge::{
    BusinessRules, ColumnDescriptor, Knowledge, Learning, TableDescriptor,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Table file as written by humans; required fields checked after parsing.
#[derive(Deserialize)]
struct RawTable {
    #[serde(default)]
    table_name: Option<String>,
    #[serde(default)]
    table_description: Option<String>,
    #[serde(default)]
    use_cases: Vec<String>,
    #[serde(default)]
    data_quality_notes: Vec<String>,
    #[serde(default)]
    table_columns: Vec<ColumnDescriptor>,
    #[serde(default)]
    primary_key: Vec<String>,
}

/// A learnings file holds one learning or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum LearningFile {
    Many(Vec<Learning>),
    One(Learning),
}

pub struct KnowledgeLoader {
    layout: StoreLayout,
}

impl KnowledgeLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: StoreLayout::new(root),
        }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Load the whole store.
    pub fn load(&self) -> Result<Knowledge, KnowledgeError> {
        let mut problems = Vec::new();
        let mut warnings = Vec::new();

        let tables = self.load_tables(&mut problems)?;
        let business = self.load_business(&mut problems)?;

        if !problems.is_empty() {
            for problem in &problems {
                warn!("{problem}");
            }
            return Err(if problems.len() == 1 {
                problems.remove(0)
            } else {
                KnowledgeError::Aggregate(problems)
            });
        }

        let queries = self.load_queries(&mut warnings)?;
        let learnings = self.load_learnings(&mut warnings)?;

        info!(
            root = %self.layout.root().display(),
            tables = tables.len(),
            queries = queries.len(),
            learnings = learnings.len(),
            skipped = warnings.len(),
            "Knowledge loaded"
        );

        Ok(Knowledge {
            tables,
            business,
            queries,
            learnings,
            warnings,
        })
    }

    fn load_tables(
        &self,
        problems: &mut Vec<KnowledgeError>,
    ) -> Result<BTreeMap<String, TableDescriptor>, KnowledgeError> {
        let mut tables = BTreeMap::new();
        let mut origins: BTreeMap<String, PathBuf> = BTreeMap::new();

        for path in list_files(&self.layout.tables_dir(), "json")? {
            let table = match read_table(&path) {
                Ok(table) => table,
                Err(e) => {
                    problems.push(e);
                    continue;
                }
            };

            if let Some(first) = origins.get(&table.table_name) {
                problems.push(KnowledgeError::DuplicateTable {
                    table: table.table_name.clone(),
                    first: first.clone(),
                    second: path.clone(),
                });
                continue;
            }

            debug!(table = %table.table_name, path = %path.display(), "Loaded table descriptor");
            origins.insert(table.table_name.clone(), path);
            tables.insert(table.table_name.clone(), table);
        }

        Ok(tables)
    }

    fn load_business(
        &self,
        problems: &mut Vec<KnowledgeError>,
    ) -> Result<BusinessRules, KnowledgeError> {
        let mut business = BusinessRules::default();

        for path in list_files(&self.layout.business_dir(), "json")? {
            let parsed = read_to_string(&path).and_then(|content| {
                serde_json::from_str::<BusinessRules>(&content).map_err(|e| {
                    KnowledgeError::MalformedDescriptor {
                        path: path.clone(),
                        reason: e.to_string(),
                    }
                })
            });
            match parsed {
                Ok(rules) => business.merge(rules),
                Err(e) => problems.push(e),
            }
        }

        Ok(business)
    }

    fn load_queries(
        &self,
        warnings: &mut Vec<KnowledgeError>,
    ) -> Result<Vec<sqlkeeper_core::ValidatedQuery>, KnowledgeError> {
        let mut queries = Vec::new();

        for path in list_files(&self.layout.queries_dir(), "sql")? {
            let content = match read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!("Skipping query file: {e}");
                    warnings.push(e);
                    continue;
                }
            };

            match parse_query_patterns(&content, &path) {
                Ok(patterns) => {
                    debug!(path = %path.display(), count = patterns.len(), "Loaded query patterns");
                    queries.extend(patterns);
                }
                Err(reason) => {
                    let e = KnowledgeError::MalformedQueryPattern {
                        path: path.clone(),
                        reason,
                    };
                    warn!("Skipping query file: {e}");
                    warnings.push(e);
                }
            }
        }

        Ok(queries)
    }

    fn load_learnings(
        &self,
        warnings: &mut Vec<KnowledgeError>,
    ) -> Result<Vec<Learning>, KnowledgeError> {
        let mut learnings = Vec::new();

        for path in list_files(&self.layout.learnings_dir(), "json")? {
            let parsed = read_to_string(&path).and_then(|content| {
                serde_json::from_str::<LearningFile>(&content).map_err(|e| {
                    KnowledgeError::MalformedDescriptor {
                        path: path.clone(),
                        reason: format!("not a learning or list of learnings: {e}"),
                    }
                })
            });
            match parsed {
                Ok(LearningFile::Many(many)) => learnings.extend(many),
                Ok(LearningFile::One(one)) => learnings.push(one),
                Err(e) => {
                    warn!("Skipping learnings file: {e}");
                    warnings.push(e);
                }
            }
        }

        Ok(learnings)
    }
}

/// Load the store rooted at `root`.
pub fn load_knowledge(root: &Path) -> Result<Knowledge, KnowledgeError> {
    KnowledgeLoader::new(root).load()
}

/// Every learning on disk, skipping unreadable files silently.
pub(crate) fn existing_learnings(layout: &StoreLayout) -> Vec<Learning> {
    let mut warnings = Vec::new();
    KnowledgeLoader {
        layout: layout.clone(),
    }
    .load_learnings(&mut warnings)
    .unwrap_or_default()
}

fn read_to_string(path: &Path) -> Result<String, KnowledgeError> {
    std::fs::read_to_string(path).map_err(|e| KnowledgeError::Io {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn read_table(path: &Path) -> Result<TableDescriptor, KnowledgeError> {
    let malformed = |reason: String| KnowledgeError::MalformedDescriptor {
        path: path.to_path_buf(),
        reason,
    };

    let content = read_to_string(path)?;
    let raw: RawTable =
        serde_json::from_str(&content).map_err(|e| malformed(format!("invalid JSON: {e}")))?;

    let mut missing = Vec::new();
    let table_name = non_empty(raw.table_name);
    let description = non_empty(raw.table_description);
    if table_name.is_none() {
        missing.push("table_name");
    }
    if description.is_none() {
        missing.push("table_description");
    }
    let (Some(table_name), Some(description)) = (table_name, description) else {
        return Err(malformed(format!(
            "missing required field(s): {}",
            missing.join(", ")
        )));
    };

    let mut seen = BTreeSet::new();
    for column in &raw.table_columns {
        if column.name.trim().is_empty() {
            return Err(malformed("column with empty name".into()));
        }
        if !seen.insert(column.name.as_str()) {
            return Err(malformed(format!("duplicate column '{}'", column.name)));
        }
    }

    Ok(TableDescriptor {
        table_name,
        description,
        use_cases: raw.use_cases,
        data_quality_notes: raw.data_quality_notes,
        columns: raw.table_columns,
        primary_key: raw.primary_key,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlkeeper_core::LearningCategory;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn orders_json() -> &'static str {
        r#"{
            "table_name": "orders",
            "table_description": "One row per order",
            "use_cases": ["Revenue by month"],
            "data_quality_notes": ["amount is stored in cents"],
            "table_columns": [
                {"name": "id", "type": "integer", "description": "Primary key"},
                {"name": "amount", "type": "integer", "description": "Cents"}
            ]
        }"#
    }

    fn populated_store() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "tables/orders.json", orders_json());
        write(
            root,
            "tables/customers.json",
            r#"{"table_name": "customers", "table_description": "Buyers"}"#,
        );
        write(
            root,
            "business/metrics.json",
            r#"{
                "metrics": [{"name": "GMV", "definition": "Gross value", "table": "orders", "calculation": "sum(amount)"}],
                "common_gotchas": [{"issue": "cents", "tables_affected": ["orders"], "solution": "divide by 100"}]
            }"#,
        );
        write(
            root,
            "business/rules.json",
            r#"{"business_rules": ["Cancelled orders never count"]}"#,
        );
        write(
            root,
            "queries/orders.sql",
            "-- <query name>gmv</query name>\n-- <query description>\n-- GMV\n-- </query description>\n-- <query>\nSELECT sum(amount) FROM orders\n-- </query>\n",
        );
        write(
            root,
            "learnings/one.json",
            r#"{"category": "type_gotcha", "description": "amount is cents", "tables_affected": ["orders"]}"#,
        );
        write(
            root,
            "learnings/many.json",
            r#"[{"category": "performance", "description": "index on created_at"}]"#,
        );
        dir
    }

    #[test]
    fn loads_every_section() {
        let dir = populated_store();
        let knowledge = load_knowledge(dir.path()).unwrap();

        let names: Vec<&str> = knowledge.table_names().collect();
        assert_eq!(names, vec!["customers", "orders"]);
        let orders = knowledge.table("orders").unwrap();
        assert_eq!(orders.columns.len(), 2);
        assert_eq!(orders.data_quality_notes, vec!["amount is stored in cents"]);

        assert_eq!(knowledge.business.metrics.len(), 1);
        assert_eq!(knowledge.business.business_rules.len(), 1);
        assert_eq!(knowledge.business.common_gotchas.len(), 1);
        assert_eq!(knowledge.queries.len(), 1);
        assert_eq!(knowledge.queries[0].name, "gmv");

        // many.json sorts before one.json
        assert_eq!(knowledge.learnings.len(), 2);
        assert_eq!(knowledge.learnings[0].category, LearningCategory::Performance);
        assert!(knowledge.warnings.is_empty());
    }

    #[test]
    fn loading_is_idempotent() {
        let dir = populated_store();
        let first = load_knowledge(dir.path()).unwrap();
        let second = load_knowledge(dir.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_root_loads_empty_knowledge() {
        let dir = tempfile::tempdir().unwrap();
        let knowledge = load_knowledge(dir.path()).unwrap();
        assert_eq!(knowledge, Knowledge::default());
    }

    #[test]
    fn missing_required_field_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "tables/bad.json", r#"{"table_name": "bad"}"#);

        let err = load_knowledge(dir.path()).unwrap_err();
        match err {
            KnowledgeError::MalformedDescriptor { path, reason } => {
                assert!(path.ends_with("tables/bad.json"));
                assert!(reason.contains("table_description"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn blank_table_name_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "tables/blank.json",
            r#"{"table_name": "  ", "table_description": "x"}"#,
        );
        let err = load_knowledge(dir.path()).unwrap_err();
        assert!(err.to_string().contains("table_name"));
    }

    #[test]
    fn duplicate_table_names_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "tables/a.json", orders_json());
        write(dir.path(), "tables/b.json", orders_json());

        let err = load_knowledge(dir.path()).unwrap_err();
        match err {
            KnowledgeError::DuplicateTable { table, first, second } => {
                assert_eq!(table, "orders");
                assert!(first.ends_with("a.json"));
                assert!(second.ends_with("b.json"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicate_columns_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "tables/t.json",
            r#"{"table_name": "t", "table_description": "d",
                "table_columns": [{"name": "id"}, {"name": "id"}]}"#,
        );
        let err = load_knowledge(dir.path()).unwrap_err();
        assert!(err.to_string().contains("duplicate column 'id'"));
    }

    #[test]
    fn every_bad_table_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "tables/a.json", "{ not json");
        write(dir.path(), "tables/b.json", r#"{"table_description": "no name"}"#);
        write(dir.path(), "tables/c.json", orders_json());
        write(dir.path(), "business/x.json", r#"{"metrics": "oops"}"#);

        let err = load_knowledge(dir.path()).unwrap_err();
        let problems = err.problems();
        assert_eq!(problems.len(), 3);
        assert!(problems.iter().all(|p| matches!(p, KnowledgeError::MalformedDescriptor { .. })));
    }

    #[test]
    fn malformed_query_file_does_not_block_others() {
        let dir = populated_store();
        write(
            dir.path(),
            "queries/broken.sql",
            "-- <query name>broken</query name>\n-- <query description>\n-- x\n-- </query description>\nSELECT 1\n",
        );
        write(
            dir.path(),
            "queries/zz_more.sql",
            "-- <query name>count_orders</query name>\n-- <query description>\n-- n\n-- </query description>\n-- <query>\nSELECT count(*) FROM orders\n-- </query>\n",
        );

        let knowledge = load_knowledge(dir.path()).unwrap();
        let names: Vec<&str> = knowledge.queries.iter().map(|q| q.name.as_str()).collect();
        assert_eq!(names, vec!["gmv", "count_orders"]);
        assert_eq!(knowledge.warnings.len(), 1);
        assert!(matches!(
            &knowledge.warnings[0],
            KnowledgeError::MalformedQueryPattern { path, .. } if path.ends_with("broken.sql")
        ));
    }

    #[test]
    fn malformed_learning_file_is_skipped() {
        let dir = populated_store();
        write(dir.path(), "learnings/bad.json", r#"{"category": "gossip", "description": "x"}"#);

        let knowledge = load_knowledge(dir.path()).unwrap();
        assert_eq!(knowledge.learnings.len(), 2);
        assert_eq!(knowledge.warnings.len(), 1);
    }
}
