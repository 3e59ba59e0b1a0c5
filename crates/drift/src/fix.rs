//! Auto-fix: write placeholder descriptors for tables that have none.

use sqlkeeper_core::catalog::{LiveCatalog, LiveTable};
use sqlkeeper_core::drift::DriftReport;
use sqlkeeper_core::error::WriteError;
use sqlkeeper_core::knowledge::{ColumnDescriptor, TableDescriptor};
use sqlkeeper_knowledge::KnowledgeStore;
use std::path::PathBuf;
use tracing::{info, warn};

/// What an auto-fix run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixOutcome {
    pub written: Vec<PathBuf>,
    /// Tables left alone because a file already occupies their path.
    pub skipped: Vec<String>,
}

/// Placeholder descriptor built from the live table.
pub fn synthesize_descriptor(table: &LiveTable) -> TableDescriptor {
    TableDescriptor {
        table_name: table.name.clone(),
        description: format!("Auto-discovered table: {}", table.name),
        use_cases: Vec::new(),
        data_quality_notes: Vec::new(),
        columns: table
            .columns
            .iter()
            .map(|c| ColumnDescriptor {
                name: c.name.clone(),
                declared_type: c.data_type.to_lowercase(),
                description: String::new(),
                nullable: Some(c.nullable),
            })
            .collect(),
        primary_key: table.primary_key.clone(),
    }
}

/// Write a descriptor for every table in `report.missing_in_knowledge`.
///
/// Existing files are never replaced; the first other write failure stops
/// the run.
pub fn apply_fixes(
    report: &DriftReport,
    catalog: &LiveCatalog,
    store: &KnowledgeStore,
) -> Result<FixOutcome, WriteError> {
    let mut outcome = FixOutcome::default();

    for name in &report.missing_in_knowledge {
        let Some(table) = catalog.table(name) else {
            warn!(table = %name, "Table vanished from the catalog, not fixing");
            outcome.skipped.push(name.clone());
            continue;
        };

        match store.write_table(&synthesize_descriptor(table)) {
            Ok(path) => outcome.written.push(path),
            Err(WriteError::AlreadyExists(path)) => {
                warn!(
                    table = %name,
                    path = %path.display(),
                    "Descriptor file exists but does not describe this table, leaving it alone"
                );
                outcome.skipped.push(name.clone());
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        written = outcome.written.len(),
        skipped = outcome.skipped.len(),
        "Auto-fix complete"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Reconciler;
    use sqlkeeper_core::catalog::LiveColumn;
    use sqlkeeper_knowledge::load_knowledge;

    fn refunds() -> LiveTable {
        LiveTable {
            name: "refunds".into(),
            columns: vec![
                LiveColumn {
                    name: "id".into(),
                    data_type: "INTEGER".into(),
                    nullable: false,
                },
                LiveColumn {
                    name: "reason".into(),
                    data_type: "Character Varying".into(),
                    nullable: true,
                },
            ],
            primary_key: vec!["id".into()],
        }
    }

    #[test]
    fn synthesized_descriptor_uses_placeholders() {
        let descriptor = synthesize_descriptor(&refunds());
        assert_eq!(descriptor.description, "Auto-discovered table: refunds");
        assert_eq!(descriptor.columns[0].declared_type, "integer");
        assert_eq!(descriptor.columns[1].declared_type, "character varying");
        assert_eq!(descriptor.columns[1].nullable, Some(true));
        assert!(descriptor.columns.iter().all(|c| c.description.is_empty()));
        assert_eq!(descriptor.primary_key, vec!["id"]);
    }

    #[test]
    fn fix_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = KnowledgeStore::new(dir.path());
        let catalog: LiveCatalog = [refunds()].into_iter().collect();
        let reconciler = Reconciler::default();

        let knowledge = load_knowledge(dir.path()).unwrap();
        let report = reconciler.reconcile(&knowledge.tables, &catalog);
        assert!(report.missing_in_knowledge.contains("refunds"));

        let outcome = apply_fixes(&report, &catalog, &store).unwrap();
        assert_eq!(outcome.written, vec![store.layout().table_path("refunds")]);

        let knowledge = load_knowledge(dir.path()).unwrap();
        let report = reconciler.reconcile(&knowledge.tables, &catalog);
        assert!(report.is_clean());
        assert_eq!(apply_fixes(&report, &catalog, &store).unwrap(), FixOutcome::default());
    }

    #[test]
    fn occupied_path_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = KnowledgeStore::new(dir.path());
        let path = store.layout().table_path("refunds");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"table_name": "refund_log", "table_description": "Log"}"#)
            .unwrap();

        let catalog: LiveCatalog = [refunds()].into_iter().collect();
        let knowledge = load_knowledge(dir.path()).unwrap();
        let report = Reconciler::default().reconcile(&knowledge.tables, &catalog);

        let outcome = apply_fixes(&report, &catalog, &store).unwrap();
        assert!(outcome.written.is_empty());
        assert_eq!(outcome.skipped, vec!["refunds"]);
        assert!(std::fs::read_to_string(&path).unwrap().contains("refund_log"));
    }
}
