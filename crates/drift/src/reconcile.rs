use crate::types::TypeEquivalence;
use sqlkeeper_core::catalog::{LiveCatalog, LiveTable};
use sqlkeeper_core::drift::{ColumnDiff, DriftReport, TypeMismatch};
use sqlkeeper_core::knowledge::TableDescriptor;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Compares table descriptors with a live catalog.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    types: TypeEquivalence,
}

impl Reconciler {
    pub fn new(types: TypeEquivalence) -> Self {
        Self { types }
    }

    pub fn types(&self) -> &TypeEquivalence {
        &self.types
    }

    /// Build the drift report. Neither input is modified.
    pub fn reconcile(
        &self,
        tables: &BTreeMap<String, TableDescriptor>,
        catalog: &LiveCatalog,
    ) -> DriftReport {
        let known: BTreeSet<&str> = tables.keys().map(String::as_str).collect();
        let live: BTreeSet<&str> = catalog.table_names().collect();

        let mut report = DriftReport {
            missing_in_db: known.difference(&live).map(|s| s.to_string()).collect(),
            missing_in_knowledge: live.difference(&known).map(|s| s.to_string()).collect(),
            ..Default::default()
        };

        for name in known.intersection(&live) {
            let (Some(descriptor), Some(table)) = (tables.get(*name), catalog.table(name)) else {
                continue;
            };
            if descriptor.columns.is_empty() {
                report.untracked_columns.insert(name.to_string());
                continue;
            }

            let diff = self.diff_columns(descriptor, table);
            if !diff.is_empty() {
                debug!(table = %name, issues = diff.issue_count(), "Column drift");
                report.column_diffs.insert(name.to_string(), diff);
            }
        }

        report
    }

    fn diff_columns(&self, descriptor: &TableDescriptor, table: &LiveTable) -> ColumnDiff {
        let declared: BTreeSet<&str> = descriptor.columns.iter().map(|c| c.name.as_str()).collect();
        let actual: BTreeSet<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();

        let type_mismatches = declared
            .intersection(&actual)
            .filter_map(|name| {
                let known = descriptor.column(name)?;
                let live = table.column(name)?;
                let verdict = self.types.compare(&known.declared_type, &live.data_type)?;
                Some(TypeMismatch {
                    column: name.to_string(),
                    declared: known.declared_type.clone(),
                    actual: live.data_type.clone(),
                    verdict,
                })
            })
            .collect();

        ColumnDiff {
            added: table
                .columns
                .iter()
                .filter(|c| !declared.contains(c.name.as_str()))
                .map(|c| (c.name.clone(), c.data_type.clone()))
                .collect(),
            removed: declared.difference(&actual).map(|s| s.to_string()).collect(),
            type_mismatches,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlkeeper_core::catalog::LiveColumn;
    use sqlkeeper_core::drift::TypeVerdict;
    use sqlkeeper_core::knowledge::ColumnDescriptor;

    fn descriptor(name: &str, columns: &[(&str, &str)]) -> TableDescriptor {
        TableDescriptor {
            table_name: name.into(),
            description: format!("The {name} table"),
            use_cases: vec![],
            data_quality_notes: vec![],
            columns: columns
                .iter()
                .map(|(n, t)| ColumnDescriptor {
                    name: (*n).into(),
                    declared_type: (*t).into(),
                    description: String::new(),
                    nullable: None,
                })
                .collect(),
            primary_key: vec![],
        }
    }

    fn live(name: &str, columns: &[(&str, &str)]) -> LiveTable {
        LiveTable {
            name: name.into(),
            columns: columns
                .iter()
                .map(|(n, t)| LiveColumn {
                    name: (*n).into(),
                    data_type: (*t).into(),
                    nullable: true,
                })
                .collect(),
            primary_key: vec![],
        }
    }

    fn knowledge(descriptors: Vec<TableDescriptor>) -> BTreeMap<String, TableDescriptor> {
        descriptors
            .into_iter()
            .map(|d| (d.table_name.clone(), d))
            .collect()
    }

    #[test]
    fn matching_sides_are_clean() {
        let tables = knowledge(vec![descriptor("orders", &[("id", "integer"), ("amount", "integer")])]);
        let catalog: LiveCatalog = [live("orders", &[("id", "integer"), ("amount", "bigint")])]
            .into_iter()
            .collect();

        let report = Reconciler::default().reconcile(&tables, &catalog);
        assert!(report.is_clean());
        assert_eq!(report.issue_count(), 0);
    }

    #[test]
    fn incompatible_type_is_reported_verbatim() {
        let tables = knowledge(vec![descriptor("orders", &[("id", "integer"), ("amount", "integer")])]);
        let catalog: LiveCatalog = [live("orders", &[("id", "integer"), ("amount", "text")])]
            .into_iter()
            .collect();

        let report = Reconciler::default().reconcile(&tables, &catalog);
        let diff = &report.column_diffs["orders"];
        assert_eq!(
            diff.type_mismatches,
            vec![TypeMismatch {
                column: "amount".into(),
                declared: "integer".into(),
                actual: "text".into(),
                verdict: TypeVerdict::Incompatible,
            }]
        );
        assert!(diff.added.is_empty() && diff.removed.is_empty());
    }

    #[test]
    fn table_and_column_set_differences() {
        let tables = knowledge(vec![
            descriptor("orders", &[("id", "integer"), ("legacy_flag", "boolean")]),
            descriptor("archived", &[("id", "integer")]),
        ]);
        let catalog: LiveCatalog = [
            live("orders", &[("id", "integer"), ("currency", "text")]),
            live("refunds", &[("id", "integer")]),
        ]
        .into_iter()
        .collect();

        let report = Reconciler::default().reconcile(&tables, &catalog);
        assert_eq!(report.missing_in_db, BTreeSet::from(["archived".to_string()]));
        assert_eq!(report.missing_in_knowledge, BTreeSet::from(["refunds".to_string()]));

        let diff = &report.column_diffs["orders"];
        assert_eq!(
            diff.added,
            BTreeMap::from([("currency".to_string(), "text".to_string())])
        );
        assert_eq!(diff.removed, BTreeSet::from(["legacy_flag".to_string()]));
        assert_eq!(report.issue_count(), 4);

        let lines = report.summary_lines();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("'archived'"));
        assert!(lines[1].contains("'refunds'"));
    }

    #[test]
    fn descriptors_without_columns_are_untracked() {
        let tables = knowledge(vec![descriptor("events", &[])]);
        let catalog: LiveCatalog = [live("events", &[("id", "bigint"), ("payload", "jsonb")])]
            .into_iter()
            .collect();

        let report = Reconciler::default().reconcile(&tables, &catalog);
        assert!(report.is_clean());
        assert_eq!(report.untracked_columns, BTreeSet::from(["events".to_string()]));
    }

    #[test]
    fn report_is_deterministic() {
        let tables = knowledge(vec![
            descriptor("b", &[("z", "text"), ("a", "integer")]),
            descriptor("a", &[("x", "uuid")]),
        ]);
        let catalog: LiveCatalog = [
            live("a", &[("x", "text")]),
            live("b", &[("a", "text"), ("z", "integer"), ("m", "date")]),
        ]
        .into_iter()
        .collect();

        let reconciler = Reconciler::default();
        let first = reconciler.reconcile(&tables, &catalog);
        let second = reconciler.reconcile(&tables, &catalog);
        assert_eq!(first, second);
        assert_eq!(first.summary_lines(), second.summary_lines());

        let columns: Vec<_> = first.column_diffs["b"]
            .type_mismatches
            .iter()
            .map(|m| m.column.as_str())
            .collect();
        assert_eq!(columns, vec!["a", "z"]);
        assert_eq!(
            first.column_diffs["a"].type_mismatches[0].verdict,
            TypeVerdict::Unrecognized
        );
    }
}
