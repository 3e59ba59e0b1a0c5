//! Drift report — the structured difference between knowledge and the live
//! catalog.
//!
//! All collections are ordered so that two runs over the same inputs render
//! byte-identical output.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Why two column types were judged different.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeVerdict {
    /// Both types belong to the equivalence policy, but to different classes.
    Incompatible,
    /// At least one type is outside every equivalence class.
    Unrecognized,
}

impl TypeVerdict {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Incompatible => "incompatible",
            Self::Unrecognized => "unrecognized type",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeMismatch {
    pub column: String,
    /// Type written in the knowledge descriptor, verbatim.
    pub declared: String,
    /// Type reported by the database, verbatim.
    pub actual: String,
    pub verdict: TypeVerdict,
}

/// Column-level drift for one table present on both sides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDiff {
    /// In the database, not in knowledge, with the live type.
    pub added: BTreeMap<String, String>,
    /// In knowledge, not in the database.
    pub removed: BTreeSet<String>,
    /// Sorted by column name.
    pub type_mismatches: Vec<TypeMismatch>,
}

impl ColumnDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.type_mismatches.is_empty()
    }

    pub fn issue_count(&self) -> usize {
        self.added.len() + self.removed.len() + self.type_mismatches.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftReport {
    /// Described in knowledge but absent from the database.
    pub missing_in_db: BTreeSet<String>,
    /// Present in the database but without a descriptor.
    pub missing_in_knowledge: BTreeSet<String>,
    /// Only tables with at least one column problem appear here.
    pub column_diffs: BTreeMap<String, ColumnDiff>,
    /// Tables whose descriptor lists no columns; column checks were skipped.
    pub untracked_columns: BTreeSet<String>,
}

impl DriftReport {
    /// True when knowledge and the database agree.
    pub fn is_clean(&self) -> bool {
        self.missing_in_db.is_empty()
            && self.missing_in_knowledge.is_empty()
            && self.column_diffs.is_empty()
    }

    pub fn issue_count(&self) -> usize {
        self.missing_in_db.len()
            + self.missing_in_knowledge.len()
            + self
                .column_diffs
                .values()
                .map(ColumnDiff::issue_count)
                .sum::<usize>()
    }

    /// One line per problem, grouped by table in name order.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();

        for name in &self.missing_in_db {
            lines.push(format!(
                "❌ MISSING TABLE: '{name}' is in knowledge but not in the database"
            ));
        }
        for name in &self.missing_in_knowledge {
            lines.push(format!(
                "➕ NEW TABLE: '{name}' is in the database but has no knowledge file"
            ));
        }
        for (table, diff) in &self.column_diffs {
            for col in &diff.removed {
                lines.push(format!("  ⚠️  {table}.{col}: in knowledge but not in database"));
            }
            for (col, live_type) in &diff.added {
                lines.push(format!(
                    "  ➕ {table}.{col}: in database ({live_type}) but not in knowledge"
                ));
            }
            for m in &diff.type_mismatches {
                lines.push(format!(
                    "  🔄 {table}.{}: declared={}, actual={} ({})",
                    m.column,
                    m.declared,
                    m.actual,
                    m.verdict.label()
                ));
            }
        }

        lines
    }
}
