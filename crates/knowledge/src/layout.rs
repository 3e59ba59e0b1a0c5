//! Directory layout of a knowledge root.

use sqlkeeper_core::error::KnowledgeError;
use std::path::{Path, PathBuf};

/// Name of the file saved queries are appended to.
pub const SAVED_QUERIES_FILE: &str = "saved_queries.sql";

#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tables_dir(&self) -> PathBuf {
        self.root.join("tables")
    }

    pub fn business_dir(&self) -> PathBuf {
        self.root.join("business")
    }

    pub fn queries_dir(&self) -> PathBuf {
        self.root.join("queries")
    }

    pub fn learnings_dir(&self) -> PathBuf {
        self.root.join("learnings")
    }

    /// Where the descriptor for `table_name` lives by convention.
    pub fn table_path(&self, table_name: &str) -> PathBuf {
        self.tables_dir()
            .join(format!("{}.json", file_stem(table_name)))
    }

    pub fn saved_queries_path(&self) -> PathBuf {
        self.queries_dir().join(SAVED_QUERIES_FILE)
    }
}

/// Turn a table name into a safe file stem. Schema-qualified names keep
/// their dot.
pub fn file_stem(table_name: &str) -> String {
    table_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// List files in `dir` with the given extension, sorted by file name.
///
/// A missing directory is an empty list, not an error.
pub fn list_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, KnowledgeError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(dir).map_err(|e| KnowledgeError::Io {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| path.extension().is_some_and(|ext| ext == extension))
        .collect();
    files.sort();
    Ok(files)
}
