//! Writes into the knowledge store.
//!
//! Three writes exist: auto-fix table descriptors, saved queries, and
//! learnings. Descriptor and learning files are written to a temporary file
//! in the destination directory and renamed into place without clobbering,
//! so a failure never leaves a truncated file behind.

use crate::layout::{StoreLayout, list_files};
use crate::loader::existing_learnings;
use crate::patterns::{block_names, render_query_block};
use chrono::Utc;
use serde::Serialize;
use sqlkeeper_core::error::WriteError;
use sqlkeeper_core::knowledge::{Learning, TableDescriptor};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct KnowledgeStore {
    layout: StoreLayout,
}

impl KnowledgeStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: StoreLayout::new(root),
        }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Write a new descriptor to `tables/<name>.json`.
    ///
    /// Fails with [`WriteError::AlreadyExists`] rather than replace a file.
    pub fn write_table(&self, table: &TableDescriptor) -> Result<PathBuf, WriteError> {
        let path = self.layout.table_path(&table.table_name);
        write_json_new(&path, table)?;
        info!(table = %table.table_name, path = %path.display(), "Wrote table descriptor");
        Ok(path)
    }

    /// Whether any `.sql` file already has a block named `name`.
    pub fn query_exists(&self, name: &str) -> bool {
        let Ok(files) = list_files(&self.layout.queries_dir(), "sql") else {
            return false;
        };
        files.iter().any(|path| {
            std::fs::read_to_string(path)
                .map(|content| block_names(&content).any(|n| n == name))
                .unwrap_or(false)
        })
    }

    /// Append a query block to `queries/saved_queries.sql`.
    pub fn append_query(
        &self,
        name: &str,
        description: &str,
        sql: &str,
    ) -> Result<PathBuf, WriteError> {
        let path = self.layout.saved_queries_path();
        ensure_parent(&path)?;

        let block = render_query_block(name, description, sql);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| io_error(&path, e))?;
        file.write_all(block.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| io_error(&path, e))?;

        debug!(name = %name, path = %path.display(), "Appended saved query");
        Ok(path)
    }

    /// Whether a learning with the same description (ignoring case and
    /// surrounding whitespace) is already stored.
    pub fn learning_exists(&self, description: &str) -> bool {
        let wanted = description.trim().to_lowercase();
        existing_learnings(&self.layout)
            .iter()
            .any(|l| l.description.trim().to_lowercase() == wanted)
    }

    /// Write a learning to `learnings/<timestamp>_<slug>.json`.
    pub fn write_learning(&self, learning: &Learning) -> Result<PathBuf, WriteError> {
        let dir = self.layout.learnings_dir();
        let stem = format!(
            "{}_{}",
            Utc::now().format("%Y%m%d_%H%M%S"),
            slug(&learning.description)
        );

        let mut path = dir.join(format!("{stem}.json"));
        let mut attempt = 1;
        loop {
            match write_json_new(&path, learning) {
                Err(WriteError::AlreadyExists(_)) if attempt < 100 => {
                    attempt += 1;
                    path = dir.join(format!("{stem}_{attempt}.json"));
                }
                other => {
                    other?;
                    break;
                }
            }
        }

        info!(category = %learning.category, path = %path.display(), "Saved learning");
        Ok(path)
    }
}

/// Lowercase, underscore-separated prefix of `text`, safe for file names.
fn slug(text: &str) -> String {
    let slug: String = text
        .trim()
        .chars()
        .take(40)
        .map(|c| if c == ' ' { '_' } else { c.to_ascii_lowercase() })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if slug.is_empty() { "learning".into() } else { slug }
}

fn io_error(path: &Path, e: std::io::Error) -> WriteError {
    WriteError::Io {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

fn ensure_parent(path: &Path) -> Result<(), WriteError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    Ok(())
}

/// Serialize `value` as pretty JSON into `path`, which must not exist yet.
fn write_json_new<T: Serialize>(path: &Path, value: &T) -> Result<(), WriteError> {
    if path.exists() {
        return Err(WriteError::AlreadyExists(path.to_path_buf()));
    }
    ensure_parent(path)?;

    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    // Dropping the temp file on any early return deletes it.
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| io_error(dir, e))?;
    tmp.write_all(json.as_bytes())
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| io_error(tmp.path(), e))?;

    persist_new(tmp, path)
}

/// Renames `tmp` onto `path` unless something already lives there. On
/// failure the temp file is dropped, which removes it.
fn persist_new(tmp: tempfile::NamedTempFile, path: &Path) -> Result<(), WriteError> {
    tmp.persist_noclobber(path).map_err(|e| {
        if e.error.kind() == std::io::ErrorKind::AlreadyExists {
            WriteError::AlreadyExists(path.to_path_buf())
        } else {
            io_error(path, e.error)
        }
    })?;
    Ok(())
}
