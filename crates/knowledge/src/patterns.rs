//! Tagged SQL query patterns.
//!
//! A pattern file holds one or more blocks:
//!
//! ```sql
//! -- <query name>orders_by_month</query name>
//! -- <query description>
//! -- Monthly order totals.
//! -- </query description>
//! -- <query>
//! SELECT date_trunc('month', created_at), sum(amount) FROM orders GROUP BY 1
//! -- </query>
//! ```
//!
//! Text between blocks is ignored. An incomplete block makes the whole file
//! malformed.

use sqlkeeper_core::ValidatedQuery;
use std::path::Path;

const NAME_OPEN: &str = "<query name>";
const NAME_CLOSE: &str = "</query name>";
const DESCRIPTION_OPEN: &str = "<query description>";
const DESCRIPTION_CLOSE: &str = "</query description>";
const QUERY_OPEN: &str = "<query>";
const QUERY_CLOSE: &str = "</query>";

enum State {
    Between,
    ExpectDescription { name: String },
    Description { name: String, lines: Vec<String> },
    ExpectQuery { name: String, description: String },
    Body { name: String, description: String, lines: Vec<String> },
}

/// The text after `--` on a SQL comment line.
fn comment_text(line: &str) -> Option<&str> {
    line.trim().strip_prefix("--").map(str::trim)
}

/// The name from a `-- <query name>…</query name>` line.
fn block_name(line: &str) -> Option<&str> {
    let text = comment_text(line)?;
    let rest = text.strip_prefix(NAME_OPEN)?;
    let end = rest.find(NAME_CLOSE)?;
    Some(rest[..end].trim())
}

fn is_tag(line: &str, tag: &str) -> bool {
    comment_text(line) == Some(tag)
}

/// Parse every block in `content`.
///
/// Returns the reason text on failure; the caller wraps it with the path.
pub fn parse_query_patterns(content: &str, source: &Path) -> Result<Vec<ValidatedQuery>, String> {
    let mut patterns = Vec::new();
    let mut state = State::Between;

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        state = match state {
            State::Between => match block_name(line) {
                Some("") => return Err(format!("line {line_no}: empty query name")),
                Some(name) => State::ExpectDescription { name: name.to_string() },
                None => State::Between,
            },
            State::ExpectDescription { name } => {
                if line.trim().is_empty() {
                    State::ExpectDescription { name }
                } else if is_tag(line, DESCRIPTION_OPEN) {
                    State::Description { name, lines: Vec::new() }
                } else {
                    return Err(format!(
                        "line {line_no}: query '{name}' expected `-- {DESCRIPTION_OPEN}`"
                    ));
                }
            }
            State::Description { name, mut lines } => {
                if is_tag(line, DESCRIPTION_CLOSE) {
                    State::ExpectQuery {
                        name,
                        description: clean_description(&lines),
                    }
                } else if block_name(line).is_some() {
                    return Err(format!(
                        "line {line_no}: query '{name}' description is not closed"
                    ));
                } else {
                    lines.push(line.to_string());
                    State::Description { name, lines }
                }
            }
            State::ExpectQuery { name, description } => {
                if line.trim().is_empty() {
                    State::ExpectQuery { name, description }
                } else if is_tag(line, QUERY_OPEN) {
                    State::Body { name, description, lines: Vec::new() }
                } else {
                    return Err(format!(
                        "line {line_no}: query '{name}' is missing the `-- {QUERY_OPEN}` delimiter"
                    ));
                }
            }
            State::Body { name, description, mut lines } => {
                if is_tag(line, QUERY_CLOSE) {
                    let sql = lines.join("\n").trim().to_string();
                    if sql.is_empty() {
                        return Err(format!("line {line_no}: query '{name}' has an empty body"));
                    }
                    patterns.push(ValidatedQuery {
                        name,
                        description,
                        sql,
                        source: source.to_path_buf(),
                    });
                    State::Between
                } else if block_name(line).is_some() {
                    return Err(format!(
                        "line {line_no}: query '{name}' is missing the `-- {QUERY_CLOSE}` delimiter"
                    ));
                } else {
                    lines.push(line.to_string());
                    State::Body { name, description, lines }
                }
            }
        };
    }

    match state {
        State::Between => {}
        State::ExpectDescription { name } | State::Description { name, .. } => {
            return Err(format!("query '{name}' has no complete description block"));
        }
        State::ExpectQuery { name, .. } => {
            return Err(format!("query '{name}' is missing the `-- {QUERY_OPEN}` delimiter"));
        }
        State::Body { name, .. } => {
            return Err(format!("query '{name}' is missing the `-- {QUERY_CLOSE}` delimiter"));
        }
    }

    if patterns.is_empty() && !content.trim().is_empty() {
        return Err("no query blocks found".into());
    }

    Ok(patterns)
}

/// Strip the comment markers from description lines.
fn clean_description(lines: &[String]) -> String {
    lines
        .iter()
        .map(|line| line.trim().trim_start_matches('-').trim())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Names of all blocks in `content`, without validating the blocks.
pub fn block_names(content: &str) -> impl Iterator<Item = &str> {
    content.lines().filter_map(block_name)
}

/// Render one block in the pattern file format, preceded by a blank line.
pub fn render_query_block(name: &str, description: &str, sql: &str) -> String {
    let description_lines: Vec<String> = description
        .trim()
        .lines()
        .map(|line| format!("-- {}", line.trim()))
        .collect();

    format!(
        "\n-- {NAME_OPEN}{name}{NAME_CLOSE}\n\
         -- {DESCRIPTION_OPEN}\n\
         {}\n\
         -- {DESCRIPTION_CLOSE}\n\
         -- {QUERY_OPEN}\n\
         {}\n\
         -- {QUERY_CLOSE}\n",
        description_lines.join("\n"),
        sql.trim()
    )
}
