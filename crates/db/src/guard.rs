//! Read-only statement guard shared by every path that runs or saves SQL.

use sqlkeeper_core::error::IntrospectError;

/// Keywords that reject a statement when they appear as a whole word.
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "drop", "delete", "truncate", "insert", "update", "alter", "create",
];

/// A statement that passed [`guard_read_only`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardedSql {
    sql: String,
    has_limit: bool,
}

impl GuardedSql {
    /// The statement without its trailing semicolon.
    pub fn as_str(&self) -> &str {
        &self.sql
    }

    /// The statement with `LIMIT <limit>` appended unless it already limits
    /// itself. The clause goes on its own line so a trailing `--` comment
    /// cannot swallow it.
    pub fn with_limit(&self, limit: usize) -> String {
        if self.has_limit {
            self.sql.clone()
        } else {
            format!("{}\nLIMIT {limit}", self.sql)
        }
    }
}

enum Scan {
    Code,
    Quoted(char),
    LineComment,
    BlockComment,
}

/// `sql` with string literals, quoted identifiers and comments blanked out,
/// so their text is never read as keywords or statement separators.
///
/// Returns `None` when a literal contains a backslash: whether it escapes
/// the quote depends on the backend, so the caller falls back to checking
/// the raw text.
fn code_only(sql: &str) -> Option<String> {
    let mut out = String::with_capacity(sql.len());
    let mut state = Scan::Code;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        state = match state {
            Scan::Code => match c {
                '\'' | '"' => {
                    out.push(c);
                    Scan::Quoted(c)
                }
                '-' if chars.peek() == Some(&'-') => {
                    chars.next();
                    out.push_str("  ");
                    Scan::LineComment
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    out.push_str("  ");
                    Scan::BlockComment
                }
                _ => {
                    out.push(c);
                    Scan::Code
                }
            },
            Scan::Quoted(quote) if c == quote => {
                out.push(c);
                Scan::Code
            }
            Scan::Quoted('\'') if c == '\\' => return None,
            Scan::Quoted(quote) => {
                out.push(' ');
                Scan::Quoted(quote)
            }
            Scan::LineComment if c == '\n' => {
                out.push(c);
                Scan::Code
            }
            Scan::LineComment => {
                out.push(' ');
                Scan::LineComment
            }
            Scan::BlockComment if c == '*' && chars.peek() == Some(&'/') => {
                chars.next();
                out.push_str("  ");
                Scan::Code
            }
            Scan::BlockComment => {
                out.push(if c == '\n' { c } else { ' ' });
                Scan::BlockComment
            }
        };
    }

    Some(out)
}

fn words(sql: &str) -> impl Iterator<Item = String> + '_ {
    sql.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_lowercase)
}

/// Accept a single `SELECT` or `WITH` statement without write keywords.
pub fn guard_read_only(sql: &str) -> Result<GuardedSql, IntrospectError> {
    let trimmed = sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    if trimmed.is_empty() {
        return Err(IntrospectError::Rejected("empty statement".into()));
    }
    let code = code_only(trimmed).unwrap_or_else(|| trimmed.to_string());
    if code.contains(';') {
        return Err(IntrospectError::Rejected(
            "only a single statement is allowed".into(),
        ));
    }

    let mut tokens = words(&code).peekable();
    match tokens.peek().map(String::as_str) {
        Some("select" | "with") => {}
        _ => {
            return Err(IntrospectError::Rejected(
                "only SELECT and WITH queries are allowed".into(),
            ));
        }
    }

    let mut has_limit = false;
    for token in tokens {
        if let Some(keyword) = FORBIDDEN_KEYWORDS.iter().find(|k| **k == token) {
            return Err(IntrospectError::Rejected(format!(
                "'{}' is not allowed in read-only queries",
                keyword.to_ascii_uppercase()
            )));
        }
        has_limit |= token == "limit";
    }

    Ok(GuardedSql {
        sql: trimmed.to_string(),
        has_limit,
    })
}
