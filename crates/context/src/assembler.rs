//! Context assembly: knowledge store to one prompt block.
//!
//! The block has a fixed section layout (tables, metrics, business rules,
//! gotchas, query patterns, learnings). When the rendered block exceeds the
//! token budget, whole items are dropped one at a time in a fixed order:
//!
//! learnings → query patterns → use cases → columns → metrics →
//! business rules → gotchas → data-quality notes → table descriptions
//!
//! Within a kind the last item goes first. Table names are never dropped.
//! Every drop is recorded in [`AssemblyMetadata`] and listed in an
//! `## OMITTED FOR SPACE` section of the block itself.
//!
//! # Determinism
//!
//! Assembly is a pure function of the knowledge and the budget.

use crate::token;
use serde::{Deserialize, Serialize};
use sqlkeeper_core::knowledge::{
    Gotcha, Knowledge, Learning, Metric, TableDescriptor, ValidatedQuery,
};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Default token budget for the assembled block.
pub const DEFAULT_MAX_TOKENS: usize = 8000;

// ── Types ─────────────────────────────────────────────────────────────────

/// A droppable kind of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Learning,
    QueryPattern,
    UseCases,
    Columns,
    Metric,
    BusinessRule,
    Gotcha,
    DataQualityNotes,
    TableDescription,
}

impl ItemKind {
    /// Kinds in the order they are dropped when over budget.
    pub const DROP_ORDER: [ItemKind; 9] = [
        Self::Learning,
        Self::QueryPattern,
        Self::UseCases,
        Self::Columns,
        Self::Metric,
        Self::BusinessRule,
        Self::Gotcha,
        Self::DataQualityNotes,
        Self::TableDescription,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Learning => "learnings",
            Self::QueryPattern => "query patterns",
            Self::UseCases => "use cases",
            Self::Columns => "columns",
            Self::Metric => "metrics",
            Self::BusinessRule => "business rules",
            Self::Gotcha => "gotchas",
            Self::DataQualityNotes => "data-quality notes",
            Self::TableDescription => "table descriptions",
        }
    }
}

/// One item removed during budget enforcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropInfo {
    pub kind: ItemKind,
    /// Query or metric name, table name for per-table content, or the start
    /// of the text otherwise.
    pub item: String,
    /// Estimated tokens of the dropped content.
    pub tokens_dropped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindStats {
    pub kind: ItemKind,
    pub items_included: usize,
    pub items_total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyMetadata {
    /// Estimated tokens of the final block.
    pub total_tokens: usize,
    pub budget: usize,
    /// Budget utilization percentage (0.0–100.0).
    pub utilization_pct: f32,
    /// One entry per kind, in drop order.
    pub per_kind: Vec<KindStats>,
    /// In the order the items were dropped.
    pub drops: Vec<DropInfo>,
}

#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub text: String,
    pub metadata: AssemblyMetadata,
}

/// Errors from context assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    /// Even the table names alone do not fit.
    BudgetExceeded { required_tokens: usize, budget: usize },
}

impl std::fmt::Display for AssemblyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BudgetExceeded {
                required_tokens,
                budget,
            } => write!(
                f,
                "Knowledge needs at least {required_tokens} tokens with everything optional \
                 dropped, budget is {budget} tokens"
            ),
        }
    }
}

impl std::error::Error for AssemblyError {}

/// A droppable item: its kind and index within that kind's source list.
type ItemId = (ItemKind, usize);

struct Candidate {
    id: ItemId,
    label: String,
    tokens: usize,
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// The context assembler. Stateless apart from its budget.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    max_tokens: usize,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOKENS)
    }
}

impl ContextAssembler {
    pub fn new(max_tokens: usize) -> Self {
        Self { max_tokens }
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Render `knowledge`, dropping items until the block fits the budget.
    pub fn assemble(&self, knowledge: &Knowledge) -> Result<AssembledContext, AssemblyError> {
        let queue = drop_queue(knowledge);
        let totals: Vec<(ItemKind, usize)> = ItemKind::DROP_ORDER
            .iter()
            .map(|kind| (*kind, queue.iter().filter(|c| c.id.0 == *kind).count()))
            .collect();

        let mut omitted: BTreeSet<ItemId> = BTreeSet::new();
        let mut drops: Vec<DropInfo> = Vec::new();
        let mut pending = queue.into_iter();

        loop {
            let text = render(knowledge, &omitted, &drops);
            let total_tokens = token::estimate_tokens(&text);

            if total_tokens <= self.max_tokens {
                debug!(
                    tokens = total_tokens,
                    budget = self.max_tokens,
                    dropped = drops.len(),
                    "Assembled knowledge context"
                );
                let per_kind = totals
                    .iter()
                    .map(|(kind, total)| KindStats {
                        kind: *kind,
                        items_included: total - drops.iter().filter(|d| d.kind == *kind).count(),
                        items_total: *total,
                    })
                    .collect();
                let utilization_pct = if self.max_tokens == 0 {
                    0.0
                } else {
                    (total_tokens as f32 / self.max_tokens as f32) * 100.0
                };
                return Ok(AssembledContext {
                    text,
                    metadata: AssemblyMetadata {
                        total_tokens,
                        budget: self.max_tokens,
                        utilization_pct,
                        per_kind,
                        drops,
                    },
                });
            }

            let Some(next) = pending.next() else {
                return Err(AssemblyError::BudgetExceeded {
                    required_tokens: total_tokens,
                    budget: self.max_tokens,
                });
            };

            warn!(
                kind = next.id.0.label(),
                item = %next.label,
                tokens = next.tokens,
                "Dropped context item to fit the token budget"
            );
            omitted.insert(next.id);
            drops.push(DropInfo {
                kind: next.id.0,
                item: next.label,
                tokens_dropped: next.tokens,
            });
        }
    }
}

// ── Drop order ────────────────────────────────────────────────────────────

/// Every droppable item, in the exact order items will be dropped.
fn drop_queue(knowledge: &Knowledge) -> Vec<Candidate> {
    let mut queue = Vec::new();
    for kind in ItemKind::DROP_ORDER {
        let mut items = candidates(knowledge, kind);
        items.reverse();
        queue.extend(items);
    }
    queue
}

/// Items of one kind, in block order.
fn candidates(knowledge: &Knowledge, kind: ItemKind) -> Vec<Candidate> {
    match kind {
        ItemKind::Learning => knowledge
            .learnings
            .iter()
            .enumerate()
            .map(|(i, l)| candidate(kind, i, excerpt(&l.description), render_learning(l)))
            .collect(),
        ItemKind::QueryPattern => knowledge
            .queries
            .iter()
            .enumerate()
            .map(|(i, q)| candidate(kind, i, q.name.clone(), render_query(q)))
            .collect(),
        ItemKind::UseCases => per_table(knowledge, kind, |t| !t.use_cases.is_empty(), render_use_cases),
        ItemKind::Columns => per_table(knowledge, kind, |t| !t.columns.is_empty(), render_columns),
        ItemKind::Metric => knowledge
            .business
            .metrics
            .iter()
            .enumerate()
            .map(|(i, m)| candidate(kind, i, m.name.clone(), render_metric(m)))
            .collect(),
        ItemKind::BusinessRule => knowledge
            .business
            .business_rules
            .iter()
            .enumerate()
            .map(|(i, r)| candidate(kind, i, excerpt(r), render_rule(r)))
            .collect(),
        ItemKind::Gotcha => knowledge
            .business
            .common_gotchas
            .iter()
            .enumerate()
            .map(|(i, g)| candidate(kind, i, excerpt(&g.issue), render_gotcha(g)))
            .collect(),
        ItemKind::DataQualityNotes => per_table(
            knowledge,
            kind,
            |t| !t.data_quality_notes.is_empty(),
            render_quality_notes,
        ),
        ItemKind::TableDescription => per_table(
            knowledge,
            kind,
            |t| !t.description.is_empty(),
            render_description,
        ),
    }
}

fn candidate(kind: ItemKind, idx: usize, label: String, rendered: String) -> Candidate {
    Candidate {
        id: (kind, idx),
        label,
        tokens: token::estimate_tokens(&rendered),
    }
}

/// Per-table items, indexed by the table's position in name order.
fn per_table(
    knowledge: &Knowledge,
    kind: ItemKind,
    present: fn(&TableDescriptor) -> bool,
    render: fn(&TableDescriptor) -> String,
) -> Vec<Candidate> {
    knowledge
        .tables
        .values()
        .enumerate()
        .filter(|(_, t)| present(t))
        .map(|(i, t)| candidate(kind, i, t.table_name.clone(), render(t)))
        .collect()
}

/// First line of `text`, cut to 40 characters.
fn excerpt(text: &str) -> String {
    let line = text.lines().next().unwrap_or("").trim();
    if line.chars().count() > 40 {
        format!("{}...", line.chars().take(40).collect::<String>())
    } else {
        line.to_string()
    }
}

// ── Rendering ─────────────────────────────────────────────────────────────

fn render(knowledge: &Knowledge, omitted: &BTreeSet<ItemId>, drops: &[DropInfo]) -> String {
    let keep = |kind: ItemKind, idx: usize| !omitted.contains(&(kind, idx));
    let mut out = String::from("## TABLES\n\n");

    if knowledge.tables.is_empty() {
        out.push_str("No tables are described in the knowledge store.\n\n");
    }
    for (i, table) in knowledge.tables.values().enumerate() {
        out.push_str(&format!("### {}\n", table.table_name));
        if !table.description.is_empty() && keep(ItemKind::TableDescription, i) {
            out.push_str(&render_description(table));
        }
        out.push('\n');

        let blocks: [(ItemKind, bool, fn(&TableDescriptor) -> String); 3] = [
            (
                ItemKind::DataQualityNotes,
                !table.data_quality_notes.is_empty(),
                render_quality_notes,
            ),
            (ItemKind::UseCases, !table.use_cases.is_empty(), render_use_cases),
            (ItemKind::Columns, !table.columns.is_empty(), render_columns),
        ];
        for (kind, present, render_block) in blocks {
            if present && keep(kind, i) {
                out.push_str(&render_block(table));
                out.push('\n');
            }
        }
    }

    let business = &knowledge.business;
    push_section(
        &mut out,
        "## METRICS",
        kept(&business.metrics, ItemKind::Metric, keep, render_metric),
        true,
    );
    push_section(
        &mut out,
        "## BUSINESS RULES",
        kept(&business.business_rules, ItemKind::BusinessRule, keep, |r| render_rule(r)),
        false,
    );
    push_section(
        &mut out,
        "## COMMON GOTCHAS (READ CAREFULLY)",
        kept(&business.common_gotchas, ItemKind::Gotcha, keep, render_gotcha),
        true,
    );
    push_section(
        &mut out,
        "## VALIDATED QUERY PATTERNS",
        kept(&knowledge.queries, ItemKind::QueryPattern, keep, render_query),
        true,
    );
    push_section(
        &mut out,
        "## LEARNINGS FROM PREVIOUS SESSIONS",
        kept(&knowledge.learnings, ItemKind::Learning, keep, render_learning),
        false,
    );

    if !drops.is_empty() {
        out.push_str(&render_omitted(drops));
    }

    let mut text = out.trim_end().to_string();
    text.push('\n');
    text
}

fn kept<T>(
    items: &[T],
    kind: ItemKind,
    keep: impl Fn(ItemKind, usize) -> bool,
    render: impl Fn(&T) -> String,
) -> Vec<String> {
    items
        .iter()
        .enumerate()
        .filter(|(i, _)| keep(kind, *i))
        .map(|(_, item)| render(item))
        .collect()
}

/// Append a section unless it has no items. `spaced` puts a blank line
/// between items.
fn push_section(out: &mut String, heading: &str, items: Vec<String>, spaced: bool) {
    if items.is_empty() {
        return;
    }
    out.push_str(heading);
    out.push_str("\n\n");
    for item in items {
        out.push_str(&item);
        if spaced {
            out.push('\n');
        }
    }
    if !spaced {
        out.push('\n');
    }
}

fn render_description(table: &TableDescriptor) -> String {
    format!("{}\n", table.description)
}

fn render_quality_notes(table: &TableDescriptor) -> String {
    let mut out = String::from("**Data quality notes (IMPORTANT):**\n");
    for note in &table.data_quality_notes {
        out.push_str(&format!("- {note}\n"));
    }
    out
}

fn render_use_cases(table: &TableDescriptor) -> String {
    let mut out = String::from("**Use cases:**\n");
    for use_case in &table.use_cases {
        out.push_str(&format!("- {use_case}\n"));
    }
    out
}

fn render_columns(table: &TableDescriptor) -> String {
    let mut out = String::from("**Columns:**\n");
    for column in &table.columns {
        if column.description.is_empty() {
            out.push_str(&format!("- `{}` ({})\n", column.name, column.declared_type));
        } else {
            out.push_str(&format!(
                "- `{}` ({}): {}\n",
                column.name, column.declared_type, column.description
            ));
        }
    }
    out
}

fn render_metric(metric: &Metric) -> String {
    let mut out = format!("**{}**: {}\n", metric.name, metric.definition);
    if let Some(table) = &metric.table {
        out.push_str(&format!("  - Table: {table}\n"));
    }
    if let Some(calculation) = &metric.calculation {
        out.push_str(&format!("  - Calculation: {calculation}\n"));
    }
    out
}

fn render_rule(rule: &str) -> String {
    format!("- {rule}\n")
}

fn render_gotcha(gotcha: &Gotcha) -> String {
    let mut out = format!("**{}**\n", gotcha.issue);
    if !gotcha.tables_affected.is_empty() {
        out.push_str(&format!("  - Tables: {}\n", gotcha.tables_affected.join(", ")));
    }
    out.push_str(&format!("  - Solution: {}\n", gotcha.solution));
    out
}

fn render_query(query: &ValidatedQuery) -> String {
    let mut out = format!("### {}\n", query.name);
    if !query.description.is_empty() {
        out.push_str(&query.description);
        out.push('\n');
    }
    out.push_str(&format!("```sql\n{}\n```\n", query.sql));
    out
}

fn render_learning(learning: &Learning) -> String {
    let mut out = format!("- [{}] {}\n", learning.category, learning.description);
    if !learning.tables_affected.is_empty() {
        out.push_str(&format!("  - Tables: {}\n", learning.tables_affected.join(", ")));
    }
    if let Some(example) = &learning.example {
        out.push_str(&format!("  - Example: {example}\n"));
    }
    out
}

fn render_omitted(drops: &[DropInfo]) -> String {
    let mut out = String::from("## OMITTED FOR SPACE\n\nLeft out to fit the token budget:\n");
    for kind in ItemKind::DROP_ORDER {
        let items: Vec<&str> = drops
            .iter()
            .filter(|d| d.kind == kind)
            .map(|d| d.item.as_str())
            .collect();
        if !items.is_empty() {
            out.push_str(&format!("- {}: {}\n", kind.label(), items.join(", ")));
        }
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────
