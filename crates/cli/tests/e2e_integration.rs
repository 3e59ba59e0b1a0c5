//! End-to-end tests for SQLKeeper.
//!
//! These tests build a real knowledge store and a real SQLite database in a
//! temporary directory, then drive the pipeline through the library crates
//! and through the `sqlkeeper` binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use sqlkeeper_config::{DatabaseConfig, DriftConfig};
use sqlkeeper_context::ContextAssembler;
use sqlkeeper_db::SchemaSource;
use sqlkeeper_drift::{Reconciler, TypeEquivalence, apply_fixes};
use sqlkeeper_knowledge::{KnowledgeStore, load_knowledge};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

// ── Fixtures ─────────────────────────────────────────────────────────────

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
    knowledge: PathBuf,
    db_path: PathBuf,
}

impl Fixture {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let knowledge = root.join("knowledge");
        let db_path = root.join("shop.db");

        write(
            &knowledge.join("tables/orders.json"),
            r#"{
                "table_name": "orders",
                "table_description": "One row per order",
                "use_cases": ["Revenue by month"],
                "data_quality_notes": ["amount is in cents"],
                "table_columns": [
                    {"name": "id", "type": "integer", "description": "Primary key"},
                    {"name": "amount", "type": "integer", "description": "Order total"},
                    {"name": "note", "type": "text"}
                ]
            }"#,
        );
        write(
            &knowledge.join("tables/customers.json"),
            r#"{
                "table_name": "customers",
                "table_description": "Registered customers",
                "table_columns": [{"name": "id", "type": "integer"}]
            }"#,
        );
        write(
            &knowledge.join("business/metrics.json"),
            r#"{
                "metrics": [{"name": "GMV", "definition": "Sum of order amounts", "table": "orders"}],
                "business_rules": ["Cancelled orders are excluded from revenue"],
                "common_gotchas": [
                    {"issue": "amount is in cents", "tables_affected": ["orders"], "solution": "Divide by 100"}
                ]
            }"#,
        );

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(
                SqliteConnectOptions::new()
                    .filename(&db_path)
                    .create_if_missing(true),
            )
            .await
            .unwrap();
        sqlx::raw_sql(
            "CREATE TABLE orders (id INTEGER PRIMARY KEY, amount BIGINT NOT NULL, note TEXT);
             CREATE TABLE refunds (id INTEGER PRIMARY KEY, order_id INTEGER NOT NULL, reason TEXT);
             INSERT INTO orders (id, amount, note) VALUES (1, 1200, 'gift'), (2, 80, NULL);
             INSERT INTO refunds (id, order_id, reason) VALUES (1, 2, 'damaged');",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool.close().await;

        Self {
            _dir: dir,
            root,
            knowledge,
            db_path,
        }
    }

    fn database_url(&self) -> String {
        format!("sqlite://{}", self.db_path.display())
    }

    fn database(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: Some(self.database_url()),
            ..Default::default()
        }
    }

    /// Run the binary against this fixture with a clean environment.
    fn sqlkeeper(&self, database_url: &str, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_sqlkeeper"))
            .arg("--config")
            .arg(self.root.join("config.toml"))
            .arg("--knowledge-dir")
            .arg(&self.knowledge)
            .args(args)
            .env("DATABASE_URL", database_url)
            .env_remove("SQLKEEPER_CONFIG")
            .env_remove("SQLKEEPER_KNOWLEDGE_DIR")
            .env_remove("RUST_LOG")
            .output()
            .unwrap()
    }
}

fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn table_files(knowledge: &Path) -> Vec<(String, String)> {
    let mut files: Vec<(String, String)> = std::fs::read_dir(knowledge.join("tables"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .map(|p| {
            (
                p.file_name().unwrap().to_string_lossy().to_string(),
                std::fs::read_to_string(&p).unwrap(),
            )
        })
        .collect();
    files.sort();
    files
}

// ── Library pipeline ─────────────────────────────────────────────────────

#[tokio::test]
async fn drift_fix_and_context_pipeline() {
    let fx = Fixture::new().await;
    let source = sqlkeeper_db::connect(&fx.database()).await.unwrap();
    assert_eq!(source.backend(), "sqlite");
    let catalog = source.introspect().await.unwrap();

    let reconciler = Reconciler::new(TypeEquivalence::from_config(&DriftConfig::default()));
    let knowledge = load_knowledge(&fx.knowledge).unwrap();
    let report = reconciler.reconcile(&knowledge.tables, &catalog);

    // BIGINT and INTEGER share a class, so orders has no column drift.
    assert!(report.column_diffs.is_empty());
    assert_eq!(report.missing_in_db.iter().collect::<Vec<_>>(), vec!["customers"]);
    assert_eq!(report.missing_in_knowledge.iter().collect::<Vec<_>>(), vec!["refunds"]);

    let store = KnowledgeStore::new(&fx.knowledge);
    let outcome = apply_fixes(&report, &catalog, &store).unwrap();
    assert_eq!(outcome.written.len(), 1);
    assert!(outcome.written[0].ends_with("tables/refunds.json"));

    let knowledge = load_knowledge(&fx.knowledge).unwrap();
    let refunds = knowledge.table("refunds").unwrap();
    let columns: Vec<&str> = refunds.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(columns, vec!["id", "order_id", "reason"]);
    assert_eq!(refunds.primary_key, vec!["id"]);

    let report = reconciler.reconcile(&knowledge.tables, &catalog);
    assert!(report.missing_in_knowledge.is_empty());
    let again = apply_fixes(&report, &catalog, &store).unwrap();
    assert!(again.written.is_empty());

    let context = ContextAssembler::default().assemble(&knowledge).unwrap();
    assert!(context.text.starts_with("## TABLES"));
    assert!(context.text.contains("### refunds"));
    assert!(context.text.contains("Auto-discovered table: refunds"));
    assert!(context.text.contains("## METRICS"));
    assert!(context.metadata.drops.is_empty());
}

#[tokio::test]
async fn declared_type_outside_the_live_class_is_reported() {
    let fx = Fixture::new().await;
    write(
        &fx.knowledge.join("tables/orders.json"),
        r#"{
            "table_name": "orders",
            "table_description": "One row per order",
            "table_columns": [
                {"name": "id", "type": "integer"},
                {"name": "amount", "type": "text"},
                {"name": "note", "type": "text"}
            ]
        }"#,
    );

    let catalog = sqlkeeper_db::connect(&fx.database())
        .await
        .unwrap()
        .introspect()
        .await
        .unwrap();
    let knowledge = load_knowledge(&fx.knowledge).unwrap();
    let report = Reconciler::default().reconcile(&knowledge.tables, &catalog);

    let diff = &report.column_diffs["orders"];
    assert_eq!(diff.type_mismatches.len(), 1);
    assert_eq!(diff.type_mismatches[0].column, "amount");
    assert_eq!(diff.type_mismatches[0].declared, "text");
    assert_eq!(diff.type_mismatches[0].actual, "BIGINT");
    assert!(
        report
            .summary_lines()
            .contains(&"  🔄 orders.amount: declared=text, actual=BIGINT (incompatible)".to_string())
    );
}

// ── Binary ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn check_schema_reports_drift_and_exits_zero() {
    let fx = Fixture::new().await;
    let output = fx.sqlkeeper(&fx.database_url(), &["check-schema"]);

    assert_eq!(output.status.code(), Some(0));
    let out = stdout(&output);
    assert!(out.contains("MISSING TABLE: 'customers'"));
    assert!(out.contains("NEW TABLE: 'refunds'"));
    assert!(out.contains("--fix"));
    assert!(!out.contains("Knowledge matches the database schema"));
    assert!(!fx.knowledge.join("tables/refunds.json").exists());
}

#[tokio::test]
async fn check_schema_fix_is_idempotent() {
    let fx = Fixture::new().await;

    let first = fx.sqlkeeper(&fx.database_url(), &["check-schema", "--fix"]);
    assert_eq!(first.status.code(), Some(0));
    assert!(stdout(&first).contains("refunds.json"));
    let after_first = table_files(&fx.knowledge);
    assert_eq!(after_first.len(), 3);

    let second = fx.sqlkeeper(&fx.database_url(), &["check-schema", "--fix"]);
    assert_eq!(second.status.code(), Some(0));
    assert!(stdout(&second).contains("Nothing to fix"));
    assert_eq!(table_files(&fx.knowledge), after_first);
}

#[tokio::test]
async fn unreachable_database_fails_loudly() {
    let fx = Fixture::new().await;
    let missing = format!("sqlite://{}", fx.root.join("missing.db").display());
    let output = fx.sqlkeeper(&missing, &["check-schema"]);

    assert_eq!(output.status.code(), Some(2));
    let out = stdout(&output);
    assert!(out.contains("Schema check FAILED"));
    assert!(!out.contains("Knowledge matches"));
    assert!(!fx.root.join("missing.db").exists());
}

#[tokio::test]
async fn invalid_knowledge_exits_one() {
    let fx = Fixture::new().await;
    write(&fx.knowledge.join("tables/broken.json"), "{ not json");

    let output = fx.sqlkeeper(&fx.database_url(), &["check-schema"]);
    assert_eq!(output.status.code(), Some(1));

    let listing = fx.sqlkeeper(&fx.database_url(), &["knowledge"]);
    assert_eq!(listing.status.code(), Some(1));
    assert!(stdout(&listing).contains("broken.json"));
}

#[tokio::test]
async fn knowledge_lists_tables_and_counts() {
    let fx = Fixture::new().await;
    let output = fx.sqlkeeper(&fx.database_url(), &["knowledge"]);

    assert_eq!(output.status.code(), Some(0));
    let out = stdout(&output);
    assert!(out.contains("- customers (1 columns)"));
    assert!(out.contains("- orders (3 columns)"));
    assert!(out.contains("All files loaded"));
}

#[tokio::test]
async fn context_prints_only_the_block_on_stdout() {
    let fx = Fixture::new().await;
    let output = fx.sqlkeeper(&fx.database_url(), &["context"]);

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).starts_with("## TABLES"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("tokens"));

    let tiny = fx.sqlkeeper(&fx.database_url(), &["context", "--max-tokens", "3"]);
    assert_eq!(tiny.status.code(), Some(1));
}

#[tokio::test]
async fn sql_runs_reads_and_rejects_writes() {
    let fx = Fixture::new().await;

    let read = fx.sqlkeeper(&fx.database_url(), &["sql", "SELECT id, amount FROM orders ORDER BY id"]);
    assert_eq!(read.status.code(), Some(0));
    let out = stdout(&read);
    assert!(out.contains("| id | amount |"));
    assert!(out.contains("| 1 | 1200 |"));

    let write = fx.sqlkeeper(&fx.database_url(), &["sql", "DELETE FROM orders"]);
    assert_eq!(write.status.code(), Some(1));

    let count = fx.sqlkeeper(&fx.database_url(), &["sql", "SELECT count(*) AS n FROM orders"]);
    assert!(stdout(&count).contains("| 2 |"));
}

#[tokio::test]
async fn introspect_describes_live_tables() {
    let fx = Fixture::new().await;

    let list = fx.sqlkeeper(&fx.database_url(), &["introspect"]);
    assert_eq!(list.status.code(), Some(0));
    assert!(stdout(&list).contains("**refunds**"));

    let unknown = fx.sqlkeeper(&fx.database_url(), &["introspect", "payments"]);
    assert_eq!(unknown.status.code(), Some(1));
}

#[tokio::test]
async fn tools_work_without_a_database() {
    let fx = Fixture::new().await;
    let offline = format!("sqlite://{}", fx.root.join("missing.db").display());

    let list = fx.sqlkeeper(&offline, &["tools"]);
    assert_eq!(list.status.code(), Some(0));
    let out = stdout(&list);
    for name in ["introspect_schema", "run_sql", "save_learning", "save_validated_query"] {
        assert!(out.contains(name), "missing tool {name}");
    }

    let saved = fx.sqlkeeper(
        &offline,
        &[
            "tool",
            "save_validated_query",
            r#"{"name": "Order Count", "question": "How many orders?", "query": "SELECT count(*) FROM orders"}"#,
        ],
    );
    assert_eq!(saved.status.code(), Some(0));
    assert!(stdout(&saved).contains("order_count"));

    let knowledge = load_knowledge(&fx.knowledge).unwrap();
    assert_eq!(knowledge.queries.len(), 1);
    assert_eq!(knowledge.queries[0].name, "order_count");

    let bad_json = fx.sqlkeeper(&offline, &["tool", "save_learning", "{"]);
    assert_eq!(bad_json.status.code(), Some(1));
}
