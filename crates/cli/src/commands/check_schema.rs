//! `sqlkeeper check-schema` — Compare knowledge with the live schema.

use sqlkeeper_config::AppConfig;
use sqlkeeper_core::catalog::LiveCatalog;
use sqlkeeper_core::drift::DriftReport;
use sqlkeeper_core::error::IntrospectError;
use sqlkeeper_db::SchemaSource;
use sqlkeeper_drift::{Reconciler, TypeEquivalence, apply_fixes};
use sqlkeeper_knowledge::{KnowledgeStore, load_knowledge};
use tracing::info;

pub async fn run(config: &AppConfig, fix: bool) -> Result<(), Box<dyn std::error::Error>> {
    let knowledge = load_knowledge(&config.knowledge_dir)?;
    for warning in &knowledge.warnings {
        println!("  ⚠️  Skipped: {warning}");
    }

    let catalog = match live_catalog(config).await {
        Ok(catalog) => catalog,
        Err(e) => {
            println!("❌ Schema check FAILED");
            println!("   Could not read the schema of {}", config.database.display_target());
            println!("   {e}");
            return Err(e.into());
        }
    };

    let reconciler = Reconciler::new(TypeEquivalence::from_config(&config.drift));
    let report = reconciler.reconcile(&knowledge.tables, &catalog);

    println!("🔍 Schema Check");
    println!("==============");
    println!("  Knowledge:  {} table(s) in {}", knowledge.tables.len(), config.knowledge_dir.display());
    println!("  Database:   {} table(s) in {}", catalog.len(), config.database.display_target());
    println!();
    print_report(&report);

    if fix {
        if report.missing_in_knowledge.is_empty() {
            println!("\n✅ Nothing to fix");
        } else {
            let store = KnowledgeStore::new(&config.knowledge_dir);
            let outcome = apply_fixes(&report, &catalog, &store)?;
            println!();
            for path in &outcome.written {
                println!("  📝 Wrote {}", path.display());
            }
            for name in &outcome.skipped {
                println!("  ⏭️  Skipped '{name}': its descriptor path is already taken");
            }
        }
    } else if !report.missing_in_knowledge.is_empty() {
        println!("\n💡 Run with --fix to create descriptors for new tables");
    }

    info!(issues = report.issue_count(), fix, "Schema check finished");
    Ok(())
}

async fn live_catalog(config: &AppConfig) -> Result<LiveCatalog, IntrospectError> {
    let source = sqlkeeper_db::connect(&config.database).await?;
    source.introspect().await
}

fn print_report(report: &DriftReport) {
    if report.is_clean() {
        println!("✅ Knowledge matches the database schema");
    } else {
        for line in report.summary_lines() {
            println!("{line}");
        }
        println!("\n⚠️  {} issue(s) found", report.issue_count());
    }

    for table in &report.untracked_columns {
        println!("  ℹ️  {table}: no columns in knowledge, column checks skipped");
    }
}
