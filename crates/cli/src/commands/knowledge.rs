//! `sqlkeeper knowledge` — Validate and list the knowledge store.

use sqlkeeper_config::AppConfig;
use sqlkeeper_knowledge::load_knowledge;

pub fn run(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let root = &config.knowledge_dir;
    println!("📚 Knowledge Store");
    println!("=================");
    println!("  Root:  {}", root.display());

    let knowledge = match load_knowledge(root) {
        Ok(knowledge) => knowledge,
        Err(e) => {
            println!("\n❌ Knowledge store is invalid:");
            for problem in e.problems() {
                println!("  - {problem}");
            }
            return Err(e.into());
        }
    };

    println!("\n  Tables ({}):", knowledge.tables.len());
    for table in knowledge.tables.values() {
        println!("    - {} ({} columns)", table.table_name, table.columns.len());
    }

    let business = &knowledge.business;
    println!("\n  Metrics:          {}", business.metrics.len());
    println!("  Business rules:   {}", business.business_rules.len());
    println!("  Gotchas:          {}", business.common_gotchas.len());
    println!("  Query patterns:   {}", knowledge.queries.len());
    println!("  Learnings:        {}", knowledge.learnings.len());

    if knowledge.warnings.is_empty() {
        println!("\n  ✅ All files loaded");
    } else {
        println!("\n  ⚠️  {} file(s) skipped:", knowledge.warnings.len());
        for warning in &knowledge.warnings {
            println!("    - {warning}");
        }
    }

    Ok(())
}
