//! `sqlkeeper context` — Print the assembled prompt context.
//!
//! The block goes to stdout; budget statistics go to stderr.

use sqlkeeper_config::AppConfig;
use sqlkeeper_context::ContextAssembler;
use sqlkeeper_knowledge::load_knowledge;

pub fn run(config: &AppConfig, max_tokens: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    let budget = max_tokens.unwrap_or(config.context.max_tokens);
    if budget == 0 {
        return Err("--max-tokens must be > 0".into());
    }

    let knowledge = load_knowledge(&config.knowledge_dir)?;
    let assembled = ContextAssembler::new(budget).assemble(&knowledge)?;
    let meta = &assembled.metadata;

    println!("{}", assembled.text);

    eprintln!(
        "📊 Context: {}/{} tokens ({:.1}%)",
        meta.total_tokens, meta.budget, meta.utilization_pct
    );
    for stats in meta.per_kind.iter().filter(|s| s.items_total > 0) {
        eprintln!(
            "  {:<20} {}/{}",
            stats.kind.label(),
            stats.items_included,
            stats.items_total
        );
    }
    if !meta.drops.is_empty() {
        eprintln!("  ⚠️  {} item(s) omitted for space", meta.drops.len());
    }

    Ok(())
}
