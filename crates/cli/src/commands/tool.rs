//! `sqlkeeper tools` / `sqlkeeper tool` — List and invoke agent tools.

use sqlkeeper_config::AppConfig;
use sqlkeeper_core::tool::{ToolCall, ToolRegistry};
use sqlkeeper_db::LazySource;
use sqlkeeper_knowledge::KnowledgeStore;
use sqlkeeper_tools::default_registry;
use std::sync::Arc;

/// The registry the agent runtime sees. The database is only contacted when
/// a tool reads it.
fn registry(config: &AppConfig) -> ToolRegistry {
    let source = Arc::new(LazySource::new(config.database.clone()));
    let store = Arc::new(KnowledgeStore::new(&config.knowledge_dir));
    default_registry(source, store, &config.tools)
}

pub fn list(config: &AppConfig) {
    let registry = registry(config);
    println!("🔧 Agent Tools");
    println!("=============");
    for definition in registry.definitions() {
        println!("\n  {}", definition.name);
        println!("    {}", definition.description);
        if let Some(properties) = definition.parameters["properties"].as_object() {
            let required: Vec<&str> = definition.parameters["required"]
                .as_array()
                .map(|names| names.iter().filter_map(|n| n.as_str()).collect())
                .unwrap_or_default();
            for name in properties.keys() {
                let marker = if required.contains(&name.as_str()) { " (required)" } else { "" };
                println!("    - {name}{marker}");
            }
        }
    }
}

pub async fn invoke(
    config: &AppConfig,
    name: &str,
    arguments: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let arguments: serde_json::Value = serde_json::from_str(arguments)
        .map_err(|e| format!("Tool arguments are not valid JSON: {e}"))?;
    if !arguments.is_object() {
        return Err("Tool arguments must be a JSON object".into());
    }

    let call = ToolCall {
        id: "cli".into(),
        name: name.to_string(),
        arguments,
    };
    let result = registry(config).execute(&call).await?;

    println!("{}", result.output);
    if let Some(data) = &result.data {
        eprintln!("{}", serde_json::to_string_pretty(data)?);
    }

    if result.success {
        Ok(())
    } else {
        Err(format!("Tool '{name}' reported a failure").into())
    }
}
