//! `sqlkeeper introspect` — Show the live schema.

use sqlkeeper_config::AppConfig;
use sqlkeeper_db::SchemaSource;
use sqlkeeper_tools::{render_table, render_table_list};

pub async fn run(config: &AppConfig, table: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let source = sqlkeeper_db::connect(&config.database).await?;
    let catalog = source.introspect().await?;

    match table {
        None => println!("{}", render_table_list(&catalog)),
        Some(name) => match catalog.table(&name) {
            Some(table) => println!("{}", render_table(table)),
            None => {
                let available = catalog.table_names().collect::<Vec<_>>().join(", ");
                return Err(format!("Table '{name}' not found. Available tables: {available}").into());
            }
        },
    }

    Ok(())
}
