//! `sqlkeeper sql` — Run one read-only query.

use sqlkeeper_config::AppConfig;
use sqlkeeper_db::{SchemaSource, guard_read_only};
use sqlkeeper_tools::render_rows;
use tracing::debug;

pub async fn run(
    config: &AppConfig,
    query: &str,
    limit: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let limit = limit
        .unwrap_or(config.tools.default_row_limit)
        .clamp(1, config.tools.max_row_limit.max(1));

    // Rejected before any connection is made.
    let guarded = guard_read_only(query)?;
    let sql = guarded.with_limit(limit);

    let source = sqlkeeper_db::connect(&config.database).await?;
    debug!(backend = source.backend(), sql = %sql, "Running query");
    let rows = source.run_read_only(&sql, limit).await?;

    println!("{}", render_rows(&rows));
    Ok(())
}
