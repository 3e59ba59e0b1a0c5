//! SQLKeeper CLI — the main entry point.
//!
//! Commands:
//! - `check-schema` — Compare the knowledge store with the live database
//! - `knowledge`    — Validate and list the knowledge store
//! - `context`      — Print the prompt block assembled from knowledge
//! - `introspect`   — Show live tables or one table's columns
//! - `sql`          — Run a read-only query
//! - `tools`        — List the agent tools
//! - `tool`         — Invoke one agent tool with JSON arguments

use clap::{Parser, Subcommand};
use sqlkeeper_config::AppConfig;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;

#[derive(Parser)]
#[command(
    name = "sqlkeeper",
    about = "SQLKeeper — schema knowledge and drift checks for SQL agents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ~/.sqlkeeper/config.toml)
    #[arg(long, global = true, env = "SQLKEEPER_CONFIG")]
    config: Option<PathBuf>,

    /// Override the knowledge store root
    #[arg(long, global = true)]
    knowledge_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare knowledge descriptors with the live database schema
    CheckSchema {
        /// Write placeholder descriptors for tables that have none
        #[arg(long)]
        fix: bool,
    },

    /// Validate the knowledge store and list what it contains
    Knowledge,

    /// Print the prompt context block assembled from knowledge
    Context {
        /// Override the token budget
        #[arg(long)]
        max_tokens: Option<usize>,
    },

    /// List live tables, or describe one
    Introspect {
        /// Table to describe
        table: Option<String>,
    },

    /// Run a read-only SQL query
    Sql {
        /// The SELECT or WITH statement
        query: String,

        /// Maximum rows to return
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List the agent tools
    Tools,

    /// Invoke an agent tool
    Tool {
        /// Tool name, as listed by `sqlkeeper tools`
        name: String,

        /// Arguments as a JSON object
        #[arg(default_value = "{}")]
        arguments: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only command output.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("❌ Failed to start the async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(commands::exit_code(e.as_ref()))
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    }
    .map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(dir) = cli.knowledge_dir {
        config.knowledge_dir = dir;
    }

    match cli.command {
        Commands::CheckSchema { fix } => commands::check_schema::run(&config, fix).await?,
        Commands::Knowledge => commands::knowledge::run(&config)?,
        Commands::Context { max_tokens } => commands::context::run(&config, max_tokens)?,
        Commands::Introspect { table } => commands::introspect::run(&config, table).await?,
        Commands::Sql { query, limit } => commands::sql::run(&config, &query, limit).await?,
        Commands::Tools => commands::tool::list(&config),
        Commands::Tool { name, arguments } => {
            commands::tool::invoke(&config, &name, &arguments).await?
        }
    }

    Ok(())
}
