//! # TaskLedger CLI
//!
//! Command line front end for the TaskLedger data-access layer: creates the
//! PostgreSQL schema, seeds it with generated data, applies sample
//! modifications, exports reports to CSV, and manages the MongoDB cats
//! collection.
//!
//! ## Usage
//!
//! ```bash
//! taskledger --config config.ini schema
//! taskledger seed --users 100 --tasks 300
//! taskledger report --out reports
//! taskledger cats menu
//! ```
//!
//! Logs go to stderr; set `RUST_LOG` to change the filter.

mod commands;
mod export;
mod fake;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use taskledger_shared::config::DEFAULT_CONFIG_PATH;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "taskledger")]
#[command(author, version, about = "Users, tasks and cats across PostgreSQL and MongoDB", long_about = None)]
struct Cli {
    /// Configuration file with [PostgreSQL] and [MongoDB] sections
    #[arg(long, global = true, env = "TASKLEDGER_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the relational schema if absent and show its state
    Schema(commands::schema::SchemaArgs),
    /// Fill the relational tables with generated users and tasks
    Seed(commands::seed::SeedArgs),
    /// Apply the sample modifications to tasks and users
    Modify(commands::modify::ModifyArgs),
    /// Run the report catalog and export each result to CSV
    Report(commands::report::ReportArgs),
    /// Cats collection in MongoDB
    Cats {
        #[command(subcommand)]
        command: commands::cats::CatsCommand,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    tracing::debug!("TaskLedger v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Schema(args) => commands::schema::run(&cli.config, args).await,
        Commands::Seed(args) => commands::seed::run(&cli.config, args).await,
        Commands::Modify(args) => commands::modify::run(&cli.config, args).await,
        Commands::Report(args) => commands::report::run(&cli.config, args).await,
        Commands::Cats { command } => commands::cats::run(&cli.config, command).await,
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "taskledger=info,taskledger_shared=info".into());

    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}
