//! AutoQuery CLI - run declarative queries over JSON datasets
//!
//! Loads a dataset into the in-memory data source and executes a query
//! built from `key=value` params, printing the envelope as JSON or the
//! rows as CSV.

mod commands;
mod models;

use clap::{Parser, Subcommand};
use commands::{DescribeCommand, QueryCommand};
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "AUTOQUERY_LOG_LEVEL", global = true)]
    log_level: String,

    /// Log format: compact, full
    #[arg(
        long,
        default_value = "compact",
        env = "AUTOQUERY_LOG_FORMAT",
        global = true
    )]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query a dataset
    Query(QueryCommand),
    /// List queryable models and their fields
    Describe(DescribeCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // If RUST_LOG is set, use it directly; otherwise use our default filter
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::try_from_default_env()?
    } else {
        tracing_subscriber::EnvFilter::new(format!(
            "autoquery_cli={level},\
             autoquery={level},\
             autoquery_memory={level}",
            level = cli.log_level
        ))
    };

    // Logs go to stderr so stdout stays clean for JSON/CSV output
    let fmt_layer = match cli.log_format.as_str() {
        "full" => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer() // "compact" or any other value
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Query(query_cmd) => query_cmd.execute(),
        Commands::Describe(describe_cmd) => describe_cmd.execute(),
    }
}
