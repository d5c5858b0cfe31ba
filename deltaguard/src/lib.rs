//! Command-line front end for DeltaGuard.
//!
//! The argument structure lives here so command dispatch can be exercised
//! from tests; `main.rs` only parses, initialises logging and prints.
//!
//! Every `--config`, `--source` and `--destination` value is either a JSON
//! provider configuration file or a relational connection URL.

pub mod commands;
mod output;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// CLI argument structure
#[derive(Debug, Parser)]
#[command(name = "deltaguard")]
#[command(about = "Move tables between backends, then check and fix their quality")]
#[command(version)]
#[command(long_about = "
DeltaGuard - table migration and data-quality checks across backends

Providers are configured with a JSON file ({\"backend\": \"s3\", ...}) or a
connection URL for relational backends. Credentials are never printed.

SUPPORTED BACKENDS:
- SQLite (sqlite:///path.db, *.db, :memory:)
- PostgreSQL (postgres://) and Redshift (redshift://)
- MySQL (mysql://)
- BigQuery, Snowflake and S3 (JSON configuration files)

EXAMPLES:
  deltaguard migrate --source sqlite:///tmp/app.db --destination warehouse.json --table orders
  deltaguard check --config postgres://etl@db/sales --table orders --fix
  deltaguard delete --config lake.json --table exports/orders.csv --where \"status = 'void'\"
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all log output except errors")]
    pub quiet: bool,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List backends compiled into this build
    Backends,
    /// Test connectivity and read/write permissions
    Test(ProviderArgs),
    /// List tables or object keys
    Tables(TablesArgs),
    /// Print the first rows of a table as JSON
    Preview(PreviewArgs),
    /// Copy a table from one provider to another in chunks
    Migrate(MigrateArgs),
    /// Report duplicates, nulls and truncated-looking values
    Check(CheckArgs),
    /// Append a local CSV or XLSX file to a table
    Import(ImportArgs),
    /// Delete rows or drop a table after a write-permission check
    Delete(DeleteArgs),
}

#[derive(Debug, Args)]
pub struct ProviderArgs {
    /// Provider configuration (JSON file or connection URL)
    #[arg(short, long, env = "DELTAGUARD_CONFIG")]
    pub config: String,
}

#[derive(Debug, Args)]
pub struct TablesArgs {
    #[command(flatten)]
    pub provider: ProviderArgs,

    /// Dataset, schema or bucket to list
    #[arg(long)]
    pub dataset: Option<String>,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub provider: ProviderArgs,

    #[arg(short, long)]
    pub table: String,

    /// Rows to show; 0 shows all
    #[arg(long, default_value_t = 50)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Source provider (JSON file or connection URL)
    #[arg(long, env = "DELTAGUARD_SOURCE")]
    pub source: String,

    /// Destination provider (JSON file or connection URL)
    #[arg(long, env = "DELTAGUARD_DESTINATION")]
    pub destination: String,

    #[arg(short, long)]
    pub table: String,

    /// Rows per destination write
    #[arg(long, default_value_t = deltaguard_core::migration::DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Skip the connectivity and permission checks before copying
    #[arg(long)]
    pub skip_preflight: bool,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub provider: ProviderArgs,

    #[arg(short, long)]
    pub table: String,

    /// Remove duplicate rows, keeping first occurrences
    #[arg(long)]
    pub fix: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    #[command(flatten)]
    pub provider: ProviderArgs,

    #[arg(short, long)]
    pub table: String,

    /// CSV or XLSX file with a header row
    #[arg(short, long)]
    pub file: PathBuf,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub provider: ProviderArgs,

    #[arg(short, long)]
    pub table: String,

    /// Backend-native predicate selecting rows to delete; all rows when absent
    #[arg(long = "where", value_name = "PREDICATE", conflicts_with = "drop")]
    pub predicate: Option<String>,

    /// Drop the whole table or object
    #[arg(long)]
    pub drop: bool,
}

pub use commands::execute;
