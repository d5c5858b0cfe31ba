//! DeltaGuard command-line entry point.
//!
//! # Security Guarantees
//! - Credentials are never logged or echoed in error messages
//! - Deletes and corrections run only after a write-permission probe

use anyhow::Result;
use clap::Parser;
use deltaguard::Cli;
use deltaguard_core::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet)?;

    let text = deltaguard::execute(cli.command).await?;
    if !text.is_empty() {
        println!("{}", text);
    }
    Ok(())
}
