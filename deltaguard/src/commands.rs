//! Command implementations.
//!
//! Each command acquires its providers through `with_provider` /
//! `with_providers`, so sessions are closed whether the command succeeds or
//! fails. Commands return the text to print instead of printing it.

use anyhow::{Context, Result, bail};
use deltaguard_core::{
    Capability, corrections, create_provider_from, formats, migration, quality,
    supported_backends, with_provider, with_providers,
};

use crate::{
    CheckArgs, Command, DeleteArgs, ImportArgs, MigrateArgs, PreviewArgs, ProviderArgs,
    TablesArgs, output,
};

/// Runs one command and returns its output.
///
/// # Errors
/// Returns the underlying provider error with command context attached
pub async fn execute(command: Command) -> Result<String> {
    match command {
        Command::Backends => Ok(output::backends(&supported_backends())),
        Command::Test(args) => test(args).await,
        Command::Tables(args) => tables(args).await,
        Command::Preview(args) => preview(args).await,
        Command::Migrate(args) => migrate(args).await,
        Command::Check(args) => check(args).await,
        Command::Import(args) => import(args).await,
        Command::Delete(args) => delete(args).await,
    }
}

async fn test(args: ProviderArgs) -> Result<String> {
    let provider = create_provider_from(&args.config)?;
    let backend = provider.backend();
    let (connected, permissions) = with_provider(provider, |p| {
        Box::pin(async move {
            if !p.test_connection().await {
                return Ok((false, None));
            }
            let report = p
                .has_permissions(&[Capability::Read, Capability::Write])
                .await;
            Ok((true, Some(report)))
        })
    })
    .await?;

    match permissions {
        Some(report) if connected => Ok(output::connection_report(backend, &report)),
        _ => bail!("Connection to {} failed (run with -v for details)", backend),
    }
}

async fn tables(args: TablesArgs) -> Result<String> {
    let provider = create_provider_from(&args.provider.config)?;
    let dataset = args.dataset;
    let names = with_provider(provider, |p| {
        Box::pin(async move { p.list_tables(dataset.as_deref()).await })
    })
    .await
    .context("Failed to list tables")?;
    Ok(output::lines(&names))
}

async fn preview(args: PreviewArgs) -> Result<String> {
    let provider = create_provider_from(&args.provider.config)?;
    let table = args.table;
    let limit = args.limit;
    let data = with_provider(provider, |p| {
        Box::pin(async move { p.read_table(&table, Some(limit)).await })
    })
    .await
    .context("Failed to read table")?;
    output::rows_json(&data)
}

async fn migrate(args: MigrateArgs) -> Result<String> {
    let source = create_provider_from(&args.source).context("Invalid source")?;
    let destination = create_provider_from(&args.destination).context("Invalid destination")?;
    let route = format!("{} -> {}", source.backend(), destination.backend());
    let MigrateArgs {
        table,
        chunk_size,
        skip_preflight,
        ..
    } = args;

    let task_table = table.clone();
    let rows = with_providers(source, destination, |s, d| {
        Box::pin(async move {
            if skip_preflight {
                tracing::warn!("Preflight checks skipped");
            } else {
                migration::preflight(s, d).await?;
            }
            migration::migrate(s, d, &task_table, chunk_size).await
        })
    })
    .await
    .with_context(|| format!("Migration of '{}' failed", table))?;

    Ok(format!("Migrated {} rows of '{}' ({})", rows, table, route))
}

async fn check(args: CheckArgs) -> Result<String> {
    let provider = create_provider_from(&args.provider.config)?;
    let table = args.table;
    let fix = args.fix;
    let (report, removed) = with_provider(provider, |p| {
        Box::pin(async move {
            let report = quality::analyze(p, &table).await?;
            let removed = if fix && report.needs_correction() {
                Some(corrections::apply_corrections(p, &table).await?)
            } else {
                None
            };
            Ok((report, removed))
        })
    })
    .await
    .context("Quality check failed")?;

    let mut text = if args.json {
        serde_json::to_string_pretty(&report)?
    } else {
        report.to_string()
    };
    if let Some(removed) = removed {
        text.push_str(&format!("\nRemoved {} duplicate rows", removed));
    } else if fix {
        text.push_str("\nNo duplicates to remove");
    }
    Ok(text)
}

async fn import(args: ImportArgs) -> Result<String> {
    let data = formats::read_table_file(&args.file)?;
    let provider = create_provider_from(&args.provider.config)?;
    let table = args.table.clone();
    let written = with_provider(provider, |p| {
        Box::pin(async move { migration::append_recordset(p, &table, &data).await })
    })
    .await
    .with_context(|| format!("Import into '{}' failed", args.table))?;
    Ok(format!(
        "Imported {} rows from {} into '{}'",
        written,
        args.file.display(),
        args.table
    ))
}

async fn delete(args: DeleteArgs) -> Result<String> {
    let provider = create_provider_from(&args.provider.config)?;
    let DeleteArgs {
        table,
        predicate,
        drop,
        ..
    } = args;

    let task_table = table.clone();
    if drop {
        with_provider(provider, |p| {
            Box::pin(async move { corrections::delete_table_guarded(p, &task_table).await })
        })
        .await
        .with_context(|| format!("Failed to drop '{}'", table))?;
        return Ok(format!("Dropped '{}'", table));
    }

    let deleted = with_provider(provider, |p| {
        Box::pin(async move {
            corrections::delete_rows_guarded(p, &task_table, predicate.as_deref()).await
        })
    })
    .await
    .with_context(|| format!("Failed to delete rows from '{}'", table))?;
    Ok(format!("Deleted {} rows from '{}'", deleted, table))
}
