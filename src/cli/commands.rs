//! CLI commands implementation.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Settings;
use crate::errors::SwapError;
use crate::models::{BatchStatus, CountyQueueEntry, ImportBatch};
use crate::pipeline::Orchestrator;
use crate::repository::{
    CountyRepository, ImportBatchRepository, ParcelRepository, ParcelTable,
};
use crate::swap::SwapCoordinator;

#[derive(Parser)]
#[command(name = "parcels")]
#[command(about = "County parcel ingestion and risk-feature pipeline")]
#[command(version)]
pub struct Cli {
    /// Data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Manage the county processing queue
    County {
        #[command(subcommand)]
        command: CountyCommands,
    },

    /// Import one county's source files into staging
    Import {
        /// Five-digit county FIPS code
        fips_code: String,
    },

    /// Import every queued county into staging
    ImportAll,

    /// Promote staging to production
    Swap,

    /// Show table counts, queue state, and recent imports
    Status,
}

#[derive(Subcommand)]
enum CountyCommands {
    /// Add or update a county in the queue
    Add {
        /// Five-digit county FIPS code
        fips_code: String,
        /// Human-readable county name
        name: String,
        /// Initial processing priority (lower runs sooner)
        #[arg(short, long, default_value = "0")]
        priority: i64,
    },
    /// List queued counties in processing order
    List,
    /// Remove a county from the queue
    Remove {
        /// Five-digit county FIPS code
        fips_code: String,
        /// Confirm removal
        #[arg(long)]
        confirm: bool,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.data_dir)?;

    match cli.command {
        Commands::Init => cmd_init(&settings).await,
        Commands::County { command } => match command {
            CountyCommands::Add {
                fips_code,
                name,
                priority,
            } => cmd_county_add(&settings, &fips_code, &name, priority).await,
            CountyCommands::List => cmd_county_list(&settings).await,
            CountyCommands::Remove { fips_code, confirm } => {
                cmd_county_remove(&settings, &fips_code, confirm).await
            }
        },
        Commands::Import { fips_code } => cmd_import(&settings, &fips_code).await,
        Commands::ImportAll => cmd_import_all(&settings).await,
        Commands::Swap => cmd_swap(&settings).await,
        Commands::Status => cmd_status(&settings).await,
    }
}

async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_dirs()?;

    let db_path = settings.database_path();
    let _parcels = ParcelRepository::new(&db_path)?;
    let _ledger = ImportBatchRepository::new(&db_path)?;
    let _counties = CountyRepository::new(&db_path)?;

    println!(
        "{} Initialized parcel database in {}",
        style("✓").green(),
        settings.data_dir.display()
    );
    println!(
        "  Place county source files under {}",
        settings.data_dir.join("counties").join("<fips>").display()
    );

    Ok(())
}

async fn cmd_county_add(
    settings: &Settings,
    fips_code: &str,
    name: &str,
    priority: i64,
) -> anyhow::Result<()> {
    if fips_code.len() != 5 || !fips_code.chars().all(|c| c.is_ascii_digit()) {
        anyhow::bail!("FIPS code must be five digits, got '{fips_code}'");
    }

    let counties = CountyRepository::new(&settings.database_path())?;
    let existing = counties.get(fips_code)?;
    let mut entry = existing
        .clone()
        .unwrap_or_else(|| CountyQueueEntry::new(fips_code, name, priority));
    entry.name = name.to_string();
    entry.processing_priority = priority;
    counties.save(&entry)?;

    let verb = if existing.is_some() { "Updated" } else { "Added" };
    println!(
        "{} {} county {} ({})",
        style("✓").green(),
        verb,
        name,
        fips_code
    );
    Ok(())
}

async fn cmd_county_list(settings: &Settings) -> anyhow::Result<()> {
    let counties = CountyRepository::new(&settings.database_path())?;
    let entries = counties.list()?;

    if entries.is_empty() {
        println!(
            "{} No counties queued. Run 'parcels county add <fips> <name>' first.",
            style("!").yellow()
        );
        return Ok(());
    }

    println!("\n{}", style("County Queue").bold());
    println!("{}", "-".repeat(60));
    println!("{:<8} {:<25} {:<10} Last Processed", "FIPS", "Name", "Priority");
    println!("{}", "-".repeat(60));
    for entry in entries {
        let last = entry
            .last_processed_at
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "Never".to_string());
        println!(
            "{:<8} {:<25} {:<10} {}",
            entry.fips_code,
            truncate(&entry.name, 24),
            entry.processing_priority,
            last
        );
    }
    Ok(())
}

async fn cmd_county_remove(
    settings: &Settings,
    fips_code: &str,
    confirm: bool,
) -> anyhow::Result<()> {
    if !confirm {
        println!(
            "{} This removes county {} from the queue (parcels already imported are kept).",
            style("!").yellow(),
            fips_code
        );
        println!("  Re-run with --confirm to proceed");
        return Ok(());
    }

    let counties = CountyRepository::new(&settings.database_path())?;
    if counties.delete(fips_code)? {
        println!("{} Removed county {}", style("✓").green(), fips_code);
    } else {
        println!("{} County {} was not queued", style("!").yellow(), fips_code);
    }
    Ok(())
}

async fn cmd_import(settings: &Settings, fips_code: &str) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::new(settings.clone())?;
    install_shutdown_handler(&orchestrator);

    let spinner = spinner(&format!("Importing county {fips_code}..."));
    let batch = orchestrator.process_county(fips_code).await?;
    spinner.finish_and_clear();

    print_batch(&batch);
    if batch.status == BatchStatus::Failed {
        anyhow::bail!("import failed for county {fips_code}");
    }
    println!(
        "  Run {} to publish staged records",
        style("parcels swap").cyan()
    );
    Ok(())
}

async fn cmd_import_all(settings: &Settings) -> anyhow::Result<()> {
    let orchestrator = Arc::new(Orchestrator::new(settings.clone())?);
    install_shutdown_handler(&orchestrator);

    let spinner = spinner("Importing all queued counties...");
    let batches = orchestrator.process_all().await?;
    spinner.finish_and_clear();

    if batches.is_empty() {
        println!(
            "{} Nothing imported. Queue counties with 'parcels county add'.",
            style("!").yellow()
        );
        return Ok(());
    }

    for batch in &batches {
        print_batch(batch);
    }

    let failed = batches
        .iter()
        .filter(|b| b.status == BatchStatus::Failed)
        .count();
    if failed > 0 {
        println!(
            "{} {} of {} counties failed; see the import ledger",
            style("!").yellow(),
            failed,
            batches.len()
        );
    }
    Ok(())
}

async fn cmd_swap(settings: &Settings) -> anyhow::Result<()> {
    let coordinator = SwapCoordinator::new(&settings.database_path());
    match coordinator
        .promote_staging(settings.pipeline.swap_min_fraction)
        .await
    {
        Ok(result) => {
            println!(
                "{} Promoted staging to production: {} -> {} records",
                style("✓").green(),
                result.old_count,
                result.new_count
            );
            Ok(())
        }
        Err(SwapError::Precondition {
            staging,
            production,
            min_fraction,
        }) => {
            println!(
                "{} Swap refused: staging has {} records, production has {} \
                 (staging must hold at least {:.0}% of production)",
                style("✗").red(),
                staging,
                production,
                min_fraction * 100.0
            );
            println!("  Production is untouched. Import more counties, then retry.");
            anyhow::bail!("swap preconditions not met")
        }
        Err(e) => Err(e.into()),
    }
}

async fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    let db_path = settings.database_path();
    let parcels = ParcelRepository::new(&db_path)?;
    let ledger = ImportBatchRepository::new(&db_path)?;
    let counties = CountyRepository::new(&db_path)?;

    println!("\n{}", style("Parcel Store").bold());
    println!(
        "  Production: {} records",
        parcels.count(ParcelTable::Production)?
    );
    println!(
        "  Staging:    {} records",
        parcels.count(ParcelTable::Staging)?
    );

    let staged = parcels.county_counts(ParcelTable::Staging)?;
    if !staged.is_empty() {
        println!("\n{}", style("Staged by County").bold());
        for (fips, count) in staged {
            println!("  {fips}: {count}");
        }
    }

    println!("\n{}", style("County Queue").bold());
    let entries = counties.list()?;
    if entries.is_empty() {
        println!("  (empty)");
    }
    for entry in entries {
        println!(
            "  {} {} (priority {})",
            entry.fips_code, entry.name, entry.processing_priority
        );
    }

    println!("\n{}", style("Recent Imports").bold());
    let recent = ledger.list_recent(10)?;
    if recent.is_empty() {
        println!("  (none)");
    }
    for batch in recent {
        let glyph = match batch.status {
            BatchStatus::Completed => style("✓").green(),
            BatchStatus::Failed => style("✗").red(),
            BatchStatus::Running => style("…").cyan(),
        };
        println!(
            "  {} {} {} ok={} failed={} skipped={}",
            glyph,
            batch.started_at.format("%Y-%m-%d %H:%M"),
            batch.county_fips,
            batch.records_succeeded,
            batch.records_failed,
            batch.records_skipped
        );
    }

    Ok(())
}

/// Raise the orchestrator's shutdown flag on Ctrl-C so in-flight batches
/// finish and queued counties are skipped.
fn install_shutdown_handler(orchestrator: &Orchestrator) {
    let flag = orchestrator.shutdown_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "\n{} Shutdown requested, finishing in-flight batches...",
                style("!").yellow()
            );
            flag.store(true, Ordering::Relaxed);
        }
    });
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn print_batch(batch: &ImportBatch) {
    let glyph = match batch.status {
        BatchStatus::Completed => style("✓").green(),
        _ => style("✗").red(),
    };
    println!(
        "{} County {}: {} processed, {} staged, {} failed, {} skipped",
        glyph,
        batch.county_fips,
        batch.records_processed,
        batch.records_succeeded,
        batch.records_failed,
        batch.records_skipped
    );
    if let Some(error) = &batch.error_details {
        println!("  {}", style(error).red());
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    // Cut on a char boundary; county names are not always ASCII
    let cut = s
        .char_indices()
        .nth(max.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    format!("{}…", &s[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_string_unchanged() {
        assert_eq!(truncate("Miami-Dade", 24), "Miami-Dade");
        assert_eq!(truncate("", 24), "");
    }

    #[test]
    fn test_truncate_long_string() {
        assert_eq!(truncate("ABCDEFGH", 5), "ABCD…");
    }

    #[test]
    fn test_truncate_multibyte_name() {
        // A multi-byte char straddling the cut must not split
        let name = format!("{}ñBBBB", "A".repeat(22));
        let cut = truncate(&name, 24);
        assert!(cut.ends_with('…'));
        assert_eq!(cut.chars().count(), 24);

        // Cut lands exactly on the multi-byte char
        let name = format!("{}ñBBBB", "A".repeat(23));
        assert_eq!(truncate(&name, 24), format!("{}…", "A".repeat(23)));
    }
}
