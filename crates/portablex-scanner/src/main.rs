use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use portablex_catalog::{category, repair_overlay_keys, CacheStore, CatalogEntry, CatalogPaths};
use portablex_config::ConfigStore;
use portablex_scanner::{CatalogEvent, DiskCatalog, ScanOrchestrator};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "portablex-scanner")]
struct Cli {
    /// Drive root holding the PortableApps folder (defaults to the executable's directory)
    #[arg(long, global = true, value_name = "DIR")]
    base: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan the applications folder, refresh the cache and print the catalog
    Scan {
        /// Include entries marked hidden
        #[arg(long)]
        show_hidden: bool,
        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the cached catalog without scanning
    Cached,
    /// Print the allowed category list
    Categories,
    /// Fix overlay keys whose case or slashes differ from the files on disk
    RepairKeys,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let paths = match cli.base {
        Some(base) => CatalogPaths::new(base),
        None => CatalogPaths::discover().context("failed to locate the base directory")?,
    };
    let store = Arc::new(ConfigStore::open(paths.settings_file()));

    match cli.command {
        Command::Scan { show_hidden, json } => {
            let mut source = DiskCatalog::new(paths, Arc::clone(&store));
            if show_hidden {
                source = source.with_show_hidden(true);
            }
            let orchestrator =
                ScanOrchestrator::new(source).context("failed to start catalog scan")?;
            let events = orchestrator.subscribe();
            orchestrator.refresh();
            let entries = loop {
                match events.recv().context("catalog scan worker stopped")? {
                    CatalogEvent::Provisional(cached) => {
                        debug!(apps = cached.len(), "cached catalog available");
                    }
                    CatalogEvent::Completed(entries) => break entries,
                    CatalogEvent::Failed { error } => bail!("catalog scan failed: {error}"),
                }
            };
            print_catalog(&entries, json)?;
        }
        Command::Cached => match CacheStore::for_paths(&paths).load(&paths.base_dir) {
            Ok(entries) => print_catalog(&entries, false)?,
            Err(miss) => println!("No usable cache: {miss}"),
        },
        Command::Categories => {
            for name in category::allowed_categories(&store) {
                println!("{name}");
            }
        }
        Command::RepairKeys => {
            let report = repair_overlay_keys(&store, &paths)?;
            println!("{}", report.message);
            if let Some(backup) = report.backup {
                println!("Backup written to {}", backup.display());
            }
        }
    }
    Ok(())
}

fn print_catalog(entries: &[CatalogEntry], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("No applications found.");
    }
    for entry in entries {
        let marker = if entry.is_favorite { "*" } else { " " };
        println!("{marker} {} [{}] {}", entry.name, entry.category, entry.key);
    }
    Ok(())
}
