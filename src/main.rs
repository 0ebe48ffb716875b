mod cache;
mod db;
mod fetch;
mod parser;
mod pipeline;
mod reconcile;
mod settings;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::cache::CacheStore;
use crate::db::DedupStore;
use crate::fetch::{HttpTransport, PageFetcher};
use crate::pipeline::Harvester;
use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "petition_harvester", about = "Brisbane e-petitions history harvester")]
struct Cli {
    /// SQLite store (overrides settings)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Cache directory (overrides settings)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the petition list and store any new signature snapshots
    Run {
        /// Always go to the network and write nothing to the cache
        #[arg(long)]
        no_cache: bool,
        /// Fail when the list and detail pages disagree
        #[arg(long)]
        strict: bool,
        /// Log and skip petitions whose page is missing or broken
        #[arg(long)]
        skip_failed: bool,
        /// No progress bar or per-petition lines
        #[arg(short, long)]
        quiet: bool,
    },
    /// Show store statistics
    Stats,
    /// List every stored snapshot of one petition
    History {
        reference_id: String,
        /// One JSON object per line
        #[arg(long)]
        json: bool,
    },
    /// Delete all cached pages
    ClearCache,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn main() -> Result<()> {
    init_tracing();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = Settings::load()?;
    if let Some(db) = cli.db {
        settings.store_path = db;
    }
    if let Some(dir) = cli.cache_dir {
        settings.cache_dir = dir;
    }
    info!(settings = ?settings, "Starting petition harvester");

    match cli.command {
        Commands::Run { no_cache, strict, skip_failed, quiet } => {
            settings.cache_enabled &= !no_cache;
            settings.strict_reconciliation |= strict;
            settings.skip_failed_items |= skip_failed;

            let cache = CacheStore::new(settings.cache_enabled, &settings.cache_dir, settings.cache_key);
            let transport = HttpTransport::new(Duration::from_secs(settings.http_timeout_secs))?;
            let store = DedupStore::open(&settings.store_path)?;
            let harvester = Harvester::new(&settings, PageFetcher::new(transport, cache), store).quiet(quiet);
            let now = chrono::Local::now().naive_local();
            harvester.run(now)?;
        }
        Commands::Stats => {
            let store = DedupStore::open(&settings.store_path)?;
            let s = store.stats()?;
            println!("Rows:      {}", s.rows);
            println!("Petitions: {}", s.petitions);
            println!("Last run:  {}", s.last_retrieved.as_deref().unwrap_or("-"));
        }
        Commands::History { reference_id, json } => {
            let store = DedupStore::open(&settings.store_path)?;
            let rows = store.history(&reference_id)?;
            if rows.is_empty() {
                println!("No snapshots stored for petition {}.", reference_id);
                return Ok(());
            }
            if json {
                for r in &rows {
                    println!("{}", serde_json::to_string(r)?);
                }
            } else {
                println!("{} - \"{}\"", reference_id, rows[rows.len() - 1].title);
                println!("{:<25} | {}", "Retrieved", "Signatures");
                println!("{}", "-".repeat(40));
                for r in &rows {
                    println!("{:<25} | {}", r.retrieved_at, r.signatures);
                }
            }
        }
        Commands::ClearCache => {
            let cache = CacheStore::new(true, &settings.cache_dir, settings.cache_key);
            let removed = cache.clear()?;
            println!("Removed {} cached pages from {:?}", removed, cache.dir());
        }
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }
    Ok(())
}
