//! wayfarer-sync - push offline trips to the remote collection
//!
//! One-shot by default: probe the server, push everything eligible, print
//! a summary. With --watch it keeps running and pushes whenever eligible
//! trips exist and the server answers, for machines that drift in and out
//! of connectivity.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Trip store: $XDG_DATA_HOME/wayfarer/trips.json (~/.local/share/wayfarer/trips.json)
//! - Logs: $XDG_STATE_HOME/wayfarer/wayfarer.log (~/.local/state/wayfarer/wayfarer.log)
//! - Config: $XDG_CONFIG_HOME/wayfarer/config.toml (~/.config/wayfarer/config.toml)

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use indicatif::{ProgressBar, ProgressStyle};

use wayfarer_core::api::TripApiClient;
use wayfarer_core::{
    Config, OfflineTripStore, SyncCoordinator, SyncOutcome, SyncStateStore, SyncStatus,
};

#[derive(Parser)]
#[command(name = "wayfarer-sync")]
#[command(about = "Push offline trips to the remote trip collection")]
#[command(version)]
struct Args {
    /// Verbose output (-v lists the trips being pushed)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Dry run - list what would be pushed without touching the network
    #[arg(long)]
    dry_run: bool,

    /// Re-arm failed trips before the pass
    #[arg(long)]
    retry_failed: bool,

    /// Watch mode - keep running instead of one-shot
    #[arg(short, long)]
    watch: bool,

    /// Poll interval in seconds (only with --watch)
    #[arg(long, default_value = "30")]
    poll: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let _log_guard =
        wayfarer_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("wayfarer-sync starting");

    let trips_path = config.trips_path();
    let mut store =
        OfflineTripStore::open(&trips_path).context("failed to open offline trip store")?;

    println!("Trip store: {}", trips_path.display());

    if args.retry_failed {
        let failed: Vec<String> = store
            .trips()
            .iter()
            .filter(|e| e.status == SyncStatus::Failed)
            .map(|e| e.offline_id.clone())
            .collect();
        for key in &failed {
            store.retry(key)?;
        }
        if !failed.is_empty() {
            println!("Re-armed {} failed trip(s)", failed.len());
        }
    }

    let eligible = store.sync_queue(config.sync.max_sync_attempts).len();
    println!("Eligible for sync: {} trip(s)", eligible);

    if args.dry_run {
        for entry in store.sync_queue(config.sync.max_sync_attempts) {
            println!(
                "  - {} ({}, {} attempt(s) so far)",
                entry.trip.title, entry.status, entry.sync_attempts
            );
        }
        println!("\nDry run - no sync performed");
        tracing::info!("Dry run complete");
        return Ok(());
    }

    if eligible == 0 && !args.watch {
        println!("Nothing to sync.");
        return Ok(());
    }

    if !config.api.is_ready() {
        bail!(
            "no server configured; set api.server_url in {}",
            Config::config_path().display()
        );
    }

    let client = TripApiClient::new(config.api.clone()).context("failed to create trip client")?;
    let state = SyncStateStore::open(config.sync_state_path())
        .context("failed to open sync state store")?;
    let mut coordinator = SyncCoordinator::new(Box::new(client), state, &config.sync);

    if args.watch {
        run_watch_mode(&mut coordinator, &mut store, &config, &args).await
    } else {
        run_single_sync(&mut coordinator, &mut store, &config, &args).await
    }
}

/// Run a single sync pass with progress bar
async fn run_single_sync(
    coordinator: &mut SyncCoordinator,
    store: &mut OfflineTripStore,
    config: &Config,
    args: &Args,
) -> Result<()> {
    if args.verbose >= 1 {
        println!("Pushing:");
        for entry in store.sync_queue(config.sync.max_sync_attempts) {
            println!(
                "  - {} ({}, {} attempt(s) so far)",
                entry.trip.title, entry.status, entry.sync_attempts
            );
        }
    }

    if !coordinator.probe().await {
        bail!("server unreachable; run again when you are online");
    }

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let outcome = coordinator
        .sync_with_progress(store, |current, total, title| {
            if current == 0 {
                pb.set_length(total as u64);
            }
            pb.set_position(current as u64);
            pb.set_message(title.to_string());
        })
        .await
        .context("sync failed")?;

    pb.finish_and_clear();

    print_outcome(&outcome);

    tracing::info!(
        attempted = outcome.attempted,
        synced = outcome.synced,
        failed = outcome.failed,
        "wayfarer-sync complete"
    );

    Ok(())
}

/// Run continuous watch mode
async fn run_watch_mode(
    coordinator: &mut SyncCoordinator,
    store: &mut OfflineTripStore,
    config: &Config,
    args: &Args,
) -> Result<()> {
    let poll = Duration::from_secs(args.poll.max(1));

    println!(
        "Watch mode active (poll every {}s). Press Ctrl+C to stop.",
        poll.as_secs()
    );
    println!();

    loop {
        let eligible = store.sync_queue(config.sync.max_sync_attempts).len();
        if eligible > 0 {
            if coordinator.probe().await {
                let outcome = coordinator.sync(store).await.context("sync failed")?;

                // Only print when something was pushed
                if outcome.attempted > 0 {
                    let timestamp = chrono::Local::now().format("%H:%M:%S");
                    println!("[{}] {}", timestamp, outcome.summary());

                    if args.verbose >= 1 {
                        for (offline_id, message) in &outcome.errors {
                            println!("  {}: {}", offline_id, message);
                        }
                    }
                }
            } else if args.verbose >= 1 {
                let timestamp = chrono::Local::now().format("%H:%M:%S");
                println!("[{}] offline, {} trip(s) waiting", timestamp, eligible);
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(poll) => {}
            _ = tokio::signal::ctrl_c() => {
                println!("\nWatch mode stopped.");
                tracing::info!("wayfarer-sync watch mode stopped");
                return Ok(());
            }
        }
    }
}

/// Print sync outcome summary
fn print_outcome(outcome: &SyncOutcome) {
    println!("\nSync complete:");
    println!("  Attempted: {}", outcome.attempted);
    println!("  Synced:    {}", outcome.synced);
    println!("  Failed:    {}", outcome.failed);
    if outcome.requeued > 0 {
        println!("  Requeued:  {}", outcome.requeued);
    }

    if !outcome.errors.is_empty() {
        println!("\nErrors ({}):", outcome.errors.len());
        for (offline_id, message) in &outcome.errors {
            println!("  {}: {}", offline_id, message);
        }
    }
}
