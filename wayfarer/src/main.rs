//! wayfarer - Offline-first adventure trip planner
//!
//! Chat with the planning assistant, keep every generated trip on this
//! machine, and push the collection to the remote service when online.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Trip store: $XDG_DATA_HOME/wayfarer/trips.json (~/.local/share/wayfarer/trips.json)
//! - Logs: $XDG_STATE_HOME/wayfarer/wayfarer.log (~/.local/state/wayfarer/wayfarer.log)
//! - Config: $XDG_CONFIG_HOME/wayfarer/config.toml (~/.config/wayfarer/config.toml)

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use wayfarer_core::api::{ChatClient, FileThreadStore, TripApiClient, WeatherClient};
use wayfarer_core::views::{ItineraryView, MapView, TimelineView};
use wayfarer_core::{
    normalize, Config, LngLat, OfflineTripStore, SyncCoordinator, SyncOutcome, SyncStateStore,
    SyncStatus, Trip,
};

#[derive(Parser)]
#[command(name = "wayfarer")]
#[command(about = "Offline-first adventure trip planner")]
#[command(version)]
struct Args {
    /// Verbose output (debug-level file logging)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask the planning assistant for trip ideas
    Plan {
        /// What you want ("a week of hut-to-hut hiking in the Alps")
        prompt: String,

        /// Session key for conversation continuity
        #[arg(short, long, default_value = "default")]
        session: String,

        /// Save the trips it comes back with to the offline store
        #[arg(long)]
        save: bool,
    },

    /// Normalize a saved assistant reply (or raw trip JSON) from disk
    Import {
        /// File holding the reply text or JSON export
        file: PathBuf,

        /// Save the found trips to the offline store
        #[arg(long)]
        save: bool,
    },

    /// List offline trips with their sync status
    List {
        /// List the remote collection instead
        #[arg(long)]
        remote: bool,
    },

    /// Show one trip
    Show {
        /// Trip id (server id, local id, or offline id)
        id: String,

        /// Map view: markers, route lines, bounds
        #[arg(long)]
        map: bool,

        /// Itinerary view: day cards
        #[arg(long)]
        itinerary: bool,

        /// Timeline view: activities grouped by day
        #[arg(long)]
        timeline: bool,

        /// Emit the selected view (or the whole trip) as JSON
        #[arg(long)]
        json: bool,
    },

    /// Push pending trips to the remote collection
    Sync {
        /// Re-arm failed trips before the pass
        #[arg(long)]
        retry_failed: bool,
    },

    /// Re-arm one failed trip for the next sync
    Retry {
        /// Trip id (server id, local id, or offline id)
        id: String,
    },

    /// Remove a trip from the offline store
    Remove {
        /// Trip id (server id, local id, or offline id)
        id: String,

        /// Also delete the server copy (only applies once a trip has synced)
        #[arg(long)]
        remote: bool,
    },

    /// Create a public share link for a synced trip
    Share {
        /// Trip id (server id, local id, or offline id)
        id: String,
    },

    /// Fetch the trip behind a share link
    Shared {
        /// The shareable id from the link
        shareable_id: String,
    },

    /// Weather at a trip's map center
    Weather {
        /// Trip id (server id, local id, or offline id)
        id: String,

        /// Days of forecast to fetch (0 = current conditions only)
        #[arg(long, default_value = "0")]
        days: u32,
    },

    /// Config readiness, store counts, last sync attempt
    Status,

    /// Wipe the offline store
    Clear {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    // Load configuration
    let mut config = Config::load().context("failed to load configuration")?;
    if args.verbose {
        config.logging.level = "debug".to_string();
    }

    // Initialize logging (to file, stdout is the interface)
    let _log_guard =
        wayfarer_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("wayfarer starting");

    match args.command {
        Command::Plan {
            prompt,
            session,
            save,
        } => cmd_plan(&config, &prompt, &session, save).await,
        Command::Import { file, save } => cmd_import(&config, &file, save),
        Command::List { remote } => cmd_list(&config, remote).await,
        Command::Show {
            id,
            map,
            itinerary,
            timeline,
            json,
        } => cmd_show(&config, &id, map, itinerary, timeline, json),
        Command::Sync { retry_failed } => cmd_sync(&config, retry_failed).await,
        Command::Retry { id } => cmd_retry(&config, &id),
        Command::Remove { id, remote } => cmd_remove(&config, &id, remote).await,
        Command::Share { id } => cmd_share(&config, &id).await,
        Command::Shared { shareable_id } => cmd_shared(&config, &shareable_id).await,
        Command::Weather { id, days } => cmd_weather(&config, &id, days).await,
        Command::Status => cmd_status(&config),
        Command::Clear { yes } => cmd_clear(&config, yes),
    }
}

// ============================================
// Planning commands
// ============================================

async fn cmd_plan(config: &Config, prompt: &str, session: &str, save: bool) -> Result<()> {
    if !config.api.is_ready() {
        bail!(
            "no server configured; set api.server_url in {} (or use 'wayfarer import' offline)",
            Config::config_path().display()
        );
    }

    let threads = FileThreadStore::open(config.threads_path())
        .context("failed to open chat thread store")?;
    let client = ChatClient::with_thread_store(config.api.clone(), Box::new(threads))
        .context("failed to create chat client")?;

    tracing::info!(session, "sending planning prompt");
    let reply = client
        .send(session, prompt, &[])
        .await
        .context("chat request failed")?;

    match normalize::trips_from_text(&reply.text) {
        Some(trips) => report_found_trips(config, trips, save),
        None => {
            // Plain conversation: the assistant is asking questions or
            // chatting, nothing to save.
            println!("{}", reply.text.trim());
            Ok(())
        }
    }
}

fn cmd_import(config: &Config, file: &Path, save: bool) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let Some(trips) = normalize::trips_from_text(&text) else {
        bail!("no trip data found in {}", file.display());
    };

    report_found_trips(config, trips, save)
}

fn report_found_trips(config: &Config, trips: Vec<Trip>, save: bool) -> Result<()> {
    println!("Found {} trip(s):", trips.len());
    for trip in &trips {
        let detail = if trip.location.is_empty() {
            trip.duration.clone()
        } else if trip.duration.is_empty() {
            trip.location.clone()
        } else {
            format!("{}, {}", trip.location, trip.duration)
        };
        if detail.is_empty() {
            println!("  - {}", trip.title);
        } else {
            println!("  - {} ({})", trip.title, detail);
        }
    }

    if !save {
        println!();
        println!("Re-run with --save to keep them offline.");
        return Ok(());
    }

    let mut store = open_store(config)?;
    println!();
    for trip in trips {
        let entry = store.save(trip).context("failed to save trip")?;
        println!("Saved '{}' as {}", entry.trip.title, entry.offline_id);
    }
    println!();
    println!("Run 'wayfarer sync' to push them to your collection.");
    Ok(())
}

// ============================================
// Listing and display commands
// ============================================

async fn cmd_list(config: &Config, remote: bool) -> Result<()> {
    if remote {
        let client = trip_client(config)?;
        let trips = client
            .list_trips()
            .await
            .context("failed to list remote trips")?;

        if trips.is_empty() {
            println!("The remote collection is empty.");
            return Ok(());
        }

        println!("{:<12} {:<36} {}", "ID", "Title", "Location");
        println!("{:-<72}", "");
        for trip in trips {
            println!(
                "{:<12} {:<36} {}",
                trip.id.raw_id(),
                truncate(&trip.title, 34),
                trip.location
            );
        }
        return Ok(());
    }

    let store = open_store(config)?;
    if store.is_empty() {
        println!("No offline trips. Run 'wayfarer plan' or 'wayfarer import' first.");
        return Ok(());
    }

    println!(
        "{:<22} {:<34} {:<8} {}",
        "ID", "Title", "Status", "Last Modified"
    );
    println!("{:-<84}", "");
    for entry in store.trips() {
        println!(
            "{:<22} {:<34} {:<8} {}",
            entry.display_id(),
            truncate(&entry.trip.title, 32),
            entry.status,
            entry
                .last_modified
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
        );
    }

    let (pending, _, failed) = store.status_counts();
    if pending + failed > 0 {
        println!();
        println!(
            "{} trip(s) not yet on the server. Run 'wayfarer sync' to push them.",
            pending + failed
        );
    }
    Ok(())
}

fn cmd_show(
    config: &Config,
    id: &str,
    map: bool,
    itinerary: bool,
    timeline: bool,
    json: bool,
) -> Result<()> {
    let store = open_store(config)?;
    let Some(entry) = store.get(id) else {
        bail!(
            "no offline trip matching '{}'. Run 'wayfarer list' to see what is saved.",
            id
        );
    };
    let trip = &entry.trip;

    if map {
        let view = MapView::from_trip(trip);
        if json {
            println!("{}", serde_json::to_string_pretty(&view)?);
            return Ok(());
        }
        render_map(&view);
    } else if itinerary {
        let view = ItineraryView::from_trip(trip);
        if json {
            println!("{}", serde_json::to_string_pretty(&view)?);
            return Ok(());
        }
        render_itinerary(&view);
    } else if timeline {
        let view = TimelineView::from_trip(trip);
        if json {
            println!("{}", serde_json::to_string_pretty(&view)?);
            return Ok(());
        }
        render_timeline(&view);
    } else {
        if json {
            println!("{}", serde_json::to_string_pretty(trip)?);
            return Ok(());
        }
        render_overview(entry.display_id().as_str(), entry.status, trip);
    }
    Ok(())
}

fn render_overview(display_id: &str, status: SyncStatus, trip: &Trip) {
    println!("{}", trip.title);
    println!("{:=<width$}", "", width = trip.title.chars().count().max(8));
    println!();
    println!("  ID:         {}", display_id);
    println!("  Status:     {}", status);
    if !trip.location.is_empty() {
        println!("  Location:   {}", trip.location);
    }
    if !trip.duration.is_empty() {
        println!("  Duration:   {}", trip.duration);
    }
    if !trip.difficulty.is_empty() {
        println!("  Difficulty: {}", trip.difficulty);
    }
    if !trip.price_estimate.is_empty() {
        println!("  Price:      {}", trip.price_estimate);
    }

    if !trip.description.is_empty() {
        println!();
        println!("{}", trip.description);
    }
    if !trip.why_we_chose_this.is_empty() {
        println!();
        println!("Why this trip: {}", trip.why_we_chose_this);
    }

    if !trip.journey.segments.is_empty() {
        println!();
        println!(
            "Journey: {} segment(s), {} total, {}",
            trip.journey.segments.len(),
            format_km(trip.journey.total_distance),
            format_hours(trip.journey.total_duration)
        );
    }
    if !trip.itinerary.is_empty() {
        println!(
            "Itinerary: {} day(s). Use --itinerary or --timeline for details.",
            trip.itinerary.len()
        );
    }
}

fn render_map(view: &MapView) {
    println!(
        "Center: {:.4}, {:.4}",
        view.center.lng(),
        view.center.lat()
    );
    if let Some(bounds) = &view.bounds {
        println!(
            "Bounds: [{:.4}, {:.4}] to [{:.4}, {:.4}]",
            bounds.southwest().lng(),
            bounds.southwest().lat(),
            bounds.northeast().lng(),
            bounds.northeast().lat()
        );
    }

    if view.markers.is_empty() && view.routes.is_empty() {
        println!();
        println!("Nothing to draw: the trip has no markers or routed segments.");
        return;
    }

    if !view.markers.is_empty() {
        println!();
        println!("Markers ({}):", view.markers.len());
        for marker in &view.markers {
            println!(
                "  {:<24} {:.4}, {:.4}",
                marker.label,
                marker.coordinates.lng(),
                marker.coordinates.lat()
            );
        }
    }

    if !view.routes.is_empty() {
        println!();
        println!("Routes ({}):", view.routes.len());
        for route in &view.routes {
            println!(
                "  [{}] {} -> {} ({} points)",
                route.mode,
                route.from,
                route.to,
                route.points.len()
            );
        }
    }
}

fn render_itinerary(view: &ItineraryView) {
    if view.days.is_empty() {
        println!("No itinerary days.");
        return;
    }

    for card in &view.days {
        println!("Day {}: {}", card.day, card.title);
        if !card.description.is_empty() {
            println!("  {}", card.description);
        }
        for activity in &card.activities {
            println!("  - {}", activity);
        }
        if let Some(accommodation) = &card.accommodation {
            println!("  Stay: {}", accommodation);
        }
        println!();
    }

    if !view.suggested_guides.is_empty() {
        println!("Suggested guides:");
        for guide in &view.suggested_guides {
            println!("  - {}", guide);
        }
    }
}

fn render_timeline(view: &TimelineView) {
    if view.day_count() == 0 {
        println!("No timeline data.");
        return;
    }

    match view {
        TimelineView::Structured(days) => {
            for day in days {
                println!("Day {}:", day.day);
                for activity in &day.activities {
                    let mut line = format!("  - {}", activity.kind);
                    if let Some(hours) = activity.duration_hours {
                        line.push_str(&format!(" ({}h)", hours));
                    }
                    if let (Some(from), Some(to)) =
                        (&activity.start_location, &activity.end_location)
                    {
                        line.push_str(&format!(", {} -> {}", from, to));
                    }
                    println!("{}", line);
                    for hazard in &activity.hazards {
                        println!("    ! {}", hazard);
                    }
                }
            }
        }
        TimelineView::Simple(days) => {
            for day in days {
                println!("Day {}: {}", day.day, day.title);
                for activity in &day.activities {
                    println!("  - {}", activity);
                }
            }
        }
    }
}

// ============================================
// Sync commands
// ============================================

async fn cmd_sync(config: &Config, retry_failed: bool) -> Result<()> {
    let mut store = open_store(config)?;

    if retry_failed {
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
    if eligible == 0 {
        println!("Nothing to sync.");
        return Ok(());
    }

    let client = trip_client(config)?;
    let state = SyncStateStore::open(config.sync_state_path())
        .context("failed to open sync state store")?;
    let mut coordinator = SyncCoordinator::new(Box::new(client), state, &config.sync);

    if !coordinator.probe().await {
        println!("Server unreachable; {} trip(s) stay pending.", eligible);
        return Ok(());
    }

    let pb = ProgressBar::new(eligible as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let outcome = coordinator
        .sync_with_progress(&mut store, |current, total, title| {
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
    Ok(())
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
        println!("\nFailed trips retry on the next sync; 'wayfarer retry <id>' re-arms them later.");
    }
}

fn cmd_retry(config: &Config, id: &str) -> Result<()> {
    let mut store = open_store(config)?;
    let Some(entry) = store.get(id) else {
        bail!("no offline trip matching '{}'", id);
    };

    if entry.status != SyncStatus::Failed {
        println!(
            "'{}' is {}, nothing to retry.",
            entry.trip.title, entry.status
        );
        return Ok(());
    }

    let title = entry.trip.title.clone();
    store.retry(id)?;
    println!("Re-armed '{}'. Run 'wayfarer sync' to push it.", title);
    Ok(())
}

async fn cmd_remove(config: &Config, id: &str, remote: bool) -> Result<()> {
    let mut store = open_store(config)?;

    if !remote {
        if store.remove(id)? {
            println!("Removed.");
        } else {
            bail!("no offline trip matching '{}'", id);
        }
        return Ok(());
    }

    let client = trip_client(config)?;
    let state = SyncStateStore::open(config.sync_state_path())
        .context("failed to open sync state store")?;
    let mut coordinator = SyncCoordinator::new(Box::new(client), state, &config.sync);

    let outcome = coordinator
        .delete(&mut store, id, true)
        .await
        .context("remote delete failed, local copy kept")?;

    if !outcome.removed_local {
        bail!("no offline trip matching '{}'", id);
    }
    if outcome.removed_remote {
        println!("Removed locally and from the server.");
    } else {
        println!("Removed locally; no server copy existed.");
    }
    Ok(())
}

// ============================================
// Remote-only commands
// ============================================

async fn cmd_share(config: &Config, id: &str) -> Result<()> {
    let store = open_store(config)?;
    let Some(entry) = store.get(id) else {
        bail!("no offline trip matching '{}'", id);
    };
    let Some(server_id) = entry.trip.id.server_id() else {
        bail!(
            "'{}' has not been synced yet. Run 'wayfarer sync' first, then share.",
            entry.trip.title
        );
    };

    let client = trip_client(config)?;
    let link = client
        .share_trip(server_id)
        .await
        .context("share request failed")?;

    println!("Share link for '{}':", entry.trip.title);
    println!("  {}", link.url);
    Ok(())
}

async fn cmd_shared(config: &Config, shareable_id: &str) -> Result<()> {
    let client = trip_client(config)?;
    let trip = match client.shared_trip(shareable_id).await {
        Ok(trip) => trip,
        Err(wayfarer_core::Error::NotFound(_)) => {
            bail!("no shared trip behind '{}'", shareable_id);
        }
        Err(e) => return Err(e).context("shared trip request failed"),
    };

    println!("Shared trip:");
    println!();
    println!("  {}", trip.title);
    if !trip.location.is_empty() {
        println!("  {}", trip.location);
    }
    if !trip.duration.is_empty() {
        println!("  {}", trip.duration);
    }
    if !trip.description.is_empty() {
        println!();
        println!("{}", trip.description);
    }
    Ok(())
}

async fn cmd_weather(config: &Config, id: &str, days: u32) -> Result<()> {
    let store = open_store(config)?;
    let Some(entry) = store.get(id) else {
        bail!("no offline trip matching '{}'", id);
    };

    let at = entry.trip.map_center;
    if at == LngLat::default() || !at.is_valid() {
        bail!("'{}' has no usable map center", entry.trip.title);
    }

    if !config.api.is_ready() {
        bail!(
            "no server configured; set api.server_url in {}",
            Config::config_path().display()
        );
    }
    let client =
        WeatherClient::new(config.api.clone()).context("failed to create weather client")?;

    let place = if entry.trip.location.is_empty() {
        entry.trip.title.clone()
    } else {
        entry.trip.location.clone()
    };

    let report = client.current(at).await.context("weather request failed")?;
    println!(
        "Weather at {} ({:.3}, {:.3}):",
        place,
        at.lng(),
        at.lat()
    );
    println!("  {}, {:.0}\u{b0}C", report.conditions, report.temperature_c);
    if let Some(wind) = report.wind_speed_kmh {
        println!("  Wind: {:.0} km/h", wind);
    }
    if let Some(humidity) = report.humidity_pct {
        println!("  Humidity: {:.0}%", humidity);
    }

    if days > 0 {
        let forecast = client
            .forecast(at, days)
            .await
            .context("forecast request failed")?;
        println!();
        println!("Forecast:");
        for day in forecast {
            let rain = day
                .precipitation_chance_pct
                .map(|p| format!(", {:.0}% rain", p))
                .unwrap_or_default();
            println!(
                "  {}  {:>3.0} / {:<3.0}  {}{}",
                day.date, day.high_c, day.low_c, day.conditions, rain
            );
        }
    }
    Ok(())
}

// ============================================
// Housekeeping commands
// ============================================

fn cmd_status(config: &Config) -> Result<()> {
    println!("Wayfarer Status");
    println!("===============");
    println!();

    println!(
        "Server URL:  {}",
        config.api.server_url.as_deref().unwrap_or("<not set>")
    );
    println!(
        "API Key:     {}",
        if config.api.api_key.is_some() {
            "<set>"
        } else {
            "<not set>"
        }
    );
    println!("Trip store:  {}", config.trips_path().display());

    let store = open_store(config)?;
    let (pending, synced, failed) = store.status_counts();
    println!();
    println!("Offline trips: {}", store.len());
    println!("  Pending: {}", pending);
    println!("  Synced:  {}", synced);
    println!("  Failed:  {}", failed);

    let state = SyncStateStore::open(config.sync_state_path())
        .context("failed to open sync state store")?;
    println!();
    match state.last_sync_attempt() {
        Some(at) => println!(
            "Last sync attempt: {}",
            at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S")
        ),
        None => println!("Last sync attempt: never"),
    }

    if !config.api.is_ready() {
        println!();
        println!("No server configured. Trips stay offline until you set one:");
        println!();
        println!("  [api]");
        println!("  server_url = \"https://trips.example.com\"");
        println!("  api_key = \"wf_live_xxxxxxxxxxxx\"");
    }
    Ok(())
}

fn cmd_clear(config: &Config, yes: bool) -> Result<()> {
    let mut store = open_store(config)?;
    if store.is_empty() {
        println!("The offline store is already empty.");
        return Ok(());
    }

    if !yes {
        bail!(
            "this removes {} offline trip(s); pass --yes to confirm",
            store.len()
        );
    }

    let removed = store.len();
    store.clear()?;
    println!("Removed {} trip(s).", removed);
    Ok(())
}

// ============================================
// Helpers
// ============================================

fn open_store(config: &Config) -> Result<OfflineTripStore> {
    OfflineTripStore::open(config.trips_path()).context("failed to open offline trip store")
}

fn trip_client(config: &Config) -> Result<TripApiClient> {
    if !config.api.is_ready() {
        bail!(
            "no server configured; set api.server_url in {}",
            Config::config_path().display()
        );
    }
    TripApiClient::new(config.api.clone()).context("failed to create trip client")
}

/// Shorten a string for table columns
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut)
}

fn format_km(meters: f64) -> String {
    format!("{:.1} km", meters / 1000.0)
}

fn format_hours(seconds: f64) -> String {
    let hours = seconds / 3600.0;
    if hours < 1.0 {
        format!("{:.0} min", seconds / 60.0)
    } else {
        format!("{:.1} h", hours)
    }
}
