//! Tracker Runtime
//!
//! This binary wires up the playtime tracker:
//! - Opens the SQLite store (schema applied on open)
//! - Builds the whitelister, population feed and Discord adapters
//! - Spawns the roster sync, accumulator, weekly report and seed call timers
//! - Shuts every timer down on CTRL+C
//!
//! Usage:
//!   cargo run --release --bin seedtrack
//!
//! See `seedtrack::config` for the environment variables.

use dotenv::dotenv;
use log::{error, info};
use seedtrack::config::TrackerConfig;
use seedtrack::tracker::{
    scheduler::{accumulator_task, report_task, roster_sync_task, seed_call_task, TrackerScheduler},
    DiscordWebhookNotifier, HttpPopulationFeed, Notifier, PlaytimeAccumulator, PlaytimeStore,
    PopulationFeed, RosterSource, RosterSynchronizer, SeedCall, SqlitePlaytimeStore,
    WhitelisterClient, WindowReporter,
};
use std::sync::Arc;
use std::time::Duration;

/// How long in-flight handlers get to finish on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize environment and logging
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("🚀 seedtrack - playtime & seeding tracker");

    let config = match TrackerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Invalid configuration: {}", e);
            return Err(e.into());
        }
    };

    info!("✅ Configuration loaded");
    info!("   ├─ Database: {}", config.db_path);
    info!(
        "   ├─ Seeding band: [{}, {}] players",
        config.thresholds.lower, config.thresholds.upper
    );
    info!("   ├─ Tick interval: {}ms", config.tick_interval.as_millis());
    info!(
        "   ├─ Weekly report: {} {:02}:00 UTC",
        config.report_schedule.weekday, config.report_schedule.hour
    );
    match &config.seed_call {
        Some(seed_call) => info!("   └─ Seed call: {} UTC", seed_call.at.format("%H:%M")),
        None => info!("   └─ Seed call: disabled"),
    }

    let store: Arc<dyn PlaytimeStore> = Arc::new(SqlitePlaytimeStore::open(&config.db_path)?);

    let roster: Arc<dyn RosterSource> = Arc::new(WhitelisterClient::new(
        &config.whitelister_api_url,
        &config.whitelister_api_key,
        &config.whitelister_list_id,
        config.http_timeout,
    )?);
    let feed: Arc<dyn PopulationFeed> = Arc::new(HttpPopulationFeed::new(
        &config.population_feed_url,
        config.http_timeout,
    )?);
    let notifier: Arc<dyn Notifier> = Arc::new(DiscordWebhookNotifier::new(
        &config.notify_webhook_url,
        config.http_timeout,
    )?);

    info!("🚀 Spawning tracker timers...");
    let mut scheduler = TrackerScheduler::new();

    let synchronizer = RosterSynchronizer::new(roster, store.clone());
    let rearm = config.roster_sync_interval;
    scheduler.spawn("roster_sync", move |shutdown| {
        roster_sync_task(synchronizer, rearm, shutdown)
    });

    let accumulator = PlaytimeAccumulator::new(feed.clone(), store.clone(), config.thresholds);
    let tick_interval = config.tick_interval;
    scheduler.spawn("accumulator", move |shutdown| {
        accumulator_task(accumulator, tick_interval, shutdown)
    });

    let reporter = WindowReporter::new(store.clone(), notifier.clone());
    let schedule = config.report_schedule;
    scheduler.spawn("weekly_report", move |shutdown| {
        report_task(reporter, schedule, shutdown)
    });

    if let Some(seed_call_config) = config.seed_call.clone() {
        let seed_call = SeedCall::new(
            feed.clone(),
            notifier.clone(),
            config.thresholds,
            seed_call_config.message,
            seed_call_config.ping_roles,
        );
        let at = seed_call_config.at;
        scheduler.spawn("seed_call", move |shutdown| seed_call_task(seed_call, at, shutdown));
    }

    info!("✅ Timers running: {}", scheduler.task_names().join(", "));
    info!("🔄 Press CTRL+C to shutdown gracefully");

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("⚠️  Received CTRL+C, shutting down..."),
        Err(err) => error!("❌ Failed to listen for CTRL+C: {}", err),
    }

    scheduler.shutdown(SHUTDOWN_GRACE).await;

    info!("✅ seedtrack stopped");
    Ok(())
}
