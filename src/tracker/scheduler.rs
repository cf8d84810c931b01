//! Background timers for the tracker
//!
//! Every component runs in its own tokio task with its own timer:
//! - accumulator: fixed interval, missed ticks skipped
//! - roster sync: once at startup, optionally re-armed on an interval
//! - weekly report: wall-clock weekday/hour (UTC)
//! - seed call: wall-clock time of day (UTC)
//!
//! A handler is always awaited inside its task's loop, so one timer never has
//! two handlers in flight. Shutdown is only observed between handler runs,
//! which lets an in-flight tick finish before its task exits.

use super::accumulator::{AccumulatorError, PlaytimeAccumulator};
use super::report::WindowReporter;
use super::roster::RosterSynchronizer;
use super::seed_call::SeedCall;
use chrono::{DateTime, Datelike, Days, NaiveTime, Utc, Weekday};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};

/// Longest single sleep while waiting for a wall-clock instant
///
/// Waking up periodically keeps long waits honest across clock adjustments.
const MAX_WALL_CLOCK_SLEEP: Duration = Duration::from_secs(60 * 60);

/// Weekly wall-clock slot (UTC)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklySchedule {
    pub weekday: Weekday,
    pub hour: u32,
}

impl WeeklySchedule {
    /// First slot strictly after `now`
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let days_ahead = (self.weekday.num_days_from_monday() + 7
            - now.weekday().num_days_from_monday())
            % 7;
        let slot_time = NaiveTime::from_hms_opt(self.hour, 0, 0).unwrap_or(NaiveTime::MIN);
        let candidate = (now.date_naive() + Days::new(days_ahead as u64))
            .and_time(slot_time)
            .and_utc();

        if candidate > now {
            candidate
        } else {
            candidate + Days::new(7)
        }
    }
}

/// First occurrence of `time` (UTC) strictly after `now`
pub fn next_daily_after(now: DateTime<Utc>, time: NaiveTime) -> DateTime<Utc> {
    let candidate = now.date_naive().and_time(time).and_utc();
    if candidate > now {
        candidate
    } else {
        candidate + Days::new(1)
    }
}

/// Sleep until `target`; returns false if shutdown was requested first
async fn sleep_until_wall_clock(target: DateTime<Utc>, shutdown: &mut watch::Receiver<bool>) -> bool {
    loop {
        let now = Utc::now();
        if now >= target {
            return true;
        }

        let remaining = (target - now).to_std().unwrap_or(Duration::ZERO);
        tokio::select! {
            biased;
            _ = shutdown.changed() => return false,
            _ = sleep(remaining.min(MAX_WALL_CLOCK_SLEEP)) => {}
        }
    }
}

/// Accumulator task - one tick per `period`
pub async fn accumulator_task(
    mut accumulator: PlaytimeAccumulator,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    log::info!("⏰ Starting playtime accumulator (interval: {}ms)", period.as_millis());

    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        // Shutdown wins when both are ready
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = timer.tick() => {}
        }

        match accumulator.tick().await {
            Ok(_) => {}
            Err(AccumulatorError::Feed(e)) => {
                log::warn!("⚠️  Tick skipped, population feed unavailable: {}", e);
            }
            Err(e) => {
                log::error!("❌ Tick aborted: {}", e);
            }
        }
    }

    log::info!("🛑 Playtime accumulator stopped");
}

/// Roster sync task - runs immediately, then every `rearm` if set
pub async fn roster_sync_task(
    synchronizer: RosterSynchronizer,
    rearm: Option<Duration>,
    mut shutdown: watch::Receiver<bool>,
) {
    run_roster_sync(&synchronizer).await;

    let Some(period) = rearm else {
        log::info!("   └─ Roster sync re-arm disabled (startup only)");
        return;
    };

    log::info!("⏰ Roster sync re-armed (interval: {}s)", period.as_secs());

    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // First tick completes immediately and the startup sync already ran
    timer.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = timer.tick() => {}
        }

        run_roster_sync(&synchronizer).await;
    }

    log::info!("🛑 Roster sync stopped");
}

async fn run_roster_sync(synchronizer: &RosterSynchronizer) {
    log::info!("🔄 Syncing roster from whitelister...");

    match synchronizer.sync().await {
        Ok(summary) => {
            log::info!("✅ Roster sync complete");
            log::info!("   ├─ Clans: {}", summary.groups);
            log::info!("   ├─ Whitelist entries: {}", summary.entries);
            log::info!("   ├─ Tagged: {} / unresolved: {}", summary.tagged, summary.unresolved);
            log::info!("   ├─ Skipped (blank steam id): {}", summary.skipped);
            log::info!("   └─ Rows changed: {}", summary.changed);
        }
        Err(e) => {
            log::error!("❌ Roster sync failed, stored tags left unchanged: {}", e);
        }
    }
}

/// Weekly report task
pub async fn report_task(
    reporter: WindowReporter,
    schedule: WeeklySchedule,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let next = schedule.next_after(Utc::now());
        log::info!("📅 Next weekly report at {}", next.format("%Y-%m-%d %H:%M UTC"));

        if !sleep_until_wall_clock(next, &mut shutdown).await {
            break;
        }

        if let Err(e) = reporter.report().await {
            log::error!("❌ Weekly report not sent: {}", e);
        }
    }

    log::info!("🛑 Weekly report timer stopped");
}

/// Daily seed call task
pub async fn seed_call_task(
    seed_call: SeedCall,
    at: NaiveTime,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let next = next_daily_after(Utc::now(), at);
        log::info!(
            "📅 Next seed call at {} ({}s from now)",
            next.format("%Y-%m-%d %H:%M UTC"),
            (next - Utc::now()).num_seconds()
        );

        if !sleep_until_wall_clock(next, &mut shutdown).await {
            break;
        }

        if let Err(e) = seed_call.announce().await {
            log::warn!("⚠️  Seed call skipped, population feed unavailable: {}", e);
        }
    }

    log::info!("🛑 Seed call timer stopped");
}

/// Owner of all tracker timers
///
/// `shutdown` signals every task and waits for it; anything still registered
/// when the scheduler is dropped gets aborted.
pub struct TrackerScheduler {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl TrackerScheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            tasks: Vec::new(),
        }
    }

    /// Spawn a task that receives the shared shutdown signal
    pub fn spawn<F, Fut>(&mut self, name: &'static str, task: F)
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task(self.shutdown_tx.subscribe()));
        self.tasks.push((name, handle));
        log::debug!("   ├─ Registered task: {}", name);
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|(name, _)| *name).collect()
    }

    /// Signal all tasks, give each up to `grace` to finish, abort stragglers
    pub async fn shutdown(mut self, grace: Duration) {
        // send() only fails when every receiver is gone, i.e. all tasks already exited
        let _ = self.shutdown_tx.send(true);

        for (name, mut handle) in std::mem::take(&mut self.tasks) {
            match timeout(grace, &mut handle).await {
                Ok(Ok(())) => log::debug!("   ├─ {} finished", name),
                Ok(Err(e)) => log::error!("❌ Task {} ended abnormally: {}", name, e),
                Err(_) => {
                    log::warn!("⚠️  Task {} did not stop within {:?}, aborting", name, grace);
                    handle.abort();
                }
            }
        }

        log::info!("✅ All tracker timers stopped");
    }
}

impl Default for TrackerScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TrackerScheduler {
    fn drop(&mut self) {
        for (_, handle) in &self.tasks {
            handle.abort();
        }
    }
}
