//! Playtime accumulator - one tick per minute
//!
//! Each tick:
//! 1. Polls the live population feed
//! 2. Skips entirely when the population is below the seeding band
//! 3. Resolves today's UTC date from a fresh clock read
//! 4. Keeps only connected players already known to the store
//! 5. Adds one played or seeded minute to each of them
//!
//! The class (played vs seeded) is decided once per tick from the population,
//! never per player. Day rollover needs no special handling: the first tick
//! after midnight UTC simply writes to a new (steam_id, date) row.

use super::feed::{FeedError, PopulationFeed};
use super::store::{PlaytimeStore, StoreError};
use super::types::{system_clock, Clock, SeedingThresholds, TickClass};
use chrono::NaiveDate;
use std::sync::Arc;

#[derive(Debug)]
pub enum AccumulatorError {
    Feed(FeedError),
    /// Store failure; `credited` players were already written this tick
    Store { source: StoreError, credited: usize },
}

impl From<FeedError> for AccumulatorError {
    fn from(err: FeedError) -> Self {
        AccumulatorError::Feed(err)
    }
}

impl std::fmt::Display for AccumulatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccumulatorError::Feed(e) => write!(f, "Population feed unavailable: {}", e),
            AccumulatorError::Store { source, credited } => {
                write!(f, "Store failure after {} players credited: {}", credited, source)
            }
        }
    }
}

impl std::error::Error for AccumulatorError {}

/// What a single tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Population below the lower threshold, nothing written
    Skipped { population: u32 },
    Credited {
        class: TickClass,
        date: NaiveDate,
        population: u32,
        /// Tracked players that received a minute
        credited: usize,
        /// Connected players unknown to the store
        untracked: usize,
    },
}

pub struct PlaytimeAccumulator {
    feed: Arc<dyn PopulationFeed>,
    store: Arc<dyn PlaytimeStore>,
    thresholds: SeedingThresholds,
    now_fn: Clock,
    /// Last UTC date a minute was credited on, for rollover logging
    last_date: Option<NaiveDate>,
}

impl PlaytimeAccumulator {
    pub fn new(
        feed: Arc<dyn PopulationFeed>,
        store: Arc<dyn PlaytimeStore>,
        thresholds: SeedingThresholds,
    ) -> Self {
        Self::new_with_clock(feed, store, thresholds, system_clock())
    }

    /// Create an accumulator with a custom clock (deterministic tests)
    pub fn new_with_clock(
        feed: Arc<dyn PopulationFeed>,
        store: Arc<dyn PlaytimeStore>,
        thresholds: SeedingThresholds,
        now_fn: Clock,
    ) -> Self {
        Self {
            feed,
            store,
            thresholds,
            now_fn,
            last_date: None,
        }
    }

    /// Run one tick
    ///
    /// Takes `&mut self` so a caller can never run two ticks of the same
    /// accumulator at once.
    pub async fn tick(&mut self) -> Result<TickOutcome, AccumulatorError> {
        let snapshot = self.feed.snapshot().await?;
        let population = snapshot.player_count;

        let class = match self.thresholds.classify(population) {
            Some(class) => class,
            None => {
                log::debug!(
                    "💤 Population {} below seeding threshold {}, tick skipped",
                    population,
                    self.thresholds.lower
                );
                return Ok(TickOutcome::Skipped { population });
            }
        };

        let date = (self.now_fn)().date_naive();
        if self.last_date.is_some_and(|last| last != date) {
            log::info!("📅 UTC day rolled over to {}", date);
        }

        let mut connected = snapshot.connected;
        connected.sort();
        connected.dedup();

        let tracked = self
            .store
            .tracked_players(&connected)
            .await
            .map_err(|source| AccumulatorError::Store { source, credited: 0 })?;

        let mut credited = 0;
        for steam_id in &tracked {
            self.store
                .increment_playtime(steam_id, date, class)
                .await
                .map_err(|source| AccumulatorError::Store { source, credited })?;
            credited += 1;
        }

        self.last_date = Some(date);

        log::debug!(
            "⏱️  Tick {} ({}): population={}, credited={}, untracked={}",
            date,
            class.as_str(),
            population,
            credited,
            connected.len() - tracked.len()
        );

        Ok(TickOutcome::Credited {
            class,
            date,
            population,
            credited,
            untracked: connected.len() - tracked.len(),
        })
    }
}
