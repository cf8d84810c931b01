//! # Playtime / seeding tracker
//!
//! Three components around one SQLite store:
//!
//! 1. `RosterSynchronizer` pulls clan membership from the whitelister and
//!    upserts player tags (startup, optionally re-armed)
//! 2. `PlaytimeAccumulator` ticks every minute and credits every connected,
//!    known player with one played or seeded minute for the current UTC day
//! 3. `WindowReporter` sums the last 7 whole days per clan once a week and
//!    posts a table to Discord
//!
//! A daily `SeedCall` announcement rides on the same feed and notifier.
//!
//! ## Population regimes
//!
//! ```text
//! population < lower            -> ignored, nothing written
//! lower <= population <= upper  -> seeded minute
//! population > upper            -> played minute
//! ```
//!
//! ## Boundaries
//!
//! Every external collaborator sits behind a trait so components can be
//! driven by mocks in tests:
//! - `PopulationFeed` - live player list from the game host
//! - `RosterSource` - whitelister clans + whitelist entries
//! - `Notifier` - Discord webhook
//! - `PlaytimeStore` - `players` / `playtime` tables (see `/sql/`)
//!
//! ## Module Organization
//!
//! - `types` - shared data structures and the seeding thresholds
//! - `store` - persistence trait + SQLite implementation
//! - `feed` - live population feed
//! - `roster` - whitelister client and roster sync
//! - `notifier` - notification trait + Discord webhook
//! - `accumulator` - per-minute playtime ticks
//! - `report` - weekly clan report
//! - `seed_call` - daily seeding announcement
//! - `scheduler` - timers, task ownership and shutdown

pub mod types;
pub mod store;
pub mod feed;
pub mod roster;
pub mod notifier;
pub mod accumulator;
pub mod report;
pub mod seed_call;
pub mod scheduler;

// Re-export commonly used types
pub use types::{
    AffiliationTotals, DailyCounter, Notification, Participant, PopulationSnapshot, ReportWindow,
    SeedingThresholds, TickClass,
};
pub use store::{PlaytimeStore, SqlitePlaytimeStore, StoreError};
pub use feed::{HttpPopulationFeed, PopulationFeed};
pub use roster::{RosterSource, RosterSynchronizer, WhitelisterClient};
pub use notifier::{DiscordWebhookNotifier, Notifier};
pub use accumulator::{PlaytimeAccumulator, TickOutcome};
pub use report::WindowReporter;
pub use seed_call::SeedCall;
pub use scheduler::TrackerScheduler;
