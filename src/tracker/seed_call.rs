//! Daily seed call announcement
//!
//! At a configured time of day the tracker asks the community to help seed,
//! unless the server is already past the seeding band.

use super::feed::{FeedError, PopulationFeed};
use super::notifier::Notifier;
use super::types::{Notification, SeedingThresholds};
use std::sync::Arc;

const SEED_CALL_TITLE: &str = "Seed call";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedCallOutcome {
    Sent,
    AlreadySeeded { population: u32 },
    DeliveryFailed,
}

pub struct SeedCall {
    feed: Arc<dyn PopulationFeed>,
    notifier: Arc<dyn Notifier>,
    thresholds: SeedingThresholds,
    message: String,
    ping_roles: Vec<String>,
}

impl SeedCall {
    pub fn new(
        feed: Arc<dyn PopulationFeed>,
        notifier: Arc<dyn Notifier>,
        thresholds: SeedingThresholds,
        message: String,
        ping_roles: Vec<String>,
    ) -> Self {
        Self {
            feed,
            notifier,
            thresholds,
            message,
            ping_roles,
        }
    }

    pub async fn announce(&self) -> Result<SeedCallOutcome, FeedError> {
        let snapshot = self.feed.snapshot().await?;

        if self.thresholds.is_seeded(snapshot.player_count) {
            log::info!(
                "🌱 Server already seeded ({} players), seed call skipped",
                snapshot.player_count
            );
            return Ok(SeedCallOutcome::AlreadySeeded {
                population: snapshot.player_count,
            });
        }

        let notification =
            Notification::new(SEED_CALL_TITLE, self.message.clone()).with_mentions(&self.ping_roles);

        match self.notifier.send(&notification).await {
            Ok(()) => {
                log::info!("📣 Seed call sent: '{}'", self.message);
                Ok(SeedCallOutcome::Sent)
            }
            Err(e) => {
                log::error!("❌ Failed to send seed call: {}", e);
                Ok(SeedCallOutcome::DeliveryFailed)
            }
        }
    }
}
