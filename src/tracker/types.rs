//! Core data types shared by the tracker components

use chrono::{DateTime, Days, NaiveDate, Utc};
use std::borrow::Cow;

/// Label used for participants without a clan tag in reports
///
/// Parenthesized so it stands apart from real clan tags.
pub const UNAFFILIATED_LABEL: &str = "(unaffiliated)";

/// Wall-clock source, read fresh on every tick (swapped out in tests)
pub type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Box::new(Utc::now)
}

/// Classification of a single accumulator tick
///
/// Population-wide: every credited participant in a tick gets the same class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickClass {
    /// Population above the upper threshold
    Played,
    /// Population inside the inclusive seeding band
    Seeded,
}

impl TickClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            TickClass::Played => "played",
            TickClass::Seeded => "seeded",
        }
    }
}

/// Seeding band boundaries
///
/// `population < lower` is ignored, `population > upper` counts as played,
/// anything in `[lower, upper]` counts as seeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedingThresholds {
    pub lower: u32,
    pub upper: u32,
}

impl SeedingThresholds {
    pub const DEFAULT_LOWER: u32 = 4;
    pub const DEFAULT_UPPER: u32 = 60;

    pub fn new(lower: u32, upper: u32) -> Self {
        Self { lower, upper }
    }

    /// Classify a population count, `None` when the server is too empty to track
    pub fn classify(&self, population: u32) -> Option<TickClass> {
        if population < self.lower {
            None
        } else if population > self.upper {
            Some(TickClass::Played)
        } else {
            Some(TickClass::Seeded)
        }
    }

    /// True once the server is past the seeding band
    pub fn is_seeded(&self, population: u32) -> bool {
        population > self.upper
    }
}

impl Default for SeedingThresholds {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LOWER, Self::DEFAULT_UPPER)
    }
}

/// One poll of the live population feed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulationSnapshot {
    /// Population count as reported by the host
    pub player_count: u32,
    /// Steam ids of currently connected players
    pub connected: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub steam_id: String,
    pub clan_tag: Option<String>,
}

/// Per-participant, per-UTC-day duration counters (minutes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyCounter {
    pub steam_id: String,
    pub date: NaiveDate,
    pub minutes_played: u32,
    pub minutes_seeded: u32,
}

/// Aggregated minutes for one affiliation bucket over a report window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffiliationTotals {
    /// `None` is the unaffiliated bucket
    pub clan_tag: Option<String>,
    pub minutes_seeded: i64,
    pub minutes_played: i64,
}

impl AffiliationTotals {
    /// Display name of the bucket
    ///
    /// A clan whose tag is literally the unaffiliated label is shown quoted.
    pub fn label(&self) -> Cow<'_, str> {
        match self.clan_tag.as_deref() {
            None => Cow::Borrowed(UNAFFILIATED_LABEL),
            Some(tag) if tag == UNAFFILIATED_LABEL => Cow::Owned(format!("\"{}\"", tag)),
            Some(tag) => Cow::Borrowed(tag),
        }
    }
}

/// Closed range of whole UTC days used by the weekly report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportWindow {
    /// Trailing 7-day window ending yesterday: `[today - 7, today - 1]`
    pub fn trailing(now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        Self {
            start: today - Days::new(7),
            end: today - Days::new(1),
        }
    }
}

/// Message handed to the notification boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Ordered (name, value) metadata fields
    pub fields: Vec<(String, String)>,
    /// Role ids to ping alongside the message
    pub mention_roles: Vec<String>,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            fields: Vec::new(),
            mention_roles: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn with_mentions(mut self, roles: &[String]) -> Self {
        self.mention_roles.extend(roles.iter().cloned());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_threshold_boundaries() {
        let thresholds = SeedingThresholds::new(4, 60);

        assert_eq!(thresholds.classify(0), None);
        assert_eq!(thresholds.classify(3), None);
        assert_eq!(thresholds.classify(4), Some(TickClass::Seeded)); // lower is inclusive
        assert_eq!(thresholds.classify(10), Some(TickClass::Seeded));
        assert_eq!(thresholds.classify(60), Some(TickClass::Seeded)); // upper is inclusive
        assert_eq!(thresholds.classify(61), Some(TickClass::Played));
        assert_eq!(thresholds.classify(75), Some(TickClass::Played));
    }

    #[test]
    fn test_trailing_window_excludes_today() {
        let now = Utc.with_ymd_and_hms(2024, 3, 11, 0, 30, 0).unwrap();
        let window = ReportWindow::trailing(now);

        assert_eq!(window.start, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(window.end, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
    }

    #[test]
    fn test_unaffiliated_label() {
        let totals = AffiliationTotals {
            clan_tag: None,
            minutes_seeded: 2,
            minutes_played: 0,
        };
        assert_eq!(totals.label(), "(unaffiliated)");
    }

    #[test]
    fn test_clan_tags_never_collide_with_unaffiliated_label() {
        let tagged = |tag: &str| AffiliationTotals {
            clan_tag: Some(tag.to_string()),
            minutes_seeded: 0,
            minutes_played: 0,
        };

        assert_eq!(tagged("unaffiliated").label(), "unaffiliated");
        assert_eq!(tagged("(unaffiliated)").label(), "\"(unaffiliated)\"");
        assert_eq!(tagged("ALPHA").label(), "ALPHA");
    }
}
