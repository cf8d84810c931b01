//! Weekly playtime report grouped by clan
//!
//! Sums seeded and played minutes over the trailing 7 whole UTC days
//! (`[today - 7, today - 1]`) and posts a fixed-width table to the notifier.
//!
//! Row order is the store's: clan tags ascending, unaffiliated last.

use super::notifier::Notifier;
use super::store::{PlaytimeStore, StoreError};
use super::types::{system_clock, AffiliationTotals, Clock, Notification, ReportWindow};
use std::sync::Arc;

const REPORT_TITLE: &str = "Weekly playtime report";
const HEADERS: [&str; 3] = ["Clan", "Seeded", "Played"];
const COLUMN_GAP: &str = "  ";

#[derive(Debug)]
pub enum ReportError {
    Store(StoreError),
}

impl From<StoreError> for ReportError {
    fn from(err: StoreError) -> Self {
        ReportError::Store(err)
    }
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::Store(e) => write!(f, "Report query failed: {}", e),
        }
    }
}

impl std::error::Error for ReportError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOutcome {
    pub window: ReportWindow,
    pub groups: usize,
    /// False when the notifier failed; the report still counts as sent
    pub delivered: bool,
}

/// Render the clan table: left-aligned clan, right-aligned minute columns
pub fn render_table(rows: &[AffiliationTotals]) -> String {
    let cells: Vec<[String; 3]> = rows
        .iter()
        .map(|row| {
            [
                row.label().to_string(),
                row.minutes_seeded.to_string(),
                row.minutes_played.to_string(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_line = |cols: [&str; 3]| {
        format!(
            "{:<w0$}{gap}{:>w1$}{gap}{:>w2$}",
            cols[0],
            cols[1],
            cols[2],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
            gap = COLUMN_GAP,
        )
        .trim_end()
        .to_string()
    };

    let mut lines = Vec::with_capacity(cells.len() + 1);
    lines.push(format_line(HEADERS));
    for row in &cells {
        lines.push(format_line([row[0].as_str(), row[1].as_str(), row[2].as_str()]));
    }
    lines.join("\n")
}

/// Build the notification for one window
pub fn build_notification(window: ReportWindow, rows: &[AffiliationTotals]) -> Notification {
    let mut body = format!("```\n{}\n```", render_table(rows));
    if rows.is_empty() {
        body.push_str("\nNo playtime recorded in this window.");
    }

    Notification::new(REPORT_TITLE, body)
        .with_field("From", window.start.format("%Y-%m-%d").to_string())
        .with_field("To", window.end.format("%Y-%m-%d").to_string())
}

pub struct WindowReporter {
    store: Arc<dyn PlaytimeStore>,
    notifier: Arc<dyn Notifier>,
    now_fn: Clock,
}

impl WindowReporter {
    pub fn new(store: Arc<dyn PlaytimeStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self::new_with_clock(store, notifier, system_clock())
    }

    pub fn new_with_clock(
        store: Arc<dyn PlaytimeStore>,
        notifier: Arc<dyn Notifier>,
        now_fn: Clock,
    ) -> Self {
        Self {
            store,
            notifier,
            now_fn,
        }
    }

    /// Query, render and publish the trailing-window report
    ///
    /// A query failure is returned and nothing is sent. A delivery failure is
    /// logged and swallowed.
    pub async fn report(&self) -> Result<ReportOutcome, ReportError> {
        let window = ReportWindow::trailing((self.now_fn)());
        let rows = self.store.totals_by_affiliation(window).await?;
        let notification = build_notification(window, &rows);

        let delivered = match self.notifier.send(&notification).await {
            Ok(()) => {
                log::info!(
                    "📊 Weekly report sent ({} to {}, {} groups)",
                    window.start,
                    window.end,
                    rows.len()
                );
                true
            }
            Err(e) => {
                log::error!("❌ Failed to deliver weekly report: {}", e);
                false
            }
        };

        Ok(ReportOutcome {
            window,
            groups: rows.len(),
            delivered,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn totals(tag: Option<&str>, seeded: i64, played: i64) -> AffiliationTotals {
        AffiliationTotals {
            clan_tag: tag.map(str::to_string),
            minutes_seeded: seeded,
            minutes_played: played,
        }
    }

    #[test]
    fn test_render_table_alignment() {
        let rows = vec![
            totals(Some("ALPHA"), 10, 5),
            totals(Some("BRAVO"), 0, 20),
            totals(None, 2, 0),
        ];

        let table = render_table(&rows);
        let expected = [
            "Clan            Seeded  Played",
            "ALPHA               10       5",
            "BRAVO                0      20",
            "(unaffiliated)       2       0",
        ]
        .join("\n");

        assert_eq!(table, expected);
    }

    #[test]
    fn test_render_table_widens_for_large_numbers() {
        let table = render_table(&[totals(Some("X"), 1234567, 1)]);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines[0], "Clan   Seeded  Played");
        assert_eq!(lines[1], "X     1234567       1");
    }

    #[test]
    fn test_empty_report_has_header_and_note() {
        let window = ReportWindow {
            start: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
        };
        let notification = build_notification(window, &[]);

        assert!(notification.body.contains("Clan  Seeded  Played"));
        assert!(notification.body.ends_with("No playtime recorded in this window."));
        assert_eq!(
            notification.fields,
            vec![
                ("From".to_string(), "2024-03-04".to_string()),
                ("To".to_string(), "2024-03-10".to_string()),
            ]
        );
    }
}
