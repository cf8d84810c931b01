//! Playtime persistence: trait + SQLite implementation
//!
//! Tables (see `/sql/`):
//! - `players` - UPSERT on steam_id (clan tag from the roster sync)
//! - `playtime` - UPSERT on (steam_id, date), counters only ever grow
//!
//! Counter increments are a single `INSERT ... ON CONFLICT DO UPDATE` statement
//! per player, so two writers can never lose each other's increment.

use super::types::{AffiliationTotals, DailyCounter, Participant, ReportWindow, TickClass};
use crate::sqlite_pragma::apply_optimized_pragmas;
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Schema files, executed in order on every open (all use IF NOT EXISTS)
const MIGRATIONS: &[(&str, &str)] = &[
    ("01_players.sql", include_str!("../../sql/01_players.sql")),
    ("02_playtime.sql", include_str!("../../sql/02_playtime.sql")),
];

#[derive(Debug)]
pub enum StoreError {
    Database(rusqlite::Error),
    Io(std::io::Error),
    LockPoisoned,
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "Database error: {}", e),
            StoreError::Io(e) => write!(f, "IO error: {}", e),
            StoreError::LockPoisoned => write!(f, "Database connection lock poisoned"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Persistence boundary used by all three tracker components
#[async_trait]
pub trait PlaytimeStore: Send + Sync {
    /// Upsert players and their clan tags in one transaction
    ///
    /// A `Some` tag overwrites the stored one. A `None` tag only makes sure the
    /// player row exists and leaves any stored tag alone.
    ///
    /// Returns the number of rows actually inserted or changed.
    async fn upsert_participants(&self, participants: &[Participant]) -> Result<usize, StoreError>;

    /// Subset of `steam_ids` that already exist in `players`
    async fn tracked_players(&self, steam_ids: &[String]) -> Result<Vec<String>, StoreError>;

    /// Add one minute of `class` to the player's counter for `date`
    ///
    /// Creates the row (both counters at zero) if this is the first tick of the day.
    async fn increment_playtime(
        &self,
        steam_id: &str,
        date: NaiveDate,
        class: TickClass,
    ) -> Result<(), StoreError>;

    async fn participant(&self, steam_id: &str) -> Result<Option<Participant>, StoreError>;

    async fn daily_counter(
        &self,
        steam_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyCounter>, StoreError>;

    /// Sum both counters over `window` grouped by clan tag
    ///
    /// Ordering: tagged groups ascending by tag, the unaffiliated bucket last.
    async fn totals_by_affiliation(
        &self,
        window: ReportWindow,
    ) -> Result<Vec<AffiliationTotals>, StoreError>;

    /// Administrative delete, cascades to the player's playtime rows
    ///
    /// Returns false when the player did not exist.
    async fn remove_participant(&self, steam_id: &str) -> Result<bool, StoreError>;
}

/// SQLite implementation of PlaytimeStore
pub struct SqlitePlaytimeStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqlitePlaytimeStore {
    /// Open (or create) the database and run schema migrations
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        apply_optimized_pragmas(&conn)?;
        run_schema_migrations(&conn)?;

        log::info!("✅ Playtime store ready at {}", db_path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

/// Execute the embedded schema files in order
fn run_schema_migrations(conn: &Connection) -> Result<(), StoreError> {
    log::info!("🔧 Running schema migrations");

    for (name, sql) in MIGRATIONS {
        conn.execute_batch(sql)?;
        log::debug!("   ├─ Applied: {}", name);
    }

    log::info!("   └─ {} schema files applied", MIGRATIONS.len());
    Ok(())
}

#[async_trait]
impl PlaytimeStore for SqlitePlaytimeStore {
    async fn upsert_participants(&self, participants: &[Participant]) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut changed = 0;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO players (steam_id, clan_tag)
                VALUES (?1, ?2)
                ON CONFLICT(steam_id) DO UPDATE SET
                    clan_tag = excluded.clan_tag
                WHERE excluded.clan_tag IS NOT NULL
                  AND players.clan_tag IS NOT excluded.clan_tag
                "#,
            )?;

            for participant in participants {
                changed += stmt.execute(params![participant.steam_id, participant.clan_tag])?;
            }
        }

        tx.commit()?;
        Ok(changed)
    }

    async fn tracked_players(&self, steam_ids: &[String]) -> Result<Vec<String>, StoreError> {
        if steam_ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;
        let placeholders = vec!["?"; steam_ids.len()].join(", ");
        let sql = format!(
            "SELECT steam_id FROM players WHERE steam_id IN ({}) ORDER BY steam_id",
            placeholders
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(steam_ids.iter()), |row| row.get(0))?;

        let mut tracked = Vec::new();
        for row in rows {
            tracked.push(row?);
        }
        Ok(tracked)
    }

    async fn increment_playtime(
        &self,
        steam_id: &str,
        date: NaiveDate,
        class: TickClass,
    ) -> Result<(), StoreError> {
        let (played, seeded): (u32, u32) = match class {
            TickClass::Played => (1, 0),
            TickClass::Seeded => (0, 1),
        };

        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO playtime (steam_id, date, minutes_played, minutes_seeded)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(steam_id, date) DO UPDATE SET
                minutes_played = minutes_played + excluded.minutes_played,
                minutes_seeded = minutes_seeded + excluded.minutes_seeded
            "#,
            params![steam_id, date, played, seeded],
        )?;

        Ok(())
    }

    async fn participant(&self, steam_id: &str) -> Result<Option<Participant>, StoreError> {
        let conn = self.lock()?;
        let participant = conn
            .query_row(
                "SELECT steam_id, clan_tag FROM players WHERE steam_id = ?1",
                [steam_id],
                |row| {
                    Ok(Participant {
                        steam_id: row.get(0)?,
                        clan_tag: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(participant)
    }

    async fn daily_counter(
        &self,
        steam_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyCounter>, StoreError> {
        let conn = self.lock()?;
        let counter = conn
            .query_row(
                "SELECT steam_id, date, minutes_played, minutes_seeded
                 FROM playtime WHERE steam_id = ?1 AND date = ?2",
                params![steam_id, date],
                |row| {
                    Ok(DailyCounter {
                        steam_id: row.get(0)?,
                        date: row.get(1)?,
                        minutes_played: row.get(2)?,
                        minutes_seeded: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(counter)
    }

    async fn totals_by_affiliation(
        &self,
        window: ReportWindow,
    ) -> Result<Vec<AffiliationTotals>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT p.clan_tag,
                   COALESCE(SUM(t.minutes_seeded), 0),
                   COALESCE(SUM(t.minutes_played), 0)
            FROM playtime t
            JOIN players p ON p.steam_id = t.steam_id
            WHERE t.date BETWEEN ?1 AND ?2
            GROUP BY p.clan_tag
            ORDER BY p.clan_tag IS NULL, p.clan_tag
            "#,
        )?;

        let rows = stmt.query_map(params![window.start, window.end], |row| {
            Ok(AffiliationTotals {
                clan_tag: row.get(0)?,
                minutes_seeded: row.get(1)?,
                minutes_played: row.get(2)?,
            })
        })?;

        let mut totals = Vec::new();
        for row in rows {
            totals.push(row?);
        }
        Ok(totals)
    }

    async fn remove_participant(&self, steam_id: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM players WHERE steam_id = ?1", [steam_id])?;
        Ok(removed > 0)
    }
}
