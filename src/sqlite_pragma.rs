//! Shared SQLite connection tuning
//!
//! Applied to every connection the tracker opens so that the accumulator,
//! the roster sync and the reporter can share one database file without
//! tripping over each other's locks.

use rusqlite::Connection;
use std::time::Duration;

/// How long a statement waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Apply PRAGMAs: WAL, NORMAL sync, foreign keys, busy timeout
pub fn apply_optimized_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    // Required for playtime rows to cascade with their player
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}
