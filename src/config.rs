//! Tracker configuration from environment variables
//!
//! Environment variables:
//! - `SEEDTRACK_DB_PATH` (default: seedtrack.db)
//! - `NOTIFY_WEBHOOK_URL` (required)
//! - `WHITELISTER_API_URL` (required)
//! - `WHITELISTER_API_KEY` (required)
//! - `WHITELISTER_PLAYER_LIST_ID` (required)
//! - `POPULATION_FEED_URL` (required)
//! - `SEEDING_STARTS_AT` (default: 4)
//! - `SEEDING_ENDS_AT` (default: 60)
//! - `TICK_INTERVAL_MS` (default: 60000)
//! - `ROSTER_SYNC_INTERVAL_SECS` (default: 0, startup only)
//! - `REPORT_WEEKDAY` (default: Mon)
//! - `REPORT_HOUR_UTC` (default: 0)
//! - `HTTP_TIMEOUT_SECS` (default: 10, must be positive)
//! - `SEED_CALL_TIME` (HH:MM UTC, seed call disabled when unset)
//! - `SEED_CALL_MESSAGE` (default: "Seeding has started.")
//! - `SEED_CALL_PING_ROLES` (comma-separated role ids)

use crate::tracker::scheduler::WeeklySchedule;
use crate::tracker::types::SeedingThresholds;
use chrono::{NaiveTime, Weekday};
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "seedtrack.db";
const DEFAULT_TICK_INTERVAL_MS: u64 = 60_000;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SEED_CALL_MESSAGE: &str = "Seeding has started.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(var) => write!(f, "{} must be set", var),
            ConfigError::Invalid { var, value, reason } => {
                write!(f, "{}='{}' is invalid: {}", var, value, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedCallConfig {
    pub at: NaiveTime,
    pub message: String,
    pub ping_roles: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Path to SQLite database file
    pub db_path: String,

    /// Discord webhook receiving reports and seed calls
    pub notify_webhook_url: String,

    pub whitelister_api_url: String,
    pub whitelister_api_key: String,
    pub whitelister_list_id: String,

    /// Host endpoint serving the live player list
    pub population_feed_url: String,

    pub thresholds: SeedingThresholds,
    pub tick_interval: Duration,

    /// `None` runs the roster sync at startup only
    pub roster_sync_interval: Option<Duration>,

    pub report_schedule: WeeklySchedule,

    /// Upper bound for every outgoing HTTP request
    pub http_timeout: Duration,

    pub seed_call: Option<SeedCallConfig>,
}

impl TrackerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup (environment, map in tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let lower = parse_or(&get, "SEEDING_STARTS_AT", SeedingThresholds::DEFAULT_LOWER)?;
        let upper = parse_or(&get, "SEEDING_ENDS_AT", SeedingThresholds::DEFAULT_UPPER)?;
        if lower > upper {
            return Err(ConfigError::Invalid {
                var: "SEEDING_STARTS_AT",
                value: lower.to_string(),
                reason: "must not exceed SEEDING_ENDS_AT",
            });
        }

        let tick_interval_ms: u64 = parse_or(&get, "TICK_INTERVAL_MS", DEFAULT_TICK_INTERVAL_MS)?;
        if tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                var: "TICK_INTERVAL_MS",
                value: "0".to_string(),
                reason: "must be positive",
            });
        }

        let roster_sync_secs: u64 = parse_or(&get, "ROSTER_SYNC_INTERVAL_SECS", 0)?;

        let weekday: Weekday = parse_or(&get, "REPORT_WEEKDAY", Weekday::Mon)?;
        let hour: u32 = parse_or(&get, "REPORT_HOUR_UTC", 0)?;
        if hour > 23 {
            return Err(ConfigError::Invalid {
                var: "REPORT_HOUR_UTC",
                value: hour.to_string(),
                reason: "must be between 0 and 23",
            });
        }

        let http_timeout_secs: u64 = parse_or(&get, "HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;
        if http_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "HTTP_TIMEOUT_SECS",
                value: "0".to_string(),
                reason: "must be positive",
            });
        }

        let seed_call = match get("SEED_CALL_TIME") {
            None => None,
            Some(raw) => {
                let at = NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|_| {
                    ConfigError::Invalid {
                        var: "SEED_CALL_TIME",
                        value: raw.clone(),
                        reason: "expected HH:MM",
                    }
                })?;
                Some(SeedCallConfig {
                    at,
                    message: get("SEED_CALL_MESSAGE")
                        .unwrap_or_else(|| DEFAULT_SEED_CALL_MESSAGE.to_string()),
                    ping_roles: get("SEED_CALL_PING_ROLES")
                        .map(|s| split_list(&s))
                        .unwrap_or_default(),
                })
            }
        };

        Ok(Self {
            db_path: get("SEEDTRACK_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            notify_webhook_url: required("NOTIFY_WEBHOOK_URL")?,
            whitelister_api_url: required("WHITELISTER_API_URL")?,
            whitelister_api_key: required("WHITELISTER_API_KEY")?,
            whitelister_list_id: required("WHITELISTER_PLAYER_LIST_ID")?,
            population_feed_url: required("POPULATION_FEED_URL")?,
            thresholds: SeedingThresholds::new(lower, upper),
            tick_interval: Duration::from_millis(tick_interval_ms),
            roster_sync_interval: (roster_sync_secs > 0).then(|| Duration::from_secs(roster_sync_secs)),
            report_schedule: WeeklySchedule { weekday, hour },
            http_timeout: Duration::from_secs(http_timeout_secs),
            seed_call,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var: key,
            value: raw,
            reason: "could not parse value",
        }),
    }
}

/// Split a comma-separated list, dropping empty items
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
