//! Roster sync from the whitelister API
//!
//! Pulls the clan list and the whitelist entries for one player list, resolves
//! each entry's clan id to a tag and upserts the result into `players`.
//!
//! ## API Reference
//!
//! - `GET {base}/api/clans/getAllClans?apiKey=KEY` → `[{"_id", "tag"}]`
//! - `GET {base}/api/whitelist/read/getAll?apiKey=KEY&sel_list_id=LIST`
//!   → `[{"steamid64", "id_clan"}]`
//!
//! Both payloads are fetched and parsed before anything is written, so a
//! failed or malformed fetch never touches stored tags.

use super::store::{PlaytimeStore, StoreError};
use super::types::Participant;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Clan (affiliation group) as returned by the whitelister
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RosterGroup {
    #[serde(rename = "_id")]
    pub id: String,
    pub tag: String,
}

/// Whitelist entry linking a player to a clan
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RosterEntry {
    #[serde(rename = "steamid64")]
    pub steam_id: String,
    #[serde(rename = "id_clan", default)]
    pub group_id: Option<String>,
}

#[derive(Debug)]
pub enum RemoteError {
    Http(reqwest::Error),
    Status { endpoint: &'static str, status: reqwest::StatusCode },
    Malformed { endpoint: &'static str, source: serde_json::Error },
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Http(err)
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::Http(e) => write!(f, "HTTP error: {}", e),
            RemoteError::Status { endpoint, status } => {
                write!(f, "{} returned {}", endpoint, status)
            }
            RemoteError::Malformed { endpoint, source } => {
                write!(f, "Malformed payload from {}: {}", endpoint, source)
            }
        }
    }
}

impl std::error::Error for RemoteError {}

#[derive(Debug)]
pub enum SyncError {
    Remote(RemoteError),
    Store(StoreError),
}

impl From<RemoteError> for SyncError {
    fn from(err: RemoteError) -> Self {
        SyncError::Remote(err)
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        SyncError::Store(err)
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Remote(e) => write!(f, "Roster fetch failed: {}", e),
            SyncError::Store(e) => write!(f, "Roster upsert failed: {}", e),
        }
    }
}

impl std::error::Error for SyncError {}

/// Remote roster boundary
#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn fetch_groups(&self) -> Result<Vec<RosterGroup>, RemoteError>;

    async fn fetch_entries(&self) -> Result<Vec<RosterEntry>, RemoteError>;
}

/// Whitelister HTTP client
pub struct WhitelisterClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    list_id: String,
}

impl WhitelisterClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        list_id: &str,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            list_id: list_id.to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &'static str,
        query: &[(&str, &str)],
    ) -> Result<T, RemoteError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self.client.get(&url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status { endpoint, status });
        }

        // Parse from bytes so a bad body is reported as malformed, not as HTTP
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|source| RemoteError::Malformed { endpoint, source })
    }
}

#[async_trait]
impl RosterSource for WhitelisterClient {
    async fn fetch_groups(&self) -> Result<Vec<RosterGroup>, RemoteError> {
        self.get_json("/api/clans/getAllClans", &[("apiKey", self.api_key.as_str())])
            .await
    }

    async fn fetch_entries(&self) -> Result<Vec<RosterEntry>, RemoteError> {
        self.get_json(
            "/api/whitelist/read/getAll",
            &[
                ("apiKey", self.api_key.as_str()),
                ("sel_list_id", self.list_id.as_str()),
            ],
        )
        .await
    }
}

/// Counts from one successful sync
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub groups: usize,
    pub entries: usize,
    /// Entries whose clan resolved to a tag
    pub tagged: usize,
    /// Entries with no clan or an unknown clan id
    pub unresolved: usize,
    /// Entries dropped for a blank steam id
    pub skipped: usize,
    /// Player rows inserted or whose tag changed
    pub changed: usize,
}

pub struct RosterSynchronizer {
    source: Arc<dyn RosterSource>,
    store: Arc<dyn PlaytimeStore>,
}

impl RosterSynchronizer {
    pub fn new(source: Arc<dyn RosterSource>, store: Arc<dyn PlaytimeStore>) -> Self {
        Self { source, store }
    }

    /// Fetch the roster and upsert clan tags
    ///
    /// Entries whose clan does not resolve are still registered as players but
    /// keep whatever tag they already had.
    pub async fn sync(&self) -> Result<SyncSummary, SyncError> {
        let groups = self.source.fetch_groups().await?;
        let entries = self.source.fetch_entries().await?;

        let tags_by_id: HashMap<&str, &str> = groups
            .iter()
            .map(|group| (group.id.as_str(), group.tag.as_str()))
            .collect();

        let mut summary = SyncSummary {
            groups: groups.len(),
            entries: entries.len(),
            ..SyncSummary::default()
        };

        let mut participants = Vec::with_capacity(entries.len());
        for entry in &entries {
            let steam_id = entry.steam_id.trim();
            if steam_id.is_empty() {
                summary.skipped += 1;
                continue;
            }

            let clan_tag = entry
                .group_id
                .as_deref()
                .and_then(|id| tags_by_id.get(id))
                .map(|tag| tag.to_string());

            if clan_tag.is_some() {
                summary.tagged += 1;
            } else {
                summary.unresolved += 1;
            }

            participants.push(Participant {
                steam_id: steam_id.to_string(),
                clan_tag,
            });
        }

        summary.changed = self.store.upsert_participants(&participants).await?;

        Ok(summary)
    }
}
