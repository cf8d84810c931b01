//! Live population feed from the game host
//!
//! The host exposes the current player count and the connected players as JSON:
//!
//! ```json
//! {"playerCount": 42, "players": [{"steamID": "76561198000000001"}]}
//! ```
//!
//! `playerCount` may be omitted, in which case the length of `players` is used.

use super::types::PopulationSnapshot;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug)]
pub enum FeedError {
    Http(reqwest::Error),
    Status(reqwest::StatusCode),
    Malformed(serde_json::Error),
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        FeedError::Http(err)
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Malformed(err)
    }
}

impl std::fmt::Display for FeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedError::Http(e) => write!(f, "HTTP error: {}", e),
            FeedError::Status(s) => write!(f, "Population feed returned {}", s),
            FeedError::Malformed(e) => write!(f, "Malformed population payload: {}", e),
        }
    }
}

impl std::error::Error for FeedError {}

/// Read-only source of the live population, polled once per tick
#[async_trait]
pub trait PopulationFeed: Send + Sync {
    async fn snapshot(&self) -> Result<PopulationSnapshot, FeedError>;
}

#[derive(Debug, Deserialize)]
struct FeedPayload {
    #[serde(rename = "playerCount", default)]
    player_count: Option<u32>,
    #[serde(default)]
    players: Vec<FeedPlayer>,
}

#[derive(Debug, Deserialize)]
struct FeedPlayer {
    #[serde(rename = "steamID")]
    steam_id: String,
}

impl From<FeedPayload> for PopulationSnapshot {
    fn from(payload: FeedPayload) -> Self {
        let connected: Vec<String> = payload.players.into_iter().map(|p| p.steam_id).collect();
        let player_count = payload.player_count.unwrap_or(connected.len() as u32);
        PopulationSnapshot {
            player_count,
            connected,
        }
    }
}

/// Parse a raw feed body into a snapshot
pub fn parse_snapshot(body: &[u8]) -> Result<PopulationSnapshot, FeedError> {
    let payload: FeedPayload = serde_json::from_slice(body)?;
    Ok(payload.into())
}

/// Polls the host's population endpoint over HTTP
pub struct HttpPopulationFeed {
    client: reqwest::Client,
    url: String,
}

impl HttpPopulationFeed {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl PopulationFeed for HttpPopulationFeed {
    async fn snapshot(&self) -> Result<PopulationSnapshot, FeedError> {
        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(FeedError::Status(response.status()));
        }

        let body = response.bytes().await?;
        parse_snapshot(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_payload() {
        let snapshot = parse_snapshot(
            br#"{"playerCount": 12, "players": [{"steamID": "a", "name": "x"}, {"steamID": "b"}]}"#,
        )
        .unwrap();

        assert_eq!(snapshot.player_count, 12);
        assert_eq!(snapshot.connected, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_missing_count_falls_back_to_players() {
        let snapshot = parse_snapshot(br#"{"players": [{"steamID": "a"}]}"#).unwrap();
        assert_eq!(snapshot.player_count, 1);
    }

    #[test]
    fn test_malformed_payload() {
        let result = parse_snapshot(b"not json");
        assert!(matches!(result, Err(FeedError::Malformed(_))));
    }
}
