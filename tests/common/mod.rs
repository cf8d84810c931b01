//! Shared test doubles for the tracker integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use seedtrack::tracker::feed::FeedError;
use seedtrack::tracker::notifier::NotifyError;
use seedtrack::tracker::roster::{RemoteError, RosterEntry, RosterGroup};
use seedtrack::tracker::types::Clock;
use seedtrack::tracker::{
    AffiliationTotals, DailyCounter, Notification, Notifier, Participant, PlaytimeStore,
    PopulationFeed, PopulationSnapshot, ReportWindow, RosterSource, SqlitePlaytimeStore,
    StoreError, TickClass,
};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Fresh SQLite store in a temp file (keep the file alive for the test)
pub fn create_test_store() -> (NamedTempFile, Arc<SqlitePlaytimeStore>) {
    let temp_file = NamedTempFile::new().unwrap();
    let store = SqlitePlaytimeStore::open(temp_file.path()).unwrap();
    (temp_file, Arc::new(store))
}

pub fn player(steam_id: &str, clan_tag: Option<&str>) -> Participant {
    Participant {
        steam_id: steam_id.to_string(),
        clan_tag: clan_tag.map(str::to_string),
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Clock whose time the test moves by hand
#[derive(Clone)]
pub struct ManualClock(Arc<Mutex<DateTime<Utc>>>);

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self(Arc::new(Mutex::new(start)))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.0.lock().unwrap() = now;
    }

    pub fn clock(&self) -> Clock {
        let inner = self.0.clone();
        Box::new(move || *inner.lock().unwrap())
    }
}

/// Population feed returning whatever the test last set
pub struct StaticFeed {
    snapshot: Mutex<Option<PopulationSnapshot>>,
}

impl StaticFeed {
    pub fn new(player_count: u32, connected: &[&str]) -> Arc<Self> {
        let feed = Arc::new(Self {
            snapshot: Mutex::new(None),
        });
        feed.set(player_count, connected);
        feed
    }

    pub fn set(&self, player_count: u32, connected: &[&str]) {
        *self.snapshot.lock().unwrap() = Some(PopulationSnapshot {
            player_count,
            connected: connected.iter().map(|s| s.to_string()).collect(),
        });
    }

    /// Make the next polls fail
    pub fn fail(&self) {
        *self.snapshot.lock().unwrap() = None;
    }
}

#[async_trait]
impl PopulationFeed for StaticFeed {
    async fn snapshot(&self) -> Result<PopulationSnapshot, FeedError> {
        match self.snapshot.lock().unwrap().clone() {
            Some(snapshot) => Ok(snapshot),
            None => Err(FeedError::Malformed(
                serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
            )),
        }
    }
}

/// Notifier that records every message, optionally failing delivery
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
    pub reject: bool,
}

impl RecordingNotifier {
    pub fn rejecting() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            reject: true,
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification.clone());
        if self.reject {
            return Err(NotifyError::Rejected(reqwest::StatusCode::FORBIDDEN));
        }
        Ok(())
    }
}

/// In-memory roster source
pub struct StaticRoster {
    pub groups: Vec<RosterGroup>,
    pub entries: Vec<RosterEntry>,
}

impl StaticRoster {
    pub fn new(groups: &[(&str, &str)], entries: &[(&str, Option<&str>)]) -> Self {
        Self {
            groups: groups
                .iter()
                .map(|(id, tag)| RosterGroup {
                    id: id.to_string(),
                    tag: tag.to_string(),
                })
                .collect(),
            entries: entries
                .iter()
                .map(|(steam_id, group_id)| RosterEntry {
                    steam_id: steam_id.to_string(),
                    group_id: group_id.map(str::to_string),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl RosterSource for StaticRoster {
    async fn fetch_groups(&self) -> Result<Vec<RosterGroup>, RemoteError> {
        Ok(self.groups.clone())
    }

    async fn fetch_entries(&self) -> Result<Vec<RosterEntry>, RemoteError> {
        Ok(self.entries.clone())
    }
}

/// Store wrapper that starts failing increments after `fail_after` successes
/// and can fail the report query on demand
pub struct FlakyStore {
    pub inner: Arc<SqlitePlaytimeStore>,
    pub fail_after: Option<usize>,
    pub fail_totals: bool,
    increments: Mutex<usize>,
}

impl FlakyStore {
    pub fn new(inner: Arc<SqlitePlaytimeStore>) -> Self {
        Self {
            inner,
            fail_after: None,
            fail_totals: false,
            increments: Mutex::new(0),
        }
    }
}

fn injected_failure() -> StoreError {
    StoreError::Database(rusqlite::Error::InvalidQuery)
}

#[async_trait]
impl PlaytimeStore for FlakyStore {
    async fn upsert_participants(&self, participants: &[Participant]) -> Result<usize, StoreError> {
        self.inner.upsert_participants(participants).await
    }

    async fn tracked_players(&self, steam_ids: &[String]) -> Result<Vec<String>, StoreError> {
        self.inner.tracked_players(steam_ids).await
    }

    async fn increment_playtime(
        &self,
        steam_id: &str,
        date: NaiveDate,
        class: TickClass,
    ) -> Result<(), StoreError> {
        {
            let mut done = self.increments.lock().unwrap();
            if self.fail_after.is_some_and(|limit| *done >= limit) {
                return Err(injected_failure());
            }
            *done += 1;
        }
        self.inner.increment_playtime(steam_id, date, class).await
    }

    async fn participant(&self, steam_id: &str) -> Result<Option<Participant>, StoreError> {
        self.inner.participant(steam_id).await
    }

    async fn daily_counter(
        &self,
        steam_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyCounter>, StoreError> {
        self.inner.daily_counter(steam_id, date).await
    }

    async fn totals_by_affiliation(
        &self,
        window: ReportWindow,
    ) -> Result<Vec<AffiliationTotals>, StoreError> {
        if self.fail_totals {
            return Err(injected_failure());
        }
        self.inner.totals_by_affiliation(window).await
    }

    async fn remove_participant(&self, steam_id: &str) -> Result<bool, StoreError> {
        self.inner.remove_participant(steam_id).await
    }
}

/// Canned response for requests whose path starts with `path`
#[derive(Clone)]
pub struct Route {
    pub path: &'static str,
    pub status: u16,
    pub body: String,
}

impl Route {
    pub fn new(path: &'static str, status: u16, body: impl Into<String>) -> Self {
        Self {
            path,
            status,
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Path plus query string
    pub target: String,
    pub body: String,
}

/// Minimal HTTP/1.1 responder on 127.0.0.1 for exercising the reqwest adapters
pub struct MockHttpServer {
    pub base_url: String,
    pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockHttpServer {
    pub async fn start(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let routes = routes.clone();
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    handle_connection(socket, routes, recorded).await;
                });
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn handle_connection(
    mut socket: TcpStream,
    routes: Vec<Route>,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or_default().to_string();
    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();
    let body_end = buf.len().min(header_end + content_length);
    let body = String::from_utf8_lossy(&buf[header_end..body_end]).to_string();

    recorded.lock().unwrap().push(RecordedRequest {
        method,
        target: target.clone(),
        body,
    });

    let (status, body) = routes
        .iter()
        .find(|route| target.starts_with(route.path))
        .map(|route| (route.status, route.body.clone()))
        .unwrap_or((404, "not found".to_string()));

    let response = format!(
        "HTTP/1.1 {} MOCK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}
