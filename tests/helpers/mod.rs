#![allow(dead_code)]

use async_trait::async_trait;
use beacon::data::models::{CandidateRecord, MissingPerson};
use beacon::data::store::{InsertOutcome, MemoryStore, RecordStore, StoreError};
use beacon::fanout::BroadcastSink;
use beacon::geocode::AddressResolver;
use beacon::source::client::PageSource;
use beacon::source::errors::SourceError;
use beacon::source::extract::RecordExtractor;
use beacon::source::patterns::FieldPatterns;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Asia::Seoul;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

pub const BASE_URL: &str = "https://www.safe182.go.kr";

pub fn extractor() -> RecordExtractor {
    RecordExtractor::new(
        FieldPatterns::default().compile().unwrap(),
        Url::parse(BASE_URL).unwrap(),
        AddressResolver::new(),
    )
}

/// Calendar date `days` before `now`, as the listing prints it.
pub fn days_before(now: DateTime<Utc>, days: i64) -> String {
    (now - Duration::days(days))
        .with_timezone(&Seoul)
        .format("%Y-%m-%d")
        .to_string()
}

/// One `<li>` person block as it appears on the listing.
pub fn person_block(id: u32, name: &str, age: u32, gender: &str, date: &str, address: &str) -> String {
    format!(
        r#"<li class="mssList">
  <a href="/home/lcm/lcmMssGet.do?msspsnIdntfccd={id}"><img src="/upload/mss/{id}.jpg" alt=""></a>
  <dl>
    <dt>{name} ({age}세) {gender}</dt>
    <dd>실종일: {date}</dd>
    <dd>실종장소: {address}</dd>
  </dl>
</li>"#
    )
}

/// A listing page holding `blocks`, advertising `page_count` pages.
pub fn listing(blocks: &[String], page_count: u32) -> String {
    let paging: String = (1..=page_count)
        .map(|n| format!(r#"<a href="/home/lcm/lcmMssList.do?pageIndex={n}">{n}</a>"#))
        .collect();
    format!(
        r#"<html><body><ul class="list">{}</ul><div class="paging">{paging}</div></body></html>"#,
        blocks.join("\n")
    )
}

enum Reply {
    Html(String),
    Status(u16),
}

/// Page source answering from a script and recording each requested page.
#[derive(Default)]
pub struct ScriptedSource {
    replies: HashMap<u32, Reply>,
    latency: Option<std::time::Duration>,
    panics: bool,
    calls: Mutex<Vec<u32>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: u32, html: impl Into<String>) -> Self {
        self.replies.insert(page, Reply::Html(html.into()));
        self
    }

    pub fn failing(mut self, page: u32, status: u16) -> Self {
        self.replies.insert(page, Reply::Status(status));
        self
    }

    /// Every fetch sleeps this long first (tokio time, so it can be paused).
    pub fn with_latency(mut self, latency: std::time::Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageSource for ScriptedSource {
    async fn fetch_page(&self, page: u32) -> Result<String, SourceError> {
        self.calls.lock().unwrap().push(page);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.panics {
            panic!("scripted source panicked on page {page}");
        }
        match self.replies.get(&page) {
            Some(Reply::Html(html)) => Ok(html.clone()),
            Some(Reply::Status(status)) => Err(SourceError::Status {
                page,
                status: *status,
            }),
            None => Err(SourceError::Status { page, status: 404 }),
        }
    }
}

/// Sink recording every broadcast; reports one subscriber.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(String, Vec<MissingPerson>)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, Vec<MissingPerson>)> {
        self.events.lock().unwrap().clone()
    }
}

impl BroadcastSink for RecordingSink {
    fn broadcast(&self, event: &str, payload: &[MissingPerson]) -> usize {
        self.events
            .lock()
            .unwrap()
            .push((event.to_string(), payload.to_vec()));
        1
    }
}

/// Memory store that rejects chosen insert attempts (1-based) and counts calls.
#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    fail_on: HashSet<usize>,
    inserts: AtomicUsize,
    recents: AtomicUsize,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(attempts: &[usize]) -> Self {
        Self {
            fail_on: attempts.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn insert_calls(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn recent_calls(&self) -> usize {
        self.recents.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for FaultyStore {
    async fn insert_if_absent(
        &self,
        candidate: &CandidateRecord,
    ) -> Result<InsertOutcome, StoreError> {
        let attempt = self.inserts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on.contains(&attempt) {
            return Err(StoreError::Rejected {
                id: candidate.source_id.clone(),
                reason: format!("injected failure on attempt {attempt}"),
            });
        }
        self.inner.insert_if_absent(candidate).await
    }

    async fn recent(&self, limit: usize) -> Result<Vec<MissingPerson>, StoreError> {
        self.recents.fetch_add(1, Ordering::SeqCst);
        self.inner.recent(limit).await
    }
}
