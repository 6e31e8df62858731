//! One ingestion run: fetch, extract, filter, persist, fan out.

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::data::batch::{self, UpsertCounts};
use crate::data::models::{CandidateRecord, MissingPerson};
use crate::data::store::{RecordStore, StoreError};
use crate::fanout::{BroadcastSink, NEW_RECORDS_EVENT};
use crate::ingest::fallback::{FallbackDataSource, SampleFallback};
use crate::ingest::recency::RecencyFilter;
use crate::source::client::{PAGE_PARAM, PageSource};
use crate::source::errors::SourceError;
use crate::source::extract::RecordExtractor;
use crate::source::pagination::Paginator;
use crate::utils::{fmt_duration, log_if_slow};

/// Records kept in the recent cache by default.
pub const DEFAULT_RECENT_CAPACITY: usize = 100;

const SLOW_RUN_THRESHOLD: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("upstream unavailable")]
    Upstream(#[from] SourceError),
    #[error("store unavailable")]
    Store(#[from] StoreError),
}

/// Newest-first records most recently seen by the orchestrator, shared with
/// the web layer for subscriber snapshots.
#[derive(Debug, Clone)]
pub struct RecentCache {
    records: Arc<RwLock<Vec<MissingPerson>>>,
    capacity: usize,
}

impl Default for RecentCache {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_CAPACITY)
    }
}

impl RecentCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn snapshot(&self) -> Vec<MissingPerson> {
        self.records.read().await.clone()
    }

    pub async fn replace(&self, mut records: Vec<MissingPerson>) {
        records.truncate(self.capacity);
        *self.records.write().await = records;
    }

    /// Put `fresh` (already newest first) ahead of the cached records.
    pub async fn push_front(&self, fresh: &[MissingPerson]) {
        let mut records = self.records.write().await;
        let ids: HashSet<&str> = fresh.iter().map(|r| r.id.as_str()).collect();
        let mut merged: Vec<MissingPerson> = fresh.to_vec();
        merged.extend(records.iter().filter(|r| !ids.contains(r.id.as_str())).cloned());
        merged.truncate(self.capacity);
        *records = merged;
    }
}

/// Ids already broadcast, oldest first. Holds at most `capacity` ids; the
/// oldest are forgotten first.
#[derive(Debug, Clone)]
pub struct NotifiedIds {
    ids: IndexSet<String>,
    capacity: usize,
}

impl NotifiedIds {
    pub fn new(capacity: usize) -> Self {
        Self {
            ids: IndexSet::with_capacity(capacity),
            capacity,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Record `ids` as the newest announcements, evicting the oldest beyond capacity.
    pub fn extend<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) {
        for id in ids {
            self.ids.shift_remove(id);
            self.ids.insert(id.to_owned());
        }
        let excess = self.ids.len().saturating_sub(self.capacity);
        if excess > 0 {
            self.ids.drain(..excess);
        }
    }
}

/// State owned by one orchestrator instance across runs.
#[derive(Debug)]
pub struct RunContext {
    pub recent: RecentCache,
    /// Ids already broadcast, bounded like the recent cache.
    pub notified: NotifiedIds,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(RecentCache::default())
    }
}

impl RunContext {
    pub fn new(recent: RecentCache) -> Self {
        let notified = NotifiedIds::new(recent.capacity());
        Self { recent, notified }
    }
}

/// What a completed run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Pages read, including the first.
    pub pages: u32,
    pub failed_pages: Vec<u32>,
    pub discovered_pages: u32,
    pub extracted: usize,
    pub kept: usize,
    pub counts: UpsertCounts,
    pub delivered: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(RunSummary),
    /// The run failed and sample records were broadcast instead.
    FellBack { reason: String, delivered: usize },
}

impl RunOutcome {
    pub fn fell_back(&self) -> bool {
        matches!(self, RunOutcome::FellBack { .. })
    }
}

/// Ingestion orchestrator for the primary listing source.
pub struct Poller {
    source: Arc<dyn PageSource>,
    extractor: RecordExtractor,
    paginator: Paginator,
    recency: RecencyFilter,
    store: Arc<dyn RecordStore>,
    sink: Arc<dyn BroadcastSink>,
    fallback: Arc<dyn FallbackDataSource>,
    ctx: RunContext,
}

impl Poller {
    pub fn new(
        source: Arc<dyn PageSource>,
        extractor: RecordExtractor,
        store: Arc<dyn RecordStore>,
        sink: Arc<dyn BroadcastSink>,
    ) -> Self {
        Self {
            source,
            extractor,
            paginator: Paginator::new(3, Duration::from_millis(500)),
            recency: RecencyFilter::default(),
            store,
            sink,
            fallback: Arc::new(SampleFallback::default()),
            ctx: RunContext::default(),
        }
    }

    pub fn with_paginator(mut self, paginator: Paginator) -> Self {
        self.paginator = paginator;
        self
    }

    pub fn with_recency(mut self, recency: RecencyFilter) -> Self {
        self.recency = recency;
        self
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackDataSource>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Share `recent` with other components instead of a private cache.
    pub fn with_recent_cache(mut self, recent: RecentCache) -> Self {
        self.ctx = RunContext::new(recent);
        self
    }

    pub fn recent_cache(&self) -> &RecentCache {
        &self.ctx.recent
    }

    /// Load the recent cache from the store before the first run.
    ///
    /// Seeded records count as already announced.
    pub async fn seed(&mut self) -> Result<usize, StoreError> {
        let records = self.store.recent(self.ctx.recent.capacity()).await?;
        let count = records.len();
        self.ctx
            .notified
            .extend(records.iter().map(|r| r.id.as_str()));
        self.ctx.recent.replace(records).await;
        info!(count, "Seeded recent cache from store");
        Ok(count)
    }

    pub async fn run_primary(&mut self) -> RunOutcome {
        self.run_primary_at(Utc::now()).await
    }

    /// Run once with `now` as the reference time. Never returns an error:
    /// failures end in the sample fallback.
    pub async fn run_primary_at(&mut self, now: DateTime<Utc>) -> RunOutcome {
        let started = Instant::now();

        let outcome = match self.ingest(now).await {
            Ok(summary) => {
                info!(
                    pages = summary.pages,
                    failed_pages = summary.failed_pages.len(),
                    extracted = summary.extracted,
                    kept = summary.kept,
                    saved = summary.counts.saved,
                    duplicates = summary.counts.duplicates,
                    failed = summary.counts.failed,
                    delivered = summary.delivered,
                    duration = fmt_duration(started.elapsed()),
                    "Ingestion run completed"
                );
                RunOutcome::Completed(summary)
            }
            Err(e) => {
                warn!(error = ?e, "Ingestion run failed, broadcasting sample records");
                RunOutcome::FellBack {
                    reason: e.to_string(),
                    delivered: self.emit_fallback(now),
                }
            }
        };

        log_if_slow(started, SLOW_RUN_THRESHOLD, "ingestion run");
        outcome
    }

    /// Broadcast the fallback sample. Sample records are not stored or cached.
    pub fn emit_fallback(&self, now: DateTime<Utc>) -> usize {
        let sample = self.fallback.sample(now);
        let delivered = self.sink.broadcast(NEW_RECORDS_EVENT, &sample);
        debug!(count = sample.len(), delivered, "Broadcast sample records");
        delivered
    }

    async fn ingest(&mut self, now: DateTime<Utc>) -> Result<RunSummary, IngestError> {
        let first = self.source.fetch_page(1).await?;
        if first.trim().is_empty() {
            return Err(SourceError::EmptyBody { page: 1 }.into());
        }

        let extractor = &self.extractor;
        let mut candidates = extractor.extract(&first, now);
        let harvest = self
            .paginator
            .harvest(self.source.as_ref(), &first, PAGE_PARAM, |_, html| {
                extractor.extract(html, now)
            })
            .await;
        candidates.extend(harvest.records);

        let extracted = candidates.len();
        let candidates = dedupe_by_fingerprint(candidates);
        let candidates = self.recency.apply(candidates, now);
        let kept = candidates.len();

        let counts = batch::upsert_if_absent(self.store.as_ref(), &candidates).await;
        let delivered = if counts.saved > 0 {
            self.fan_out(counts.saved).await?
        } else {
            0
        };

        Ok(RunSummary {
            pages: 1 + harvest.pages.len() as u32,
            failed_pages: harvest.failed_pages,
            discovered_pages: harvest.discovered,
            extracted,
            kept,
            counts,
            delivered,
        })
    }

    /// Broadcast the `saved` newest stored records that were not announced yet.
    async fn fan_out(&mut self, saved: usize) -> Result<usize, IngestError> {
        let fresh: Vec<MissingPerson> = self
            .store
            .recent(saved)
            .await?
            .into_iter()
            .filter(|r| !self.ctx.notified.contains(&r.id))
            .collect();
        if fresh.is_empty() {
            return Ok(0);
        }

        let delivered = self.sink.broadcast(NEW_RECORDS_EVENT, &fresh);
        self.ctx
            .notified
            .extend(fresh.iter().map(|r| r.id.as_str()));
        self.ctx.recent.push_front(&fresh).await;

        debug!(count = fresh.len(), delivered, "Broadcast new records");
        Ok(delivered)
    }
}

/// Collapse candidates sharing a fingerprint across pages, first seen wins.
fn dedupe_by_fingerprint(candidates: Vec<CandidateRecord>) -> Vec<CandidateRecord> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.fingerprint.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::models::{Category, Gender, Location, NO_FEATURES, RecordStatus, ReportSource};

    fn person(id: &str) -> MissingPerson {
        MissingPerson {
            id: id.to_string(),
            fingerprint: format!("{id}_9_female"),
            name: id.to_string(),
            age: 9,
            gender: Gender::Female,
            category: Category::MissingChild,
            missing_date: "2026-10-01".to_string(),
            address: "서울".to_string(),
            location: Location {
                lat: 37.5665,
                lng: 126.9780,
                address: "서울".to_string(),
            },
            photo_url: None,
            description: NO_FEATURES.to_string(),
            clothing: NO_FEATURES.to_string(),
            status: RecordStatus::Active,
            report_source: ReportSource::ApiIngested,
            updated_at: Utc::now(),
        }
    }

    fn ids(records: &[MissingPerson]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    // --- recent cache ---

    #[tokio::test]
    async fn test_push_front_orders_and_caps() {
        let cache = RecentCache::new(3);
        cache.replace(vec![person("b"), person("c")]).await;
        cache.push_front(&[person("a"), person("z")]).await;
        assert_eq!(ids(&cache.snapshot().await), vec!["a", "z", "b"]);
    }

    #[tokio::test]
    async fn test_push_front_replaces_existing_ids() {
        let cache = RecentCache::new(5);
        cache.replace(vec![person("a"), person("b")]).await;
        cache.push_front(&[person("b")]).await;
        assert_eq!(ids(&cache.snapshot().await), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_replace_truncates() {
        let cache = RecentCache::new(1);
        cache.replace(vec![person("a"), person("b")]).await;
        assert_eq!(ids(&cache.snapshot().await), vec!["a"]);
    }

    // --- notified ids ---

    #[test]
    fn test_notified_ids_evict_oldest() {
        let mut notified = NotifiedIds::new(3);
        notified.extend(["a", "b", "c"]);
        notified.extend(["d"]);
        assert_eq!(notified.len(), 3);
        assert!(!notified.contains("a"));
        assert!(notified.contains("b") && notified.contains("d"));
    }

    #[test]
    fn test_notified_ids_refresh_on_repeat() {
        let mut notified = NotifiedIds::new(2);
        notified.extend(["a", "b"]);
        notified.extend(["a", "c"]);
        assert!(notified.contains("a"));
        assert!(notified.contains("c"));
        assert!(!notified.contains("b"));
    }

    #[test]
    fn test_run_context_bounds_notified_by_cache_capacity() {
        let mut ctx = RunContext::new(RecentCache::new(2));
        ctx.notified.extend(["a", "b", "c", "d"]);
        assert_eq!(ctx.notified.len(), 2);
        assert!(ctx.notified.contains("c") && ctx.notified.contains("d"));
    }

    // --- run-level dedupe ---

    #[test]
    fn test_dedupe_keeps_first_of_each_fingerprint() {
        let mk = |id: &str, fp: &str| {
            let p = person(id);
            CandidateRecord {
                fingerprint: fp.to_string(),
                source_id: p.id,
                name: p.name,
                age: p.age,
                gender: p.gender,
                category: p.category,
                missing_date: p.missing_date,
                address: p.address,
                location: p.location,
                photo_url: None,
                description: p.description,
                clothing: p.clothing,
            }
        };
        let out = dedupe_by_fingerprint(vec![mk("1", "x"), mk("2", "y"), mk("3", "x")]);
        let ids: Vec<&str> = out.iter().map(|c| c.source_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }
}
