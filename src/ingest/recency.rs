//! Recency filtering and newest-first ordering of extracted candidates.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::data::models::CandidateRecord;
use crate::source::dates::parse_missing_date;

pub const DEFAULT_RECENCY_DAYS: i64 = 90;

#[derive(Debug, Clone, Copy)]
pub struct RecencyFilter {
    max_age: Duration,
}

impl Default for RecencyFilter {
    fn default() -> Self {
        Self::new(Duration::days(DEFAULT_RECENCY_DAYS))
    }
}

impl RecencyFilter {
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }

    pub fn from_days(days: u32) -> Self {
        Self::new(Duration::days(i64::from(days)))
    }

    /// Drop candidates that went missing before `now - max_age`, then order
    /// the rest newest first.
    ///
    /// A candidate whose date cannot be parsed is kept, and keeps its
    /// position: only the candidates with parseable dates are reordered,
    /// among the positions they already occupied.
    pub fn apply(&self, candidates: Vec<CandidateRecord>, now: DateTime<Utc>) -> Vec<CandidateRecord> {
        let cutoff = now - self.max_age;
        let before = candidates.len();

        let kept: Vec<(Option<DateTime<Utc>>, CandidateRecord)> = candidates
            .into_iter()
            .map(|c| (parse_missing_date(&c.missing_date), c))
            .filter(|(date, _)| date.is_none_or(|d| d >= cutoff))
            .collect();

        debug!(
            before,
            after = kept.len(),
            cutoff = %cutoff,
            "Applied recency filter"
        );

        newest_first(kept)
    }
}

/// Stable newest-first sort of the dated entries. Undated entries stay in their slots.
fn newest_first<T>(items: Vec<(Option<DateTime<Utc>>, T)>) -> Vec<T> {
    let layout: Vec<bool> = items.iter().map(|(date, _)| date.is_some()).collect();

    let mut dated = Vec::new();
    let mut undated = Vec::new();
    for (date, item) in items {
        match date {
            Some(date) => dated.push((date, item)),
            None => undated.push(item),
        }
    }
    dated.sort_by(|a, b| b.0.cmp(&a.0));

    let mut dated = dated.into_iter().map(|(_, item)| item);
    let mut undated = undated.into_iter();
    layout
        .into_iter()
        .filter_map(|is_dated| if is_dated { dated.next() } else { undated.next() })
        .collect()
}
