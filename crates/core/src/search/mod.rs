//! Heuristic search over spreadsheet-derived records.
//!
//! Uploads carry whatever headers the sheet had, so every search resolves
//! logical fields to concrete headers first ([`fields`]), parses mixed date
//! encodings ([`dates`]) and then applies the sparse criteria ([`filter`]).

pub mod dates;
pub mod fields;
pub mod filter;

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::record::{LooseRecord, RecordBatch};
use crate::store::StoreError;

pub use fields::{LogicalField, ResolvedColumns, UnresolvedField};
pub use filter::{Criterion, FilterOutcome, FilterSet, FilterStep, IgnoredBound};

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchDiagnostics {
    pub batches: usize,
    pub scanned: usize,
    pub steps: Vec<FilterStep>,
    pub unresolved_fields: Vec<UnresolvedField>,
    pub ignored_bounds: Vec<IgnoredBound>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub records: Vec<LooseRecord>,
    pub total_count: usize,
    pub criteria_echo: Value,
    pub executed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub diagnostics: SearchDiagnostics,
}

impl SearchResult {
    pub fn empty(criteria_echo: Value, started: Instant) -> Self {
        Self {
            records: Vec::new(),
            total_count: 0,
            criteria_echo,
            executed_at: Utc::now(),
            elapsed_ms: elapsed_ms(started),
            diagnostics: SearchDiagnostics::default(),
        }
    }

    /// Keep at most `limit` records, keeping `total_count` equal to the
    /// number of records returned.
    pub fn truncate(&mut self, limit: usize) {
        self.records.truncate(limit);
        self.total_count = self.records.len();
    }
}

/// Concatenate every batch and run the filters over the union.
///
/// Headers are resolved once from the first record; batches are never merged
/// or deduplicated.
pub fn execute(
    batches: Vec<RecordBatch>,
    filters: &FilterSet,
    criteria_echo: Value,
    started: Instant,
) -> SearchResult {
    let batch_count = batches.len();
    let records: Vec<LooseRecord> = batches.into_iter().flat_map(|batch| batch.records).collect();

    if records.is_empty() {
        let mut result = SearchResult::empty(criteria_echo, started);
        result.diagnostics.batches = batch_count;
        result.diagnostics.ignored_bounds = filters.ignored_bounds().to_vec();
        return result;
    }

    let columns = {
        let headers: Vec<&str> =
            records.first().map(|first| first.headers().collect()).unwrap_or_default();
        ResolvedColumns::resolve(&filters.fields(), &headers)
    };
    let scanned = records.len();

    let FilterOutcome { records, steps } = filters.apply(records, &columns);
    let total_count = records.len();

    SearchResult {
        records,
        total_count,
        criteria_echo,
        executed_at: Utc::now(),
        elapsed_ms: elapsed_ms(started),
        diagnostics: SearchDiagnostics {
            batches: batch_count,
            scanned,
            steps,
            unresolved_fields: columns.into_unresolved(),
            ignored_bounds: filters.ignored_bounds().to_vec(),
        },
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
