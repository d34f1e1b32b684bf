//! Per-extension chunking counters.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

/// Outcome counts for one file extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtensionCounts {
    pub processed: u64,
    pub skipped: u64,
    pub errored: u64,
}

/// Thread-safe chunking statistics.
#[derive(Debug, Default)]
pub struct ChunkerStats {
    by_extension: Mutex<BTreeMap<String, ExtensionCounts>>,
    chunks_emitted: AtomicU64,
    duplicates_dropped: AtomicU64,
}

/// Point-in-time copy of [`ChunkerStats`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub by_extension: BTreeMap<String, ExtensionCounts>,
    pub chunks_emitted: u64,
    pub duplicates_dropped: u64,
}

impl StatsSnapshot {
    pub fn files_processed(&self) -> u64 {
        self.by_extension.values().map(|c| c.processed).sum()
    }

    pub fn files_skipped(&self) -> u64 {
        self.by_extension.values().map(|c| c.skipped).sum()
    }

    pub fn files_errored(&self) -> u64 {
        self.by_extension.values().map(|c| c.errored).sum()
    }
}

impl ChunkerStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, extension: &str, apply: impl FnOnce(&mut ExtensionCounts)) {
        let mut map = self.by_extension.lock().unwrap_or_else(PoisonError::into_inner);
        apply(map.entry(extension.to_string()).or_default());
    }

    pub fn record_processed(&self, extension: &str, chunks: usize, duplicates: usize) {
        self.update(extension, |c| c.processed += 1);
        self.chunks_emitted.fetch_add(chunks as u64, Ordering::Relaxed);
        self.duplicates_dropped.fetch_add(duplicates as u64, Ordering::Relaxed);
    }

    /// A file that could not be chunked (binary or unparseable).
    pub fn record_skipped(&self, extension: &str) {
        self.update(extension, |c| c.skipped += 1);
    }

    /// A file aborted by a depth or resource limit.
    pub fn record_error(&self, extension: &str) {
        self.update(extension, |c| c.errored += 1);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            by_extension: self
                .by_extension
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            chunks_emitted: self.chunks_emitted.load(Ordering::Relaxed),
            duplicates_dropped: self.duplicates_dropped.load(Ordering::Relaxed),
        }
    }
}
