//! Correlation cache: captured exchanges keyed by correlation id.
//!
//! Bounded by entry count (oldest insertion evicted first; reads never
//! reorder) and by age (expired entries are dropped when looked up, or in
//! bulk through [`CorrelationCache::sweep_expired`]). One mutex covers the
//! whole check-evict-insert sequence.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The request half of a captured exchange. Secret headers are redacted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CapturedRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// JSON when the body decoded, otherwise the raw text; `null` if empty.
    pub body: serde_json::Value,
}

/// The response half of a captured exchange.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CapturedResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: serde_json::Value,
}

/// One complete request/response exchange.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorrelationRecord {
    pub correlation_id: String,
    pub request: CapturedRequest,
    pub response: CapturedResponse,
    pub captured_at: DateTime<Utc>,
}

struct Entry {
    record: CorrelationRecord,
    inserted_at: Instant,
}

/// Bounded, time-expiring store of [`CorrelationRecord`]s.
pub struct CorrelationCache {
    entries: Mutex<LruCache<String, Entry>>,
    ttl: Duration,
}

impl std::fmt::Debug for CorrelationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.lock();
        f.debug_struct("CorrelationCache")
            .field("len", &entries.len())
            .field("capacity", &entries.cap())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl CorrelationCache {
    /// A cache holding at most `capacity` records (minimum 1) for `ttl` each.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        CorrelationCache {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of stored records, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Store `record`, replacing any record with the same id.
    ///
    /// At capacity, the oldest-inserted record is evicted first.
    pub fn insert(&self, record: CorrelationRecord) {
        self.insert_at(record, Instant::now());
    }

    /// The full record for `correlation_id`, unless absent or expired.
    pub fn record(&self, correlation_id: &str) -> Option<CorrelationRecord> {
        self.record_at(correlation_id, Instant::now())
    }

    /// Request and response for `correlation_id`, or `(None, None)`.
    pub fn get(&self, correlation_id: &str) -> (Option<CapturedRequest>, Option<CapturedResponse>) {
        match self.record(correlation_id) {
            Some(record) => (Some(record.request), Some(record.response)),
            None => (None, None),
        }
    }

    /// Remove every expired record. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now())
    }

    /// Remove everything.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub(crate) fn insert_at(&self, record: CorrelationRecord, now: Instant) {
        let mut entries = self.lock();
        let key = record.correlation_id.clone();

        // `push` would move an existing key to the back anyway; popping first
        // keeps replacement from evicting an unrelated record.
        entries.pop(&key);
        if let Some((evicted, _)) = entries.push(
            key,
            Entry {
                record,
                inserted_at: now,
            },
        ) {
            debug!(correlation_id = %evicted, "Evicted oldest captured exchange");
        }
    }

    pub(crate) fn record_at(&self, correlation_id: &str, now: Instant) -> Option<CorrelationRecord> {
        let mut entries = self.lock();
        let expired = match entries.peek(correlation_id) {
            None => return None,
            Some(entry) => self.is_expired(entry, now),
        };
        if expired {
            entries.pop(correlation_id);
            debug!(correlation_id = %correlation_id, "Captured exchange expired");
            return None;
        }
        entries.peek(correlation_id).map(|entry| entry.record.clone())
    }

    pub(crate) fn sweep_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.lock();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        if !expired.is_empty() {
            debug!(removed = expired.len(), "Swept expired captured exchanges");
        }
        expired.len()
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        now.saturating_duration_since(entry.inserted_at) >= self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
