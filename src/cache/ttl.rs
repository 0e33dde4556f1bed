//! Single-entry TTL cache in front of the APOD source
//!
//! Holds at most one entry. A read returns the entry while it is fresh;
//! otherwise it fetches, overwrites the slot and returns the new value.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use super::clock::{Clock, SystemClock};
use crate::config::LiveSettings;
use crate::data::{ApodSource, FetchOutcome};

/// The one cached APOD value and its lifetime
#[derive(Debug, Clone)]
struct CacheEntry {
    /// What the last fetch returned, success or failure
    value: FetchOutcome,
    /// When the value was stored
    cached_at: DateTime<Utc>,
    /// When the value stops being served
    expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Metadata about the current entry, without the value itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheSnapshot {
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Whether the entry holds the failure sentinel
    pub is_error: bool,
    /// Whether the entry would be refetched on the next read
    pub is_expired: bool,
}

/// Read-through cache with capacity 1
///
/// The slot lock is never held across the upstream call, so two readers that
/// both see a miss will both fetch. The later write wins; both callers get a
/// complete value.
pub struct ApodCache {
    slot: RwLock<Option<CacheEntry>>,
    source: Arc<dyn ApodSource>,
    settings: LiveSettings,
    clock: Arc<dyn Clock>,
}

impl ApodCache {
    /// Creates an empty cache using wall-clock time
    ///
    /// The TTL is read from `settings` on every store, so operator updates
    /// apply from the next fetch onward.
    pub fn new(source: Arc<dyn ApodSource>, settings: LiveSettings) -> Self {
        Self {
            slot: RwLock::new(None),
            source,
            settings,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the cached value, fetching a fresh one if the slot is empty or expired
    ///
    /// A failed fetch is cached like any other value: callers keep getting the
    /// failure until the TTL runs out or [`clear`](Self::clear) is called.
    pub async fn get(&self) -> FetchOutcome {
        let now = self.clock.now();

        if let Some(entry) = self.slot.read().await.as_ref() {
            if !entry.is_expired(now) {
                tracing::debug!(expires_at = %entry.expires_at, "APOD cache hit");
                return entry.value.clone();
            }
        }

        tracing::debug!("APOD cache miss, fetching upstream");
        let value = self.source.fetch().await;

        let ttl_secs = self.settings.cache_timeout().await;
        let cached_at = self.clock.now();
        let expires_at = expiry(cached_at, ttl_secs);

        if let Err(failure) = &value {
            tracing::warn!(
                reason = %failure.reason,
                ttl_secs,
                "caching APOD fetch failure until expiry"
            );
        }

        *self.slot.write().await = Some(CacheEntry {
            value: value.clone(),
            cached_at,
            expires_at,
        });

        value
    }

    /// Evicts the current entry so the next read fetches
    pub async fn clear(&self) {
        let evicted = self.slot.write().await.take();
        tracing::info!(had_entry = evicted.is_some(), "APOD cache cleared");
    }

    /// Describes the current entry without fetching
    pub async fn peek(&self) -> Option<CacheSnapshot> {
        let now = self.clock.now();
        self.slot.read().await.as_ref().map(|entry| CacheSnapshot {
            cached_at: entry.cached_at,
            expires_at: entry.expires_at,
            is_error: entry.value.is_err(),
            is_expired: entry.is_expired(now),
        })
    }
}

/// `from + ttl_secs`, saturating at the latest representable time
fn expiry(from: DateTime<Utc>, ttl_secs: u64) -> DateTime<Utc> {
    i64::try_from(ttl_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|ttl| from.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
