use std::sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::{DashMap, mapref::entry::Entry};

use crate::{
    clock::{Clock, IdGenerator},
    error::{AppError, AppResult},
    preview::PreviewRecord,
};

const KEY_PREFIX: &str = "preview:";
const MAX_TOKEN_ATTEMPTS: usize = 10;
const SWEEP_INTERVAL_SECS: i64 = 60;

/// Expiring key/value storage for previews.
///
/// Each operation is atomic on its own. `put_if_absent` never replaces a
/// live entry, and `delete` reports whether a live entry was removed, so of
/// two concurrent deletes exactly one sees `true`.
#[async_trait]
pub trait PreviewStore: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<String>>;
    /// Stores `value` unless `key` holds a live entry; returns whether it did.
    async fn put_if_absent(&self, key: &str, value: String, ttl: Duration) -> AppResult<bool>;
    async fn delete(&self, key: &str) -> AppResult<bool>;
}

#[derive(Debug)]
struct Slot {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Process-wide store. Expired entries read as absent immediately and are
/// evicted by a sweep that runs on insert at most once per minute.
pub struct InMemoryPreviewStore {
    entries: DashMap<String, Slot>,
    clock: Arc<dyn Clock>,
    next_sweep: AtomicI64,
}

impl InMemoryPreviewStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let next_sweep = clock.now().timestamp() + SWEEP_INTERVAL_SECS;
        Self {
            entries: DashMap::new(),
            clock,
            next_sweep: AtomicI64::new(next_sweep),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn sweep_expired(&self, now: DateTime<Utc>) {
        let due = self.next_sweep.load(Ordering::Acquire);
        if now.timestamp() < due {
            return;
        }
        // one caller wins the slot; the rest skip this round
        if self
            .next_sweep
            .compare_exchange(
                due,
                now.timestamp() + SWEEP_INTERVAL_SECS,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return;
        }

        let before = self.entries.len();
        self.entries.retain(|_, slot| slot.expires_at > now);
        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            tracing::debug!(evicted, "expired previews evicted");
        }
    }
}

#[async_trait]
impl PreviewStore for InMemoryPreviewStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let now = self.clock.now();
        let live = match self.entries.get(key) {
            Some(slot) if slot.expires_at > now => Some(slot.value.clone()),
            Some(_) => None,
            None => return Ok(None),
        };
        if live.is_none() {
            self.entries.remove_if(key, |_, slot| slot.expires_at <= now);
        }
        Ok(live)
    }

    async fn put_if_absent(&self, key: &str, value: String, ttl: Duration) -> AppResult<bool> {
        let now = self.clock.now();
        self.sweep_expired(now);

        let slot = Slot {
            value,
            expires_at: now + ttl,
        };
        let stored = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut held) if held.get().expires_at <= now => {
                held.insert(slot);
                true
            }
            Entry::Occupied(_) => false,
            Entry::Vacant(free) => {
                free.insert(slot);
                true
            }
        };
        Ok(stored)
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        let now = self.clock.now();
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, slot)| slot.expires_at > now))
    }
}

/// Typed view over a [`PreviewStore`]: key prefixing, JSON encoding and
/// token uniqueness.
#[derive(Clone)]
pub struct PreviewCache {
    store: Arc<dyn PreviewStore>,
    ttl: Duration,
}

impl PreviewCache {
    pub fn new(store: Arc<dyn PreviewStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn key(token: &str) -> String {
        format!("{KEY_PREFIX}{token}")
    }

    pub async fn get(&self, token: &str) -> AppResult<Option<PreviewRecord>> {
        let Some(raw) = self.store.get(&Self::key(token)).await? else {
            return Ok(None);
        };
        let record = serde_json::from_str(&raw)
            .map_err(|err| AppError::Internal(anyhow::anyhow!("corrupt preview entry: {err}")))?;
        Ok(Some(record))
    }

    /// Stores a new preview under its token. When a live preview already
    /// holds that token a fresh one is drawn, so an existing preview is
    /// never overwritten. Returns the record as stored.
    pub async fn publish(
        &self,
        mut record: PreviewRecord,
        ids: &dyn IdGenerator,
    ) -> AppResult<PreviewRecord> {
        for attempt in 0..MAX_TOKEN_ATTEMPTS {
            if attempt > 0 {
                record.preview_token = preview_token(record.created_at, &ids.suffix());
            }
            let raw = serde_json::to_string(&record)
                .map_err(|err| AppError::Internal(anyhow::anyhow!("preview encoding: {err}")))?;
            let key = Self::key(&record.preview_token);
            if self.store.put_if_absent(&key, raw, self.ttl).await? {
                return Ok(record);
            }
            tracing::debug!(token = %record.preview_token, "preview token collision, retrying");
        }
        Err(AppError::Internal(anyhow::anyhow!(
            "could not allocate a unique preview token"
        )))
    }

    pub async fn delete(&self, token: &str) -> AppResult<bool> {
        self.store.delete(&Self::key(token)).await
    }
}

pub fn preview_token(now: DateTime<Utc>, suffix: &str) -> String {
    format!("PV-{}-{}", now.format("%Y%m%d"), suffix)
}
