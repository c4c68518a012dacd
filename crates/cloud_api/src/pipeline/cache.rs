//! Snapshot cache: keyed by (identity, date range), absolute 10-minute
//! expiry, lazy eviction, unconditional overwrite. Reads mid-write see the
//! old or new value, never a torn one.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use db::DbPool;
use domain::{DateRange, Identity, Snapshot};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// How long a stored snapshot stays servable.
pub const SNAPSHOT_TTL_SECS: i64 = 10 * 60;

#[async_trait]
pub trait SnapshotCache: Send + Sync {
    /// A hit only while `now < expires_at`; expired entries are misses.
    async fn get(&self, identity: &Identity, range: DateRange) -> Option<Snapshot>;

    /// Overwrite unconditionally and restart the TTL. Best-effort: a
    /// failed write is logged, never surfaced — the caller already holds
    /// the snapshot.
    async fn put(&self, identity: &Identity, range: DateRange, snapshot: &Snapshot);

    /// Immediate expiry of one entry (forced refresh).
    async fn invalidate(&self, identity: &Identity, range: DateRange);
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MemoryKey {
    identity: Identity,
    cache_key: String,
}

impl MemoryKey {
    fn new(identity: &Identity, range: DateRange) -> Self {
        Self {
            identity: identity.clone(),
            cache_key: range.cache_key(),
        }
    }
}

struct MemoryEntry {
    snapshot: Snapshot,
    expires_at: DateTime<Utc>,
}

/// In-process cache. Default for DB-less deployments and the test suite.
pub struct MemoryCache {
    ttl: Duration,
    entries: RwLock<HashMap<MemoryKey, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(SNAPSHOT_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotCache for MemoryCache {
    async fn get(&self, identity: &Identity, range: DateRange) -> Option<Snapshot> {
        let entries = self.entries.read().await;
        let entry = entries.get(&MemoryKey::new(identity, range))?;
        // Lazy expiry: stale entries sit until overwritten.
        if Utc::now() < entry.expires_at {
            Some(entry.snapshot.clone())
        } else {
            None
        }
    }

    async fn put(&self, identity: &Identity, range: DateRange, snapshot: &Snapshot) {
        let entry = MemoryEntry {
            snapshot: snapshot.clone(),
            expires_at: Utc::now() + self.ttl,
        };
        self.entries
            .write()
            .await
            .insert(MemoryKey::new(identity, range), entry);
    }

    async fn invalidate(&self, identity: &Identity, range: DateRange) {
        self.entries
            .write()
            .await
            .remove(&MemoryKey::new(identity, range));
    }
}

/// DB-backed cache over the `api_cache` table, shared across instances and
/// between the interactive path and the refresh job.
pub struct DbCache {
    pool: DbPool,
}

impl DbCache {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn company_scope(identity: &Identity) -> &str {
    identity.company_id.as_deref().unwrap_or("")
}

#[async_trait]
impl SnapshotCache for DbCache {
    async fn get(&self, identity: &Identity, range: DateRange) -> Option<Snapshot> {
        let row = match db::get_cache_entry(
            &self.pool,
            &identity.user_id,
            company_scope(identity),
            &range.cache_key(),
        )
        .await
        {
            Ok(row) => row?,
            Err(e) => {
                tracing::warn!("cache read failed for {}: {e}", identity.user_id);
                return None;
            }
        };
        match serde_json::from_value::<Snapshot>(row.cache_data) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                // A corrupt payload is just a miss; the next put replaces it.
                tracing::warn!("discarding unreadable cache row for {}: {e}", identity.user_id);
                None
            }
        }
    }

    async fn put(&self, identity: &Identity, range: DateRange, snapshot: &Snapshot) {
        let payload = match serde_json::to_value(snapshot) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("snapshot serialization failed: {e}");
                return;
            }
        };
        let expires_at = Utc::now() + Duration::seconds(SNAPSHOT_TTL_SECS);
        if let Err(e) = db::upsert_cache_entry(
            &self.pool,
            &identity.user_id,
            company_scope(identity),
            &range.cache_key(),
            &payload,
            expires_at,
        )
        .await
        {
            tracing::warn!("cache write failed for {}: {e}", identity.user_id);
        }
    }

    async fn invalidate(&self, identity: &Identity, range: DateRange) {
        if let Err(e) = db::delete_cache_entry(
            &self.pool,
            &identity.user_id,
            company_scope(identity),
            &range.cache_key(),
        )
        .await
        {
            tracing::warn!("cache invalidate failed for {}: {e}", identity.user_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(range: DateRange) -> Snapshot {
        Snapshot::empty(range, Utc::now())
    }

    #[tokio::test]
    async fn hit_within_ttl_miss_for_other_keys() {
        let cache = MemoryCache::new();
        let identity = Identity::user("u1");
        cache
            .put(&identity, DateRange::Days(30), &snapshot(DateRange::Days(30)))
            .await;

        assert!(cache.get(&identity, DateRange::Days(30)).await.is_some());
        // Same user, different range: a different key entirely.
        assert!(cache.get(&identity, DateRange::Days(7)).await.is_none());
        // Same range, different identity.
        assert!(cache
            .get(&Identity::user("u2"), DateRange::Days(30))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let cache = MemoryCache::with_ttl(Duration::seconds(-1));
        let identity = Identity::user("u1");
        cache
            .put(&identity, DateRange::Days(30), &snapshot(DateRange::Days(30)))
            .await;
        assert!(cache.get(&identity, DateRange::Days(30)).await.is_none());
    }

    #[tokio::test]
    async fn invalidate_forces_a_miss() {
        let cache = MemoryCache::new();
        let identity = Identity::user("u1");
        cache
            .put(&identity, DateRange::Today, &snapshot(DateRange::Today))
            .await;
        cache.invalidate(&identity, DateRange::Today).await;
        assert!(cache.get(&identity, DateRange::Today).await.is_none());
    }

    #[tokio::test]
    async fn put_overwrites_last_write_wins() {
        let cache = MemoryCache::new();
        let identity = Identity::user("u1");
        let first = snapshot(DateRange::Days(30));
        cache.put(&identity, DateRange::Days(30), &first).await;

        let mut second = snapshot(DateRange::Days(30));
        second
            .source_errors
            .set(domain::SourceKind::Ads, "down".to_string());
        cache.put(&identity, DateRange::Days(30), &second).await;

        let stored = cache.get(&identity, DateRange::Days(30)).await.unwrap();
        assert_eq!(stored.source_errors.ads.as_deref(), Some("down"));
    }
}
