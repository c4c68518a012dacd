//! Snapshot cache rows: one row per (user, company, cache key), JSON
//! payload, absolute expiry. Reads filter on expiry; writes overwrite.

use crate::DbPool;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, FromRow, Clone)]
pub struct CacheRow {
    pub user_id: String,
    pub company_id: String,
    pub cache_key: String,
    pub cache_data: Value,
    pub cached_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

/// Fetch a live cache row. An expired row is a miss; it stays in place
/// until the next write or the opportunistic sweep removes it.
pub async fn get_cache_entry(
    pool: &DbPool,
    user_id: &str,
    company_id: &str,
    cache_key: &str,
) -> Result<Option<CacheRow>, sqlx::Error> {
    sqlx::query_as::<_, CacheRow>(
        r#"
        SELECT user_id, company_id, cache_key, cache_data, cached_at, expires_at
        FROM api_cache
        WHERE user_id = ? AND company_id = ? AND cache_key = ? AND expires_at > NOW(3)
        "#,
    )
    .bind(user_id)
    .bind(company_id)
    .bind(cache_key)
    .fetch_optional(pool)
    .await
}

/// Write a cache row, replacing any previous payload under the same key.
pub async fn upsert_cache_entry(
    pool: &DbPool,
    user_id: &str,
    company_id: &str,
    cache_key: &str,
    cache_data: &Value,
    expires_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO api_cache (id, user_id, company_id, cache_key, cache_data, cached_at, expires_at)
        VALUES (?, ?, ?, ?, ?, NOW(3), ?)
        ON DUPLICATE KEY UPDATE
          cache_data = VALUES(cache_data),
          cached_at = VALUES(cached_at),
          expires_at = VALUES(expires_at)
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(company_id)
    .bind(cache_key)
    .bind(cache_data)
    .bind(expires_at.naive_utc())
    .execute(pool)
    .await?;
    Ok(())
}

/// Drop one cache row (forced refresh / immediate expiry).
pub async fn delete_cache_entry(
    pool: &DbPool,
    user_id: &str,
    company_id: &str,
    cache_key: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM api_cache WHERE user_id = ? AND company_id = ? AND cache_key = ?")
        .bind(user_id)
        .bind(company_id)
        .bind(cache_key)
        .execute(pool)
        .await?;
    Ok(())
}

/// Sweep rows past expiry. Lazy expiry makes this optional; the refresh
/// job runs it to keep the table from growing unbounded.
pub async fn clean_expired_cache(pool: &DbPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM api_cache WHERE expires_at <= NOW(3)")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
