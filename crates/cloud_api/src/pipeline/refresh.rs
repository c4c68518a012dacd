//! Background refresh job: pre-warms the snapshot cache for every
//! configured identity so interactive reads rarely miss. The 10-minute TTL
//! is renewed every 5 minutes.

use db::DbPool;
use domain::{DateRange, Identity};
use std::sync::Arc;
use std::time::Duration;

use super::orchestrator::Orchestrator;

pub const REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Identities processed per cycle, to bound a cycle's runtime.
pub const REFRESH_BATCH_LIMIT: i64 = 100;

/// Spawn the refresh loop. Runs until the process exits; the first cycle
/// fires immediately to warm the cache on startup.
pub fn spawn_refresh_job(pool: DbPool, orchestrator: Arc<Orchestrator>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(REFRESH_INTERVAL);
        loop {
            ticker.tick().await;
            run_refresh_cycle(&pool, &orchestrator).await;
        }
    })
}

/// One refresh pass: sweep expired cache rows, then force-refresh the
/// standard ranges for a bounded batch of identities. Per-identity
/// failures are logged and never abort the batch.
pub async fn run_refresh_cycle(pool: &DbPool, orchestrator: &Orchestrator) {
    match db::clean_expired_cache(pool).await {
        Ok(0) => {}
        Ok(swept) => tracing::debug!("swept {swept} expired cache rows"),
        Err(e) => tracing::warn!("expired-cache sweep failed: {e}"),
    }

    let identities = match db::list_configured_identities(pool, REFRESH_BATCH_LIMIT).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!("could not list identities for refresh: {e}");
            return;
        }
    };
    tracing::info!("refreshing snapshots for {} identities", identities.len());

    for (user_id, company_id) in identities {
        let identity = Identity {
            user_id,
            company_id: (!company_id.is_empty()).then_some(company_id),
        };
        for range in DateRange::REFRESH_RANGES {
            let result = orchestrator
                .aggregated_snapshot(&identity, range, true)
                .await;
            for (source, message) in result.snapshot.source_errors.iter() {
                tracing::warn!(
                    "refresh {} range {range}: {source} degraded: {message}",
                    identity.user_id
                );
            }
        }
    }
}
