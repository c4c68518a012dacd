//! The pipeline's inbound surface: one endpoint returning the aggregated
//! snapshot, the per-source error manifest, and freshly derived metrics.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::session::CurrentUser;
use crate::state::AppState;
use domain::{DashboardReport, DateRange, Snapshot};

pub fn router(_state: AppState) -> Router<AppState> {
    Router::new().route("/dashboard/unified", post(get_unified))
}

#[derive(Debug, Deserialize)]
struct UnifiedRequest {
    #[serde(default)]
    date_range: DateRange,
    #[serde(default)]
    force_refresh: bool,
}

#[derive(Debug, Serialize)]
struct UnifiedResponse {
    snapshot: Snapshot,
    report: DashboardReport,
    from_cache: bool,
}

/// Always answers 200 with a snapshot; degraded sources show up in the
/// snapshot's error manifest, and the presentation layer decides how to
/// render them.
async fn get_unified(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<UnifiedRequest>,
) -> Json<UnifiedResponse> {
    let result = state
        .orchestrator
        .aggregated_snapshot(&user.0, req.date_range, req.force_refresh)
        .await;
    Json(UnifiedResponse {
        snapshot: result.snapshot,
        report: result.report,
        from_cache: result.from_cache,
    })
}
