//! Reconciliation and dashboard views

use axum::{
    extract::{Query, State},
    Json,
};
use tracing::debug;

use super::reports::RangeParams;
use crate::error::ApiResult;
use crate::services::presentation::{build_dashboard, DashboardView};
use crate::services::reconciliation::{reconcile_latest, ReconciliationView};
use crate::AppState;

/// GET /api/reconciliation?from&to
///
/// Flat reconciled rows of the latest report in range.
pub async fn get_reconciliation(
    State(state): State<AppState>,
    Query(params): Query<RangeParams>,
) -> ApiResult<Json<ReconciliationView>> {
    let range = params.range()?;
    let view = reconcile_latest(&state.db, &range).await?;
    debug!(rows = view.rows.len(), "Reconciliation served");
    Ok(Json(view))
}

/// GET /api/dashboard?from&to
pub async fn get_dashboard(
    State(state): State<AppState>,
    Query(params): Query<RangeParams>,
) -> ApiResult<Json<DashboardView>> {
    let range = params.range()?;
    let view = reconcile_latest(&state.db, &range).await?;
    Ok(Json(build_dashboard(view)))
}
