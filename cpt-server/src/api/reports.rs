//! Read-only task and report queries

use axum::{
    extract::{Query, State},
    Json,
};
use cpt_common::db::{Task, WeeklyReport};
use cpt_common::time::{DateRange, ReportPeriod};
use cpt_common::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::db::progress::{self, ReportLine};
use crate::db::{reports, tasks};
use crate::error::ApiResult;
use crate::AppState;

/// Optional `from` / `to` query parameters
#[derive(Debug, Default, Deserialize)]
pub struct RangeParams {
    #[serde(alias = "fromDate")]
    pub from: Option<String>,
    #[serde(alias = "toDate")]
    pub to: Option<String>,
}

impl RangeParams {
    pub fn range(&self) -> Result<DateRange> {
        DateRange::from_params(self.from.as_deref(), self.to.as_deref())
    }
}

/// GET /api/tasks
pub async fn list_tasks(State(state): State<AppState>) -> ApiResult<Json<Vec<Task>>> {
    let mut conn = state.db.acquire().await.map_err(Error::from)?;
    Ok(Json(tasks::list_tasks(&mut conn).await?))
}

/// GET /api/reports?from&to
pub async fn list_reports(
    State(state): State<AppState>,
    Query(params): Query<RangeParams>,
) -> ApiResult<Json<Vec<WeeklyReport>>> {
    let range = params.range()?;
    let mut conn = state.db.acquire().await.map_err(Error::from)?;
    Ok(Json(reports::list_reports(&mut conn, &range, None).await?))
}

#[derive(Debug, Deserialize)]
pub struct PeriodParams {
    #[serde(alias = "startDate", alias = "fromDate")]
    pub start_date: Option<String>,
    #[serde(alias = "endDate", alias = "toDate")]
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExistsResponse {
    pub duplicated: bool,
}

/// GET /api/reports/exists?start_date&end_date
///
/// Lets the upload form warn before a report period is overwritten.
pub async fn report_exists(
    State(state): State<AppState>,
    Query(params): Query<PeriodParams>,
) -> ApiResult<Json<ExistsResponse>> {
    let period =
        ReportPeriod::from_fields(params.start_date.as_deref(), params.end_date.as_deref())?;
    let duplicated = reports::report_exists(&state.db, &period).await?;
    Ok(Json(ExistsResponse { duplicated }))
}

#[derive(Debug, Serialize)]
pub struct LatestReportResponse {
    pub report: WeeklyReport,
    pub lines: Vec<ReportLine>,
}

/// GET /api/reports/latest
pub async fn latest_report(
    State(state): State<AppState>,
) -> ApiResult<Json<LatestReportResponse>> {
    let mut tx = state.db.begin().await.map_err(Error::from)?;
    let report = reports::list_reports(&mut tx, &DateRange::default(), Some(1))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::NotFound("No weekly report has been uploaded".to_string()))?;

    let lines = progress::report_lines(&mut tx, report.id).await?;
    tx.commit().await.map_err(Error::from)?;
    Ok(Json(LatestReportResponse { report, lines }))
}
