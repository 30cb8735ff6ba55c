//! Reporting period persistence (`weekly_reports`)

use cpt_common::db::WeeklyReport;
use cpt_common::time::{DateRange, ReportPeriod};
use cpt_common::Result;
use sqlx::{SqliteConnection, SqlitePool};

/// Insert the report for `period`, or touch the existing one; returns its id
pub async fn upsert_report(conn: &mut SqliteConnection, period: &ReportPeriod) -> Result<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO weekly_reports (start_date, end_date)
        VALUES (?, ?)
        ON CONFLICT(start_date, end_date) DO UPDATE SET
            updated_at = CURRENT_TIMESTAMP
        RETURNING id
        "#,
    )
    .bind(period.start_key())
    .bind(period.end_key())
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

/// Check whether a report for exactly this period was already uploaded
pub async fn report_exists(pool: &SqlitePool, period: &ReportPeriod) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM weekly_reports WHERE start_date = ? AND end_date = ?",
    )
    .bind(period.start_key())
    .bind(period.end_key())
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

/// Reports inside `range`, newest first
///
/// Ordered by end date, then by id so two reports ending on the same day
/// still have a stable order. `limit` of None returns all.
pub async fn list_reports(
    conn: &mut SqliteConnection,
    range: &DateRange,
    limit: Option<i64>,
) -> Result<Vec<WeeklyReport>> {
    let from = range.from_key();
    let to = range.to_key();

    let reports = sqlx::query_as::<_, WeeklyReport>(
        r#"
        SELECT id, start_date, end_date
        FROM weekly_reports
        WHERE (? IS NULL OR start_date >= ?)
          AND (? IS NULL OR end_date <= ?)
        ORDER BY end_date DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(&from)
    .bind(&from)
    .bind(&to)
    .bind(&to)
    .bind(limit.unwrap_or(-1))
    .fetch_all(&mut *conn)
    .await?;

    Ok(reports)
}

/// The latest two reports inside `range`: (current, previous)
pub async fn latest_pair(
    conn: &mut SqliteConnection,
    range: &DateRange,
) -> Result<Option<(WeeklyReport, Option<WeeklyReport>)>> {
    let mut reports = list_reports(conn, range, Some(2)).await?.into_iter();
    Ok(reports.next().map(|current| (current, reports.next())))
}
