//! Per-report task progress persistence (`progress_entries`)

use cpt_common::db::ProgressEntry;
use cpt_common::Result;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};

/// Insert or overwrite the entry for (report, task)
pub async fn upsert_entry(conn: &mut SqliteConnection, entry: &ProgressEntry) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO progress_entries (
            report_id, task_id, work_done_this_week, cumulative_work_done, notes
        ) VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(report_id, task_id) DO UPDATE SET
            work_done_this_week = excluded.work_done_this_week,
            cumulative_work_done = excluded.cumulative_work_done,
            notes = excluded.notes,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(entry.report_id)
    .bind(entry.task_id)
    .bind(entry.work_done_this_week)
    .bind(entry.cumulative_work_done)
    .bind(&entry.notes)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn entries_for_report(
    conn: &mut SqliteConnection,
    report_id: i64,
) -> Result<Vec<ProgressEntry>> {
    let entries = sqlx::query_as::<_, ProgressEntry>(
        r#"
        SELECT report_id, task_id, work_done_this_week, cumulative_work_done, notes
        FROM progress_entries
        WHERE report_id = ?
        ORDER BY task_id
        "#,
    )
    .bind(report_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(entries)
}

/// A progress entry joined with its task, for report listings
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ReportLine {
    pub task_id: i64,
    pub stt: String,
    pub task_name: String,
    pub unit: Option<String>,
    pub contract_volume: Option<f64>,
    pub work_done_this_week: f64,
    pub cumulative_work_done: f64,
    pub notes: String,
}

pub async fn report_lines(conn: &mut SqliteConnection, report_id: i64) -> Result<Vec<ReportLine>> {
    let lines = sqlx::query_as::<_, ReportLine>(
        r#"
        SELECT t.id AS task_id, t.stt, t.task_name, t.unit, t.contract_volume,
               p.work_done_this_week, p.cumulative_work_done, p.notes
        FROM progress_entries p
        JOIN project_tasks t ON t.id = p.task_id
        WHERE p.report_id = ?
        ORDER BY t.id
        "#,
    )
    .bind(report_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(lines)
}

pub async fn count_entries(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM progress_entries")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
