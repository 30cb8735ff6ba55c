//! Weekly report loader
//!
//! Records one reporting period and the progress of every contract task
//! named in the weekly workbook. Rows are matched to contract leaves by exact
//! name; rows naming an unknown task are logged and dropped so one stray line
//! never aborts an upload.

use cpt_common::config::WeeklyLayout;
use cpt_common::db::ProgressEntry;
use cpt_common::time::ReportPeriod;
use cpt_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use super::hierarchy::{classify, Numbering, RowKind};
use super::spreadsheet::{project_columns, Cell, Record};
use super::workbook::decode_sheet;
use crate::db::{progress, reports, tasks};

/// One task line of a weekly report
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyLine {
    pub source_row: usize,
    pub task_name: String,
    pub work_done_this_week: f64,
    pub cumulative_work_done: f64,
    pub notes: String,
}

/// Outcome of a weekly report load
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklySummary {
    pub report_id: i64,
    pub start_date: String,
    pub end_date: String,
    pub matched: usize,
    /// Task names with no matching contract task
    pub unmatched: Vec<String>,
}

/// Extract task lines from raw weekly sheet rows
///
/// Group rows that slipped into the sheet body are excluded with the same
/// classification used for contracts. Blank figures read as zero.
pub fn parse_weekly(rows: &[Vec<Cell>], layout: &WeeklyLayout) -> Result<Vec<WeeklyLine>> {
    let labels = [
        layout.stt.as_str(),
        layout.name.as_str(),
        layout.unit.as_str(),
        layout.work_done_this_week.as_str(),
        layout.cumulative_work_done.as_str(),
        layout.notes.as_str(),
    ];
    let table = project_columns(rows, &layout.header_marker, &labels)?;

    let has_figures = |record: &Record<'_>| {
        record.quantity(&layout.work_done_this_week).is_some()
            || record.quantity(&layout.cumulative_work_done).is_some()
    };

    let samples: Vec<(String, bool)> = table
        .records()
        .map(|r| (r.text(&layout.stt), has_figures(&r)))
        .collect();
    let numbering = Numbering::detect(samples.iter().map(|(s, f)| (s.as_str(), *f)));
    debug!(?numbering, rows = table.row_count(), "Detected report numbering");

    let lines = table
        .records()
        .filter_map(|record| {
            let row = classify(
                &record.text(&layout.stt),
                &record.text(&layout.name),
                has_figures(&record),
                numbering,
            );
            (row.kind == RowKind::Leaf).then(|| WeeklyLine {
                source_row: record.source_row(),
                task_name: row.name,
                work_done_this_week: record.quantity(&layout.work_done_this_week).unwrap_or(0.0),
                cumulative_work_done: record
                    .quantity(&layout.cumulative_work_done)
                    .unwrap_or(0.0),
                notes: record.text(&layout.notes),
            })
        })
        .collect();

    Ok(lines)
}

/// Upsert the report for `period` and its matched entries in one transaction
pub async fn store_weekly(
    pool: &SqlitePool,
    period: &ReportPeriod,
    lines: &[WeeklyLine],
) -> Result<WeeklySummary> {
    let mut tx = pool.begin().await?;

    let report_id = reports::upsert_report(&mut tx, period).await?;

    let mut matched = 0;
    let mut unmatched = Vec::new();
    for line in lines {
        let Some(task_id) = tasks::find_leaf_by_name(&mut tx, &line.task_name).await? else {
            warn!(
                task_name = %line.task_name,
                row = line.source_row,
                "No contract task matches report row; row dropped"
            );
            unmatched.push(line.task_name.clone());
            continue;
        };

        progress::upsert_entry(
            &mut tx,
            &ProgressEntry {
                report_id,
                task_id,
                work_done_this_week: line.work_done_this_week,
                cumulative_work_done: line.cumulative_work_done,
                notes: line.notes.clone(),
            },
        )
        .await?;
        matched += 1;
    }

    tx.commit().await?;

    Ok(WeeklySummary {
        report_id,
        start_date: period.start_key(),
        end_date: period.end_key(),
        matched,
        unmatched,
    })
}

/// Validate the period, then decode, parse and store a weekly workbook
///
/// The period comes from the caller and is checked before the file is read.
pub async fn import_weekly(
    pool: &SqlitePool,
    bytes: Vec<u8>,
    layout: &WeeklyLayout,
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Result<WeeklySummary> {
    let period = ReportPeriod::from_fields(start_date, end_date)?;

    let rows = decode_sheet(bytes, layout.sheet.clone(), layout.sheet_match).await?;
    let lines = parse_weekly(&rows, layout)?;
    let summary = store_weekly(pool, &period, &lines).await?;

    info!(
        report_id = summary.report_id,
        start_date = %summary.start_date,
        end_date = %summary.end_date,
        matched = summary.matched,
        unmatched = summary.unmatched.len(),
        "Weekly report stored"
    );

    Ok(summary)
}
