//! Reconciliation engine
//!
//! Compares the latest weekly report against the previous one and against
//! contract volumes. The figures are pure functions of their inputs; only
//! [`reconcile_latest`] touches the database.

use cpt_common::db::{ProgressEntry, Task, WeeklyReport};
use cpt_common::time::DateRange;
use cpt_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashMap;

use crate::db::{progress, reports, tasks};

/// Completion ratio at or above which an unfinished task is on schedule
pub const ON_SCHEDULE_THRESHOLD: f64 = 0.90;

/// Progress classification of one task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    CompletedOrAhead,
    OnSchedule,
    BehindSchedule,
    NoContractData,
}

impl ProgressStatus {
    pub const ALL: [ProgressStatus; 4] = [
        ProgressStatus::CompletedOrAhead,
        ProgressStatus::OnSchedule,
        ProgressStatus::BehindSchedule,
        ProgressStatus::NoContractData,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ProgressStatus::CompletedOrAhead => "completed or ahead of schedule",
            ProgressStatus::OnSchedule => "on schedule",
            ProgressStatus::BehindSchedule => "behind schedule",
            ProgressStatus::NoContractData => "no contract data available",
        }
    }
}

/// A usable contract volume: known, finite and positive
fn usable_volume(contract_volume: Option<f64>) -> Option<f64> {
    contract_volume.filter(|v| v.is_finite() && *v > 0.0)
}

/// `cumulative / contract_volume`, or 0 when the volume is unknown or zero
pub fn completion_percentage(cumulative_work_done: f64, contract_volume: Option<f64>) -> f64 {
    match usable_volume(contract_volume) {
        Some(volume) if cumulative_work_done.is_finite() => (cumulative_work_done / volume).max(0.0),
        _ => 0.0,
    }
}

/// Classify progress; total over all inputs
pub fn classify_status(
    cumulative_work_done: f64,
    contract_volume: Option<f64>,
    completion_percentage: f64,
) -> ProgressStatus {
    let Some(volume) = usable_volume(contract_volume) else {
        return ProgressStatus::NoContractData;
    };

    if cumulative_work_done >= volume {
        ProgressStatus::CompletedOrAhead
    } else if completion_percentage >= ON_SCHEDULE_THRESHOLD {
        ProgressStatus::OnSchedule
    } else {
        ProgressStatus::BehindSchedule
    }
}

/// Week-over-week change in work done; a missing previous week counts as 0
pub fn week_delta(current_work_done: f64, previous_work_done: Option<f64>) -> f64 {
    current_work_done - previous_work_done.unwrap_or(0.0)
}

/// An ancestor group of a reconciled task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRef {
    pub id: i64,
    pub stt: String,
    pub name: String,
}

/// One leaf task compared across the latest two reports
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledRow {
    pub task_id: i64,
    pub stt: String,
    pub task_name: String,
    pub unit: Option<String>,
    /// Enclosing groups, outermost first
    pub ancestors: Vec<GroupRef>,
    /// `"top > group > task"`
    pub path: String,
    pub contract_volume: Option<f64>,
    pub work_done_this_week: f64,
    pub previous_work_done: f64,
    pub delta: f64,
    pub cumulative_work_done: f64,
    pub completion_percentage: f64,
    pub status: ProgressStatus,
    pub status_label: &'static str,
    pub notes: String,
}

/// Reconciliation of the latest report in a range
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationView {
    pub current_report: WeeklyReport,
    pub previous_report: Option<WeeklyReport>,
    pub rows: Vec<ReconciledRow>,
}

fn ancestors_of(task: &Task, by_id: &HashMap<i64, &Task>) -> Vec<GroupRef> {
    let mut chain = Vec::new();
    let mut cursor = task.parent_id;
    // Bounded by the task count so a corrupt parent cycle cannot loop forever
    while let Some(id) = cursor {
        if chain.len() > by_id.len() {
            break;
        }
        let Some(parent) = by_id.get(&id) else {
            break;
        };
        chain.push(GroupRef {
            id: parent.id,
            stt: parent.stt.clone(),
            name: parent.task_name.clone(),
        });
        cursor = parent.parent_id;
    }
    chain.reverse();
    chain
}

/// Compare `current` entries against `previous` entries and the contract
///
/// Only tasks active in the current report (work done this week or a
/// cumulative figure above zero) are returned, in contract order.
pub fn reconcile_rows(
    tasks: &[Task],
    current: &[ProgressEntry],
    previous: &[ProgressEntry],
) -> Vec<ReconciledRow> {
    let by_id: HashMap<i64, &Task> = tasks.iter().map(|t| (t.id, t)).collect();
    let previous_by_task: HashMap<i64, f64> = previous
        .iter()
        .map(|e| (e.task_id, e.work_done_this_week))
        .collect();

    let mut rows: Vec<ReconciledRow> = current
        .iter()
        .filter(|e| e.work_done_this_week > 0.0 || e.cumulative_work_done > 0.0)
        .map(|entry| {
            let task = by_id.get(&entry.task_id).copied();
            let contract_volume = task.and_then(|t| t.contract_volume);
            let previous_work_done = previous_by_task.get(&entry.task_id).copied();
            let completion = completion_percentage(entry.cumulative_work_done, contract_volume);
            let status = classify_status(entry.cumulative_work_done, contract_volume, completion);

            let (stt, task_name, unit, ancestors) = match task {
                Some(task) => (
                    task.stt.clone(),
                    task.task_name.clone(),
                    task.unit.clone(),
                    ancestors_of(task, &by_id),
                ),
                None => (String::new(), format!("Task #{}", entry.task_id), None, Vec::new()),
            };
            let path = ancestors
                .iter()
                .map(|g| g.name.as_str())
                .chain(std::iter::once(task_name.as_str()))
                .collect::<Vec<_>>()
                .join(" > ");

            ReconciledRow {
                task_id: entry.task_id,
                stt,
                task_name,
                unit,
                ancestors,
                path,
                contract_volume,
                work_done_this_week: entry.work_done_this_week,
                previous_work_done: previous_work_done.unwrap_or(0.0),
                delta: week_delta(entry.work_done_this_week, previous_work_done),
                cumulative_work_done: entry.cumulative_work_done,
                completion_percentage: completion,
                status,
                status_label: status.label(),
                notes: entry.notes.clone(),
            }
        })
        .collect();

    rows.sort_by_key(|r| r.task_id);
    rows
}

/// Reconcile the latest two reports inside `range`
///
/// All reads run in one transaction and see a single snapshot.
pub async fn reconcile_latest(pool: &SqlitePool, range: &DateRange) -> Result<ReconciliationView> {
    let mut tx = pool.begin().await?;

    let (current_report, previous_report) = reports::latest_pair(&mut tx, range)
        .await?
        .ok_or_else(|| Error::NotFound("No weekly report uploaded for this period".to_string()))?;

    let tasks = tasks::list_tasks(&mut tx).await?;
    let current = progress::entries_for_report(&mut tx, current_report.id).await?;
    let previous = match &previous_report {
        Some(report) => progress::entries_for_report(&mut tx, report.id).await?,
        None => Vec::new(),
    };
    tx.commit().await?;

    Ok(ReconciliationView {
        rows: reconcile_rows(&tasks, &current, &previous),
        current_report,
        previous_report,
    })
}
