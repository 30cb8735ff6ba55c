//! Database models

use serde::{Deserialize, Serialize};

/// A node of the contract hierarchy (`project_tasks`)
///
/// Groups carry no contract volume; leaves carry unit and volume and are the
/// unit of progress tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: i64,
    pub stt: String,
    pub task_name: String,
    pub unit: Option<String>,
    pub contract_volume: Option<f64>,
    pub is_group: bool,
    pub parent_id: Option<i64>,
}

/// One reporting period (`weekly_reports`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WeeklyReport {
    pub id: i64,
    pub start_date: String,
    pub end_date: String,
}

/// One task's progress within one report (`progress_entries`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProgressEntry {
    pub report_id: i64,
    pub task_id: i64,
    pub work_done_this_week: f64,
    pub cumulative_work_done: f64,
    pub notes: String,
}
