//! Dashboard grouping
//!
//! Read-side only: nests reconciled rows under their ancestor groups and
//! totals each group.

use cpt_common::db::WeeklyReport;
use serde::Serialize;

use super::reconciliation::{GroupRef, ProgressStatus, ReconciledRow, ReconciliationView};

/// Number of tasks per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub completed_or_ahead: usize,
    pub on_schedule: usize,
    pub behind_schedule: usize,
    pub no_contract_data: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: ProgressStatus) {
        match status {
            ProgressStatus::CompletedOrAhead => self.completed_or_ahead += 1,
            ProgressStatus::OnSchedule => self.on_schedule += 1,
            ProgressStatus::BehindSchedule => self.behind_schedule += 1,
            ProgressStatus::NoContractData => self.no_contract_data += 1,
        }
    }
}

/// Totals over every task beneath a group
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupSummary {
    pub task_count: usize,
    pub statuses: StatusCounts,
    pub work_done_this_week: f64,
    pub cumulative_work_done: f64,
}

impl GroupSummary {
    fn add(&mut self, row: &ReconciledRow) {
        self.task_count += 1;
        self.statuses.add(row.status);
        self.work_done_this_week += row.work_done_this_week;
        self.cumulative_work_done += row.cumulative_work_done;
    }
}

/// One group with its nested groups and direct tasks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSection {
    pub id: i64,
    pub stt: String,
    pub name: String,
    pub summary: GroupSummary,
    pub groups: Vec<GroupSection>,
    pub tasks: Vec<ReconciledRow>,
}

impl GroupSection {
    fn new(group: &GroupRef) -> Self {
        Self {
            id: group.id,
            stt: group.stt.clone(),
            name: group.name.clone(),
            summary: GroupSummary::default(),
            groups: Vec::new(),
            tasks: Vec::new(),
        }
    }
}

/// The grouped dashboard for one reconciliation
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub current_report: WeeklyReport,
    pub previous_report: Option<WeeklyReport>,
    pub summary: GroupSummary,
    pub groups: Vec<GroupSection>,
    /// Tasks that sit directly under no group
    pub ungrouped: Vec<ReconciledRow>,
}

/// Nest rows under their ancestors, keeping first-seen order
pub fn group_rows(rows: Vec<ReconciledRow>) -> (Vec<GroupSection>, Vec<ReconciledRow>) {
    let mut sections: Vec<GroupSection> = Vec::new();
    let mut ungrouped = Vec::new();

    for row in rows {
        if row.ancestors.is_empty() {
            ungrouped.push(row);
        } else {
            let ancestors = row.ancestors.clone();
            insert(&mut sections, &ancestors, row);
        }
    }

    (sections, ungrouped)
}

fn insert(sections: &mut Vec<GroupSection>, ancestors: &[GroupRef], row: ReconciledRow) {
    let Some((group, rest)) = ancestors.split_first() else {
        return;
    };

    let index = match sections.iter().position(|s| s.id == group.id) {
        Some(index) => index,
        None => {
            sections.push(GroupSection::new(group));
            sections.len() - 1
        }
    };

    let section = &mut sections[index];
    section.summary.add(&row);
    if rest.is_empty() {
        section.tasks.push(row);
    } else {
        insert(&mut section.groups, rest, row);
    }
}

/// Build the grouped dashboard from a reconciliation
pub fn build_dashboard(view: ReconciliationView) -> DashboardView {
    let mut summary = GroupSummary::default();
    for row in &view.rows {
        summary.add(row);
    }

    let (groups, ungrouped) = group_rows(view.rows);

    DashboardView {
        current_report: view.current_report,
        previous_report: view.previous_report,
        summary,
        groups,
        ungrouped,
    }
}
