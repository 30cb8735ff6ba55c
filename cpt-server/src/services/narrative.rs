//! Narrative prompt composition
//!
//! Turns reconciled rows (or rows supplied by the caller) into the text
//! summary the completion service analyses.

use cpt_common::time::DateRange;
use cpt_common::Result;
use serde_json::Value;
use sqlx::SqlitePool;

use super::completion::Prompt;
use super::reconciliation::{reconcile_latest, ReconciledRow};

/// Returned instead of a narrative when there is nothing to analyse
pub const NO_ACTIVITY_MESSAGE: &str =
    "No significant activity in the latest weekly report to analyse.";

const SYSTEM_PROMPT: &str = "You are a senior project management assistant for a construction \
project. You analyse progress in depth based on measured work volumes.";

/// Where the summary text comes from
#[derive(Debug, Clone)]
pub enum SummarySource {
    /// Already aggregated by the caller
    Text(String),
    /// Raw rows supplied by the caller
    Rows(Vec<Value>),
    /// Stored reconciliation of the latest report in a range
    Stored(DateRange),
}

/// One summary line per reconciled task
pub fn summarize_reconciliation(rows: &[ReconciledRow]) -> String {
    rows.iter()
        .map(|row| {
            let unit = row.unit.as_deref().unwrap_or("");
            let contract = match row.contract_volume {
                Some(volume) => format!(
                    "{:.1} of {:.1} {} ({:.1}%)",
                    row.cumulative_work_done,
                    volume,
                    unit,
                    row.completion_percentage * 100.0
                ),
                None => format!("{:.1} {}", row.cumulative_work_done, unit),
            };
            let notes = if row.notes.is_empty() { "none" } else { row.notes.as_str() };

            format!(
                "- Task: {}. This week: {:.1} {} (previous week {:.1}, change {:+.1}). \
                 Cumulative: {}. Status: {}. Notes: {}",
                row.path,
                row.work_done_this_week,
                unit,
                row.previous_work_done,
                row.delta,
                contract,
                row.status_label,
                notes
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One summary line per caller-supplied row
///
/// Objects render as `key: value` pairs in key order; null and
/// empty values are left out.
pub fn summarize_raw_rows(rows: &[Value]) -> String {
    rows.iter()
        .filter_map(|row| {
            let line = match row {
                Value::Object(map) => map
                    .iter()
                    .filter_map(|(key, value)| render_value(value).map(|v| format!("{}: {}", key, v)))
                    .collect::<Vec<_>>()
                    .join("; "),
                other => render_value(other).unwrap_or_default(),
            };
            (!line.is_empty()).then(|| format!("- {}", line))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        other => Some(other.to_string()),
    }
}

/// Resolve a summary source to summary text
pub async fn build_summary(pool: &SqlitePool, source: SummarySource) -> Result<String> {
    match source {
        SummarySource::Text(text) => Ok(text.trim().to_string()),
        SummarySource::Rows(rows) => Ok(summarize_raw_rows(&rows)),
        SummarySource::Stored(range) => {
            let view = reconcile_latest(pool, &range).await?;
            Ok(summarize_reconciliation(&view.rows))
        }
    }
}

/// Compose the analysis prompt around a summary
pub fn compose_prompt(summary: &str, language: &str) -> Prompt {
    let user = format!(
        "Based on the week-over-week comparison of completed work volumes below, write a \
         detailed assessment:\n\
         1. **Performance:** Compare this week's work done with the previous week. Is overall \
         performance rising or falling?\n\
         2. **Risks and forecast:** Which items risk falling behind schedule, judging by the \
         volumes and notes?\n\
         3. **Recommended actions:** Propose concrete measures grounded in the figures.\n\n\
         Respond in {}.\n\n\
         ### DATA SUMMARY:\n{}",
        language, summary
    );

    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}
