//! Contract loader
//!
//! Replaces the stored task hierarchy with the one in a contract baseline
//! workbook. Baselines are never merged: the previous hierarchy and every
//! report recorded against it are removed in the same transaction that
//! inserts the new tree.

use cpt_common::config::ContractLayout;
use cpt_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::hierarchy::{classify, Numbering, RowKind, TaskTree, TreeBuilder};
use super::spreadsheet::{project_columns, Cell};
use super::workbook::decode_sheet;
use crate::db::tasks::{self, NewTask};

/// Outcome of a contract load
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractSummary {
    pub groups: usize,
    pub tasks: usize,
    /// Task rows dropped because they carry no contract volume
    pub skipped_rows: usize,
}

/// Parsed contract sheet, ready to persist
#[derive(Debug, Clone)]
pub struct ParsedContract {
    pub tree: TaskTree,
    pub skipped_rows: usize,
}

/// Build the task tree from raw contract sheet rows
pub fn parse_contract(rows: &[Vec<Cell>], layout: &ContractLayout) -> Result<ParsedContract> {
    let labels = [
        layout.stt.as_str(),
        layout.name.as_str(),
        layout.unit.as_str(),
        layout.volume.as_str(),
    ];
    let table = project_columns(rows, &layout.header_marker, &labels)?;

    let samples: Vec<(String, bool)> = table
        .records()
        .map(|r| (r.text(&layout.stt), r.quantity(&layout.volume).is_some()))
        .collect();
    let numbering = Numbering::detect(samples.iter().map(|(s, v)| (s.as_str(), *v)));
    debug!(?numbering, rows = table.row_count(), "Detected contract numbering");

    let mut builder = TreeBuilder::new();
    let mut skipped_rows = 0;
    for record in table.records() {
        let volume = record.quantity(&layout.volume);
        let row = classify(
            &record.text(&layout.stt),
            &record.text(&layout.name),
            volume.is_some(),
            numbering,
        );

        // Every stored leaf carries a contract volume
        if row.kind == RowKind::Leaf && volume.is_none() {
            debug!(row = record.source_row(), name = %row.name, "Task row without volume skipped");
            skipped_rows += 1;
            continue;
        }
        if row.kind == RowKind::Skip {
            continue;
        }

        builder.push(row, Some(record.text(&layout.unit)), volume);
    }

    let tree = builder.finish();
    if tree.leaves().next().is_none() {
        return Err(Error::Schema(
            "Contract sheet contains no tasks with a contract volume".to_string(),
        ));
    }

    Ok(ParsedContract { tree, skipped_rows })
}

/// Replace the stored hierarchy with `tree` in one transaction
pub async fn store_contract(pool: &SqlitePool, tree: &TaskTree) -> Result<Vec<i64>> {
    let mut tx = pool.begin().await?;

    tasks::clear_all(&mut tx).await?;

    // Nodes are ordered parents-first, so every parent id is known
    let mut ids: Vec<i64> = Vec::with_capacity(tree.nodes.len());
    for node in &tree.nodes {
        let parent_id = match node.parent {
            Some(index) => Some(ids.get(index).copied().ok_or_else(|| {
                Error::Internal(format!("Parent {} inserted after its child", index))
            })?),
            None => None,
        };

        let id = tasks::insert_task(
            &mut tx,
            &NewTask {
                stt: &node.code,
                task_name: &node.name,
                unit: node.unit.as_deref(),
                contract_volume: node.contract_volume,
                is_group: node.is_group,
                parent_id,
            },
        )
        .await?;
        ids.push(id);
    }

    tx.commit().await?;
    Ok(ids)
}

/// Decode, parse and store a contract baseline workbook
pub async fn import_contract(
    pool: &SqlitePool,
    bytes: Vec<u8>,
    layout: &ContractLayout,
) -> Result<ContractSummary> {
    let rows = decode_sheet(bytes, layout.sheet.clone(), layout.sheet_match).await?;
    let parsed = parse_contract(&rows, layout)?;
    store_contract(pool, &parsed.tree).await?;

    let summary = ContractSummary {
        groups: parsed.tree.group_count(),
        tasks: parsed.tree.leaves().count(),
        skipped_rows: parsed.skipped_rows,
    };
    info!(
        groups = summary.groups,
        tasks = summary.tasks,
        skipped = summary.skipped_rows,
        "Contract baseline replaced"
    );

    Ok(summary)
}
