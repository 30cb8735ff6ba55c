//! Contract hierarchy persistence (`project_tasks`)

use cpt_common::db::Task;
use cpt_common::Result;
use sqlx::{SqliteConnection, SqlitePool};

/// A task row about to be inserted
#[derive(Debug, Clone)]
pub struct NewTask<'a> {
    pub stt: &'a str,
    pub task_name: &'a str,
    pub unit: Option<&'a str>,
    pub contract_volume: Option<f64>,
    pub is_group: bool,
    pub parent_id: Option<i64>,
}

/// Remove the whole contract hierarchy together with every report
///
/// Progress entries reference tasks, and reports without entries are
/// meaningless against a new baseline, so all three tables are cleared.
pub async fn clear_all(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query("DELETE FROM progress_entries")
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM weekly_reports")
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM project_tasks")
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Insert one task and return its id
pub async fn insert_task(conn: &mut SqliteConnection, task: &NewTask<'_>) -> Result<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO project_tasks (stt, task_name, unit, contract_volume, is_group, parent_id)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(task.stt)
    .bind(task.task_name)
    .bind(task.unit)
    .bind(task.contract_volume)
    .bind(task.is_group)
    .bind(task.parent_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

/// Find a leaf task by exact name
///
/// Duplicate leaf names resolve to the earliest inserted task.
pub async fn find_leaf_by_name(conn: &mut SqliteConnection, name: &str) -> Result<Option<i64>> {
    let id: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM project_tasks WHERE is_group = 0 AND task_name = ? ORDER BY id LIMIT 1",
    )
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(id)
}

/// All tasks in sheet order (parents precede children)
pub async fn list_tasks(conn: &mut SqliteConnection) -> Result<Vec<Task>> {
    let tasks = sqlx::query_as::<_, Task>(
        r#"
        SELECT id, stt, task_name, unit, contract_volume, is_group, parent_id
        FROM project_tasks
        ORDER BY id
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(tasks)
}

pub async fn count_tasks(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM project_tasks")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
