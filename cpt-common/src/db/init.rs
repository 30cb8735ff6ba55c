//! Database initialization
//!
//! Creates the database on first run and the three progress tables
//! idempotently on every start.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // foreign_keys is a per-connection pragma, so it goes on the options
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets dashboard reads proceed while an upload writes
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the full schema
///
/// Limited to one connection: every pooled connection to `:memory:` would
/// otherwise see its own empty database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables (idempotent - safe to call multiple times)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_project_tasks_table(pool).await?;
    create_weekly_reports_table(pool).await?;
    create_progress_entries_table(pool).await?;
    Ok(())
}

/// Create the contract hierarchy table
///
/// Groups have NULL contract_volume; a parent delete cascades to children.
async fn create_project_tasks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS project_tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            stt TEXT NOT NULL DEFAULT '',
            task_name TEXT NOT NULL,
            unit TEXT,
            contract_volume REAL CHECK (contract_volume IS NULL OR contract_volume >= 0),
            is_group INTEGER NOT NULL DEFAULT 0,
            parent_id INTEGER REFERENCES project_tasks(id) ON DELETE CASCADE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_project_tasks_leaf_name ON project_tasks(task_name) WHERE is_group = 0",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the reporting period table, unique on the date pair
async fn create_weekly_reports_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS weekly_reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (start_date, end_date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the per-report progress table, unique on (report, task)
async fn create_progress_entries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS progress_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            report_id INTEGER NOT NULL REFERENCES weekly_reports(id) ON DELETE CASCADE,
            task_id INTEGER NOT NULL REFERENCES project_tasks(id) ON DELETE CASCADE,
            work_done_this_week REAL NOT NULL DEFAULT 0 CHECK (work_done_this_week >= 0),
            cumulative_work_done REAL NOT NULL DEFAULT 0 CHECK (cumulative_work_done >= 0),
            notes TEXT NOT NULL DEFAULT '',
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (report_id, task_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
