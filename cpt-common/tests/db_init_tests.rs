//! Tests for database initialization
//!
//! Covers first-run creation, idempotent reopen, and the uniqueness
//! constraints the loaders rely on for upserts.

use cpt_common::db::{init_database, init_memory_database};

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("sub").join("progress.db");

    let result = init_database(&db_path).await;
    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("progress.db");

    let pool1 = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO weekly_reports (start_date, end_date) VALUES ('2024-06-03', '2024-06-09')")
        .execute(&pool1)
        .await
        .unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM weekly_reports")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(count, 1, "Reopen must keep existing rows");
}

#[tokio::test]
async fn test_report_date_pair_is_unique() {
    let pool = init_memory_database().await.unwrap();

    sqlx::query("INSERT INTO weekly_reports (start_date, end_date) VALUES ('2024-06-03', '2024-06-09')")
        .execute(&pool)
        .await
        .unwrap();
    let duplicate = sqlx::query(
        "INSERT INTO weekly_reports (start_date, end_date) VALUES ('2024-06-03', '2024-06-09')",
    )
    .execute(&pool)
    .await;

    assert!(duplicate.is_err());
}

#[tokio::test]
async fn test_progress_entries_cascade_with_report() {
    let pool = init_memory_database().await.unwrap();

    let task_id: i64 = sqlx::query_scalar(
        "INSERT INTO project_tasks (stt, task_name, unit, contract_volume, is_group) VALUES ('1', 'Đào đất', 'm3', 100, 0) RETURNING id",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    let report_id: i64 = sqlx::query_scalar(
        "INSERT INTO weekly_reports (start_date, end_date) VALUES ('2024-06-03', '2024-06-09') RETURNING id",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO progress_entries (report_id, task_id, work_done_this_week, cumulative_work_done) VALUES (?, ?, 5, 5)")
        .bind(report_id)
        .bind(task_id)
        .execute(&pool)
        .await
        .unwrap();

    sqlx::query("DELETE FROM weekly_reports").execute(&pool).await.unwrap();

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM progress_entries")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn test_negative_volume_rejected() {
    let pool = init_memory_database().await.unwrap();

    let result = sqlx::query(
        "INSERT INTO project_tasks (stt, task_name, unit, contract_volume, is_group) VALUES ('1', 'x', 'm', -1, 0)",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err());
}
