//! cpt-server library - construction progress tracker
//!
//! Ingests contract baselines and weekly reports from spreadsheets, reconciles
//! progress against contract volumes and relays AI-written narratives.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use cpt_common::config::{LayoutConfig, TomlConfig, UserCredential};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod services;

use services::completion::CompletionService;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Sheet and column labels of uploaded workbooks
    pub layout: Arc<LayoutConfig>,
    /// Login credentials
    pub users: Arc<Vec<UserCredential>>,
    /// Completion service used for narratives
    pub completion: Arc<dyn CompletionService>,
    /// Language narratives are written in
    pub language: Arc<str>,
    /// Largest accepted upload
    pub max_upload_bytes: usize,
    /// Service start, for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Create application state from the bootstrap configuration
    pub fn new(db: SqlitePool, config: &TomlConfig, completion: Arc<dyn CompletionService>) -> Self {
        Self {
            db,
            layout: Arc::new(config.layout.clone()),
            users: Arc::new(config.users.clone()),
            completion,
            language: Arc::from(config.completion.language.as_str()),
            max_upload_bytes: config.max_upload_bytes,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    // Multipart bodies are buffered whole, so the limit applies here
    let uploads = Router::new()
        .route("/api/upload", post(api::upload_workbook))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes));

    let api = Router::new()
        .route("/api/login", post(api::login))
        .route("/api/buildinfo", get(api::get_build_info))
        .route("/api/tasks", get(api::list_tasks))
        .route("/api/reports", get(api::list_reports))
        .route("/api/reports/exists", get(api::report_exists))
        .route("/api/reports/latest", get(api::latest_report))
        .route("/api/reconciliation", get(api::get_reconciliation))
        .route("/api/dashboard", get(api::get_dashboard))
        .route("/api/narrative", post(api::narrative))
        .route("/api/narrative/stream", post(api::narrative_stream));

    let public = Router::new()
        .route("/", get(api::serve_index))
        .route("/static/app.js", get(api::serve_app_js))
        .merge(api::health_routes());

    Router::new()
        .merge(uploads)
        .merge(api)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
