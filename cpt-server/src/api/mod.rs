//! HTTP API handlers for the progress tracker

pub mod auth;
pub mod buildinfo;
pub mod dashboard;
pub mod health;
pub mod narrative;
pub mod reports;
pub mod ui;
pub mod upload;

pub use auth::login;
pub use buildinfo::get_build_info;
pub use dashboard::{get_dashboard, get_reconciliation};
pub use health::health_routes;
pub use narrative::{narrative, narrative_stream};
pub use reports::{latest_report, list_reports, list_tasks, report_exists};
pub use ui::{serve_app_js, serve_index};
pub use upload::upload_workbook;
