//! Workbook upload endpoint
//!
//! `POST /api/upload` (multipart): `file`, `kind` (`contract` or `weekly`)
//! and, for weekly reports, `start_date` / `end_date`.

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use cpt_common::Error;
use serde::Serialize;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};
use crate::services::contract_loader::{import_contract, ContractSummary};
use crate::services::report_loader::{import_weekly, WeeklySummary};
use crate::AppState;

/// Which loader an upload goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Contract,
    Weekly,
}

impl FromStr for UploadKind {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "contract" | "contract_baseline" => Ok(UploadKind::Contract),
            "weekly" | "weekly_report" => Ok(UploadKind::Weekly),
            other => Err(ApiError::BadRequest(format!(
                "Unknown upload kind \"{}\" (expected contract or weekly)",
                other
            ))),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UploadSummary {
    Contract(ContractSummary),
    Weekly(WeeklySummary),
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub summary: UploadSummary,
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::BadRequest(format!("Malformed upload: {}", e.body_text()))
    }
}

/// POST /api/upload
pub async fn upload_workbook(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut kind: Option<String> = None;
    let mut start_date: Option<String> = None;
    let mut end_date: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some((file_name, bytes.to_vec()));
            }
            "kind" => kind = Some(field.text().await.map_err(multipart_error)?),
            "start_date" | "startDate" => {
                start_date = Some(field.text().await.map_err(multipart_error)?)
            }
            "end_date" | "endDate" => end_date = Some(field.text().await.map_err(multipart_error)?),
            _ => debug!(field = %name, "Ignoring unknown upload field"),
        }
    }

    let kind: UploadKind = kind
        .ok_or_else(|| ApiError::BadRequest("Missing upload kind".to_string()))?
        .parse()?;
    let (file_name, bytes) =
        file.ok_or_else(|| Error::Validation("No file uploaded".to_string()))?;

    info!(file = %file_name, bytes = bytes.len(), ?kind, "Workbook uploaded");

    let response = match kind {
        UploadKind::Contract => {
            let summary = import_contract(&state.db, bytes, &state.layout.contract).await?;
            UploadResponse {
                message: format!(
                    "Contract baseline loaded: {} tasks in {} groups",
                    summary.tasks, summary.groups
                ),
                summary: UploadSummary::Contract(summary),
            }
        }
        UploadKind::Weekly => {
            let summary = import_weekly(
                &state.db,
                bytes,
                &state.layout.weekly,
                start_date.as_deref(),
                end_date.as_deref(),
            )
            .await?;
            UploadResponse {
                message: format!(
                    "Weekly report {} to {} saved: {} tasks matched, {} unmatched",
                    summary.start_date,
                    summary.end_date,
                    summary.matched,
                    summary.unmatched.len()
                ),
                summary: UploadSummary::Weekly(summary),
            }
        }
    };

    Ok(Json(response))
}
