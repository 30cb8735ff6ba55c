//! Login endpoint
//!
//! Checks a username/password pair against the configured credential list
//! and reports the user's dashboard role. No session is issued.

use axum::{extract::State, http::StatusCode, Json};
use cpt_common::config::Role;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> (StatusCode, Json<LoginResponse>) {
    let user = state
        .users
        .iter()
        .find(|u| u.username == request.username.trim() && u.password == request.password);

    match user {
        Some(user) => {
            info!(username = %user.username, role = ?user.role, "Login succeeded");
            (
                StatusCode::OK,
                Json(LoginResponse {
                    success: true,
                    role: Some(user.role),
                }),
            )
        }
        None => {
            warn!(username = %request.username, "Login rejected");
            (
                StatusCode::UNAUTHORIZED,
                Json(LoginResponse {
                    success: false,
                    role: None,
                }),
            )
        }
    }
}
