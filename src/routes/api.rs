// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dashboard API routes.

use crate::error::{AppError, Result};
use crate::models::DashboardSnapshot;
use crate::services::LoadOutcome;
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/dashboard/reload", post(reload_dashboard))
        .route("/api/refresh-token", post(setup_refresh_token))
}

// ─── Snapshot ────────────────────────────────────────────────

/// Latest dashboard snapshot.
async fn get_dashboard(State(state): State<Arc<AppState>>) -> Result<Json<DashboardSnapshot>> {
    match state.dashboard.latest().await {
        Some(snapshot) => Ok(Json(DashboardSnapshot::clone(&snapshot))),
        None => {
            let reason = state
                .dashboard
                .last_error()
                .await
                .unwrap_or_else(|| "Dashboard data has not been loaded yet".to_string());
            Err(AppError::NotFound(reason))
        }
    }
}

// ─── Loading ─────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LoadResponse {
    /// `loaded`, or `skipped` when a load was already running
    pub status: String,
    pub loaded_at: Option<String>,
}

impl From<LoadOutcome> for LoadResponse {
    fn from(outcome: LoadOutcome) -> Self {
        match outcome {
            LoadOutcome::Loaded(snapshot) => LoadResponse {
                status: "loaded".to_string(),
                loaded_at: Some(snapshot.loaded_at.clone()),
            },
            LoadOutcome::Skipped => LoadResponse {
                status: "skipped".to_string(),
                loaded_at: None,
            },
        }
    }
}

/// Load fresh data now.
async fn reload_dashboard(State(state): State<Arc<AppState>>) -> Result<Json<LoadResponse>> {
    let outcome = state.dashboard.load().await?;
    Ok(Json(outcome.into()))
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

/// Replace the stored credentials with a new refresh token and load.
async fn setup_refresh_token(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<Json<LoadResponse>> {
    let outcome = state
        .dashboard
        .setup_refresh_token(&body.refresh_token)
        .await?;
    Ok(Json(outcome.into()))
}
