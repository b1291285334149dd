// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Setmore proxy route.
//!
//! Forwards `{endpoint, apiKey}` requests to the upstream booking API with
//! the key as a bearer token, so the browser never talks to Setmore
//! directly.

use crate::error::{AppError, Result};
use crate::models::credential::token_preview;
use crate::services::setmore::{decode_body, ResourceKind};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/setmore", get(proxy_status).post(proxy_request))
}

#[derive(Debug, Default, Deserialize)]
pub struct ProxyRequestBody {
    #[serde(rename = "apiKey")]
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Serialize)]
pub struct ProxyStatus {
    pub message: String,
    pub timestamp: String,
}

/// Liveness check for the proxy.
async fn proxy_status() -> Json<ProxyStatus> {
    Json(ProxyStatus {
        message: "Setmore API proxy is running".to_string(),
        timestamp: format_utc_rfc3339(Utc::now()),
    })
}

async fn proxy_request(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ProxyRequestBody>,
) -> Result<Json<Value>> {
    let api_key = body
        .api_key
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::BadRequest("API key is required".to_string()))?;
    let endpoint = body
        .endpoint
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::BadRequest("Endpoint is required".to_string()))?;
    let kind = ResourceKind::from_endpoint(&endpoint)
        .ok_or_else(|| AppError::BadRequest("Invalid endpoint".to_string()))?;

    tracing::debug!(endpoint = %kind, api_key = %token_preview(&api_key), "Proxy request");

    let (status, text) = state
        .client
        .get_upstream(kind, &api_key, Utc::now().date_naive())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, endpoint = %kind, "Proxy request failed");
            AppError::Internal(e.into())
        })?;

    if !(200..300).contains(&status) {
        tracing::warn!(status, endpoint = %kind, "Upstream returned error");
        return Err(upstream_error(status, text));
    }

    Ok(Json(decode_body(&text)))
}

/// Map an upstream failure to a pass-through error with a readable message.
fn upstream_error(status: u16, body: String) -> AppError {
    let reason = StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown Status");

    let error = match status {
        401 => format!(
            "API Error: {} {} - the access token is invalid or expired",
            status, reason
        ),
        403 => format!(
            "API Error: {} {} - the access token lacks permission for this resource",
            status, reason
        ),
        429 => format!(
            "API Error: {} {} - rate limited by Setmore, try again shortly",
            status, reason
        ),
        _ => format!("API Error: {} {}", status, reason),
    };

    AppError::Upstream {
        status,
        error,
        details: Some(body),
    }
}
