// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Resource retrieval through the proxy.
//!
//! Each retrieval is a small state machine:
//!
//! ```text
//! Attempt(n) ──2xx──────────────► Done
//!     │ 401
//!     ▼
//! Reauthenticate ──refresh ok──► RetryOnce ──2xx──► Done
//!     │ refresh failed              └─other──► Failed
//!     ▼
//!   Failed
//! ```
//!
//! Any other status (or a transport error) moves `Attempt(n)` to
//! `Attempt(n + 1)` after `n × backoff`, until the retry budget is spent.

use crate::config::Config;
use crate::error::AppError;
use crate::models::credential::token_preview;
use crate::services::setmore::{HttpReply, ResourceKind, SetmoreClient};
use crate::services::TokenManager;
use serde_json::Value;
use std::time::Duration;

/// Raw (unwrapped, not yet normalized) payloads of the four resources.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDataset {
    pub customers: Value,
    pub appointments: Value,
    pub services: Value,
    pub staff: Value,
}

enum Step {
    Attempt(u32),
    Reauthenticate,
    RetryOnce(String),
}

/// Fetches resources via the proxy with retry and re-authentication.
#[derive(Clone)]
pub struct DataFetcher {
    client: SetmoreClient,
    tokens: TokenManager,
    retries: u32,
    backoff: Duration,
}

impl DataFetcher {
    pub fn new(client: SetmoreClient, tokens: TokenManager, retries: u32, backoff: Duration) -> Self {
        Self {
            client,
            tokens,
            retries: retries.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &Config, client: SetmoreClient, tokens: TokenManager) -> Self {
        Self::new(client, tokens, config.fetch_retries, config.retry_backoff)
    }

    /// Fetch all four resources concurrently.
    ///
    /// Every retrieval runs to completion; the load fails with the first
    /// error (in resource order) if any of them failed.
    pub async fn fetch_all(&self, token: &str) -> Result<RawDataset, AppError> {
        let (customers, appointments, services, staff) = tokio::join!(
            self.fetch_resource(ResourceKind::Customers, token),
            self.fetch_resource(ResourceKind::Appointments, token),
            self.fetch_resource(ResourceKind::Services, token),
            self.fetch_resource(ResourceKind::Staff, token),
        );

        Ok(RawDataset {
            customers: customers?,
            appointments: appointments?,
            services: services?,
            staff: staff?,
        })
    }

    /// Fetch one resource and unwrap the proxy envelope.
    pub async fn fetch_resource(&self, kind: ResourceKind, token: &str) -> Result<Value, AppError> {
        tracing::debug!(resource = %kind, token = %token_preview(token), "Fetching via proxy");

        let mut step = Step::Attempt(1);
        loop {
            step = match step {
                Step::Attempt(attempt) => match self.client.post_proxy(kind, token).await {
                    Ok(reply) if reply.is_success() => return Ok(unwrap_envelope(reply.body)),
                    Ok(reply) if reply.status == 401 => {
                        tracing::info!(resource = %kind, "Got 401, attempting to refresh token");
                        Step::Reauthenticate
                    }
                    Ok(reply) => {
                        self.backoff_or_fail(kind, attempt, failure_from_reply(kind, &reply))
                            .await?
                    }
                    Err(e) => {
                        self.backoff_or_fail(kind, attempt, transport_failure(kind, e))
                            .await?
                    }
                },
                Step::Reauthenticate => {
                    // A failed refresh ends the retrieval with RefreshFailed
                    let new_token = self.tokens.refresh_rejected(token).await?;
                    tracing::info!(resource = %kind, "Token refreshed, retrying with new token");
                    Step::RetryOnce(new_token)
                }
                Step::RetryOnce(new_token) => {
                    return match self.client.post_proxy(kind, &new_token).await {
                        Ok(reply) if reply.is_success() => Ok(unwrap_envelope(reply.body)),
                        Ok(reply) => Err(failure_from_reply(kind, &reply)),
                        Err(e) => Err(transport_failure(kind, e)),
                    };
                }
            };
        }
    }

    /// Sleep before the next attempt, or give up if the budget is spent.
    async fn backoff_or_fail(
        &self,
        kind: ResourceKind,
        attempt: u32,
        failure: AppError,
    ) -> Result<Step, AppError> {
        tracing::warn!(resource = %kind, attempt, error = %failure, "Proxy fetch attempt failed");
        if attempt >= self.retries {
            return Err(failure);
        }
        tokio::time::sleep(self.backoff * attempt).await;
        Ok(Step::Attempt(attempt + 1))
    }
}

/// Build a fetch error from a non-success proxy reply.
fn failure_from_reply(kind: ResourceKind, reply: &HttpReply) -> AppError {
    let detail = ["error", "details"]
        .iter()
        .find_map(|k| reply.body.get(*k).and_then(Value::as_str))
        .unwrap_or("Unknown error");
    AppError::Fetch {
        endpoint: kind.endpoint().to_string(),
        status: Some(reply.status),
        message: format!("API Error: {} - {}", reply.status, detail),
    }
}

fn transport_failure(kind: ResourceKind, err: reqwest::Error) -> AppError {
    AppError::Fetch {
        endpoint: kind.endpoint().to_string(),
        status: None,
        message: err.to_string(),
    }
}

/// Take the payload out of the proxy envelope.
///
/// Precedence: `.data.data`, then `.data`, then the body itself.
pub fn unwrap_envelope(mut body: Value) -> Value {
    if let Some(inner) = body
        .get_mut("data")
        .and_then(|d| d.get_mut("data"))
        .filter(|v| !v.is_null())
    {
        return inner.take();
    }
    if let Some(data) = body.get_mut("data").filter(|v| !v.is_null()) {
        return data.take();
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unwrap_envelope_precedence() {
        assert_eq!(
            unwrap_envelope(json!({"data": {"data": [1, 2]}, "response": true})),
            json!([1, 2])
        );
        assert_eq!(
            unwrap_envelope(json!({"response": true, "data": {"services": []}})),
            json!({"services": []})
        );
        assert_eq!(unwrap_envelope(json!([1])), json!([1]));
        assert_eq!(
            unwrap_envelope(json!({"customer": [], "data": null})),
            json!({"customer": [], "data": null})
        );
    }

    #[test]
    fn test_failure_from_reply_uses_error_field() {
        let reply = HttpReply {
            status: 503,
            body: json!({"error": "API Error: 503 Service Unavailable"}),
        };
        let err = failure_from_reply(ResourceKind::Services, &reply);
        assert_eq!(err.fetch_status(), Some(503));
        assert!(err.to_string().contains("services"));
    }
}
