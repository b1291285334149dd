// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Setmore HTTP client.
//!
//! Handles:
//! - Resource requests through the local proxy (`POST {endpoint, apiKey}`)
//! - Direct upstream resource requests (used by the proxy route itself)
//! - Token refresh with POST → GET fallback

use crate::config::Config;
use crate::error::TokenError;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use serde_json::Value;

/// User agent sent to the upstream API.
const USER_AGENT: &str = "BarberShop-Dashboard/1.0";

/// Days before and after today covered by the appointments request.
pub const APPOINTMENT_WINDOW_DAYS: i64 = 30;

/// The four Setmore resource collections the dashboard reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Customers,
    Appointments,
    Services,
    Staff,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Customers,
        ResourceKind::Appointments,
        ResourceKind::Services,
        ResourceKind::Staff,
    ];

    /// Endpoint name understood by the proxy.
    pub fn endpoint(self) -> &'static str {
        match self {
            ResourceKind::Customers => "customers",
            ResourceKind::Appointments => "appointments",
            ResourceKind::Services => "services",
            ResourceKind::Staff => "staffs",
        }
    }

    /// Key the upstream wraps this resource's list under.
    pub fn wrapper_key(self) -> &'static str {
        match self {
            ResourceKind::Customers => "customer",
            ResourceKind::Appointments => "appointments",
            ResourceKind::Services => "services",
            ResourceKind::Staff => "staffs",
        }
    }

    /// Upstream API path for this resource.
    pub fn upstream_path(self) -> &'static str {
        match self {
            ResourceKind::Customers => "/api/v1/bookingapi/customer",
            ResourceKind::Appointments => "/api/v1/bookingapi/appointments",
            ResourceKind::Services => "/api/v1/bookingapi/services",
            ResourceKind::Staff => "/api/v1/bookingapi/staffs",
        }
    }

    pub fn from_endpoint(endpoint: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.endpoint() == endpoint)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.endpoint())
    }
}

/// Proxy request body.
#[derive(Serialize)]
struct ProxyRequest<'a> {
    endpoint: &'a str,
    #[serde(rename = "apiKey")]
    api_key: &'a str,
}

/// Status and decoded body of an HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: Value,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Decode a response body as JSON, wrapping anything else as `{raw: text}`.
pub fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::json!({ "raw": text }))
}

/// Setmore API client.
#[derive(Clone)]
pub struct SetmoreClient {
    http: reqwest::Client,
    api_base: String,
    token_url: String,
    proxy_url: String,
}

impl SetmoreClient {
    pub fn new(
        api_base: impl Into<String>,
        token_url: impl Into<String>,
        proxy_url: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
            token_url: token_url.into(),
            proxy_url: proxy_url.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.setmore_api_base.clone(),
            config.token_url.clone(),
            config.proxy_url.clone(),
        )
    }

    /// Request a resource through the proxy.
    ///
    /// Only transport failures are errors; every HTTP status is returned to
    /// the caller, which owns the retry policy.
    pub async fn post_proxy(
        &self,
        kind: ResourceKind,
        access_token: &str,
    ) -> Result<HttpReply, reqwest::Error> {
        let response = self
            .http
            .post(&self.proxy_url)
            .json(&ProxyRequest {
                endpoint: kind.endpoint(),
                api_key: access_token,
            })
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        Ok(HttpReply {
            status,
            body: decode_body(&text),
        })
    }

    /// Request a resource directly from the upstream API.
    pub async fn get_upstream(
        &self,
        kind: ResourceKind,
        api_key: &str,
        today: NaiveDate,
    ) -> Result<(u16, String), reqwest::Error> {
        let url = format!("{}{}", self.api_base, kind.upstream_path());
        let mut request = self
            .http
            .get(&url)
            .bearer_auth(api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::USER_AGENT, USER_AGENT);

        if kind == ResourceKind::Appointments {
            request = request.query(&appointment_window(today));
        }

        tracing::info!(url = %url, "Proxying request upstream");
        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        Ok((status, text))
    }

    /// Exchange a refresh token for a new grant.
    ///
    /// Tries a JSON POST first; if that fails in transport or with a non-2xx
    /// status, retries as a GET with the token in the query string.
    pub async fn request_token_refresh(&self, refresh_token: &str) -> Result<Value, TokenError> {
        let body = serde_json::json!({
            "grant_type": "refresh_token",
            "refresh_token": refresh_token,
        });

        let post = self.http.post(&self.token_url).json(&body).send().await;

        let response = match post {
            Ok(resp) if resp.status().is_success() => resp,
            outcome => {
                match outcome {
                    Ok(resp) => tracing::warn!(
                        status = resp.status().as_u16(),
                        "Token refresh POST rejected, trying GET"
                    ),
                    Err(e) => tracing::warn!(error = %e, "Token refresh POST failed, trying GET"),
                }
                self.http
                    .get(&self.token_url)
                    .query(&[("refreshToken", refresh_token)])
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .send()
                    .await
                    .map_err(|e| {
                        TokenError::RefreshFailed(format!("token request failed: {}", e))
                    })?
            }
        };

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TokenError::RefreshFailed(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), body = %text, "Token refresh rejected");
            return Err(TokenError::RefreshFailed(format!("HTTP {}: {}", status, text)));
        }

        serde_json::from_str(&text)
            .map_err(|e| TokenError::RefreshFailed(format!("JSON parse error: {}", e)))
    }
}

/// Query parameters for the appointments window around `today`.
pub fn appointment_window(today: NaiveDate) -> [(&'static str, String); 3] {
    let span = Duration::days(APPOINTMENT_WINDOW_DAYS);
    [
        ("startDate", (today - span).format("%d-%m-%Y").to_string()),
        ("endDate", (today + span).format("%d-%m-%Y").to_string()),
        ("customerDetails", "true".to_string()),
    ]
}
