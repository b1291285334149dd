// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access/refresh token lifecycle.
//!
//! The token manager is the only owner of the credential. It:
//! - Restores the credential from the key-value store at startup
//! - Hands out the cached access token while it is outside the 5-minute
//!   refresh margin
//! - Refreshes with single-flight semantics: concurrent callers share one
//!   upstream refresh and all observe its result or failure
//! - Invalidates the credential (memory and store) whenever a refresh fails

use crate::db::{keys, KeyValueStore};
use crate::error::{AppError, TokenError};
use crate::models::credential::{token_preview, DEFAULT_EXPIRES_IN_SECS};
use crate::models::Credential;
use crate::services::SetmoreClient;
use crate::time_utils::from_epoch_millis;
use chrono::{DateTime, Duration, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// A refresh in progress, awaitable by any number of callers.
type RefreshFlight = Shared<BoxFuture<'static, Result<String, TokenError>>>;

/// Token fields extracted from a refresh response.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

/// Locates the object carrying `access_token` in one response shape.
type GrantShape = fn(&Value) -> Option<&Value>;

/// Known refresh response shapes, in precedence order.
const GRANT_SHAPES: [(&str, GrantShape); 4] = [
    ("enveloped", enveloped_shape),
    ("flat", flat_shape),
    ("data", data_shape),
    ("data.token", data_token_shape),
];

fn has_access_token(v: &&Value) -> bool {
    v.get("access_token")
        .and_then(Value::as_str)
        .is_some_and(|t| !t.is_empty())
}

/// `{response: true, data: {access_token, ...}}`
fn enveloped_shape(body: &Value) -> Option<&Value> {
    let flagged = body
        .get("response")
        .is_some_and(|r| !r.is_null() && *r != Value::Bool(false));
    if !flagged {
        return None;
    }
    body.get("data").filter(has_access_token)
}

/// `{access_token, refresh_token, expires_in}`
fn flat_shape(body: &Value) -> Option<&Value> {
    Some(body).filter(has_access_token)
}

/// `{data: {access_token, ...}}`
fn data_shape(body: &Value) -> Option<&Value> {
    body.get("data").filter(has_access_token)
}

/// `{data: {token: {access_token, ...}}}`
fn data_token_shape(body: &Value) -> Option<&Value> {
    body.get("data")?.get("token").filter(has_access_token)
}

impl TokenGrant {
    /// Extract a grant from any recognized response shape.
    pub fn from_response(body: &Value) -> Option<Self> {
        let (shape, obj) = GRANT_SHAPES
            .iter()
            .find_map(|(name, shape)| shape(body).map(|obj| (*name, obj)))?;
        tracing::debug!(shape, "Matched token refresh response shape");

        let access_token = obj.get("access_token")?.as_str()?.to_string();
        let refresh_token = obj
            .get("refresh_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        let expires_in = obj
            .get("expires_in")
            .and_then(|v| match v {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .filter(|secs| *secs > 0);

        Some(Self {
            access_token,
            refresh_token,
            expires_in,
        })
    }
}

/// Owner of the credential and its refresh state.
#[derive(Clone)]
pub struct TokenManager {
    state: Arc<TokenState>,
}

struct TokenState {
    client: SetmoreClient,
    store: Arc<dyn KeyValueStore>,
    credential: RwLock<Credential>,
    in_flight: Mutex<Option<RefreshFlight>>,
    /// Upstream refresh attempts issued so far
    refresh_count: AtomicU64,
}

impl TokenManager {
    /// Create a token manager, restoring any persisted credential.
    pub fn new(client: SetmoreClient, store: Arc<dyn KeyValueStore>) -> Self {
        let credential = load_credential(store.as_ref());
        tracing::info!(
            has_access_token = credential.access_token.is_some(),
            has_refresh_token = credential.refresh_token.is_some(),
            expires_at = ?credential.expires_at,
            "Credential loaded"
        );

        Self {
            state: Arc::new(TokenState {
                client,
                store,
                credential: RwLock::new(credential),
                in_flight: Mutex::new(None),
                refresh_count: AtomicU64::new(0),
            }),
        }
    }

    /// Copy of the current credential.
    pub async fn credential(&self) -> Credential {
        self.state.credential.read().await.clone()
    }

    pub async fn has_access_token(&self) -> bool {
        self.state.credential.read().await.access_token.is_some()
    }

    /// Whether the current token is inside the refresh margin.
    pub async fn is_expired(&self) -> bool {
        self.state.credential.read().await.is_expired_at(Utc::now())
    }

    /// Number of upstream refresh calls issued by this manager.
    pub fn refresh_count(&self) -> u64 {
        self.state.refresh_count.load(Ordering::SeqCst)
    }

    /// Get a usable access token, refreshing if it is expired or about to be.
    pub async fn get_valid_token(&self) -> Result<String, TokenError> {
        {
            let credential = self.state.credential.read().await;
            if credential.access_token.is_none() {
                return Err(TokenError::NoCredential);
            }
            if let Some(token) = credential.usable_token_at(Utc::now()) {
                return Ok(token.to_string());
            }
        }

        tracing::info!("Token expired or expiring soon, refreshing");
        self.join_or_start_refresh(usable_token).await
    }

    /// Refresh the access token.
    ///
    /// Joins the refresh already in flight if there is one; otherwise starts
    /// one. The credential is invalidated if the refresh fails.
    pub async fn refresh(&self) -> Result<String, TokenError> {
        self.join_or_start_refresh(|_| None).await
    }

    /// Refresh after the upstream rejected `rejected`.
    ///
    /// If another caller already replaced the rejected token with a usable
    /// one, that token is returned without a second refresh.
    pub async fn refresh_rejected(&self, rejected: &str) -> Result<String, TokenError> {
        self.join_or_start_refresh(|credential| {
            credential
                .usable_token_at(Utc::now())
                .filter(|current| *current != rejected)
                .map(str::to_string)
        })
        .await
    }

    /// Join the refresh in flight, or start one unless `reuse` finds a
    /// token in the credential.
    ///
    /// `reuse` runs while the in-flight slot is locked, so a refresh that
    /// finished after the caller last looked is seen before a second one
    /// is started.
    async fn join_or_start_refresh<F>(&self, reuse: F) -> Result<String, TokenError>
    where
        F: FnOnce(&Credential) -> Option<String>,
    {
        let flight = {
            let mut slot = self.state.in_flight.lock().await;
            match slot.as_ref() {
                Some(flight) => {
                    tracing::debug!("Token refresh already in progress, waiting");
                    flight.clone()
                }
                None => {
                    // Double-check: another task may have refreshed meanwhile
                    if let Some(token) = reuse(&*self.state.credential.read().await) {
                        tracing::debug!("Token already refreshed, reusing current token");
                        return Ok(token);
                    }

                    let state = self.state.clone();
                    let flight = async move {
                        let result = state.perform_refresh().await;
                        state.in_flight.lock().await.take();
                        result
                    }
                    .boxed()
                    .shared();
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };

        flight.await
    }

    /// Merge the given fields into the credential and persist immediately.
    ///
    /// `None` leaves the stored refresh token / expiry unchanged.
    pub async fn save(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        let mut credential = self.state.credential.write().await;
        let mut updated = credential.clone();
        updated.access_token = Some(access_token.to_string());
        if let Some(refresh_token) = refresh_token {
            updated.refresh_token = Some(refresh_token.to_string());
        }
        if let Some(expires_at) = expires_at {
            updated.expires_at = Some(expires_at);
        }

        persist_credential(&self.state.store, &credential, &updated).await?;
        *credential = updated;
        tracing::debug!(token = %token_preview(access_token), "Credential saved");
        Ok(())
    }

    /// Clear the credential from memory and from the store.
    pub async fn invalidate(&self) -> Result<(), AppError> {
        self.state.invalidate().await
    }

    /// Replace all credentials with a fresh refresh token and mint an access
    /// token from it right away.
    pub async fn setup_refresh_token(&self, refresh_token: &str) -> Result<String, AppError> {
        let refresh_token = refresh_token.trim();
        if refresh_token.is_empty() {
            return Err(AppError::BadRequest(
                "Please provide a valid refresh token".to_string(),
            ));
        }

        self.invalidate().await?;
        {
            let mut credential = self.state.credential.write().await;
            let value = refresh_token.to_string();
            blocking_store(&self.state.store, move |store| {
                store.set(keys::REFRESH_TOKEN, &value)
            })
            .await?;
            credential.refresh_token = Some(refresh_token.to_string());
        }
        tracing::info!("Refresh token saved, refreshing access token");

        Ok(self.refresh().await?)
    }
}

impl TokenState {
    /// Run one refresh; never panics, so every waiter sees an outcome and
    /// the in-flight slot is always cleared.
    async fn perform_refresh(&self) -> Result<String, TokenError> {
        let result = AssertUnwindSafe(self.try_refresh())
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                Err(TokenError::RefreshFailed(
                    "token refresh aborted unexpectedly".to_string(),
                ))
            });
        if let Err(e) = &result {
            tracing::error!(error = %e, "Token refresh failed, clearing credential");
            if let Err(store_err) = self.invalidate().await {
                tracing::error!(error = %store_err, "Failed to clear stored credential");
            }
        }
        result
    }

    async fn try_refresh(&self) -> Result<String, TokenError> {
        let refresh_token = self
            .credential
            .read()
            .await
            .refresh_token
            .clone()
            .ok_or_else(|| {
                TokenError::RefreshFailed(
                    "No refresh token available. Please re-authenticate with Setmore.".to_string(),
                )
            })?;

        self.refresh_count.fetch_add(1, Ordering::SeqCst);
        tracing::info!(refresh_token = %token_preview(&refresh_token), "Refreshing access token");

        let body = self.client.request_token_refresh(&refresh_token).await?;
        let grant = TokenGrant::from_response(&body).ok_or_else(|| {
            tracing::error!(response = %body, "Unexpected token refresh response format");
            TokenError::RefreshFailed(
                "Invalid token refresh response format - no access_token found".to_string(),
            )
        })?;

        let expires_in = grant.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let expires_at = expiry_after(Utc::now(), expires_in).ok_or_else(|| {
            TokenError::RefreshFailed(format!("expires_in out of range: {}", expires_in))
        })?;
        let updated = Credential {
            access_token: Some(grant.access_token.clone()),
            refresh_token: grant.refresh_token.or(Some(refresh_token)),
            expires_at: Some(expires_at),
        };

        let mut credential = self.credential.write().await;
        persist_credential(&self.store, &credential, &updated)
            .await
            .map_err(|e| TokenError::RefreshFailed(format!("failed to persist tokens: {}", e)))?;
        *credential = updated;

        tracing::info!(expires_in, "Access token refreshed");
        Ok(grant.access_token)
    }

    async fn invalidate(&self) -> Result<(), AppError> {
        let mut credential = self.credential.write().await;
        *credential = Credential::default();
        blocking_store(&self.store, |store| {
            for key in [
                keys::ACCESS_TOKEN,
                keys::REFRESH_TOKEN,
                keys::TOKEN_EXPIRY,
                keys::LEGACY_API_KEY,
            ] {
                store.remove(key)?;
            }
            Ok(())
        })
        .await?;
        tracing::info!("Credential cleared");
        Ok(())
    }
}

/// Read the credential from the store, falling back to a legacy API key.
fn load_credential(store: &dyn KeyValueStore) -> Credential {
    let access_token = store
        .get(keys::ACCESS_TOKEN)
        .or_else(|| store.get(keys::LEGACY_API_KEY))
        .filter(|t| !t.is_empty());
    let expires_at = store.get(keys::TOKEN_EXPIRY).and_then(|raw| {
        let parsed = raw.trim().parse::<i64>().ok().and_then(from_epoch_millis);
        if parsed.is_none() {
            tracing::warn!(value = %raw, "Ignoring unparseable token expiry");
        }
        parsed
    });

    Credential {
        access_token,
        refresh_token: store.get(keys::REFRESH_TOKEN).filter(|t| !t.is_empty()),
        expires_at,
    }
}

fn usable_token(credential: &Credential) -> Option<String> {
    credential.usable_token_at(Utc::now()).map(str::to_string)
}

/// `now + expires_in` seconds, or `None` if that is not a representable time.
fn expiry_after(now: DateTime<Utc>, expires_in: i64) -> Option<DateTime<Utc>> {
    Duration::try_seconds(expires_in).and_then(|ttl| now.checked_add_signed(ttl))
}

/// Run store I/O on the blocking pool.
async fn blocking_store<T, F>(store: &Arc<dyn KeyValueStore>, op: F) -> Result<T, AppError>
where
    F: FnOnce(&dyn KeyValueStore) -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    let store = store.clone();
    tokio::task::spawn_blocking(move || op(store.as_ref()))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("store task failed: {}", e)))?
}

/// Store keys and values of a credential, in write order. The access token
/// goes last so a partial write never pairs it with a stale expiry.
fn credential_fields(credential: &Credential) -> [(&'static str, Option<String>); 3] {
    [
        (
            keys::TOKEN_EXPIRY,
            credential
                .expires_at
                .map(|at| at.timestamp_millis().to_string()),
        ),
        (keys::REFRESH_TOKEN, credential.refresh_token.clone()),
        (keys::ACCESS_TOKEN, credential.access_token.clone()),
    ]
}

fn write_field(store: &dyn KeyValueStore, key: &str, value: Option<&str>) -> Result<(), AppError> {
    match value {
        Some(value) => store.set(key, value),
        None => store.remove(key),
    }
}

/// Replace the stored `previous` credential with `updated`; absent fields
/// are removed. If a write fails, the fields already written are restored.
async fn persist_credential(
    store: &Arc<dyn KeyValueStore>,
    previous: &Credential,
    updated: &Credential,
) -> Result<(), AppError> {
    let before = credential_fields(previous);
    let after = credential_fields(updated);

    blocking_store(store, move |store| {
        for (written, (key, value)) in after.iter().enumerate() {
            if let Err(e) = write_field(store, key, value.as_deref()) {
                for (key, value) in before.iter().take(written) {
                    if let Err(rollback) = write_field(store, key, value.as_deref()) {
                        tracing::error!(key, error = %rollback, "Failed to restore credential field");
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    })
    .await
}
