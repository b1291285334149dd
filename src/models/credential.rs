//! OAuth credential held by the token manager.

use chrono::{DateTime, Duration, Utc};

/// Margin before token expiration when we proactively refresh (5 minutes).
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Lifetime assumed when a refresh response carries no `expires_in` (7 days).
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 604_800;

/// Access/refresh token pair with optional expiry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credential {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// `None` means the token never expires on its own
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// True iff `now` is within the refresh margin of (or past) the expiry.
    /// A credential without expiry is never considered expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at - Duration::seconds(TOKEN_REFRESH_MARGIN_SECS),
            None => false,
        }
    }

    /// The access token, if present and not expired at `now`.
    pub fn usable_token_at(&self, now: DateTime<Utc>) -> Option<&str> {
        match self.access_token.as_deref() {
            Some(token) if !self.is_expired_at(now) => Some(token),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.expires_at.is_none()
    }
}

/// Abbreviate a token for log output.
pub fn token_preview(token: &str) -> String {
    let prefix: String = token.chars().take(20).collect();
    if prefix.len() < token.len() {
        format!("{}...", prefix)
    } else {
        prefix
    }
}
