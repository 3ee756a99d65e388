use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Session lifetime when the sign-in response carries no expiry.
pub const DEFAULT_SESSION_TTL_DAYS: i64 = 7;

/// Email/password sign-in request.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Access + refresh token. Always replaced together.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl core::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("TokenPair { .. }")
    }
}

/// Body of a successful sign-in or refresh response.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    #[serde(flatten)]
    pub tokens: TokenPair,
    /// Lifetime in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
}

impl core::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// An authenticated session: the token pair plus its expiry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub expires_at: DateTime<Utc>,
}

impl core::fmt::Debug for Session {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionValidationError {
    #[error("session is missing a token")]
    MissingToken,
}

impl Session {
    pub fn new(tokens: TokenPair, expires_at: DateTime<Utc>) -> Self {
        Self { tokens, expires_at }
    }

    /// Build a session from a sign-in/refresh grant received at `now`.
    ///
    /// `expires_at` tracks the access token. Server lifetimes are capped at
    /// [`DEFAULT_SESSION_TTL_DAYS`], which is also the cookie lifetime.
    pub fn from_grant(grant: TokenGrant, now: DateTime<Utc>) -> Self {
        let max_ttl = Duration::days(DEFAULT_SESSION_TTL_DAYS);
        let ttl = grant
            .expires_in
            .filter(|secs| *secs > 0)
            .and_then(Duration::try_seconds)
            .map_or(max_ttl, |ttl| ttl.min(max_ttl));
        // Out of range only at the end of chrono's calendar; expire at once
        // so the next request refreshes.
        let expires_at = now.checked_add_signed(ttl).unwrap_or(now);
        Self::new(grant.tokens, expires_at)
    }

    pub fn access_token(&self) -> &str {
        &self.tokens.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.tokens.refresh_token
    }

    /// Whether the access token is past its lifetime. The refresh token may
    /// still be good, so this is a reason to refresh, not to sign out.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Check a session restored from storage before trusting it.
    pub fn validate(&self) -> Result<(), SessionValidationError> {
        if self.tokens.access_token.is_empty() || self.tokens.refresh_token.is_empty() {
            return Err(SessionValidationError::MissingToken);
        }
        Ok(())
    }
}

/// Session refresh state machine.
///
/// `Unauthenticated` is initial. `Authenticated → Refreshing` on manual
/// refresh or a 401; `Refreshing` resolves to `Authenticated` on success and
/// to `Unauthenticated` on any failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    #[default]
    Unauthenticated,
    Authenticated,
    Refreshing,
}

impl AuthStatus {
    /// Guards treat an in-flight refresh as still signed in; the outcome of
    /// the refresh decides what happens next.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthStatus::Authenticated | AuthStatus::Refreshing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> TokenPair {
        TokenPair {
            access_token: "access-1".to_string(),
            refresh_token: "refresh-1".to_string(),
        }
    }

    #[test]
    fn grant_without_expiry_lasts_seven_days() {
        let now = Utc::now();
        let session = Session::from_grant(TokenGrant { tokens: tokens(), expires_in: None }, now);
        assert_eq!(session.expires_at, now + Duration::days(7));

        let session = Session::from_grant(TokenGrant { tokens: tokens(), expires_in: Some(900) }, now);
        assert_eq!(session.expires_at, now + Duration::seconds(900));
    }

    #[test]
    fn server_lifetime_is_capped_without_panicking() {
        let now = Utc::now();
        for secs in [10_000_000_000_000, i64::MAX] {
            let grant = TokenGrant { tokens: tokens(), expires_in: Some(secs) };
            let session = Session::from_grant(grant, now);
            assert_eq!(session.expires_at, now + Duration::days(DEFAULT_SESSION_TTL_DAYS));
        }

        let grant = TokenGrant { tokens: tokens(), expires_in: Some(-5) };
        assert_eq!(
            Session::from_grant(grant, now).expires_at,
            now + Duration::days(DEFAULT_SESSION_TTL_DAYS)
        );
    }

    #[test]
    fn expired_access_token_still_validates() {
        let now = Utc::now();
        let session = Session::new(tokens(), now - Duration::minutes(5));
        assert!(session.is_expired(now));
        assert_eq!(session.validate(), Ok(()));

        let mut broken = session.clone();
        broken.tokens.refresh_token.clear();
        assert_eq!(broken.validate(), Err(SessionValidationError::MissingToken));
    }

    #[test]
    fn debug_output_never_contains_tokens() {
        let session = Session::new(tokens(), Utc::now());
        let rendered = format!("{session:?} {:?}", session.tokens);
        assert!(!rendered.contains("access-1"));
        assert!(!rendered.contains("refresh-1"));

        let creds = Credentials::new("ana@vialyzer.test", "hunter2");
        assert!(!format!("{creds:?}").contains("hunter2"));
    }

    #[test]
    fn grant_reads_camel_case_wire_shape() {
        let grant: TokenGrant = serde_json::from_str(
            r#"{"accessToken":"a","refreshToken":"r","expiresIn":60}"#,
        )
        .unwrap();
        assert_eq!(grant.tokens.access_token, "a");
        assert_eq!(grant.expires_in, Some(60));
    }
}
