//! Session persistence in a signed cookie.
//!
//! The session cookie holds `base64url(json).base64url(hmac_sha256(json))`
//! where the JSON is `{ accessToken, refreshToken, expiresAt }`. A separate,
//! unsigned cookie remembers the last sign-in email.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Duration;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use vialyzer_auth::Session;

pub const SESSION_COOKIE: &str = "vialyzer_session";
pub const REMEMBER_EMAIL_COOKIE: &str = "vialyzer_remember_email";

pub const SESSION_COOKIE_DAYS: i64 = 7;
pub const REMEMBER_EMAIL_DAYS: i64 = 30;

type HmacSha256 = Hmac<Sha256>;

// ─────────────────────────────────────────────────────────────────────────────
// Cookie jar
// ─────────────────────────────────────────────────────────────────────────────

/// Attributes written with a cookie. `SameSite=Strict` and `Path=/` always.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieOptions {
    pub max_age: Duration,
    pub secure: bool,
}

impl CookieOptions {
    pub fn days(days: i64, secure: bool) -> Self {
        Self {
            max_age: Duration::days(days),
            secure,
        }
    }

    /// `Set-Cookie`/`document.cookie` form of `name=value` with attributes.
    pub fn render(&self, name: &str, value: &str) -> String {
        let mut out = format!(
            "{name}={value}; Max-Age={}; Path=/; SameSite=Strict",
            self.max_age.num_seconds()
        );
        if self.secure {
            out.push_str("; Secure");
        }
        out
    }
}

/// Where cookies live: `document.cookie` in the browser, memory in tests.
pub trait CookieJar: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&self, name: &str, value: &str, options: CookieOptions);
    fn remove(&self, name: &str);
}

/// In-process cookie jar.
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    cookies: Mutex<HashMap<String, (String, CookieOptions)>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full cookie line last written under `name`.
    pub fn rendered(&self, name: &str) -> Option<String> {
        let cookies = self.cookies.lock().unwrap_or_else(PoisonError::into_inner);
        cookies
            .get(name)
            .map(|(value, options)| options.render(name, value))
    }
}

impl CookieJar for MemoryCookieJar {
    fn get(&self, name: &str) -> Option<String> {
        let cookies = self.cookies.lock().unwrap_or_else(PoisonError::into_inner);
        cookies.get(name).map(|(value, _)| value.clone())
    }

    fn set(&self, name: &str, value: &str, options: CookieOptions) {
        let mut cookies = self.cookies.lock().unwrap_or_else(PoisonError::into_inner);
        cookies.insert(name.to_string(), (value.to_string(), options));
    }

    fn remove(&self, name: &str) {
        let mut cookies = self.cookies.lock().unwrap_or_else(PoisonError::into_inner);
        cookies.remove(name);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Signed session codec
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SessionCodecError {
    #[error("malformed session cookie")]
    Malformed,
    #[error("session cookie encoding: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("session cookie signature mismatch")]
    BadSignature,
    #[error("session cookie payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("invalid signing key")]
    Key,
}

#[derive(Clone)]
pub struct SessionCookieCodec {
    key: Vec<u8>,
}

impl core::fmt::Debug for SessionCookieCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SessionCookieCodec { .. }")
    }
}

impl SessionCookieCodec {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> Result<HmacSha256, SessionCodecError> {
        HmacSha256::new_from_slice(&self.key).map_err(|_| SessionCodecError::Key)
    }

    pub fn encode(&self, session: &Session) -> Result<String, SessionCodecError> {
        let payload = serde_json::to_vec(session)?;
        let mut mac = self.mac()?;
        mac.update(&payload);
        let signature = mac.finalize().into_bytes();
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Decode and verify. The signature is checked before the payload is
    /// parsed.
    pub fn decode(&self, value: &str) -> Result<Session, SessionCodecError> {
        let (payload, signature) = value
            .split_once('.')
            .ok_or(SessionCodecError::Malformed)?;
        let payload = URL_SAFE_NO_PAD.decode(payload)?;
        let signature = URL_SAFE_NO_PAD.decode(signature)?;

        let mut mac = self.mac()?;
        mac.update(&payload);
        mac.verify_slice(&signature)
            .map_err(|_| SessionCodecError::BadSignature)?;

        Ok(serde_json::from_slice(&payload)?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session store
// ─────────────────────────────────────────────────────────────────────────────

/// Read/write/clear of the persisted session.
#[derive(Clone)]
pub struct SessionStore {
    jar: Arc<dyn CookieJar>,
    codec: SessionCookieCodec,
    secure: bool,
}

impl SessionStore {
    pub fn new(jar: Arc<dyn CookieJar>, codec: SessionCookieCodec, secure: bool) -> Self {
        Self { jar, codec, secure }
    }

    /// The persisted session, if present, authentic and complete.
    ///
    /// A session whose access token has expired is still returned; the
    /// refresh token decides whether it survives. Anything else is removed
    /// so the next read starts clean.
    pub fn read(&self) -> Option<Session> {
        let raw = self.jar.get(SESSION_COOKIE)?;
        let session = match self.codec.decode(&raw) {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(error = %err, "discarding unreadable session cookie");
                self.jar.remove(SESSION_COOKIE);
                return None;
            }
        };

        if let Err(err) = session.validate() {
            tracing::info!(error = %err, "discarding stored session");
            self.jar.remove(SESSION_COOKIE);
            return None;
        }

        Some(session)
    }

    /// Persist both tokens in one cookie write.
    pub fn write(&self, session: &Session) -> Result<(), SessionCodecError> {
        let value = self.codec.encode(session)?;
        self.jar.set(
            SESSION_COOKIE,
            &value,
            CookieOptions::days(SESSION_COOKIE_DAYS, self.secure),
        );
        Ok(())
    }

    pub fn clear(&self) {
        self.jar.remove(SESSION_COOKIE);
    }

    pub fn remember_email(&self, email: &str) {
        self.jar.set(
            REMEMBER_EMAIL_COOKIE,
            &URL_SAFE_NO_PAD.encode(email.as_bytes()),
            CookieOptions::days(REMEMBER_EMAIL_DAYS, self.secure),
        );
    }

    pub fn remembered_email(&self) -> Option<String> {
        let raw = self.jar.get(REMEMBER_EMAIL_COOKIE)?;
        let bytes = URL_SAFE_NO_PAD.decode(raw).ok()?;
        String::from_utf8(bytes).ok()
    }

    pub fn forget_email(&self) {
        self.jar.remove(REMEMBER_EMAIL_COOKIE);
    }
}
