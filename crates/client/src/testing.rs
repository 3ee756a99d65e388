//! In-process fake of the REST backend for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use vialyzer_auth::{Company, Credentials, Role, TokenGrant, TokenPair, User};

use crate::api::{ApiError, AuthApi};
use crate::auth_context::AuthContext;
use crate::cookie::{MemoryCookieJar, SessionCookieCodec, SessionStore};

pub(crate) const PASSWORD: &str = "secret";

pub(crate) struct FakeApi {
    user: User,
    accepted: Mutex<Option<String>>,
    issued: AtomicUsize,
    pub refresh_ok: AtomicBool,
    pub reject_all: AtomicBool,
    pub me_delay: Duration,
    pub me_network_error: AtomicBool,
    pub me_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
}

impl FakeApi {
    pub fn new(user: User) -> Arc<Self> {
        Arc::new(Self::with_me_delay(user, Duration::ZERO))
    }

    pub fn with_me_delay(user: User, me_delay: Duration) -> Self {
        Self {
            user,
            accepted: Mutex::new(None),
            issued: AtomicUsize::new(0),
            refresh_ok: AtomicBool::new(true),
            reject_all: AtomicBool::new(false),
            me_delay,
            me_network_error: AtomicBool::new(false),
            me_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
        }
    }

    /// Server-side expiry of the current access token.
    pub fn expire_access(&self) {
        *self.accepted.lock().unwrap() = None;
    }

    fn issue(&self) -> TokenGrant {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let access = format!("access-{n}");
        *self.accepted.lock().unwrap() = Some(access.clone());
        TokenGrant {
            tokens: TokenPair {
                access_token: access,
                refresh_token: format!("refresh-{n}"),
            },
            expires_in: Some(3600),
        }
    }

    fn check(&self, token: &str) -> Result<(), ApiError> {
        let accepted = self.accepted.lock().unwrap();
        if self.reject_all.load(Ordering::SeqCst) || accepted.as_deref() != Some(token) {
            return Err(ApiError::Unauthorized);
        }
        Ok(())
    }
}

#[async_trait]
impl AuthApi for FakeApi {
    async fn sign_in(&self, credentials: &Credentials) -> Result<TokenGrant, ApiError> {
        if credentials.email != self.user.email || credentials.password != PASSWORD {
            return Err(ApiError::Api {
                status: 400,
                message: "invalid credentials".to_string(),
            });
        }
        Ok(self.issue())
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), ApiError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        self.check(access_token)
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, ApiError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        if !self.refresh_ok.load(Ordering::SeqCst) {
            return Err(ApiError::Unauthorized);
        }
        Ok(self.issue())
    }

    async fn current_user(&self, access_token: &str) -> Result<User, ApiError> {
        self.me_calls.fetch_add(1, Ordering::SeqCst);
        if !self.me_delay.is_zero() {
            tokio::time::sleep(self.me_delay).await;
        }
        if self.me_network_error.load(Ordering::SeqCst) {
            return Err(ApiError::Network("connection refused".to_string()));
        }
        self.check(access_token)?;
        Ok(self.user.clone())
    }

    async fn fetch(&self, path: &str, access_token: &str) -> Result<Value, ApiError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.check(access_token)?;
        Ok(json!([{ "path": path }]))
    }
}

/// Operator at a transit company: cameras and vehicles, companies read-only.
pub(crate) fn operator() -> User {
    let role = Role::new("Operator")
        .with_module("cameras")
        .with_module("vehicles")
        .with_module("companies")
        .with_permission("cameras", "read")
        .with_permission("cameras", "update")
        .with_permission("vehicles", "read")
        .with_permission("companies", "list");
    User::new("Ana Torres", "ana@vialyzer.test", role, Company::new("Movilidad Norte"))
}

pub(crate) fn admin() -> User {
    let mut role = Role::new("Administrator");
    for module in ["users", "companies", "roles", "modules", "cameras"] {
        role = role
            .with_module(module)
            .with_permission(module, "create")
            .with_permission(module, "list");
    }
    User::new("Laura Gómez", "laura@vialyzer.test", role, Company::new("Vialyzer"))
}

pub(crate) fn context(api: Arc<FakeApi>) -> (AuthContext, Arc<MemoryCookieJar>) {
    let jar = Arc::new(MemoryCookieJar::new());
    let store = SessionStore::new(jar.clone(), SessionCookieCodec::new("test-secret"), false);
    (AuthContext::new(api, store), jar)
}

pub(crate) async fn signed_in(api: Arc<FakeApi>) -> (AuthContext, Arc<MemoryCookieJar>) {
    let email = api.user.email.clone();
    let (ctx, jar) = context(api);
    ctx.login(&Credentials::new(email, PASSWORD), false)
        .await
        .unwrap();
    (ctx, jar)
}
