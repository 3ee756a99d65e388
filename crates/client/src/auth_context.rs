//! Tab-lifetime authentication state.
//!
//! `AuthContext` exclusively owns the session. It mirrors every change into
//! the signed cookie, publishes [`AuthStatus`] transitions on a watch
//! channel, and routes authenticated requests through a 401 interceptor that
//! refreshes once and logs out when refreshing fails.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::watch;

use vialyzer_auth::{AuthStatus, Credentials, Session, User};

use crate::api::{ApiError, AuthApi};
use crate::cookie::SessionStore;
use crate::query_cache::{CURRENT_USER, QueryCache};
use crate::render::Viewer;
use crate::resources::Resource;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("session refresh failed: {0}")]
    RefreshFailed(ApiError),
    #[error("could not persist session: {0}")]
    Persist(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl AuthError {
    /// Errors after which the user must sign in again.
    pub fn requires_sign_in(&self) -> bool {
        matches!(self, AuthError::NotAuthenticated | AuthError::RefreshFailed(_))
    }
}

pub struct AuthContext {
    api: Arc<dyn AuthApi>,
    store: SessionStore,
    session: Mutex<Option<Session>>,
    status: watch::Sender<AuthStatus>,
    /// Serializes refreshes so concurrent 401s trigger one refresh call.
    refresh_lock: tokio::sync::Mutex<()>,
    users: QueryCache<User>,
    resources: QueryCache<Value>,
}

impl AuthContext {
    /// A context in the initial `Unauthenticated` state. Call
    /// [`restore`](Self::restore) to pick up a persisted session.
    pub fn new(api: Arc<dyn AuthApi>, store: SessionStore) -> Self {
        let (status, _) = watch::channel(AuthStatus::Unauthenticated);
        Self {
            api,
            store,
            session: Mutex::new(None),
            status,
            refresh_lock: tokio::sync::Mutex::new(()),
            users: QueryCache::new(),
            resources: QueryCache::new(),
        }
    }

    fn session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, next: AuthStatus) {
        let previous = self.status.send_replace(next);
        if previous != next {
            tracing::debug!(from = ?previous, to = ?next, "auth status changed");
        }
    }

    /// Load the session persisted by a previous page load, if any.
    pub fn restore(&self) -> AuthStatus {
        if let Some(session) = self.store.read() {
            let stale = session.is_expired(Utc::now());
            *self.session() = Some(session);
            self.set_status(AuthStatus::Authenticated);
            tracing::info!(stale, "session restored from cookie");
        }
        self.status()
    }

    pub fn status(&self) -> AuthStatus {
        *self.status.borrow()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status().is_authenticated()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.status.subscribe()
    }

    pub fn access_token(&self) -> Option<String> {
        self.session()
            .as_ref()
            .map(|session| session.access_token().to_string())
    }

    pub fn remembered_email(&self) -> Option<String> {
        self.store.remembered_email()
    }

    /// Replace the session (both tokens at once) and persist it.
    fn install(&self, session: Session) -> Result<(), AuthError> {
        self.store
            .write(&session)
            .map_err(|e| AuthError::Persist(e.to_string()))?;
        *self.session() = Some(session);
        self.set_status(AuthStatus::Authenticated);
        Ok(())
    }

    fn clear_session(&self) {
        *self.session() = None;
        self.store.clear();
        self.users.clear();
        self.resources.clear();
        self.set_status(AuthStatus::Unauthenticated);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    pub async fn login(&self, credentials: &Credentials, remember_me: bool) -> Result<(), AuthError> {
        let grant = self.api.sign_in(credentials).await?;

        self.users.clear();
        self.resources.clear();
        self.install(Session::from_grant(grant, Utc::now()))?;

        if remember_me {
            self.store.remember_email(&credentials.email);
        } else {
            self.store.forget_email();
        }

        tracing::info!(email = %credentials.email, "signed in");
        Ok(())
    }

    /// Clear the local session, then tell the server. A failed sign-out
    /// request does not keep the user signed in.
    pub async fn logout(&self) {
        let token = self.access_token();
        self.clear_session();

        if let Some(token) = token {
            if let Err(err) = self.api.sign_out(&token).await {
                tracing::warn!(error = %err, "sign-out request failed");
            }
        }
        tracing::info!("signed out");
    }

    /// Manually refresh the token pair.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await.map(|_| ())
    }

    /// Refresh after `rejected` got a 401, unless a concurrent caller already
    /// replaced it.
    async fn refresh_after_unauthorized(&self, rejected: &str) -> Result<String, AuthError> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(current) = self.access_token() {
            if current != rejected {
                tracing::debug!("access token already refreshed");
                return Ok(current);
            }
        }
        self.refresh_locked().await
    }

    /// Caller holds `refresh_lock`.
    async fn refresh_locked(&self) -> Result<String, AuthError> {
        let refresh_token = self
            .session()
            .as_ref()
            .map(|session| session.refresh_token().to_string());
        let Some(refresh_token) = refresh_token else {
            self.clear_session();
            return Err(AuthError::NotAuthenticated);
        };

        self.set_status(AuthStatus::Refreshing);

        match self.api.refresh(&refresh_token).await {
            Ok(grant) => {
                let session = Session::from_grant(grant, Utc::now());
                let access_token = session.access_token().to_string();
                if let Err(err) = self.install(session) {
                    self.clear_session();
                    return Err(err);
                }
                tracing::info!("session refreshed");
                Ok(access_token)
            }
            Err(err) => {
                tracing::warn!(error = %err, "session refresh failed; signing out");
                self.clear_session();
                Err(AuthError::RefreshFailed(err))
            }
        }
    }

    /// Run `op` with the current access token. On a 401 the session is
    /// refreshed once and `op` retried; a second 401 signs the user out.
    /// An access token past its expiry is refreshed before use.
    pub async fn with_session<T, F, Fut>(&self, op: F) -> Result<T, AuthError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let (token, stale) = {
            let session = self.session();
            let session = session.as_ref().ok_or(AuthError::NotAuthenticated)?;
            (session.access_token().to_string(), session.is_expired(Utc::now()))
        };

        if stale {
            tracing::debug!("access token expired; refreshing before request");
            let fresh = self.refresh_after_unauthorized(&token).await?;
            return self.retry_with(op, fresh).await;
        }

        match op(token.clone()).await {
            Err(ApiError::Unauthorized) => {}
            other => return other.map_err(AuthError::from),
        }

        let fresh = self.refresh_after_unauthorized(&token).await?;
        self.retry_with(op, fresh).await
    }

    /// Run `op` with a token that was just refreshed. A 401 now is final.
    async fn retry_with<T, F, Fut>(&self, op: F, fresh: String) -> Result<T, AuthError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        match op(fresh).await {
            Err(ApiError::Unauthorized) => {
                tracing::warn!("request rejected with a fresh token; signing out");
                self.clear_session();
                Err(AuthError::NotAuthenticated)
            }
            other => other.map_err(AuthError::from),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Cached reads
    // ─────────────────────────────────────────────────────────────────────

    /// The signed-in user, fetched at most once per session.
    pub async fn current_user(&self) -> Result<Arc<User>, AuthError> {
        if !self.is_authenticated() {
            return Err(AuthError::NotAuthenticated);
        }

        self.users
            .get_or_fetch(&CURRENT_USER, || {
                self.with_session(|token| {
                    let api = Arc::clone(&self.api);
                    async move { api.current_user(&token).await }
                })
            })
            .await
    }

    /// The already-fetched user, if any. Never fetches.
    pub fn cached_user(&self) -> Option<Arc<User>> {
        self.users.peek(&CURRENT_USER)
    }

    /// Render-time context for conditional guards.
    pub fn viewer(&self) -> Viewer {
        Viewer::new(self.cached_user())
    }

    /// Data hook: a resource's payload, shared between all callers.
    pub async fn query(&self, resource: Resource) -> Result<Arc<Value>, AuthError> {
        let path = resource.path();
        self.resources
            .get_or_fetch(&resource.key(), || {
                self.with_session(|token| {
                    let api = Arc::clone(&self.api);
                    async move { api.fetch(path, &token).await }
                })
            })
            .await
    }

    pub async fn query_as<T: DeserializeOwned>(&self, resource: Resource) -> Result<T, AuthError> {
        let value = self.query(resource).await?;
        T::deserialize(value.as_ref())
            .map_err(|e| ApiError::Parse(format!("{}: {e}", resource.path())).into())
    }

    pub fn invalidate(&self, resource: Resource) {
        self.resources.invalidate(&resource.key());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use crate::cookie::{CookieJar, CookieOptions, SESSION_COOKIE, SessionCookieCodec};
    use crate::testing::{FakeApi, context, operator, signed_in};

    #[tokio::test]
    async fn starts_unauthenticated_and_restores_after_reload() {
        let api = FakeApi::new(operator());
        let (ctx, jar) = context(api.clone());
        assert_eq!(ctx.status(), AuthStatus::Unauthenticated);
        assert_eq!(ctx.restore(), AuthStatus::Unauthenticated);

        ctx.login(&Credentials::new("ana@vialyzer.test", "secret"), true).await.unwrap();
        assert!(ctx.is_authenticated());

        // Simulated reload: fresh context over the same cookies.
        let store = SessionStore::new(jar.clone(), SessionCookieCodec::new("test-secret"), false);
        let reloaded = AuthContext::new(api, store);
        assert_eq!(reloaded.restore(), AuthStatus::Authenticated);
        assert_eq!(reloaded.access_token().as_deref(), Some("access-1"));
        assert_eq!(reloaded.remembered_email().as_deref(), Some("ana@vialyzer.test"));
    }

    #[tokio::test]
    async fn bad_credentials_leave_context_signed_out() {
        let api = FakeApi::new(operator());
        let (ctx, jar) = context(api);

        let err = ctx
            .login(&Credentials::new("ana@vialyzer.test", "wrong"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Api(ApiError::Api { status: 400, .. })));
        assert!(!ctx.is_authenticated());
        assert_eq!(jar.get(SESSION_COOKIE), None);
    }

    #[tokio::test]
    async fn refresh_replaces_both_tokens() {
        let api = FakeApi::new(operator());
        let (ctx, jar) = signed_in(api.clone()).await;

        ctx.refresh().await.unwrap();

        let codec = SessionCookieCodec::new("test-secret");
        let persisted = codec.decode(&jar.get(SESSION_COOKIE).unwrap()).unwrap();
        assert_eq!(persisted.access_token(), "access-2");
        assert_eq!(persisted.refresh_token(), "refresh-2");
        assert_eq!(ctx.access_token().as_deref(), Some("access-2"));
        assert_eq!(ctx.status(), AuthStatus::Authenticated);
    }

    #[tokio::test]
    async fn failed_refresh_clears_session() {
        let api = FakeApi::new(operator());
        let (ctx, jar) = signed_in(api.clone()).await;
        api.refresh_ok.store(false, Ordering::SeqCst);

        let err = ctx.refresh().await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshFailed(ApiError::Unauthorized)));
        assert!(err.requires_sign_in());
        assert!(!ctx.is_authenticated());
        assert_eq!(ctx.access_token(), None);
        assert_eq!(jar.get(SESSION_COOKIE), None);

        // Terminal: no automatic retry happened.
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn status_is_refreshing_while_refresh_in_flight() {
        let api = FakeApi::new(operator());
        let (ctx, _jar) = signed_in(api.clone()).await;
        let mut rx = ctx.subscribe();

        // `refresh` is polled first and parks on the network call with the
        // status already published.
        let observe = async {
            rx.changed().await.unwrap();
            *rx.borrow_and_update()
        };
        let (result, during) = tokio::join!(ctx.refresh(), observe);

        result.unwrap();
        assert_eq!(during, AuthStatus::Refreshing);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), AuthStatus::Authenticated);
    }

    #[tokio::test]
    async fn reload_with_expired_access_token_refreshes_instead_of_signing_out() {
        let api = FakeApi::new(operator());
        let (_ctx, jar) = signed_in(api.clone()).await;

        // The cookie outlives the access token.
        let codec = SessionCookieCodec::new("test-secret");
        let mut stale = codec.decode(&jar.get(SESSION_COOKIE).unwrap()).unwrap();
        stale.expires_at = Utc::now() - chrono::Duration::seconds(1);
        jar.set(
            SESSION_COOKIE,
            &codec.encode(&stale).unwrap(),
            CookieOptions::days(7, false),
        );

        let store = SessionStore::new(jar.clone(), codec.clone(), false);
        let reloaded = AuthContext::new(api.clone(), store);
        assert_eq!(reloaded.restore(), AuthStatus::Authenticated);

        let user = reloaded.current_user().await.unwrap();
        assert_eq!(user.email, "ana@vialyzer.test");
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.me_calls.load(Ordering::SeqCst), 1);
        assert_eq!(reloaded.access_token().as_deref(), Some("access-2"));

        let persisted = codec.decode(&jar.get(SESSION_COOKIE).unwrap()).unwrap();
        assert!(!persisted.is_expired(Utc::now()));
    }

    #[tokio::test]
    async fn reload_with_expired_access_token_and_dead_refresh_token_signs_out() {
        let api = FakeApi::new(operator());
        let (_ctx, jar) = signed_in(api.clone()).await;
        api.refresh_ok.store(false, Ordering::SeqCst);

        let codec = SessionCookieCodec::new("test-secret");
        let mut stale = codec.decode(&jar.get(SESSION_COOKIE).unwrap()).unwrap();
        stale.expires_at = Utc::now() - chrono::Duration::seconds(1);
        jar.set(
            SESSION_COOKIE,
            &codec.encode(&stale).unwrap(),
            CookieOptions::days(7, false),
        );

        let reloaded = AuthContext::new(api.clone(), SessionStore::new(jar.clone(), codec, false));
        reloaded.restore();

        let err = reloaded.current_user().await.unwrap_err();
        assert!(err.requires_sign_in());
        assert!(!reloaded.is_authenticated());
        assert_eq!(jar.get(SESSION_COOKIE), None);
    }

    #[tokio::test]
    async fn unauthorized_response_refreshes_and_retries_once() {
        let api = FakeApi::new(operator());
        let (ctx, _jar) = signed_in(api.clone()).await;
        api.expire_access();

        let user = ctx.current_user().await.unwrap();
        assert_eq!(user.email, "ana@vialyzer.test");
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.me_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_unauthorized_requests_share_one_refresh() {
        let api = FakeApi::new(operator());
        let (ctx, _jar) = signed_in(api.clone()).await;
        api.expire_access();

        let (cameras, roles) = tokio::join!(ctx.query(Resource::Cameras), ctx.query(Resource::Roles));
        cameras.unwrap();
        roles.unwrap();
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_fresh_token_signs_out() {
        let api = FakeApi::new(operator());
        let (ctx, _jar) = signed_in(api.clone()).await;
        api.reject_all.store(true, Ordering::SeqCst);

        let err = ctx.current_user().await.unwrap_err();
        assert_eq!(err, AuthError::NotAuthenticated);
        assert!(!ctx.is_authenticated());
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn logout_clears_cached_user_even_if_server_call_fails() {
        let api = FakeApi::new(operator());
        let (ctx, jar) = signed_in(api.clone()).await;
        ctx.current_user().await.unwrap();
        assert!(ctx.cached_user().is_some());

        api.reject_all.store(true, Ordering::SeqCst);
        ctx.logout().await;

        assert!(!ctx.is_authenticated());
        assert!(ctx.cached_user().is_none());
        assert_eq!(jar.get(SESSION_COOKIE), None);
        assert_eq!(api.sign_out_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            ctx.current_user().await.unwrap_err(),
            AuthError::NotAuthenticated
        );
    }

    #[tokio::test]
    async fn query_as_decodes_and_caches_payload() {
        #[derive(Debug, serde::Deserialize)]
        struct Row {
            path: String,
        }

        let api = FakeApi::new(operator());
        let (ctx, _jar) = signed_in(api.clone()).await;

        let rows: Vec<Row> = ctx.query_as(Resource::Cameras).await.unwrap();
        assert_eq!(rows[0].path, "/cameras");
        let _: Vec<Row> = ctx.query_as(Resource::Cameras).await.unwrap();
        assert_eq!(api.fetch_calls.load(Ordering::SeqCst), 1);

        ctx.invalidate(Resource::Cameras);
        let _: Vec<Row> = ctx.query_as(Resource::Cameras).await.unwrap();
        assert_eq!(api.fetch_calls.load(Ordering::SeqCst), 2);
    }
}
