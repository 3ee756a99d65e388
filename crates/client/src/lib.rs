//! `vialyzer-client`
//!
//! **Responsibility:** Authentication and authorization core of the Vialyzer
//! dashboard.
//!
//! This crate provides:
//! - The auth context (login, logout, token refresh, 401 interceptor)
//! - Session persistence in a signed cookie
//! - The route guard and conditional-render gates
//! - A shared query cache for the current user and REST resources
//!
//! The browser UI (`frontend`, wasm32 only) is a thin Leptos shell over these
//! types.

use std::sync::Arc;

use anyhow::Context;

pub mod api;
pub mod auth_context;
pub mod config;
pub mod cookie;
pub mod guard;
pub mod query_cache;
pub mod render;
pub mod resources;
pub mod routes;

#[cfg(target_arch = "wasm32")]
pub mod frontend;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiError, AuthApi, HttpAuthApi};
pub use auth_context::{AuthContext, AuthError};
pub use config::{ClientConfig, Environment};
pub use cookie::{CookieJar, MemoryCookieJar, SessionCookieCodec, SessionStore};
pub use guard::{GuardError, Navigation, Redirect, RouteGuard};
pub use render::{Gate, Viewer};
pub use resources::Resource;
pub use routes::AppRoute;

/// Wire the HTTP API and cookie store, then restore any persisted session.
pub fn bootstrap(config: &ClientConfig, jar: Arc<dyn CookieJar>) -> anyhow::Result<Arc<AuthContext>> {
    config.validate().context("invalid client configuration")?;

    let api = HttpAuthApi::new(config).context("failed to build HTTP client")?;
    let store = SessionStore::new(
        jar,
        SessionCookieCodec::new(&config.cookie_secret),
        config.secure_cookies(),
    );

    let ctx = AuthContext::new(Arc::new(api), store);
    let status = ctx.restore();
    tracing::info!(api_url = %config.api_url, ?status, "auth context ready");
    Ok(Arc::new(ctx))
}
