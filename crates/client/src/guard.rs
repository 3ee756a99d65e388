//! Route guard: authentication and authorization before navigation.
//!
//! The decision is made before anything renders. Unauthenticated
//! navigations go to sign-in and unauthorized ones go home, both replacing
//! history. Fetch failures are errors, not redirects.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use vialyzer_auth::{Requirement, User, explain};

use crate::api::ApiError;
use crate::auth_context::{AuthContext, AuthError};
use crate::routes::AppRoute;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redirect {
    pub to: AppRoute,
    pub replace: bool,
}

impl Redirect {
    pub fn replacing(to: AppRoute) -> Self {
        Self { to, replace: true }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Navigation {
    /// Render the route. Carries the user for guarded routes.
    Allow(Option<Arc<User>>),
    Redirect(Redirect),
    /// A newer navigation started before this one was decided.
    Abandoned,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("could not load the current user: {0}")]
    Fetch(ApiError),
    #[error("session error: {0}")]
    Session(String),
}

pub struct RouteGuard {
    ctx: Arc<AuthContext>,
    generation: AtomicU64,
}

impl RouteGuard {
    pub fn new(ctx: Arc<AuthContext>) -> Self {
        Self {
            ctx,
            generation: AtomicU64::new(0),
        }
    }

    pub fn context(&self) -> &Arc<AuthContext> {
        &self.ctx
    }

    /// Guard a navigation to one of the dashboard routes.
    pub async fn navigate(&self, route: AppRoute) -> Result<Navigation, GuardError> {
        match route.requirement() {
            None => {
                self.generation.fetch_add(1, Ordering::SeqCst);
                Ok(Navigation::Allow(None))
            }
            Some(requirement) => self.check(Some(&requirement)).await,
        }
    }

    /// Guard entry into an authenticated segment, optionally requiring more
    /// than a signed-in user.
    pub async fn check(&self, requirement: Option<&Requirement>) -> Result<Navigation, GuardError> {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let outcome = self.decide(requirement).await;

        if self.generation.load(Ordering::SeqCst) != ticket {
            tracing::debug!(ticket, "navigation superseded");
            return Ok(Navigation::Abandoned);
        }
        outcome
    }

    async fn decide(&self, requirement: Option<&Requirement>) -> Result<Navigation, GuardError> {
        if !self.ctx.is_authenticated() {
            tracing::debug!("not authenticated; redirecting to sign-in");
            return Ok(Navigation::Redirect(Redirect::replacing(AppRoute::SIGN_IN)));
        }

        let fetched = self.ctx.current_user().await;

        // The session may have ended while the fetch was in flight.
        if !self.ctx.is_authenticated() {
            tracing::debug!("signed out during navigation; redirecting to sign-in");
            return Ok(Navigation::Redirect(Redirect::replacing(AppRoute::SIGN_IN)));
        }

        let user = match fetched {
            Ok(user) => user,
            Err(err) if err.requires_sign_in() => {
                tracing::debug!(error = %err, "session lost; redirecting to sign-in");
                return Ok(Navigation::Redirect(Redirect::replacing(AppRoute::SIGN_IN)));
            }
            Err(AuthError::Api(err)) => return Err(GuardError::Fetch(err)),
            Err(err) => return Err(GuardError::Session(err.to_string())),
        };

        if let Some(requirement) = requirement {
            if !requirement.is_satisfied_by(Some(&user)) {
                let explanation = explain(requirement, Some(&user));
                tracing::debug!(
                    requirement = %requirement,
                    reason = %explanation.reason,
                    missing = ?explanation.missing,
                    "navigation denied"
                );
                return Ok(Navigation::Redirect(Redirect::replacing(AppRoute::FALLBACK)));
            }
        }

        Ok(Navigation::Allow(Some(user)))
    }
}
