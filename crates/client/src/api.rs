//! REST collaborator: the endpoints the auth core consumes.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;

use vialyzer_auth::{Credentials, TokenGrant, User};
use vialyzer_core::{DomainError, Envelope};

use crate::config::ClientConfig;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// HTTP 401. Drives the refresh interceptor.
    #[error("unauthorized")]
    Unauthorized,
    #[error("network error: {0}")]
    Network(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error(transparent)]
    Envelope(#[from] DomainError),
}

/// Auth and resource endpoints, as seen by the client.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait AuthApi: Send + Sync {
    async fn sign_in(&self, credentials: &Credentials) -> Result<TokenGrant, ApiError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), ApiError>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ApiError>;

    async fn current_user(&self, access_token: &str) -> Result<User, ApiError>;

    /// GET a resource path and return the envelope payload.
    async fn fetch(&self, path: &str, access_token: &str) -> Result<Value, ApiError>;
}

/// `reqwest`-backed implementation.
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAuthApi {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let builder = reqwest::Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(config.request_timeout);
        let client = builder
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            base_url: config.api_url.clone(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn network(err: reqwest::Error) -> ApiError {
    ApiError::Network(err.to_string())
}

/// Map status + envelope to a payload or an `ApiError`.
async fn read_envelope<T: DeserializeOwned>(resp: reqwest::Response, what: &str) -> Result<T, ApiError> {
    let status = resp.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }

    let body = resp.text().await.map_err(network)?;

    if !status.is_success() {
        let message = serde_json::from_str::<Envelope<Value>>(&body)
            .map(|env| env.failure_message())
            .unwrap_or(body);
        return Err(ApiError::Api {
            status: status.as_u16(),
            message,
        });
    }

    let envelope: Envelope<T> =
        serde_json::from_str(&body).map_err(|e| ApiError::Parse(format!("{what}: {e}")))?;
    Ok(envelope.into_payload(what)?)
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl AuthApi for HttpAuthApi {
    async fn sign_in(&self, credentials: &Credentials) -> Result<TokenGrant, ApiError> {
        let resp = self
            .client
            .post(self.url("/auth/sign-in"))
            .json(credentials)
            .send()
            .await
            .map_err(network)?;
        read_envelope(resp, "sign-in tokens").await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), ApiError> {
        let resp = self
            .client
            .post(self.url("/auth/sign-out"))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(network)?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ApiError> {
        let resp = self
            .client
            .post(self.url("/auth/refresh"))
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await
            .map_err(network)?;
        read_envelope(resp, "refreshed tokens").await
    }

    async fn current_user(&self, access_token: &str) -> Result<User, ApiError> {
        let resp = self
            .client
            .get(self.url("/auth/me"))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(network)?;
        read_envelope(resp, "current user").await
    }

    async fn fetch(&self, path: &str, access_token: &str) -> Result<Value, ApiError> {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(network)?;
        read_envelope(resp, path).await
    }
}
