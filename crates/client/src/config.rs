//! Client configuration (API location, cookie signing, timeouts).

use std::time::Duration;

use anyhow::{Context, bail};

pub const ENV_API_URL: &str = "VIALYZER_API_URL";
pub const ENV_COOKIE_SECRET: &str = "VIALYZER_COOKIE_SECRET";
pub const ENV_ENVIRONMENT: &str = "VIALYZER_ENV";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "VIALYZER_HTTP_TIMEOUT_SECS";

const DEFAULT_API_URL: &str = "http://localhost:3000/api";
const DEV_COOKIE_SECRET: &str = "vialyzer-dev-cookie-secret-not-for-production";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const MIN_PRODUCTION_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl core::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => bail!("unknown environment '{other}' (expected development or production)"),
        }
    }
}

#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the REST API, without trailing slash.
    pub api_url: String,
    /// Key for the session cookie signature.
    pub cookie_secret: String,
    pub environment: Environment,
    /// Per-request timeout (native builds only; browsers apply their own).
    pub request_timeout: Duration,
}

impl core::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_url", &self.api_url)
            .field("cookie_secret", &"<redacted>")
            .field("environment", &self.environment)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl ClientConfig {
    /// Development configuration pointing at `api_url`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            cookie_secret: DEV_COOKIE_SECRET.to_string(),
            environment: Environment::Development,
            request_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration from values baked in at compile time (browser builds
    /// have no process environment).
    pub fn from_build_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| {
            let value = match key {
                ENV_API_URL => option_env!("VIALYZER_API_URL"),
                ENV_COOKIE_SECRET => option_env!("VIALYZER_COOKIE_SECRET"),
                ENV_ENVIRONMENT => option_env!("VIALYZER_ENV"),
                ENV_HTTP_TIMEOUT_SECS => option_env!("VIALYZER_HTTP_TIMEOUT_SECS"),
                _ => None,
            };
            value.map(str::to_string)
        })
    }

    /// Build from an arbitrary key lookup; unset keys fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::new(lookup(ENV_API_URL).unwrap_or_else(|| DEFAULT_API_URL.to_string()));

        if let Some(env) = lookup(ENV_ENVIRONMENT) {
            config.environment = env
                .parse()
                .with_context(|| format!("invalid {ENV_ENVIRONMENT}"))?;
        }

        if let Some(secs) = lookup(ENV_HTTP_TIMEOUT_SECS) {
            let secs: u64 = secs
                .trim()
                .parse()
                .with_context(|| format!("{ENV_HTTP_TIMEOUT_SECS} must be a whole number of seconds"))?;
            config.request_timeout = Duration::from_secs(secs);
        }

        match lookup(ENV_COOKIE_SECRET) {
            Some(secret) => config.cookie_secret = secret,
            None if config.environment == Environment::Production => {
                bail!("{ENV_COOKIE_SECRET} must be set in production");
            }
            None => {
                tracing::warn!("{ENV_COOKIE_SECRET} not set; using insecure dev default");
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            bail!("API URL must be http(s), got '{}'", self.api_url);
        }
        if self.cookie_secret.is_empty() {
            bail!("cookie secret must not be empty");
        }
        if self.environment == Environment::Production {
            if self.cookie_secret.len() < MIN_PRODUCTION_SECRET_LEN {
                bail!("cookie secret must be at least {MIN_PRODUCTION_SECRET_LEN} bytes in production");
            }
            if self.cookie_secret == DEV_COOKIE_SECRET {
                bail!("the development cookie secret cannot be used in production");
            }
        }
        Ok(())
    }

    /// Cookies carry `Secure` in production.
    pub fn secure_cookies(&self) -> bool {
        self.environment == Environment::Production
    }
}
