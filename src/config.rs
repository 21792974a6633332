//! Process-level settings for Graph access.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{GraphError, Result};

/// Microsoft Graph v1.0 endpoint.
pub const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Microsoft identity platform host.
pub const AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Default location of the on-disk token cache.
pub const DEFAULT_TOKEN_CACHE_PATH: &str = ".cache/token_cache.json";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// How the authenticator obtains a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Sign in as a user with the device-code flow.
    Device,
    /// Sign in as the application with a client secret.
    Confidential,
}

impl AuthMode {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "device" => Ok(AuthMode::Device),
            "confidential" => Ok(AuthMode::Confidential),
            other => Err(GraphError::Configuration(format!(
                "AUTH_MODE must be 'device' or 'confidential', got '{}'",
                other
            ))),
        }
    }
}

/// Settings constructed once at startup and passed to every component.
#[derive(Clone)]
pub struct Settings {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub auth_mode: AuthMode,
    pub graph_base: String,
    pub authority_host: String,
    pub token_cache_path: PathBuf,
    pub http_timeout: Duration,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let tenant_id = non_empty("TENANT_ID");
        let client_id = non_empty("CLIENT_ID");
        let (tenant_id, client_id) = match (tenant_id, client_id) {
            (Some(t), Some(c)) => (t, c),
            _ => {
                return Err(GraphError::Configuration(
                    "TENANT_ID and CLIENT_ID must be set".to_string(),
                ))
            }
        };

        let auth_mode = match non_empty("AUTH_MODE") {
            Some(mode) => AuthMode::parse(&mode)?,
            None => AuthMode::Device,
        };

        let client_secret = non_empty("CLIENT_SECRET");
        if auth_mode == AuthMode::Confidential && client_secret.is_none() {
            return Err(GraphError::Configuration(
                "CLIENT_SECRET is required for confidential auth".to_string(),
            ));
        }

        let http_timeout = match non_empty("HTTP_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(GraphError::Configuration(format!(
                        "HTTP_TIMEOUT_SECS must be a positive integer, got '{}'",
                        raw
                    )))
                }
            },
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        Ok(Self {
            tenant_id,
            client_id,
            client_secret,
            auth_mode,
            graph_base: non_empty("GRAPH_BASE_URL")
                .unwrap_or_else(|| GRAPH_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            authority_host: non_empty("AUTHORITY_HOST")
                .unwrap_or_else(|| AUTHORITY_HOST.to_string())
                .trim_end_matches('/')
                .to_string(),
            token_cache_path: non_empty("TOKEN_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_CACHE_PATH)),
            http_timeout,
        })
    }

    /// Tenant-scoped authority URL.
    pub fn authority(&self) -> String {
        format!("{}/{}", self.authority_host, self.tenant_id)
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("auth_mode", &self.auth_mode)
            .field("graph_base", &self.graph_base)
            .field("authority_host", &self.authority_host)
            .field("token_cache_path", &self.token_cache_path)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}
