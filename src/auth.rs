//! Token acquisition against the Microsoft identity platform.

use std::time::{Duration, Instant};

use chrono::Utc;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::{AuthMode, Settings};
use crate::error::{GraphError, Result};
use crate::models::{DeviceCodeResponse, OAuthErrorResponse, TokenResponse};
use crate::token_cache::{CachedAccount, TokenCache};

/// Delegated Graph permissions requested for a signed-in user.
pub const DELEGATED_SCOPES: [&str; 2] = ["Files.Read", "Sites.Read.All"];

/// Scopes that yield a refresh token and an id token alongside the access token.
const SESSION_SCOPES: [&str; 3] = ["offline_access", "openid", "profile"];

/// Application permission scope for the client-credential flow.
const APP_SCOPE: &str = "https://graph.microsoft.com/.default";

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Cached access tokens are reused only if they outlive this margin.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Extra poll delay after a `slow_down` answer (RFC 8628 §3.5).
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// Account claims read from the id token.
#[derive(Debug, Deserialize)]
struct IdClaims {
    preferred_username: Option<String>,
    oid: Option<String>,
}

/// Outcome of one poll of the token endpoint during the device flow.
enum Poll {
    Issued(TokenResponse),
    Pending,
    SlowDown,
}

/// Authenticator for Microsoft Graph.
#[derive(Clone)]
pub struct Authenticator {
    settings: Settings,
    http: Client,
}

impl Authenticator {
    /// Create a new authenticator from settings.
    pub fn new(settings: &Settings) -> Result<Self> {
        let http = Client::builder().timeout(settings.http_timeout).build()?;
        Ok(Self {
            settings: settings.clone(),
            http,
        })
    }

    /// Get a bearer token for Graph using the configured mode.
    pub async fn acquire(&self) -> Result<String> {
        match self.settings.auth_mode {
            AuthMode::Device => self.acquire_delegated().await,
            AuthMode::Confidential => self.acquire_for_client().await,
        }
    }

    /// Silent reuse from the cache, then refresh, then the device-code flow.
    async fn acquire_delegated(&self) -> Result<String> {
        let cache_path = &self.settings.token_cache_path;
        let mut cache = TokenCache::load(cache_path);

        let cached = cache
            .find(&self.settings.tenant_id, &self.settings.client_id)
            .map(|(key, account)| (key.to_string(), account.clone()));

        if let Some((key, account)) = cached {
            if account.is_fresh(chrono::Duration::seconds(EXPIRY_MARGIN_SECS)) {
                debug!(account = %key, "using cached access token");
                return Ok(account.access_token);
            }

            if let Some(refresh_token) = account.refresh_token.as_deref() {
                match self.redeem_refresh_token(refresh_token).await {
                    Ok(response) => {
                        info!(account = %key, "refreshed access token");
                        return Ok(self.remember(&mut cache, Some(&key), response, Some(refresh_token)));
                    }
                    Err(e) => warn!(account = %key, "token refresh failed, signing in again: {}", e),
                }
            }
        }

        let response = self.device_flow().await?;
        Ok(self.remember(&mut cache, None, response, None))
    }

    /// Store a delegated token in the cache and return its access token.
    fn remember(
        &self,
        cache: &mut TokenCache,
        previous_key: Option<&str>,
        response: TokenResponse,
        previous_refresh: Option<&str>,
    ) -> String {
        let key = response
            .id_token
            .as_deref()
            .and_then(account_from_id_token)
            .or_else(|| previous_key.map(str::to_string))
            .unwrap_or_else(|| format!("{}:{}", self.settings.tenant_id, self.settings.client_id));

        let scopes = match response.scope.as_deref() {
            Some(granted) => granted.split_whitespace().map(str::to_string).collect(),
            None => DELEGATED_SCOPES.iter().map(|s| s.to_string()).collect(),
        };

        let lifetime = response.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        let account = CachedAccount {
            tenant_id: self.settings.tenant_id.clone(),
            client_id: self.settings.client_id.clone(),
            access_token: response.access_token.clone(),
            refresh_token: response
                .refresh_token
                .or_else(|| previous_refresh.map(str::to_string)),
            expires_at: Utc::now() + chrono::Duration::seconds(lifetime),
            scopes,
        };
        cache.upsert(key, account);

        // Not fatal for this run
        if let Err(e) = cache.save(&self.settings.token_cache_path) {
            warn!("failed to save token cache: {}", e);
        }

        response.access_token
    }

    /// Exchange the client secret for an application token.
    async fn acquire_for_client(&self) -> Result<String> {
        let secret = self.settings.client_secret.as_deref().ok_or_else(|| {
            GraphError::Configuration("CLIENT_SECRET is required for confidential auth".to_string())
        })?;

        info!("requesting application token");
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", secret),
            ("scope", APP_SCOPE),
        ];

        match self.request_token(&params).await? {
            Ok(token) => Ok(token.access_token),
            Err(err) => Err(GraphError::Authentication(err.describe())),
        }
    }

    async fn redeem_refresh_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        let scope = delegated_scope_string();
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.settings.client_id.as_str()),
            ("refresh_token", refresh_token),
            ("scope", scope.as_str()),
        ];

        match self.request_token(&params).await? {
            Ok(token) => Ok(token),
            Err(err) => Err(GraphError::Authentication(err.describe())),
        }
    }

    /// Run the device-code flow to completion.
    ///
    /// Prints the sign-in instructions to stderr and blocks until the user
    /// finishes, declines, or the code expires.
    async fn device_flow(&self) -> Result<TokenResponse> {
        let device = self.request_device_code().await?;

        eprintln!("\n== Sign in required ==");
        match device.message.as_deref() {
            Some(message) => eprintln!("{}", message),
            None => eprintln!(
                "To sign in, open {} and enter the code {}",
                device.verification_uri, device.user_code
            ),
        }

        let deadline = Instant::now() + Duration::from_secs(device.expires_in);
        let mut interval = Duration::from_secs(device.interval);

        loop {
            tokio::time::sleep(interval).await;

            if Instant::now() >= deadline {
                return Err(GraphError::Authentication(
                    "device code expired before sign-in completed".to_string(),
                ));
            }

            match self.poll_device_token(&device.device_code).await? {
                Poll::Issued(token) => {
                    info!("device sign-in completed");
                    return Ok(token);
                }
                Poll::Pending => debug!("authorization pending"),
                Poll::SlowDown => {
                    interval += SLOW_DOWN_STEP;
                    debug!("slowing down device polling to {:?}", interval);
                }
            }
        }
    }

    async fn request_device_code(&self) -> Result<DeviceCodeResponse> {
        let scope = delegated_scope_string();
        let response = self
            .http
            .post(format!("{}/oauth2/v2.0/devicecode", self.settings.authority()))
            .form(&[
                ("client_id", self.settings.client_id.as_str()),
                ("scope", scope.as_str()),
            ])
            .send()
            .await
            .map_err(|e| GraphError::Authentication(format!("device code request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            let detail = serde_json::from_str::<OAuthErrorResponse>(&body)
                .map(|e| e.describe())
                .unwrap_or(body);
            return Err(GraphError::Authentication(format!(
                "could not start device code flow, check TENANT_ID/CLIENT_ID: {}",
                detail
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            GraphError::Authentication(format!("invalid device code response: {}", e))
        })
    }

    async fn poll_device_token(&self, device_code: &str) -> Result<Poll> {
        let params = [
            ("grant_type", DEVICE_CODE_GRANT),
            ("client_id", self.settings.client_id.as_str()),
            ("device_code", device_code),
        ];

        match self.request_token(&params).await? {
            Ok(token) => Ok(Poll::Issued(token)),
            Err(err) => match err.error.as_str() {
                "authorization_pending" => Ok(Poll::Pending),
                "slow_down" => Ok(Poll::SlowDown),
                _ => Err(GraphError::Authentication(err.describe())),
            },
        }
    }

    /// POST a form to the token endpoint.
    ///
    /// The inner `Err` is an OAuth error answer the caller may act on.
    async fn request_token(
        &self,
        params: &[(&str, &str)],
    ) -> Result<std::result::Result<TokenResponse, OAuthErrorResponse>> {
        let response = self
            .http
            .post(format!("{}/oauth2/v2.0/token", self.settings.authority()))
            .form(params)
            .send()
            .await
            .map_err(|e| GraphError::Authentication(format!("token request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            let token = serde_json::from_str(&body).map_err(|e| {
                GraphError::Authentication(format!("invalid token response: {}", e))
            })?;
            return Ok(Ok(token));
        }

        match serde_json::from_str::<OAuthErrorResponse>(&body) {
            Ok(err) => Ok(Err(err)),
            Err(_) => Err(GraphError::Authentication(format!(
                "token endpoint returned {}: {}",
                status, body
            ))),
        }
    }
}

fn delegated_scope_string() -> String {
    DELEGATED_SCOPES
        .iter()
        .chain(SESSION_SCOPES.iter())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Account key from an id token, read without signature validation.
fn account_from_id_token(id_token: &str) -> Option<String> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<IdClaims>(id_token, &DecodingKey::from_secret(&[]), &validation).ok()?;
    data.claims.preferred_username.or(data.claims.oid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn id_token(claims: serde_json::Value) -> String {
        encode(&Header::default(), &claims, &EncodingKey::from_secret(b"test")).unwrap()
    }

    #[test]
    fn test_scope_string() {
        assert_eq!(
            delegated_scope_string(),
            "Files.Read Sites.Read.All offline_access openid profile"
        );
    }

    #[test]
    fn test_account_from_id_token() {
        let token = id_token(json!({
            "preferred_username": "jane@contoso.com",
            "oid": "00000000-0000-0000-0000-000000000001",
            "aud": "client",
            "exp": 1
        }));
        assert_eq!(
            account_from_id_token(&token).as_deref(),
            Some("jane@contoso.com")
        );
    }

    #[test]
    fn test_account_falls_back_to_oid() {
        let token = id_token(json!({"oid": "abc"}));
        assert_eq!(account_from_id_token(&token).as_deref(), Some("abc"));
    }

    #[test]
    fn test_account_from_garbage() {
        assert!(account_from_id_token("not-a-jwt").is_none());
    }
}
