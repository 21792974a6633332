//! Authenticated Microsoft Graph HTTP client.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::auth::Authenticator;
use crate::config::Settings;
use crate::error::{GraphError, Result};
use crate::models::User;

/// Client for Microsoft Graph requests with a fixed bearer token.
pub struct GraphClient {
    base: String,
    token: String,
    http: Client,
}

impl GraphClient {
    /// Create a new GraphClient.
    ///
    /// # Arguments
    /// * `base` - API base URL, e.g. `https://graph.microsoft.com/v1.0`
    /// * `token` - Bearer access token
    /// * `timeout` - Per-request timeout
    pub fn new(base: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base: base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            http,
        })
    }

    /// Acquire a token with the configured mode and build a client for it.
    pub async fn connect(settings: &Settings) -> Result<Self> {
        let token = Authenticator::new(settings)?.acquire().await?;
        Self::new(settings.graph_base.clone(), token, settings.http_timeout)
    }

    /// The API base URL.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Resolve a path against the base. Absolute URLs pass through.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    /// Strip the base prefix from an absolute link returned by the API.
    ///
    /// Links outside the base are returned unchanged and later used verbatim.
    pub fn relative_to_base<'a>(&self, link: &'a str) -> &'a str {
        match link.strip_prefix(self.base.as_str()) {
            Some(rest) => rest.trim_start_matches('/'),
            None => link,
        }
    }

    /// GET `path` and return the parsed JSON body.
    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        self.get_json(path, query).await
    }

    /// POST an optional JSON body to `path` and return the parsed JSON body.
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: Option<&B>) -> Result<Value> {
        self.post_json(path, body).await
    }

    /// GET `path` and deserialize the body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = self.url_for(path);
        debug!(method = "GET", %url, "graph request");

        let mut request = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, "application/json");

        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request.send().await?;
        Self::parse(response).await
    }

    /// POST an optional JSON body to `path` and deserialize the response.
    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<T> {
        let url = self.url_for(path);
        debug!(method = "POST", %url, "graph request");

        let mut request = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, "application/json");

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        Self::parse(response).await
    }

    /// Fetch the signed-in principal.
    pub async fn me(&self) -> Result<User> {
        self.get_json("me", &[]).await
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(GraphError::Http {
                status: status.as_u16(),
                body,
            });
        }

        // Some endpoints answer 204 with no body
        if body.trim().is_empty() {
            return Ok(serde_json::from_value(Value::Null)?);
        }

        Ok(serde_json::from_str(&body)?)
    }
}
