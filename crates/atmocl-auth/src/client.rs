//! Client for the Atmosphere authentication endpoint.
//!
//! Authentication is a single `GET` carrying the username and password in
//! `X-Auth-User`/`X-Auth-Key` headers. A successful answer has an empty body;
//! the token and the API server URL come back as response headers.

use std::time::Duration;

use chrono::Utc;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use tracing::{debug, instrument};

use crate::credentials::CredentialSet;
use crate::error::{AuthError, Result};
use crate::AuthConfig;

const HEADER_USER: &str = "X-Auth-User";
const HEADER_KEY: &str = "X-Auth-Key";
const HEADER_TOKEN: &str = "X-Auth-Token";
const HEADER_SERVER: &str = "X-Server-Management-Url";

/// Client for exchanging a username and password for a [`CredentialSet`].
pub struct AuthClient {
    config: AuthConfig,
    client: reqwest::Client,
}

impl AuthClient {
    /// Create a new authentication client.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created (should never happen with rustls).
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()
            .expect("failed to create HTTP client");

        Self { config, client }
    }

    /// The configuration this client was built with.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Authenticate and build a fresh credential set issued now.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The server answers 401 or 403 (`InvalidCredentials`)
    /// - The server answers any other non-success status (`Http`)
    /// - The request cannot be sent (`Transport`)
    /// - The token or server URL header is absent (`MissingHeader`)
    #[instrument(skip(self, password), fields(url = %self.config.auth_url))]
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<CredentialSet> {
        let response = self
            .client
            .get(&self.config.auth_url)
            .header(HEADER_USER, username)
            .header(HEADER_KEY, password)
            .header(reqwest::header::ACCEPT, "text/plain")
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = response.status();
        match status {
            s if s.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(AuthError::InvalidCredentials)
            }
            other => {
                return Err(AuthError::Http {
                    status: other.as_u16(),
                })
            }
        }

        let headers = response.headers();
        let token = required_header(headers, HEADER_TOKEN)?;
        let server_url = required_header(headers, HEADER_SERVER)?;

        debug!(server = %server_url, "authenticated");

        Ok(CredentialSet {
            server_url,
            token,
            username: username.to_string(),
            api_version: self.config.api_version.clone(),
            issued_at: Utc::now(),
        })
    }
}

fn required_header(headers: &HeaderMap, name: &'static str) -> Result<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
        .ok_or(AuthError::MissingHeader(name))
}
