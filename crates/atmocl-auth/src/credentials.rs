//! The Credential Set attached to every control API call.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::error::{AuthError, Result};

/// How long a credential set stays valid after issuance.
pub const CREDENTIAL_VALIDITY_HOURS: i64 = 24;

/// Credentials obtained from the authentication endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialSet {
    /// Base URL of the API server (from `X-Server-Management-Url`).
    pub server_url: String,
    /// Session token (from `X-Auth-Token`).
    pub token: String,
    /// The authenticated username.
    pub username: String,
    /// API version sent as `X-Api-Version`.
    pub api_version: String,
    /// When the credentials were issued.
    pub issued_at: DateTime<Utc>,
}

impl CredentialSet {
    fn expires_at(&self) -> DateTime<Utc> {
        self.issued_at + Duration::hours(CREDENTIAL_VALIDITY_HOURS)
    }

    /// Returns true if the credentials are still inside their validity window at `now`.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at()
    }

    /// Serialize to the five-line cache format:
    /// issuance epoch-millis, server URL, token, username, API version.
    #[must_use]
    pub fn to_cache_text(&self) -> String {
        format!(
            "{}\n{}\n{}\n{}\n{}\n",
            self.issued_at.timestamp_millis(),
            self.server_url,
            self.token,
            self.username,
            self.api_version
        )
    }

    /// Parse the five-line cache format.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::CacheCorrupt` if a line is missing, blank, or the
    /// timestamp is not a valid epoch in milliseconds.
    pub fn from_cache_text(text: &str) -> Result<Self> {
        let mut lines = text.lines().map(str::trim);
        let mut next = |field: &str| {
            lines
                .next()
                .filter(|line| !line.is_empty())
                .map(ToString::to_string)
                .ok_or_else(|| AuthError::CacheCorrupt(format!("missing {field}")))
        };

        let millis_text = next("issuance time")?;
        let server_url = next("server URL")?;
        let token = next("token")?;
        let username = next("username")?;
        let api_version = next("API version")?;

        let millis: i64 = millis_text
            .parse()
            .map_err(|_| AuthError::CacheCorrupt(format!("bad issuance time {millis_text:?}")))?;
        let issued_at = Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| AuthError::CacheCorrupt(format!("issuance time out of range: {millis}")))?;

        Ok(Self {
            server_url,
            token,
            username,
            api_version,
            issued_at,
        })
    }
}

impl std::fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSet")
            .field("server_url", &self.server_url)
            .field("token", &"<redacted>")
            .field("username", &self.username)
            .field("api_version", &self.api_version)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}
