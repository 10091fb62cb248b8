//! Authentication for the Atmosphere command-line client.
//!
//! This crate owns the Credential Set and its two sources:
//!
//! - The authentication endpoint, contacted with `X-Auth-User`/`X-Auth-Key`
//!   headers and answering with a token and the API server URL
//! - A flat cache file in the user's home directory, valid for 24 hours
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   cached?   ┌──────────────────┐
//! │   CLI bootstrap  │────────────▶│ CredentialCache  │  ~/.atmocl
//! └────────┬─────────┘             └──────────────────┘
//!          │ expired / missing / other user
//!          ▼
//! ┌──────────────────┐   HTTPS     ┌──────────────────┐
//! │   AuthClient     │────────────▶│  /auth endpoint  │
//! └────────┬─────────┘             └──────────────────┘
//!          ▼
//!    CredentialSet ──▶ attached to every API call
//! ```
//!
//! # Example
//!
//! ```no_run
//! use atmocl_auth::{AuthClient, AuthConfig, CredentialCache};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = CredentialCache::at_home()?;
//! let credentials = match cache.load(Some("esteve"), chrono::Utc::now()).await? {
//!     Some(credentials) => credentials,
//!     None => {
//!         let client = AuthClient::new(AuthConfig::default());
//!         let credentials = client.authenticate("esteve", "secret").await?;
//!         cache.store(&credentials).await?;
//!         credentials
//!     }
//! };
//! println!("token for {}", credentials.username);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cache;
pub mod client;
pub mod credentials;
pub mod error;

pub use cache::CredentialCache;
pub use client::AuthClient;
pub use credentials::{CredentialSet, CREDENTIAL_VALIDITY_HOURS};
pub use error::{AuthError, Result};

use serde::Deserialize;

/// Configuration for the authentication endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Full URL of the authentication endpoint.
    #[serde(default = "AuthConfig::default_auth_url")]
    pub auth_url: String,
    /// API version sent with every call after authentication.
    #[serde(default = "AuthConfig::default_api_version")]
    pub api_version: String,
    /// User agent reported to the server.
    #[serde(default = "AuthConfig::default_user_agent")]
    pub user_agent: String,
    /// Request timeout in seconds.
    #[serde(default = "AuthConfig::default_timeout")]
    pub request_timeout_seconds: u64,
}

impl AuthConfig {
    fn default_auth_url() -> String {
        "https://atmo-beta.iplantcollaborative.org:443/auth".to_string()
    }

    fn default_api_version() -> String {
        "v1".to_string()
    }

    fn default_user_agent() -> String {
        format!("atmocl/{}", env!("CARGO_PKG_VERSION"))
    }

    const fn default_timeout() -> u64 {
        30
    }

    /// Create a configuration pointing at a different endpoint.
    #[must_use]
    pub fn with_url(auth_url: impl Into<String>) -> Self {
        Self {
            auth_url: auth_url.into(),
            ..Self::default()
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            auth_url: Self::default_auth_url(),
            api_version: Self::default_api_version(),
            user_agent: Self::default_user_agent(),
            request_timeout_seconds: Self::default_timeout(),
        }
    }
}
