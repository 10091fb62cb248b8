//! Remote control API client for the Atmosphere command-line client.
//!
//! This crate provides:
//!
//! - **Contract**: the [`AtmoApi`] trait covering volumes, instances, images and apps
//! - **HTTP client**: [`HttpAtmoClient`], which attaches the session's credentials
//!   to every call and authenticates on demand
//! - **Session**: [`Session`], holding credentials and the cached volume
//!   listing; any mutating call invalidates the listing
//! - **Envelope**: decoding of the `{ "result": { "code", "value" } }` wrapper
//!
//! Every failure is an [`ApiError`]; a non-success status or malformed body
//! never produces a partial record.
//!
//! # Testing
//!
//! Enable the `test-utils` feature for [`MockAtmoApi`], an in-memory API with
//! scripted volume listings.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod envelope;
pub mod error;
pub mod requests;
pub mod session;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use client::{find_volume, AtmoApi, HttpAtmoClient};
pub use envelope::ResultBody;
pub use error::{ApiError, Result};
pub use requests::{CreateVolumeRequest, LaunchInstanceRequest};
pub use session::Session;

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{MockAtmoApi, MockCall};

use serde::Deserialize;

/// Configuration for the control API client.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Request timeout in seconds.
    #[serde(default = "ApiConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Connect timeout in seconds.
    #[serde(default = "ApiConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl ApiConfig {
    const fn default_request_timeout() -> u64 {
        60
    }

    const fn default_connect_timeout() -> u64 {
        10
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: Self::default_request_timeout(),
            connect_timeout_seconds: Self::default_connect_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.request_timeout_seconds, 60);
        assert_eq!(config.connect_timeout_seconds, 10);
    }
}
