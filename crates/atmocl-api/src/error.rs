//! Error types for the remote control API.

use atmocl_auth::AuthError;
use thiserror::Error;

/// A result type using `ApiError`.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors returned by the remote control API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No valid credentials are held and no login is available to obtain them.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Authentication failed.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// The request could not be sent or the response body could not be read.
    #[error("{endpoint} request failed: {message}")]
    Transport {
        /// Endpoint that was called.
        endpoint: String,
        /// Underlying failure.
        message: String,
    },

    /// The server answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}")]
    Http {
        /// Endpoint that was called.
        endpoint: String,
        /// HTTP status code.
        status: u16,
    },

    /// The response was not a well-formed result envelope.
    #[error("malformed {endpoint} response: {message}")]
    Decode {
        /// Endpoint that was called.
        endpoint: String,
        /// What was wrong with the body.
        message: String,
    },

    /// The server processed the request but did not report success.
    #[error("{operation} was rejected: {detail}")]
    Rejected {
        /// Operation that was rejected.
        operation: &'static str,
        /// Result code and value reported by the server.
        detail: String,
    },

    /// A record was not present in the listing.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of record, e.g. `volume`.
        kind: &'static str,
        /// Identifier or name that was looked up.
        id: String,
    },
}

impl ApiError {
    /// Returns true if this error means the record does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if the failure came from the user's credentials.
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        match self {
            Self::NotAuthenticated => true,
            Self::Auth(e) => e.is_credential_failure(),
            Self::Http { status, .. } => *status == 401,
            _ => false,
        }
    }
}
