//! Authentication error types.

use thiserror::Error;

/// A result type using `AuthError`.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur during authentication or while handling the
/// credential cache.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The server rejected the username/password pair.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The authentication endpoint answered with an unexpected status.
    #[error("authentication endpoint returned HTTP {status}")]
    Http {
        /// The HTTP status code.
        status: u16,
    },

    /// The request could not be sent or the response could not be read.
    #[error("authentication request failed: {0}")]
    Transport(String),

    /// A required response header was missing or not valid text.
    #[error("authentication response is missing header {0}")]
    MissingHeader(&'static str),

    /// The home directory could not be determined.
    #[error("could not determine the home directory for the credential cache")]
    NoHomeDirectory,

    /// Reading or writing the credential cache failed.
    #[error("credential cache I/O error: {0}")]
    CacheIo(#[from] std::io::Error),

    /// The credential cache exists but is not in the expected format.
    #[error("credential cache is malformed: {0}")]
    CacheCorrupt(String),
}

impl AuthError {
    /// Returns `true` if the failure came from the user's credentials rather
    /// than from the network or the local cache.
    #[must_use]
    pub const fn is_credential_failure(&self) -> bool {
        matches!(self, Self::InvalidCredentials)
    }
}
