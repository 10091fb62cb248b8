//! Common error types for the client.

use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while building core values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// The identifier was empty or only whitespace.
    #[error("identifier must not be empty")]
    EmptyId,

    /// The identifier contained whitespace or control characters.
    #[error("invalid identifier: {0:?}")]
    InvalidId(String),
}
