//! Identifier types.
//!
//! Volume identifiers are opaque strings issued by the control API
//! (`vol-0000abcd`). The API is inconsistent about their letter casing, so
//! this module owns both the normalization applied before mutating calls and
//! the case-insensitive comparison used when looking a volume up in a listing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Number of leading characters kept verbatim by [`VolumeId::normalized`].
const PREFIX_LEN: usize = 3;

/// Identifier of a remote block-storage volume.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VolumeId(String);

impl VolumeId {
    /// Parse a volume identifier, rejecting empty or whitespace-bearing input.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::EmptyId` for blank input and `CoreError::InvalidId`
    /// when the value contains whitespace or control characters.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(CoreError::EmptyId);
        }
        if trimmed
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(CoreError::InvalidId(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Return the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the identifier in the casing the control API expects for
    /// attach and detach: the first three characters unchanged, the rest
    /// upper-cased. Identifiers of four characters or fewer are returned as is.
    #[must_use]
    pub fn normalized(&self) -> Self {
        if self.0.chars().count() <= 4 {
            return self.clone();
        }
        let split = self
            .0
            .char_indices()
            .nth(PREFIX_LEN)
            .map_or(self.0.len(), |(idx, _)| idx);
        let (head, tail) = self.0.split_at(split);
        Self(format!("{head}{}", tail.to_uppercase()))
    }

    /// Compare two identifiers ignoring ASCII case.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl fmt::Debug for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VolumeId({})", self.0)
    }
}

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for VolumeId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for VolumeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
