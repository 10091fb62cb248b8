//! Per-client session: the current credentials and the last fetched volume listing.

use atmocl_auth::CredentialSet;
use atmocl_core::Volume;
use chrono::{DateTime, Utc};

/// Mutable state held by one API client.
///
/// The volume listing is cached after every fetch and dropped by
/// [`Session::invalidate`] whenever a mutating call is issued, so the next
/// read goes back to the server.
#[derive(Debug, Default)]
pub struct Session {
    credentials: Option<CredentialSet>,
    volumes: Option<Vec<Volume>>,
}

impl Session {
    /// Start a session with already obtained credentials.
    #[must_use]
    pub fn with_credentials(credentials: CredentialSet) -> Self {
        Self {
            credentials: Some(credentials),
            ..Self::default()
        }
    }

    /// Credentials still valid at `now`, if any.
    #[must_use]
    pub fn valid_credentials(&self, now: DateTime<Utc>) -> Option<CredentialSet> {
        self.credentials
            .as_ref()
            .filter(|credentials| credentials.is_valid_at(now))
            .cloned()
    }

    /// Replace the credentials.
    pub fn set_credentials(&mut self, credentials: CredentialSet) {
        self.credentials = Some(credentials);
    }

    /// Forget the credentials, e.g. after the server refused the token.
    pub fn clear_credentials(&mut self) {
        self.credentials = None;
    }

    /// Drop the cached listing.
    pub fn invalidate(&mut self) {
        self.volumes = None;
    }

    /// Cached volume listing.
    #[must_use]
    pub fn volumes(&self) -> Option<&[Volume]> {
        self.volumes.as_deref()
    }

    pub(crate) fn store_volumes(&mut self, volumes: Vec<Volume>) {
        self.volumes = Some(volumes);
    }
}
