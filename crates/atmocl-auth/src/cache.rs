//! On-disk credential cache.
//!
//! The cache is a five-line text file (`~/.atmocl` by default) holding the
//! most recent credential set. It is reused while younger than 24 hours and
//! only for the user it was issued to.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::credentials::CredentialSet;
use crate::error::{AuthError, Result};

/// File name of the cache inside the home directory.
pub const CACHE_FILE_NAME: &str = ".atmocl";

/// Reads and writes the credential cache file.
#[derive(Debug, Clone)]
pub struct CredentialCache {
    path: PathBuf,
}

impl CredentialCache {
    /// Use the cache file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Use `~/.atmocl`.
    ///
    /// # Errors
    ///
    /// Returns `NoHomeDirectory` if the home directory cannot be determined.
    pub fn at_home() -> Result<Self> {
        let home = dirs::home_dir().ok_or(AuthError::NoHomeDirectory)?;
        Ok(Self::new(home.join(CACHE_FILE_NAME)))
    }

    /// Location of the cache file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load cached credentials that are still usable at `now`.
    ///
    /// Returns `Ok(None)` when the file is absent, expired, or was issued to
    /// a different user than `requested_user`. A malformed file is logged and
    /// treated as absent.
    ///
    /// # Errors
    ///
    /// Returns `CacheIo` if the file exists but cannot be read.
    pub async fn load(
        &self,
        requested_user: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<CredentialSet>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no credential cache");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let credentials = match CredentialSet::from_cache_text(&text) {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring credential cache");
                return Ok(None);
            }
        };

        if !credentials.is_valid_at(now) {
            debug!(issued_at = %credentials.issued_at, "cached credentials expired");
            return Ok(None);
        }

        if let Some(user) = requested_user {
            if user != credentials.username {
                debug!(cached = %credentials.username, requested = %user, "cached credentials belong to another user");
                return Ok(None);
            }
        }

        Ok(Some(credentials))
    }

    /// Overwrite the cache with `credentials`, readable only by the owner.
    ///
    /// # Errors
    ///
    /// Returns `CacheIo` if the file cannot be written.
    pub async fn store(&self, credentials: &CredentialSet) -> Result<()> {
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&self.path).await?;
        file.write_all(credentials.to_cache_text().as_bytes()).await?;
        file.flush().await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        debug!(path = %self.path.display(), "credential cache written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn creds(user: &str, issued_at: DateTime<Utc>) -> CredentialSet {
        CredentialSet {
            server_url: "https://api.example.org/resources".to_string(),
            token: "tok".to_string(),
            username: user.to_string(),
            api_version: "v1".to_string(),
            issued_at,
        }
    }

    fn cache_in(dir: &tempfile::TempDir) -> CredentialCache {
        CredentialCache::new(dir.path().join(CACHE_FILE_NAME))
    }

    #[tokio::test]
    async fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = cache_in(&dir).load(None, Utc::now()).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn fresh_credentials_are_reused() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);
        let now = Utc::now();
        cache.store(&creds("esteve", now - Duration::hours(23))).await.unwrap();

        let loaded = cache.load(Some("esteve"), now).await.unwrap().unwrap();
        assert_eq!(loaded.username, "esteve");
        assert!(cache.load(None, now).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn stale_credentials_are_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);
        let now = Utc::now();
        cache.store(&creds("esteve", now - Duration::hours(25))).await.unwrap();

        assert!(cache.load(Some("esteve"), now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn other_user_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);
        let now = Utc::now();
        cache.store(&creds("esteve", now)).await.unwrap();

        assert!(cache.load(Some("nirav"), now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_cache_is_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);
        tokio::fs::write(cache.path(), "not a cache\n").await.unwrap();

        assert!(cache.load(None, Utc::now()).await.unwrap().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cache_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);
        cache.store(&creds("esteve", Utc::now())).await.unwrap();

        let mode = std::fs::metadata(cache.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
