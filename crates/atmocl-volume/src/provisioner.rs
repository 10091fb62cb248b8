//! Local filesystem steps: directory, format detection, format, mount, ownership.
//!
//! Most steps report success as a plain `bool` (or a [`FormatState`]) and
//! log the details; the orchestrator decides what the user sees.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::ProvisionerConfig;
use crate::error::ProcessError;
use crate::process::{CommandOutput, Invocation, OutputStream, ProcessRunner};

/// Suffixes appended to the base device path when probing for a formatted partition.
pub const CANDIDATE_SUFFIXES: [&str; 5] = ["", "1", "2", "3", "4"];

const BAD_MAGIC_MARKER: &str = "Bad magic number";
const MISSING_FS_MARKER: &str = "find valid filesystem";
const MOUNT_ERROR_MARKER: &str = "error";

/// Why a device is considered unformatted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnformattedReason {
    /// No filesystem superblock was found; the device was never formatted.
    MissingFilesystem,
    /// A superblock exists but is not recognized; the filesystem is corrupt.
    BadMagicNumber,
}

/// Filesystem state of a block device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatState {
    /// Carries a readable filesystem.
    Formatted,
    /// Carries no usable filesystem.
    Unformatted(UnformattedReason),
    /// Could not be inspected (absent device, inspection tool failed).
    Error,
}

/// Classify the output of `tune2fs -l`.
///
/// The first line carrying a known marker decides; without a marker the exit
/// status does.
#[must_use]
pub fn classify_format(output: &CommandOutput) -> FormatState {
    for line in output.lines() {
        if line.contains(BAD_MAGIC_MARKER) {
            return FormatState::Unformatted(UnformattedReason::BadMagicNumber);
        }
        if line.contains(MISSING_FS_MARKER) {
            return FormatState::Unformatted(UnformattedReason::MissingFilesystem);
        }
    }
    if output.success() {
        FormatState::Formatted
    } else {
        FormatState::Error
    }
}

/// Candidate device paths in scan order: the base path, then partitions 1 to 4.
#[must_use]
pub fn candidate_devices(base: &Path) -> Vec<PathBuf> {
    CANDIDATE_SUFFIXES
        .iter()
        .map(|suffix| {
            let mut path = OsString::from(base.as_os_str());
            path.push(suffix);
            PathBuf::from(path)
        })
        .collect()
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Runs the local filesystem steps through a [`ProcessRunner`].
pub struct Provisioner<R> {
    runner: R,
    config: ProvisionerConfig,
}

impl<R: ProcessRunner> Provisioner<R> {
    /// Create a provisioner.
    #[must_use]
    pub fn new(runner: R, config: ProvisionerConfig) -> Self {
        Self { runner, config }
    }

    /// The underlying runner.
    #[must_use]
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    fn privileged(&self, invocation: Invocation) -> Invocation {
        invocation.with_sudo(self.config.use_sudo)
    }

    async fn succeeds(&self, invocation: &Invocation) -> bool {
        match self.runner.output(invocation).await {
            Ok(output) if output.success() => true,
            Ok(output) => {
                warn!(
                    command = %invocation,
                    code = ?output.code,
                    stderr = %output.stderr.trim(),
                    "Command failed"
                );
                false
            }
            Err(e) => {
                warn!(error = %e, "Command could not be run");
                false
            }
        }
    }

    /// Returns true if a device node (or any file) exists at `device`.
    pub async fn device_present(&self, device: &Path) -> bool {
        tokio::fs::try_exists(device).await.unwrap_or(false)
    }

    /// Make sure `directory` exists, creating the whole tree if needed.
    ///
    /// After creating it, waits for the settle delay and checks again.
    pub async fn ensure_directory(&self, directory: &Path) -> bool {
        if is_dir(directory).await {
            return true;
        }

        if let Err(e) = tokio::fs::create_dir_all(directory).await {
            if self.config.use_sudo {
                debug!(directory = %directory.display(), error = %e, "Retrying mkdir through sudo");
                let mkdir = self.privileged(Invocation::new("mkdir").arg("-p").arg(path_arg(directory)));
                self.succeeds(&mkdir).await;
            } else {
                warn!(directory = %directory.display(), error = %e, "Failed to create directory");
            }
        }

        tokio::time::sleep(self.config.settle_delay).await;
        is_dir(directory).await
    }

    /// Inspect the filesystem on `device`.
    pub async fn detect_format(&self, device: &Path) -> FormatState {
        let tune2fs = self.privileged(Invocation::new("tune2fs").arg("-l").arg(path_arg(device)));
        let state = match self.runner.output(&tune2fs).await {
            Ok(output) => classify_format(&output),
            Err(e) => {
                warn!(error = %e, "Format detection could not be run");
                FormatState::Error
            }
        };
        debug!(device = %device.display(), ?state, "Format detected");
        state
    }

    /// First candidate under `base` that carries a filesystem.
    pub async fn select_formatted_device(&self, base: &Path) -> Option<PathBuf> {
        for candidate in candidate_devices(base) {
            debug!(device = %candidate.display(), "Looking for formatted device");
            if self.detect_format(&candidate).await == FormatState::Formatted {
                return Some(candidate);
            }
        }
        None
    }

    /// Create a filesystem on `device`, destroying its contents.
    ///
    /// Callers must obtain the user's confirmation first.
    pub async fn format_device(&self, device: &Path) -> bool {
        let mkfs = self.privileged(
            Invocation::new(format!("mkfs.{}", self.config.filesystem))
                .arg("-F")
                .arg(path_arg(device)),
        );
        let formatted = self.succeeds(&mkfs).await;
        if formatted {
            info!(device = %device.display(), filesystem = %self.config.filesystem, "Formatted device");
        }
        formatted
    }

    /// Mount `device` at `directory`.
    ///
    /// Succeeds only if the command exits 0 and no output line mentions an error.
    pub async fn mount(&self, device: &Path, directory: &Path) -> bool {
        let mount = self.privileged(
            Invocation::new("mount")
                .arg("-t")
                .arg(self.config.filesystem.clone())
                .arg(path_arg(device))
                .arg(path_arg(directory)),
        );
        match self.runner.output(&mount).await {
            Ok(output) => {
                let marked = output.lines().any(|line| line.contains(MOUNT_ERROR_MARKER));
                if marked || !output.success() {
                    warn!(
                        command = %mount,
                        code = ?output.code,
                        output = %output.lines().collect::<Vec<_>>().join(" | "),
                        "Mount failed"
                    );
                    return false;
                }
                true
            }
            Err(e) => {
                warn!(error = %e, "Mount could not be run");
                false
            }
        }
    }

    /// Give `user` and their primary group recursive ownership of `directory`.
    ///
    /// Fails if the group cannot be resolved.
    pub async fn fix_ownership(&self, user: &str, directory: &Path) -> bool {
        let id = Invocation::new("id").arg("-g").arg("-n").arg(user);
        let group = match self.runner.output(&id).await {
            Ok(output) if output.success() => output
                .stdout
                .lines()
                .next()
                .map(str::trim)
                .filter(|group| !group.is_empty())
                .map(ToString::to_string),
            Ok(output) => {
                warn!(user, code = ?output.code, "Could not resolve primary group");
                None
            }
            Err(e) => {
                warn!(user, error = %e, "Could not resolve primary group");
                None
            }
        };
        let Some(group) = group else {
            return false;
        };

        let chown = self.privileged(
            Invocation::new("chown")
                .arg("-R")
                .arg(format!("{user}:{group}"))
                .arg(path_arg(directory)),
        );
        self.succeeds(&chown).await
    }

    /// Returns true if the mount table has a line naming both `device` and `directory`.
    ///
    /// # Errors
    ///
    /// Returns a `ProcessError` if `mount` cannot be started or its output
    /// cannot be read; the caller then knows nothing about the mount state.
    pub async fn is_mounted(&self, device: &Path, directory: &Path) -> Result<bool, ProcessError> {
        let device = path_arg(device);
        let directory = path_arg(directory);

        let mut lines = self
            .runner
            .stream(&Invocation::new("mount"), OutputStream::Stdout)
            .await?;
        while let Some(line) = lines.next_line().await? {
            if line.contains(&device) && line.contains(&directory) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Unmount whatever is mounted at `directory`.
    pub async fn unmount(&self, directory: &Path) -> bool {
        let umount = self.privileged(Invocation::new("umount").arg(path_arg(directory)));
        self.succeeds(&umount).await
    }

    /// Remove an empty mount directory.
    pub async fn remove_directory(&self, directory: &Path) -> bool {
        match tokio::fs::remove_dir(directory).await {
            Ok(()) => true,
            Err(e) => {
                warn!(directory = %directory.display(), error = %e, "Failed to remove directory");
                false
            }
        }
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|metadata| metadata.is_dir())
}
