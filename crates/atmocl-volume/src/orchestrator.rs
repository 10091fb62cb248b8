//! The mount and unmount workflows.
//!
//! Mounting sequences attach, confirmation polling and local provisioning.
//! Unmounting picks one of three paths from what the host shows: unmount
//! then detach, detach only, or nothing to do. Remote failures end the
//! workflow; nothing is rolled back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use atmocl_api::AtmoApi;
use atmocl_core::VolumeId;
use tracing::{debug, info, warn};

use crate::config::WorkflowConfig;
use crate::console::{Confirmation, Console};
use crate::error::{Result, WorkflowError};
use crate::poller::{wait_for_change, PollOutcome};
use crate::process::ProcessRunner;
use crate::provisioner::{FormatState, Provisioner, UnformattedReason};

/// Default block device for attached volumes.
pub const DEFAULT_DEVICE: &str = "/dev/sdb";

/// How the device to mount is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelection {
    /// Scan the base path and its partitions 1 to 4 for a filesystem.
    Scan(PathBuf),
    /// Use exactly this device.
    Explicit(PathBuf),
}

impl DeviceSelection {
    /// The base or explicit device path.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Scan(path) | Self::Explicit(path) => path,
        }
    }
}

/// Input to [`VolumeWorkflows::mount_volume`].
#[derive(Debug, Clone)]
pub struct MountRequest {
    /// Volume to mount.
    pub volume_id: VolumeId,
    /// Device the volume appears as.
    pub device: DeviceSelection,
    /// Mount point.
    pub directory: PathBuf,
    /// Instance to attach to.
    pub instance_id: String,
    /// Local user who should own the mount point, if any.
    pub owner: Option<String>,
    /// Offer to format even if a filesystem is present.
    pub force_format: bool,
}

/// What a successful mount did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountOutcome {
    /// Device that was mounted.
    pub device: PathBuf,
    /// `None` if the device was already present; otherwise whether the
    /// attach was confirmed by polling.
    pub attach: Option<PollOutcome>,
    /// Whether the device was formatted.
    pub formatted: bool,
}

/// Input to [`VolumeWorkflows::unmount_volume`].
#[derive(Debug, Clone)]
pub struct UnmountRequest {
    /// Volume to detach.
    pub volume_id: VolumeId,
    /// Device the volume appears as.
    pub device: PathBuf,
    /// Mount point.
    pub directory: PathBuf,
}

/// Which unmount path was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmountOutcome {
    /// The volume was mounted; it was unmounted and then detached.
    UnmountedAndDetached,
    /// The volume was attached but not mounted; it was detached.
    Detached {
        /// Whether the user chose to remove the mount directory.
        directory_removed: bool,
    },
    /// Neither mounted nor attached; nothing was done.
    AlreadyDetached,
}

/// Device name the attach request expects: the path without `/dev/` and
/// without a trailing partition number, so `/dev/sdb1` attaches as `sdb`.
#[must_use]
pub fn attach_device_name(device: &Path) -> String {
    let path = device.to_string_lossy();
    let name = path.strip_prefix("/dev/").unwrap_or(&path);
    let disk = name.trim_end_matches(|c: char| c.is_ascii_digit());
    if disk.ends_with(|c: char| c.is_ascii_alphabetic()) {
        disk.to_string()
    } else {
        name.to_string()
    }
}

/// Coordinates the remote API, the local provisioner and the user.
pub struct VolumeWorkflows<A: ?Sized, R, C> {
    api: Arc<A>,
    provisioner: Provisioner<R>,
    console: C,
    config: WorkflowConfig,
}

impl<A, R, C> VolumeWorkflows<A, R, C>
where
    A: AtmoApi + ?Sized,
    R: ProcessRunner,
    C: Console,
{
    /// Create the workflows.
    #[must_use]
    pub fn new(api: Arc<A>, runner: R, console: C, config: WorkflowConfig) -> Self {
        let provisioner = Provisioner::new(runner, config.provisioner.clone());
        Self {
            api,
            provisioner,
            console,
            config,
        }
    }

    /// The provisioner used for local steps.
    #[must_use]
    pub fn provisioner(&self) -> &Provisioner<R> {
        &self.provisioner
    }

    /// The console used for prompts and progress.
    #[must_use]
    pub fn console(&self) -> &C {
        &self.console
    }

    /// Attach (if needed), provision and mount a volume.
    ///
    /// # Errors
    ///
    /// Returns the first failing step. An attach that succeeded stays in
    /// place if a later step fails.
    pub async fn mount_volume(&self, request: &MountRequest) -> Result<MountOutcome> {
        let directory = &request.directory;
        if !self.provisioner.ensure_directory(directory).await {
            return Err(WorkflowError::DirectoryUnavailable(directory.clone()));
        }

        let base = request.device.path();
        let attach = if self.provisioner.device_present(base).await {
            debug!(device = %base.display(), "Device present, skipping attach");
            None
        } else {
            Some(self.attach(request).await?)
        };

        let (device, formatted) = self.resolve_device(request).await?;

        self.console.print("Mounting drive. This can take some time..");
        if !self.provisioner.mount(&device, directory).await {
            return Err(WorkflowError::MountFailed {
                device,
                directory: directory.clone(),
            });
        }

        if let Some(owner) = &request.owner {
            if !self.provisioner.fix_ownership(owner, directory).await {
                return Err(WorkflowError::OwnershipFailed(directory.clone()));
            }
        }

        info!(volume_id = %request.volume_id, device = %device.display(), directory = %directory.display(), "Volume mounted");
        self.console
            .print(&format!("Volume mounted to {}.", directory.display()));

        Ok(MountOutcome {
            device,
            attach,
            formatted,
        })
    }

    async fn attach(&self, request: &MountRequest) -> Result<PollOutcome> {
        let prior = self
            .api
            .get_volume(&request.volume_id)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    WorkflowError::VolumeNotFound(request.volume_id.clone())
                } else {
                    WorkflowError::Api(e)
                }
            })?;

        let volume_id = request.volume_id.normalized();
        let device = attach_device_name(request.device.path());

        self.console
            .print("Attaching volume.. This can take some time (10+ Seconds)");
        self.api
            .attach_volume(&request.instance_id, &volume_id, &device)
            .await
            .map_err(WorkflowError::AttachFailed)?;
        debug!(volume_id = %volume_id, "Attach request accepted, waiting for the volume to change");

        let outcome = wait_for_change(
            self.api.as_ref(),
            &volume_id,
            &prior,
            self.config.poll,
            |attempt, max| {
                self.console
                    .print(&format!("Waiting.. Attempt #{attempt}/{max}"));
            },
        )
        .await;

        match outcome {
            PollOutcome::Changed { .. } => self.console.print("Volume attached"),
            PollOutcome::TimedOut { attempts } => {
                warn!(volume_id = %volume_id, attempts, "Attach not confirmed, continuing");
                self.console.print(&format!(
                    "Attach not confirmed after {attempts} attempts, continuing anyway"
                ));
            }
        }
        Ok(outcome)
    }

    async fn resolve_device(&self, request: &MountRequest) -> Result<(PathBuf, bool)> {
        if request.force_format {
            let device = request.device.path().to_path_buf();
            self.offer_format(&device).await?;
            return Ok((device, true));
        }

        match &request.device {
            DeviceSelection::Explicit(device) => {
                self.console
                    .print(&format!("Using the driver: {}", device.display()));
                match self.provisioner.detect_format(device).await {
                    FormatState::Formatted => Ok((device.clone(), false)),
                    FormatState::Unformatted(reason) => {
                        self.console.print(&unformatted_message(device, reason));
                        self.offer_format(device).await?;
                        Ok((device.clone(), true))
                    }
                    FormatState::Error => {
                        Err(WorkflowError::FormatDetectionFailed(device.clone()))
                    }
                }
            }
            DeviceSelection::Scan(base) => {
                if let Some(device) = self.provisioner.select_formatted_device(base).await {
                    self.console
                        .print(&format!("Using the driver found at {}", device.display()));
                    return Ok((device, false));
                }
                self.console
                    .print(&format!("No formatted driver found at {}", base.display()));
                self.offer_format(base).await?;
                Ok((base.clone(), true))
            }
        }
    }

    async fn offer_format(&self, device: &Path) -> Result<()> {
        let question = format!("Format {}? All data on it will be lost.", device.display());
        if !self.console.confirm(&question, Confirmation::YES) {
            self.console
                .print("User cancelled formatting of driver. Operation aborted.");
            return Err(WorkflowError::ConfirmationDeclined);
        }

        self.console.print("Formatting drive. This can take a while..");
        if self.provisioner.format_device(device).await {
            Ok(())
        } else {
            Err(WorkflowError::FormatFailed)
        }
    }

    /// Unmount and detach a volume, whichever part is still needed.
    ///
    /// # Errors
    ///
    /// Returns `MountTableUnavailable` before touching the volume if the mount
    /// state cannot be determined, or `UnmountFailed` or `DetachFailed`; the
    /// user is expected to retry.
    pub async fn unmount_volume(&self, request: &UnmountRequest) -> Result<UnmountOutcome> {
        let directory = &request.directory;
        let volume_id = request.volume_id.normalized();

        self.console
            .print(&format!("Checking if {} is mounted:", directory.display()));

        let mounted = self
            .provisioner
            .is_mounted(&request.device, directory)
            .await
            .map_err(|e| WorkflowError::MountTableUnavailable(request.volume_id.clone(), e))?;
        if mounted {
            if !self.provisioner.unmount(directory).await {
                return Err(WorkflowError::UnmountFailed(directory.clone()));
            }
            self.console
                .print(&format!("Un-Mounted volume from {}", directory.display()));
            self.console.print(&format!(
                "Sending detach request. Waiting for reply..({} seconds)",
                self.config.unmount_settle.as_secs()
            ));
            tokio::time::sleep(self.config.unmount_settle).await;

            self.api
                .detach_volume(&volume_id)
                .await
                .map_err(WorkflowError::DetachFailed)?;
            self.console.print(&format!("Detached volume {volume_id}."));
            return Ok(UnmountOutcome::UnmountedAndDetached);
        }

        self.console
            .print(&format!("{} unmounted.", directory.display()));

        if !self.provisioner.device_present(&request.device).await {
            self.console
                .print(&format!("Volume {} detached.", request.volume_id));
            return Ok(UnmountOutcome::AlreadyDetached);
        }

        self.api
            .detach_volume(&volume_id)
            .await
            .map_err(WorkflowError::DetachFailed)?;

        let question = format!(
            "Detached volume. Remove the directory <{}>?",
            directory.display()
        );
        let directory_removed = if self.console.confirm(&question, Confirmation::YES) {
            let removed = self.provisioner.remove_directory(directory).await;
            if removed {
                self.console.print("Removed directory");
            } else {
                self.console
                    .print(&format!("Could not remove {}", directory.display()));
            }
            removed
        } else {
            self.console.print(&format!("Detached volume {volume_id}."));
            false
        };

        Ok(UnmountOutcome::Detached { directory_removed })
    }

    /// Delete a volume after the user types the required confirmation.
    ///
    /// # Errors
    ///
    /// Returns `ConfirmationDeclined` without calling the API if the answer
    /// does not match, or `DeleteFailed` if the server refuses.
    pub async fn delete_volume(
        &self,
        volume_id: &VolumeId,
        confirmation: Confirmation,
    ) -> Result<()> {
        let question = format!("Delete volume {volume_id}? This cannot be undone.");
        if !self.console.confirm(&question, confirmation) {
            return Err(WorkflowError::ConfirmationDeclined);
        }

        self.api
            .delete_volume(volume_id)
            .await
            .map_err(WorkflowError::DeleteFailed)?;
        self.console.print(&format!("Deleted volume {volume_id}"));
        Ok(())
    }
}

fn unformatted_message(device: &Path, reason: UnformattedReason) -> String {
    match reason {
        UnformattedReason::MissingFilesystem => {
            format!("No filesystem found on {}", device.display())
        }
        UnformattedReason::BadMagicNumber => {
            format!(
                "The filesystem on {} is unreadable (bad magic number)",
                device.display()
            )
        }
    }
}
