//! Error types for process execution and the volume workflows.

use std::path::PathBuf;

use atmocl_api::ApiError;
use atmocl_core::VolumeId;
use thiserror::Error;

/// A result type using `WorkflowError`.
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Failure to run an external command.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The process could not be started.
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        /// The command line.
        command: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Reading the output or waiting for the process failed.
    #[error("I/O error while running `{command}`: {source}")]
    Io {
        /// The command line.
        command: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

/// Terminal outcome of a volume workflow that did not complete.
///
/// The `Display` text is the message shown to the user.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The mount directory could not be created.
    #[error("Failed to create directory {}", .0.display())]
    DirectoryUnavailable(PathBuf),

    /// The volume is not in the listing.
    #[error("Volume {0} not found")]
    VolumeNotFound(VolumeId),

    /// The attach request failed.
    #[error("Failed to attach volume, try again.")]
    AttachFailed(#[source] ApiError),

    /// The detach request failed.
    #[error("Failed to detach volume. Retry command.")]
    DetachFailed(#[source] ApiError),

    /// The delete request failed.
    #[error("Failed to delete volume")]
    DeleteFailed(#[source] ApiError),

    /// The user did not type the required confirmation.
    #[error("Operation cancelled by user.")]
    ConfirmationDeclined,

    /// Filesystem detection on an explicitly chosen device failed.
    #[error("Could not read the filesystem on {}", .0.display())]
    FormatDetectionFailed(PathBuf),

    /// Formatting the device failed.
    #[error("Format failed.")]
    FormatFailed,

    /// The mount command failed.
    #[error("Volume is formatted, but failed to mount {} to {}", .device.display(), .directory.display())]
    MountFailed {
        /// Device that was mounted.
        device: PathBuf,
        /// Target directory.
        directory: PathBuf,
    },

    /// Changing ownership of the mount directory failed.
    #[error("Error changing permissions on {}", .0.display())]
    OwnershipFailed(PathBuf),

    /// The mount table could not be read, so the mount state is unknown.
    #[error("Could not read the mount table; volume {0} was not detached")]
    MountTableUnavailable(VolumeId, #[source] ProcessError),

    /// The unmount command failed.
    #[error("Error unmounting volume from {}", .0.display())]
    UnmountFailed(PathBuf),

    /// A remote call other than attach, detach or delete failed.
    #[error("Remote request failed: {0}")]
    Api(#[from] ApiError),
}

impl WorkflowError {
    /// Process exit code for this failure: 1 for a failed attach, 0 otherwise.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::AttachFailed(_) => 1,
            _ => 0,
        }
    }
}
