//! Volume workflows for the Atmosphere command-line client.
//!
//! This crate turns a remote volume into a mounted directory on the current
//! instance and back again. It handles:
//!
//! - Attaching the volume through the control API
//! - Polling the volume listing until the attach shows up
//! - Finding a formatted device, or formatting one after confirmation
//! - Mounting, fixing ownership, unmounting and detaching
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        VolumeWorkflows                           │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────────┐   │
//! │  │   Mount     │ │  Unmount    │ │    Delete               │   │
//! │  └─────────────┘ └─────────────┘ └─────────────────────────┘   │
//! │        │                │                                       │
//! │        ▼                ▼                                       │
//! │  ┌───────────┐   ┌─────────────┐   ┌───────────┐               │
//! │  │  Poller   │   │ Provisioner │   │  Console  │               │
//! │  └───────────┘   └─────────────┘   └───────────┘               │
//! └─────────────────────────────────────────────────────────────────┘
//!        │                  │
//!        ▼                  ▼
//! ┌──────────────┐   ┌──────────────────────────────────────────────┐
//! │   AtmoApi    │   │  ProcessRunner (tune2fs, mkfs, mount, ...)   │
//! └──────────────┘   └──────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! use atmocl_api::AtmoApi;
//! use atmocl_core::VolumeId;
//! use atmocl_volume::{
//!     DeviceSelection, MountRequest, ShellRunner, StdConsole, VolumeWorkflows, WorkflowConfig,
//! };
//!
//! # async fn example(api: Arc<dyn AtmoApi>) -> Result<(), Box<dyn std::error::Error>> {
//! let workflows = VolumeWorkflows::new(api, ShellRunner::new(), StdConsole, WorkflowConfig::default());
//!
//! let request = MountRequest {
//!     volume_id: VolumeId::parse("vol-0000abcd")?,
//!     device: DeviceSelection::Scan(PathBuf::from("/dev/sdb")),
//!     directory: PathBuf::from("/mnt/data"),
//!     instance_id: "i-12345678".to_string(),
//!     owner: Some("esteve".to_string()),
//!     force_format: false,
//! };
//! let outcome = workflows.mount_volume(&request).await?;
//! println!("Mounted {}", outcome.device.display());
//! # Ok(())
//! # }
//! ```
//!
//! # Testing
//!
//! Enable the `test-utils` feature for [`ScriptedRunner`] and
//! [`ScriptedConsole`], which replace the shell and the terminal.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod console;
pub mod error;
pub mod host;
pub mod orchestrator;
pub mod poller;
pub mod process;
pub mod provisioner;

pub use config::{ProvisionerConfig, WorkflowConfig};
pub use console::{Confirmation, Console, StdConsole};
pub use error::{ProcessError, Result, WorkflowError};
pub use host::resolve_instance_id;
pub use orchestrator::{
    DeviceSelection, MountOutcome, MountRequest, UnmountOutcome, UnmountRequest,
    VolumeWorkflows, DEFAULT_DEVICE,
};
pub use poller::{wait_for_change, PollConfig, PollOutcome};
pub use process::{CommandOutput, Invocation, OutputLines, OutputStream, ProcessRunner, ShellRunner};
pub use provisioner::{FormatState, Provisioner, UnformattedReason};

#[cfg(any(test, feature = "test-utils"))]
pub use console::mock::ScriptedConsole;
#[cfg(any(test, feature = "test-utils"))]
pub use process::mock::ScriptedRunner;
