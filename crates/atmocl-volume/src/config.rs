//! Workflow configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::poller::PollConfig;

/// Settings for the local filesystem steps.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProvisionerConfig {
    /// Filesystem type passed to `mkfs.<type>` and `mount -t`.
    #[serde(default = "ProvisionerConfig::default_filesystem")]
    pub filesystem: String,
    /// Run privileged commands through `sudo -n`.
    #[serde(default)]
    pub use_sudo: bool,
    /// Wait after creating a directory before checking it exists.
    #[serde(default = "ProvisionerConfig::default_settle_delay", with = "seconds")]
    pub settle_delay: Duration,
}

impl ProvisionerConfig {
    fn default_filesystem() -> String {
        "ext3".to_string()
    }

    const fn default_settle_delay() -> Duration {
        Duration::from_secs(3)
    }
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            filesystem: Self::default_filesystem(),
            use_sudo: false,
            settle_delay: Self::default_settle_delay(),
        }
    }
}

/// Settings for the mount and unmount workflows.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkflowConfig {
    /// Local filesystem steps.
    #[serde(default)]
    pub provisioner: ProvisionerConfig,
    /// Attach confirmation polling.
    #[serde(default)]
    pub poll: PollConfig,
    /// Wait between a successful unmount and the detach request.
    #[serde(default = "WorkflowConfig::default_unmount_settle", with = "seconds")]
    pub unmount_settle: Duration,
}

impl WorkflowConfig {
    const fn default_unmount_settle() -> Duration {
        Duration::from_secs(10)
    }

    /// A configuration with every wait set to zero.
    #[must_use]
    pub fn without_delays() -> Self {
        Self {
            provisioner: ProvisionerConfig {
                settle_delay: Duration::ZERO,
                ..ProvisionerConfig::default()
            },
            poll: PollConfig {
                delay: Duration::ZERO,
                ..PollConfig::default()
            },
            unmount_settle: Duration::ZERO,
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            provisioner: ProvisionerConfig::default(),
            poll: PollConfig::default(),
            unmount_settle: Self::default_unmount_settle(),
        }
    }
}

/// Durations written as whole seconds.
pub(crate) mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
