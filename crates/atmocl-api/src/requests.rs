//! Parameters for the create and launch calls, sent as form fields.

use serde::Serialize;

/// Parameters for `createVolume`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateVolumeRequest {
    /// Size in gigabytes.
    #[serde(rename = "size")]
    pub size_gb: u32,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Comma-separated tags.
    pub tags: String,
}

impl CreateVolumeRequest {
    /// Default volume size in gigabytes.
    pub const DEFAULT_SIZE_GB: u32 = 1;
    /// Default volume name.
    pub const DEFAULT_NAME: &'static str = "atmoCLVolume";

    /// Request a volume with the given size and name and the default description and tags.
    #[must_use]
    pub fn new(size_gb: u32, name: impl Into<String>) -> Self {
        Self {
            size_gb,
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Default for CreateVolumeRequest {
    fn default() -> Self {
        Self {
            size_gb: Self::DEFAULT_SIZE_GB,
            name: Self::DEFAULT_NAME.to_string(),
            description: "Volume created using atmocl".to_string(),
            tags: "atmoCL".to_string(),
        }
    }
}

/// Parameters for `launchInstance`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchInstanceRequest {
    /// Display name of the new instance.
    #[serde(rename = "instance_name")]
    pub name: String,
    /// Size class.
    #[serde(rename = "instance_size")]
    pub size: String,
    /// Machine image to boot.
    pub image_id: String,
    /// Key pair name; empty for none.
    pub auth_key: String,
    /// Number of instances to launch.
    #[serde(rename = "num_of_instances")]
    pub count: u32,
    /// Free-form description.
    #[serde(rename = "instance_description")]
    pub description: String,
    /// Comma-separated tags.
    #[serde(rename = "instance_tags")]
    pub tags: String,
}

impl LaunchInstanceRequest {
    /// Size class used when none is given.
    pub const DEFAULT_SIZE: &'static str = "m1.small";

    /// Launch one default-size instance of `image_id` named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, image_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: Self::DEFAULT_SIZE.to_string(),
            image_id: image_id.into(),
            auth_key: String::new(),
            count: 1,
            description: "Instance launched using atmocl".to_string(),
            tags: "atmoCL".to_string(),
        }
    }
}
