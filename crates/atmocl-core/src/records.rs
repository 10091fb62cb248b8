//! Domain records decoded from the control API listings.
//!
//! Field names follow the wire format of the listing calls (`getVolumeList`,
//! `getInstanceList`, `getImageList`, `getAppList`). The API sends `null` for
//! unset text fields and sometimes quotes numbers, so decoding is lenient on
//! both.

use serde::{Deserialize, Deserializer, Serialize};

use crate::ids::VolumeId;

// =============================================================================
// Volume
// =============================================================================

/// A block-storage volume as reported by the volume listing.
///
/// Equality is structural over every field: two snapshots of the same volume
/// compare equal only if nothing at all changed between them. The volume
/// poller relies on this to detect attach and detach completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    /// Volume identifier, unique within one listing.
    pub id: VolumeId,
    /// Display name.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    /// Comma-separated tags.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: String,
    /// Free-form description.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    /// Remote state, e.g. `available`, `attaching`, `in-use`.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub status: String,
    /// Size in gigabytes.
    #[serde(default, deserialize_with = "lenient_u32")]
    pub size: u32,
    /// Creation time as reported by the API.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub create_time: String,
    /// Device path on the instance the volume is attached to.
    #[serde(rename = "attach_data_device", default)]
    pub attached_device: Option<String>,
    /// Instance the volume is attached to.
    #[serde(rename = "attach_data_instance_id", default)]
    pub attached_instance_id: Option<String>,
    /// Time of the last attach.
    #[serde(rename = "attach_data_attach_time", default)]
    pub attach_time: Option<String>,
    /// Snapshot the volume was created from.
    #[serde(default)]
    pub snapshot_id: Option<String>,
    /// Position of the volume in the owner's listing.
    #[serde(rename = "no", default, deserialize_with = "lenient_u32")]
    pub num: u32,
}

impl Volume {
    /// Returns true if the listing reports the volume attached to an instance.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.status == "in-use"
            || self
                .attached_instance_id
                .as_deref()
                .is_some_and(|id| !id.trim().is_empty())
    }
}

// =============================================================================
// Instance
// =============================================================================

/// A virtual machine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Instance identifier (`i-...`).
    #[serde(rename = "instance_id")]
    pub id: String,
    /// Display name.
    #[serde(rename = "instance_name", default, deserialize_with = "null_as_empty")]
    pub name: String,
    /// Remote state, e.g. `running`, `pending`, `terminated`.
    #[serde(rename = "instance_state", default, deserialize_with = "null_as_empty")]
    pub state: String,
    /// Availability zone.
    #[serde(rename = "instance_placement", default)]
    pub placement: Option<String>,
    /// Machine image the instance was launched from.
    #[serde(rename = "instance_image_id", default)]
    pub image_id: Option<String>,
    /// Launch time as reported by the API.
    #[serde(rename = "instance_launch_time", default)]
    pub launch_time: Option<String>,
    /// Public DNS name.
    #[serde(rename = "instance_public_dns_name", default)]
    pub public_dns_name: Option<String>,
    /// Private DNS name.
    #[serde(rename = "instance_private_dns_name", default)]
    pub private_dns_name: Option<String>,
    /// Key pair used at launch.
    #[serde(rename = "instance_key_name", default)]
    pub key_name: Option<String>,
    /// Size class, e.g. `m1.small`.
    #[serde(rename = "instance_instance_type", default)]
    pub instance_type: Option<String>,
}

// =============================================================================
// Image
// =============================================================================

/// A machine image from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// Image identifier (`emi-...`).
    #[serde(rename = "image_id")]
    pub id: String,
    /// Display name; may be empty in the catalog.
    #[serde(rename = "image_name", default, deserialize_with = "null_as_empty")]
    pub name: String,
    /// Free-form description.
    #[serde(rename = "image_description", default, deserialize_with = "null_as_empty")]
    pub description: String,
    /// Comma-separated tags.
    #[serde(rename = "image_tags", default, deserialize_with = "null_as_empty")]
    pub tags: String,
    /// Storage location of the image manifest.
    #[serde(rename = "image_location", default)]
    pub location: Option<String>,
    /// Owner account.
    #[serde(rename = "image_ownerid", default)]
    pub owner_id: Option<String>,
    /// Catalog state, e.g. `available`.
    #[serde(rename = "image_state", default)]
    pub state: Option<String>,
    /// CPU architecture.
    #[serde(rename = "image_architecture", default)]
    pub architecture: Option<String>,
    /// Image type, e.g. `machine`.
    #[serde(rename = "image_type", default)]
    pub image_type: Option<String>,
    /// Visibility, `public` or `private`.
    #[serde(rename = "image_is_public", default)]
    pub visibility: Option<String>,
}

impl Image {
    /// Returns true if the image is publicly visible.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.visibility.as_deref() == Some("public")
    }
}

// =============================================================================
// App
// =============================================================================

/// An application bundle from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    /// Application identifier.
    #[serde(rename = "application_id")]
    pub id: String,
    /// Display name.
    #[serde(rename = "application_name", default, deserialize_with = "null_as_empty")]
    pub name: String,
    /// Free-form description.
    #[serde(
        rename = "application_description",
        default,
        deserialize_with = "null_as_empty"
    )]
    pub description: String,
    /// Comma-separated tags.
    #[serde(rename = "application_tags", default, deserialize_with = "null_as_empty")]
    pub tags: String,
    /// Machine image the application runs on.
    #[serde(rename = "machine_image_id", default)]
    pub machine_image_id: Option<String>,
    /// Target platform.
    #[serde(default)]
    pub platform: Option<String>,
    /// Application version.
    #[serde(rename = "application_version", default)]
    pub version: Option<String>,
    /// Catalog category.
    #[serde(rename = "application_category", default)]
    pub category: Option<String>,
    /// Whether the application is provided by the platform itself.
    #[serde(default)]
    pub is_sys_app: bool,
}

// =============================================================================
// Lenient decoding
// =============================================================================

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(u32),
        Text(String),
    }

    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(0),
        Some(NumberOrText::Number(n)) => Ok(n),
        Some(NumberOrText::Text(s)) if s.trim().is_empty() => Ok(0),
        Some(NumberOrText::Text(s)) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume_json() -> serde_json::Value {
        serde_json::json!({
            "id": "vol-0000abcd",
            "name": "data",
            "tags": "atmoCL,test",
            "description": null,
            "status": "available",
            "size": "10",
            "create_time": "2011-07-11T10:00:00Z",
            "attach_data_device": null,
            "attach_data_instance_id": null,
            "attach_data_attach_time": null,
            "snapshot_id": null,
            "no": 3
        })
    }

    #[test]
    fn volume_decodes_leniently() {
        let volume: Volume = serde_json::from_value(volume_json()).unwrap();
        assert_eq!(volume.id.as_str(), "vol-0000abcd");
        assert_eq!(volume.description, "");
        assert_eq!(volume.size, 10);
        assert_eq!(volume.num, 3);
        assert!(!volume.is_attached());
    }

    #[test]
    fn volume_equality_covers_every_field() {
        let a: Volume = serde_json::from_value(volume_json()).unwrap();
        let mut b = a.clone();
        assert_eq!(a, b);

        b.attach_time = Some("2011-07-11T10:05:00Z".to_string());
        assert_ne!(a, b);

        let mut c = a.clone();
        c.num = 4;
        assert_ne!(a, c);
    }

    #[test]
    fn attached_volume_detected() {
        let mut json = volume_json();
        json["status"] = "in-use".into();
        json["attach_data_instance_id"] = "i-12345678".into();
        let volume: Volume = serde_json::from_value(json).unwrap();
        assert!(volume.is_attached());
    }

    #[test]
    fn bad_size_is_rejected() {
        let mut json = volume_json();
        json["size"] = "ten".into();
        assert!(serde_json::from_value::<Volume>(json).is_err());
    }

    #[test]
    fn instance_decodes() {
        let instance: Instance = serde_json::from_value(serde_json::json!({
            "instance_id": "i-12345678",
            "instance_name": "worker",
            "instance_state": "running",
            "instance_placement": "zone-a",
            "instance_image_id": "emi-8D24142A",
            "instance_key_name": null,
            "reservation_id": "r-1"
        }))
        .unwrap();
        assert_eq!(instance.state, "running");
        assert_eq!(instance.image_id.as_deref(), Some("emi-8D24142A"));
        assert!(instance.key_name.is_none());
    }

    #[test]
    fn image_visibility() {
        let image: Image = serde_json::from_value(serde_json::json!({
            "image_id": "emi-1",
            "image_name": "",
            "image_is_public": "public"
        }))
        .unwrap();
        assert!(image.is_public());
        assert!(image.name.is_empty());
    }

    #[test]
    fn app_decodes() {
        let app: App = serde_json::from_value(serde_json::json!({
            "application_id": "app-1",
            "application_name": "R Studio",
            "machine_image_id": "emi-2",
            "is_sys_app": true
        }))
        .unwrap();
        assert_eq!(app.name, "R Studio");
        assert!(app.is_sys_app);
    }
}
