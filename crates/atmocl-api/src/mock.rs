//! A scriptable in-memory control API for testing the volume workflows.

use std::collections::VecDeque;

use async_trait::async_trait;
use atmocl_core::{App, Image, Instance, Volume, VolumeId};
use parking_lot::Mutex;

use crate::client::{find_volume, name_unnamed_images, AtmoApi};
use crate::error::{ApiError, Result};
use crate::requests::{CreateVolumeRequest, LaunchInstanceRequest};

/// A call received by [`MockAtmoApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `list_volumes`.
    ListVolumes,
    /// `attach_volume`.
    Attach {
        /// Target instance.
        instance_id: String,
        /// Volume id exactly as sent.
        volume_id: String,
        /// Device name.
        device: String,
    },
    /// `detach_volume`.
    Detach {
        /// Volume id exactly as sent.
        volume_id: String,
    },
    /// `create_volume`.
    Create(CreateVolumeRequest),
    /// `delete_volume`.
    Delete {
        /// Volume id exactly as sent.
        volume_id: String,
    },
    /// `launch_instance`.
    Launch(LaunchInstanceRequest),
    /// `terminate_instance`.
    Terminate {
        /// Target instance.
        instance_id: String,
    },
}

#[derive(Default)]
struct MockState {
    volumes: Vec<Volume>,
    scripted_listings: VecDeque<Vec<Volume>>,
    instances: Vec<Instance>,
    images: Vec<Image>,
    apps: Vec<App>,
    fail_attach: bool,
    fail_detach: bool,
    fail_delete: bool,
    fail_listing: bool,
    calls: Vec<MockCall>,
}

/// A mock API that serves fixed listings and records every call.
///
/// Each `list_volumes` call takes the next scripted listing, if any, and
/// serves it; once the script runs out the last listing repeats.
/// `get_volume` reads the current listing without advancing the script.
#[derive(Default)]
pub struct MockAtmoApi {
    state: Mutex<MockState>,
}

fn rejected(operation: &'static str) -> ApiError {
    ApiError::Rejected {
        operation,
        detail: "code=failed value=null".to_string(),
    }
}

impl MockAtmoApi {
    /// Create an empty mock API.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `volumes` as the current listing.
    #[must_use]
    pub fn with_volumes(self, volumes: Vec<Volume>) -> Self {
        self.state.lock().volumes = volumes;
        self
    }

    /// Serve `instances` as the instance listing.
    #[must_use]
    pub fn with_instances(self, instances: Vec<Instance>) -> Self {
        self.state.lock().instances = instances;
        self
    }

    /// Serve `images` as the image catalog.
    #[must_use]
    pub fn with_images(self, images: Vec<Image>) -> Self {
        self.state.lock().images = images;
        self
    }

    /// Serve `apps` as the application catalog.
    #[must_use]
    pub fn with_apps(self, apps: Vec<App>) -> Self {
        self.state.lock().apps = apps;
        self
    }

    /// Queue a listing to be served by a later `list_volumes` call.
    pub fn push_volume_listing(&self, volumes: Vec<Volume>) {
        self.state.lock().scripted_listings.push_back(volumes);
    }

    /// Make `attach_volume` fail.
    pub fn fail_attach(&self) {
        self.state.lock().fail_attach = true;
    }

    /// Make `detach_volume` fail.
    pub fn fail_detach(&self) {
        self.state.lock().fail_detach = true;
    }

    /// Make `delete_volume` fail.
    pub fn fail_delete(&self) {
        self.state.lock().fail_delete = true;
    }

    /// Make every volume listing fail with a transport error.
    pub fn fail_listing(&self) {
        self.state.lock().fail_listing = true;
    }

    /// Every call received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    /// Number of `list_volumes` calls received.
    #[must_use]
    pub fn listing_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, MockCall::ListVolumes))
            .count()
    }

    /// Returns true if any call mutated remote state.
    #[must_use]
    pub fn has_mutations(&self) -> bool {
        self.state
            .lock()
            .calls
            .iter()
            .any(|call| !matches!(call, MockCall::ListVolumes))
    }
}

#[async_trait]
impl AtmoApi for MockAtmoApi {
    async fn list_volumes(&self) -> Result<Vec<Volume>> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::ListVolumes);
        if state.fail_listing {
            return Err(ApiError::Transport {
                endpoint: "getVolumeList".to_string(),
                message: "connection refused".to_string(),
            });
        }
        if let Some(next) = state.scripted_listings.pop_front() {
            state.volumes = next;
        }
        Ok(state.volumes.clone())
    }

    async fn get_volume(&self, id: &VolumeId) -> Result<Volume> {
        let state = self.state.lock();
        if state.fail_listing {
            return Err(ApiError::Transport {
                endpoint: "getVolumeList".to_string(),
                message: "connection refused".to_string(),
            });
        }
        find_volume(&state.volumes, id)
    }

    async fn attach_volume(
        &self,
        instance_id: &str,
        volume_id: &VolumeId,
        device: &str,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Attach {
            instance_id: instance_id.to_string(),
            volume_id: volume_id.to_string(),
            device: device.to_string(),
        });
        if state.fail_attach {
            Err(rejected("attachVolume"))
        } else {
            Ok(())
        }
    }

    async fn detach_volume(&self, volume_id: &VolumeId) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Detach {
            volume_id: volume_id.to_string(),
        });
        if state.fail_detach {
            Err(rejected("detachVolume"))
        } else {
            Ok(())
        }
    }

    async fn create_volume(&self, request: &CreateVolumeRequest) -> Result<VolumeId> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Create(request.clone()));
        let id = format!("vol-{:08x}", state.calls.len());
        VolumeId::parse(&id).map_err(|e| ApiError::Decode {
            endpoint: "createVolume".to_string(),
            message: e.to_string(),
        })
    }

    async fn delete_volume(&self, volume_id: &VolumeId) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Delete {
            volume_id: volume_id.to_string(),
        });
        if state.fail_delete {
            return Err(rejected("deleteVolume"));
        }
        state.volumes.retain(|volume| !volume.id.matches(volume_id));
        Ok(())
    }

    async fn list_instances(&self) -> Result<Vec<Instance>> {
        Ok(self.state.lock().instances.clone())
    }

    async fn list_images(&self) -> Result<Vec<Image>> {
        let mut images = self.state.lock().images.clone();
        name_unnamed_images(&mut images);
        Ok(images)
    }

    async fn list_apps(&self) -> Result<Vec<App>> {
        Ok(self.state.lock().apps.clone())
    }

    async fn launch_instance(&self, request: &LaunchInstanceRequest) -> Result<String> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Launch(request.clone()));
        Ok(format!("i-{:08x}", state.calls.len()))
    }

    async fn terminate_instance(&self, instance_id: &str) -> Result<()> {
        self.state.lock().calls.push(MockCall::Terminate {
            instance_id: instance_id.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume(id: &str, status: &str) -> Volume {
        Volume {
            id: VolumeId::parse(id).unwrap(),
            name: "data".to_string(),
            tags: String::new(),
            description: String::new(),
            status: status.to_string(),
            size: 1,
            create_time: String::new(),
            attached_device: None,
            attached_instance_id: None,
            attach_time: None,
            snapshot_id: None,
            num: 1,
        }
    }

    #[tokio::test]
    async fn scripted_listings_then_repeat_last() {
        let api = MockAtmoApi::new().with_volumes(vec![volume("vol-1", "available")]);
        api.push_volume_listing(vec![volume("vol-1", "attaching")]);
        api.push_volume_listing(vec![volume("vol-1", "in-use")]);

        let id = VolumeId::parse("vol-1").unwrap();
        assert_eq!(api.get_volume(&id).await.unwrap().status, "available");
        assert_eq!(api.list_volumes().await.unwrap()[0].status, "attaching");
        assert_eq!(api.list_volumes().await.unwrap()[0].status, "in-use");
        assert_eq!(api.list_volumes().await.unwrap()[0].status, "in-use");
        assert_eq!(api.listing_count(), 3);
        assert!(!api.has_mutations());
    }

    #[tokio::test]
    async fn failures_are_configurable() {
        let api = MockAtmoApi::new();
        api.fail_attach();
        let id = VolumeId::parse("vol-1").unwrap();
        assert!(api.attach_volume("i-1", &id, "sdb").await.is_err());
        assert!(api.detach_volume(&id).await.is_ok());
        assert_eq!(api.calls().len(), 2);
    }
}
