//! The remote control API contract and its HTTP implementation.
//!
//! Every call is authenticated with the session's credentials. When they are
//! missing or older than 24 hours and a login is configured, the client
//! authenticates first and then proceeds with the call.

use std::time::Duration;

use async_trait::async_trait;
use atmocl_auth::{AuthClient, CredentialSet};
use atmocl_core::{App, Image, Instance, Volume, VolumeId};
use chrono::Utc;
use parking_lot::Mutex;
use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::envelope::ResultBody;
use crate::error::{ApiError, Result};
use crate::requests::{CreateVolumeRequest, LaunchInstanceRequest};
use crate::session::Session;
use crate::ApiConfig;

/// Value `attachVolume` reports when the attach was accepted.
const ATTACHING: &str = "attaching";

/// Device and instance placeholders the server expects on detach.
const DETACH_DEVICE: &str = "sdb";
const DETACH_INSTANCE: &str = "undefined";

/// Trait for the cloud control API.
///
/// This trait abstracts the remote service, allowing the volume workflows to
/// run against a mock in tests.
#[async_trait]
pub trait AtmoApi: Send + Sync {
    /// Fetch the full volume listing.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    async fn list_volumes(&self) -> Result<Vec<Volume>>;

    /// Look up one volume, matching its id case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the listing has no such volume, or the listing error.
    async fn get_volume(&self, id: &VolumeId) -> Result<Volume> {
        let volumes = self.list_volumes().await?;
        find_volume(&volumes, id)
    }

    /// Attach a volume to an instance at `device` (without the `/dev/` prefix).
    ///
    /// # Errors
    ///
    /// Returns `Rejected` unless the server reports the attach as in progress.
    async fn attach_volume(&self, instance_id: &str, volume_id: &VolumeId, device: &str)
        -> Result<()>;

    /// Detach a volume from whatever instance holds it.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` unless the server reports success.
    async fn detach_volume(&self, volume_id: &VolumeId) -> Result<()>;

    /// Create a volume and return its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or no id comes back.
    async fn create_volume(&self, request: &CreateVolumeRequest) -> Result<VolumeId>;

    /// Delete a volume.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` unless the server reports success.
    async fn delete_volume(&self, volume_id: &VolumeId) -> Result<()>;

    /// Fetch the instance listing.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    async fn list_instances(&self) -> Result<Vec<Instance>>;

    /// Fetch the image catalog. Images without a name are listed as `Unnamed Image N`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    async fn list_images(&self) -> Result<Vec<Image>>;

    /// Fetch the application catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    async fn list_apps(&self) -> Result<Vec<App>>;

    /// Launch an instance and return its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects it.
    async fn launch_instance(&self, request: &LaunchInstanceRequest) -> Result<String>;

    /// Terminate an instance.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` unless the server reports success.
    async fn terminate_instance(&self, instance_id: &str) -> Result<()>;

    /// Find an image by its display name.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no image has that name, or the listing error.
    async fn find_image_by_name(&self, name: &str) -> Result<Image> {
        self.list_images()
            .await?
            .into_iter()
            .find(|image| image.name == name)
            .ok_or_else(|| ApiError::NotFound {
                kind: "image",
                id: name.to_string(),
            })
    }
}

/// Find a volume in a listing by id, ignoring ASCII case.
///
/// # Errors
///
/// Returns `NotFound` if no volume matches.
pub fn find_volume(volumes: &[Volume], id: &VolumeId) -> Result<Volume> {
    volumes
        .iter()
        .find(|volume| volume.id.matches(id))
        .cloned()
        .ok_or_else(|| ApiError::NotFound {
            kind: "volume",
            id: id.to_string(),
        })
}

/// Give every image with an empty name the placeholder `Unnamed Image N`, counting from 1.
pub fn name_unnamed_images(images: &mut [Image]) {
    let mut unnamed = 0;
    for image in images.iter_mut().filter(|image| image.name.trim().is_empty()) {
        unnamed += 1;
        image.name = format!("Unnamed Image {unnamed}");
    }
}

// =============================================================================
// HTTP implementation
// =============================================================================

struct Login {
    username: String,
    password: String,
}

/// HTTP client for the Atmosphere control API.
pub struct HttpAtmoClient {
    http: reqwest::Client,
    auth: AuthClient,
    login: Option<Login>,
    session: Mutex<Session>,
}

impl HttpAtmoClient {
    /// Create a client with an empty session.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created.
    #[must_use]
    pub fn new(config: &ApiConfig, auth: AuthClient) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .user_agent(auth.config().user_agent.clone())
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            auth,
            login: None,
            session: Mutex::new(Session::default()),
        }
    }

    /// Start with credentials obtained elsewhere (e.g. the cache).
    #[must_use]
    pub fn with_credentials(self, credentials: CredentialSet) -> Self {
        *self.session.lock() = Session::with_credentials(credentials);
        self
    }

    /// Allow the client to authenticate on its own when credentials run out.
    #[must_use]
    pub fn with_login(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.login = Some(Login {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    async fn ensure_credentials(&self) -> Result<CredentialSet> {
        let cached = self.session.lock().valid_credentials(Utc::now());
        if let Some(credentials) = cached {
            return Ok(credentials);
        }

        let Some(login) = &self.login else {
            return Err(ApiError::NotAuthenticated);
        };

        info!(user = %login.username, "Credentials missing or expired, authenticating");
        let credentials = self
            .auth
            .authenticate(&login.username, &login.password)
            .await?;
        self.session.lock().set_credentials(credentials.clone());
        Ok(credentials)
    }

    async fn request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder> {
        let credentials = self.ensure_credentials().await?;
        let url = format!("{}/{endpoint}", credentials.server_url.trim_end_matches('/'));

        Ok(self
            .http
            .request(method, url)
            .header(ACCEPT, "text/plain")
            .header("X-Auth-User", credentials.username.as_str())
            .header("X-Auth-Token", credentials.token.as_str())
            .header("X-Api-Server", credentials.server_url.as_str())
            .header("X-Api-Version", credentials.api_version.as_str()))
    }

    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<ResultBody> {
        let response = request.send().await.map_err(|e| ApiError::Transport {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(endpoint, status = %status, "Control API returned non-success status");
            if status == StatusCode::UNAUTHORIZED {
                self.session.lock().clear_credentials();
            }
            return Err(ApiError::Http {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| ApiError::Transport {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;
        ResultBody::parse(endpoint, &body)
    }

    async fn get(&self, endpoint: &str) -> Result<ResultBody> {
        let request = self.request(Method::GET, endpoint).await?;
        debug!(endpoint, "GET");
        self.send(endpoint, request).await
    }

    async fn post<F>(&self, endpoint: &str, form: &F) -> Result<ResultBody>
    where
        F: Serialize + Sync + ?Sized,
    {
        self.session.lock().invalidate();
        let request = self.request(Method::POST, endpoint).await?.form(form);
        debug!(endpoint, "POST");
        self.send(endpoint, request).await
    }
}

#[async_trait]
impl AtmoApi for HttpAtmoClient {
    async fn list_volumes(&self) -> Result<Vec<Volume>> {
        let volumes: Vec<Volume> = self.get("getVolumeList").await?.records("getVolumeList")?;
        self.session.lock().store_volumes(volumes.clone());
        Ok(volumes)
    }

    async fn get_volume(&self, id: &VolumeId) -> Result<Volume> {
        let cached = self.session.lock().volumes().map(<[Volume]>::to_vec);
        let volumes = match cached {
            Some(volumes) => volumes,
            None => self.list_volumes().await?,
        };
        find_volume(&volumes, id)
    }

    async fn attach_volume(
        &self,
        instance_id: &str,
        volume_id: &VolumeId,
        device: &str,
    ) -> Result<()> {
        let form = [
            ("device", device),
            ("instance_id", instance_id),
            ("volume_id", volume_id.as_str()),
        ];
        let body = self
            .post("attachVolume", &form)
            .await?
            .require_success("attachVolume")?;

        if body.value_str() == Some(ATTACHING) {
            info!(volume_id = %volume_id, instance_id, device, "Attach accepted");
            Ok(())
        } else {
            Err(body.rejected("attachVolume"))
        }
    }

    async fn detach_volume(&self, volume_id: &VolumeId) -> Result<()> {
        let form = [
            ("device", DETACH_DEVICE),
            ("instance_id", DETACH_INSTANCE),
            ("volume_id", volume_id.as_str()),
        ];
        self.post("detachVolume", &form)
            .await?
            .require_success("detachVolume")?;
        info!(volume_id = %volume_id, "Detach accepted");
        Ok(())
    }

    async fn create_volume(&self, request: &CreateVolumeRequest) -> Result<VolumeId> {
        let body = self
            .post("createVolume", request)
            .await?
            .require_success("createVolume")?;

        let id = body
            .value
            .get(0)
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ApiError::Decode {
                endpoint: "createVolume".to_string(),
                message: format!("expected a volume id list, got {}", body.value),
            })?;

        VolumeId::parse(id).map_err(|e| ApiError::Decode {
            endpoint: "createVolume".to_string(),
            message: e.to_string(),
        })
    }

    async fn delete_volume(&self, volume_id: &VolumeId) -> Result<()> {
        self.post("deleteVolume", &[("volume_id", volume_id.as_str())])
            .await?
            .require_success("deleteVolume")?;
        info!(volume_id = %volume_id, "Volume deleted");
        Ok(())
    }

    async fn list_instances(&self) -> Result<Vec<Instance>> {
        self.get("getInstanceList")
            .await?
            .records("getInstanceList")
    }

    async fn list_images(&self) -> Result<Vec<Image>> {
        let mut images: Vec<Image> = self.get("getImageList").await?.records("getImageList")?;
        name_unnamed_images(&mut images);
        Ok(images)
    }

    async fn list_apps(&self) -> Result<Vec<App>> {
        self.get("getAppList").await?.records("getAppList")
    }

    async fn launch_instance(&self, request: &LaunchInstanceRequest) -> Result<String> {
        let body = self
            .post("launchInstance", request)
            .await?
            .require_success("launchInstance")?;

        body.value_str()
            .filter(|id| !id.is_empty())
            .map(ToString::to_string)
            .ok_or_else(|| ApiError::Decode {
                endpoint: "launchInstance".to_string(),
                message: format!("expected an instance id, got {}", body.value),
            })
    }

    async fn terminate_instance(&self, instance_id: &str) -> Result<()> {
        self.post("terminateInstance", &[("instance_id", instance_id)])
            .await?
            .require_success("terminateInstance")?;
        info!(instance_id, "Instance terminated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atmocl_auth::AuthConfig;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials_for(server: &MockServer) -> CredentialSet {
        CredentialSet {
            server_url: format!("{}/resources", server.uri()),
            token: "tok-1".to_string(),
            username: "esteve".to_string(),
            api_version: "v1".to_string(),
            issued_at: Utc::now(),
        }
    }

    fn client_for(server: &MockServer) -> HttpAtmoClient {
        let auth = AuthClient::new(AuthConfig::with_url(format!("{}/auth", server.uri())));
        HttpAtmoClient::new(&ApiConfig::default(), auth).with_credentials(credentials_for(server))
    }

    fn envelope(code: &str, value: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .set_body_string(json!({ "result": { "code": code, "value": value } }).to_string())
    }

    fn volume_json(id: &str, status: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": "data",
            "tags": "",
            "description": "",
            "status": status,
            "size": 10,
            "create_time": "2011-07-11",
            "attach_data_device": null,
            "attach_data_instance_id": null,
            "attach_data_attach_time": null,
            "snapshot_id": null,
            "no": 1
        })
    }

    #[tokio::test]
    async fn list_volumes_sends_session_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/resources/getVolumeList"))
            .and(header("X-Auth-User", "esteve"))
            .and(header("X-Auth-Token", "tok-1"))
            .and(header("X-Api-Version", "v1"))
            .respond_with(envelope(
                "success",
                json!([volume_json("vol-0000abcd", "available")]),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let volumes = client_for(&server).list_volumes().await.unwrap();
        assert_eq!(volumes.len(), 1);
        assert_eq!(volumes[0].status, "available");
    }

    #[tokio::test]
    async fn get_volume_matches_case_insensitively_and_uses_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/resources/getVolumeList"))
            .respond_with(envelope(
                "success",
                json!([volume_json("vol-0000abcd", "available")]),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let id = VolumeId::parse("vol-0000ABCD").unwrap();
        let first = client.get_volume(&id).await.unwrap();
        let second = client.get_volume(&id).await.unwrap();
        assert_eq!(first, second);

        let missing = VolumeId::parse("vol-ffffffff").unwrap();
        assert!(client.get_volume(&missing).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn mutating_call_invalidates_listing_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/resources/getVolumeList"))
            .respond_with(envelope(
                "success",
                json!([volume_json("vol-0000abcd", "in-use")]),
            ))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/resources/detachVolume"))
            .respond_with(envelope("success", json!("detaching")))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let id = VolumeId::parse("vol-0000abcd").unwrap();
        client.get_volume(&id).await.unwrap();
        client.detach_volume(&id).await.unwrap();
        client.get_volume(&id).await.unwrap();
    }

    #[tokio::test]
    async fn attach_requires_attaching_value() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/resources/attachVolume"))
            .and(body_string_contains("device=sdb"))
            .and(body_string_contains("instance_id=i-12345678"))
            .and(body_string_contains("volume_id=vol-0000ABCD"))
            .respond_with(envelope("success", json!("attaching")))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let id = VolumeId::parse("vol-0000ABCD").unwrap();
        client.attach_volume("i-12345678", &id, "sdb").await.unwrap();
    }

    #[tokio::test]
    async fn attach_with_unexpected_value_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/resources/attachVolume"))
            .respond_with(envelope("success", json!("in-use")))
            .mount(&server)
            .await;

        let id = VolumeId::parse("vol-0000ABCD").unwrap();
        let err = client_for(&server)
            .attach_volume("i-12345678", &id, "sdb")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Rejected { operation: "attachVolume", .. }));
    }

    #[tokio::test]
    async fn detach_sends_placeholders() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/resources/detachVolume"))
            .and(body_string_contains("instance_id=undefined"))
            .and(body_string_contains("volume_id=vol-0000ABCD"))
            .respond_with(envelope("failed", json!(null)))
            .mount(&server)
            .await;

        let id = VolumeId::parse("vol-0000ABCD").unwrap();
        let err = client_for(&server).detach_volume(&id).await.unwrap_err();
        assert!(matches!(err, ApiError::Rejected { operation: "detachVolume", .. }));
    }

    #[tokio::test]
    async fn create_volume_returns_first_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/resources/createVolume"))
            .and(body_string_contains("size=5"))
            .and(body_string_contains("name=scratch"))
            .respond_with(envelope("success", json!(["vol-12345678", "creating"])))
            .mount(&server)
            .await;

        let id = client_for(&server)
            .create_volume(&CreateVolumeRequest::new(5, "scratch"))
            .await
            .unwrap();
        assert_eq!(id.as_str(), "vol-12345678");
    }

    #[tokio::test]
    async fn http_error_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/resources/getInstanceList"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client_for(&server).list_instances().await.unwrap_err();
        assert!(matches!(err, ApiError::Http { status: 500, .. }));
        assert!(!err.is_auth_failure());
    }

    #[tokio::test]
    async fn malformed_listing_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/resources/getVolumeList"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server).list_volumes().await.unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }

    #[tokio::test]
    async fn unnamed_images_get_placeholders() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/resources/getImageList"))
            .respond_with(envelope(
                "success",
                json!([
                    { "image_id": "emi-1", "image_name": "" },
                    { "image_id": "emi-2", "image_name": "Ubuntu 10.04" },
                    { "image_id": "emi-3", "image_name": null }
                ]),
            ))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let names: Vec<String> = client
            .list_images()
            .await
            .unwrap()
            .into_iter()
            .map(|image| image.name)
            .collect();
        assert_eq!(names, ["Unnamed Image 1", "Ubuntu 10.04", "Unnamed Image 2"]);

        let found = client.find_image_by_name("Ubuntu 10.04").await.unwrap();
        assert_eq!(found.id, "emi-2");
    }

    #[tokio::test]
    async fn authenticates_transparently_when_credentials_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth"))
            .and(header("X-Auth-User", "esteve"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Auth-Token", "fresh-token")
                    .insert_header(
                        "X-Server-Management-Url",
                        format!("{}/resources", server.uri()).as_str(),
                    ),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/resources/getAppList"))
            .and(header("X-Auth-Token", "fresh-token"))
            .respond_with(envelope("success", json!([])))
            .expect(2)
            .mount(&server)
            .await;

        let auth = AuthClient::new(AuthConfig::with_url(format!("{}/auth", server.uri())));
        let client = HttpAtmoClient::new(&ApiConfig::default(), auth).with_login("esteve", "secret");

        assert!(client.list_apps().await.unwrap().is_empty());
        assert!(client.list_apps().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_credentials_and_no_login() {
        let auth = AuthClient::new(AuthConfig::default());
        let client = HttpAtmoClient::new(&ApiConfig::default(), auth);
        let err = client.list_volumes().await.unwrap_err();
        assert!(matches!(err, ApiError::NotAuthenticated));
    }
}
