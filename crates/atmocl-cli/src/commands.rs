//! Command dispatch.
//!
//! Each [`Action`] maps to one remote call or one volume workflow. Missing
//! parameters are filled in interactively where a listing can offer choices.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use atmocl_api::{AtmoApi, CreateVolumeRequest, LaunchInstanceRequest};
use atmocl_core::VolumeId;
use atmocl_volume::{
    resolve_instance_id, Confirmation, Console, DeviceSelection, MountRequest, ProcessRunner,
    UnmountRequest, VolumeWorkflows, DEFAULT_DEVICE,
};
use tracing::debug;

use crate::args::Action;
use crate::output::{
    app_line, image_line, image_name_from_arg, instance_line, numbered, parse_selection,
    volume_line,
};

/// Settings that shape individual commands.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Device given with `-d`; probing is used when absent.
    pub device: Option<PathBuf>,
    /// Offer to format even if a filesystem is found.
    pub force_format: bool,
    /// Instance to attach to; discovered from the host when absent.
    pub instance_id: Option<String>,
    /// Local user who should own mounted directories.
    pub owner: Option<String>,
    /// Parameters for `volcreate`.
    pub create: CreateVolumeRequest,
}

/// Runs commands against an API, a process runner and a console.
pub struct Dispatcher<A: ?Sized, R, C> {
    api: Arc<A>,
    workflows: VolumeWorkflows<A, R, C>,
    options: Options,
}

impl<A, R, C> Dispatcher<A, R, C>
where
    A: AtmoApi + ?Sized,
    R: ProcessRunner,
    C: Console,
{
    /// Create a dispatcher over `workflows`, which must share `api`.
    pub fn new(api: Arc<A>, workflows: VolumeWorkflows<A, R, C>, options: Options) -> Self {
        Self {
            api,
            workflows,
            options,
        }
    }

    fn console(&self) -> &C {
        self.workflows.console()
    }

    fn print(&self, line: &str) {
        self.console().print(line);
    }

    fn print_all(&self, lines: &[String]) {
        for line in lines {
            self.print(line);
        }
    }

    /// Run `action` with its positional `params`.
    ///
    /// # Errors
    ///
    /// Workflow failures are returned as [`atmocl_volume::WorkflowError`]
    /// inside the `anyhow` error so the caller can pick the exit code.
    pub async fn run(&self, action: Action, params: &[String]) -> anyhow::Result<()> {
        debug!(%action, ?params, "Dispatching command");
        let first = params.first().map(String::as_str);
        let second = params.get(1).map(String::as_str);

        match action {
            Action::VolumeMount => self.mount(first, second).await,
            Action::VolumeDetach => self.detach(first, second).await,
            Action::VolumeList => self.list_volumes().await,
            Action::VolumeCreate => self.create_volume().await,
            Action::VolumeDelete => self.delete_volume(first).await,
            Action::InstanceLaunch => self.launch_instance(first).await,
            Action::InstanceTerminate => self.terminate_instance(first).await,
            Action::InstanceList => self.list_instances().await,
            Action::ImageList => self.list_images().await,
            Action::AppList => self.list_apps().await,
            Action::ListAll => {
                self.print("Images:");
                self.list_images().await?;
                self.print("");
                self.print("Instances:");
                self.list_instances().await?;
                self.print("");
                self.print("Volumes:");
                self.list_volumes().await
            }
        }
    }

    // =========================================================================
    // Volumes
    // =========================================================================

    async fn mount(&self, volume: Option<&str>, directory: Option<&str>) -> anyhow::Result<()> {
        let (Some(volume_id), Some(directory)) = (
            self.volume_param(volume).await?,
            self.directory_param(directory),
        ) else {
            bail!("Usage: atmocl volmount <volumeId> <directory>");
        };

        let instance_id = match &self.options.instance_id {
            Some(id) => id.clone(),
            None => resolve_instance_id(self.workflows.provisioner().runner())
                .await
                .context("Could not determine this instance's id; pass --instance")?,
        };

        let device = match &self.options.device {
            Some(device) => DeviceSelection::Explicit(device.clone()),
            None => DeviceSelection::Scan(PathBuf::from(DEFAULT_DEVICE)),
        };

        let request = MountRequest {
            volume_id,
            device,
            directory,
            instance_id,
            owner: self.options.owner.clone(),
            force_format: self.options.force_format,
        };
        self.workflows.mount_volume(&request).await?;
        Ok(())
    }

    async fn detach(&self, volume: Option<&str>, directory: Option<&str>) -> anyhow::Result<()> {
        let (Some(volume_id), Some(directory)) = (
            self.volume_param(volume).await?,
            self.directory_param(directory),
        ) else {
            bail!("Usage: atmocl voldet <volumeId> <directory>");
        };

        let request = UnmountRequest {
            volume_id,
            device: self
                .options
                .device
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DEVICE)),
            directory,
        };
        self.workflows.unmount_volume(&request).await?;
        Ok(())
    }

    async fn delete_volume(&self, volume: Option<&str>) -> anyhow::Result<()> {
        let Some(volume_id) = self.volume_param(volume).await? else {
            bail!("Usage: atmocl voldel <volumeId>");
        };
        self.workflows
            .delete_volume(&volume_id, Confirmation::YES)
            .await?;
        Ok(())
    }

    async fn create_volume(&self) -> anyhow::Result<()> {
        let request = &self.options.create;
        let id = self.api.create_volume(request).await?;
        self.print(&format!(
            "Created volume {id} ({} GB, \"{}\")",
            request.size_gb, request.name
        ));
        Ok(())
    }

    async fn list_volumes(&self) -> anyhow::Result<()> {
        let volumes = self.api.list_volumes().await?;
        if volumes.is_empty() {
            self.print("No volumes.");
        }
        self.print_all(&numbered(volumes.iter().map(volume_line)));
        Ok(())
    }

    async fn volume_param(&self, given: Option<&str>) -> anyhow::Result<Option<VolumeId>> {
        if let Some(id) = given {
            return Ok(Some(VolumeId::parse(id)?));
        }
        let volumes = self.api.list_volumes().await?;
        let lines: Vec<String> = volumes.iter().map(volume_line).collect();
        Ok(self
            .select("Volumes:", &lines)
            .map(|i| volumes[i].id.clone()))
    }

    fn directory_param(&self, given: Option<&str>) -> Option<PathBuf> {
        given
            .map(ToString::to_string)
            .or_else(|| self.console().ask("Directory: "))
            .map(|dir| dir.trim().to_string())
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
    }

    // =========================================================================
    // Instances, images and apps
    // =========================================================================

    async fn launch_instance(&self, image: Option<&str>) -> anyhow::Result<()> {
        let name = match image {
            Some(arg) => Some(image_name_from_arg(arg)),
            None => {
                let images = self.api.list_images().await?;
                let lines: Vec<String> = images.iter().map(image_line).collect();
                self.select("Images:", &lines)
                    .map(|i| images[i].name.clone())
            }
        };
        let Some(name) = name else {
            bail!("Usage: atmocl instlaunch <imageName>");
        };

        let image = self.api.find_image_by_name(&name).await?;
        let request = LaunchInstanceRequest::new(name, image.id);
        let instance_id = self.api.launch_instance(&request).await?;
        self.print(&format!("Launched instance {instance_id}"));
        Ok(())
    }

    async fn terminate_instance(&self, instance: Option<&str>) -> anyhow::Result<()> {
        let instance_id = match instance {
            Some(id) => Some(id.to_string()),
            None => {
                let instances = self.api.list_instances().await?;
                let lines: Vec<String> = instances.iter().map(instance_line).collect();
                self.select("Instances:", &lines)
                    .map(|i| instances[i].id.clone())
            }
        };
        let Some(instance_id) = instance_id else {
            bail!("Usage: atmocl instterminate <instanceId>");
        };

        self.api.terminate_instance(&instance_id).await?;
        self.print(&format!("Terminated instance {instance_id}"));
        Ok(())
    }

    async fn list_instances(&self) -> anyhow::Result<()> {
        let instances = self.api.list_instances().await?;
        self.print_all(&numbered(instances.iter().map(instance_line)));
        Ok(())
    }

    async fn list_images(&self) -> anyhow::Result<()> {
        let images = self.api.list_images().await?;
        self.print_all(&numbered(images.iter().map(image_line)));
        Ok(())
    }

    async fn list_apps(&self) -> anyhow::Result<()> {
        let apps = self.api.list_apps().await?;
        self.print_all(&numbered(apps.iter().map(app_line)));
        Ok(())
    }

    /// Show `lines` numbered and read a choice; `None` for no valid choice.
    fn select(&self, heading: &str, lines: &[String]) -> Option<usize> {
        if lines.is_empty() {
            return None;
        }
        self.print(heading);
        self.print_all(&numbered(lines));
        let answer = self.console().ask("Select a number: ")?;
        parse_selection(&answer, lines.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atmocl_api::{MockAtmoApi, MockCall};
    use atmocl_core::{Image, Instance, Volume};
    use atmocl_volume::{
        CommandOutput, ScriptedConsole, ScriptedRunner, WorkflowConfig, WorkflowError,
    };

    type TestDispatcher = Dispatcher<MockAtmoApi, ScriptedRunner, ScriptedConsole>;

    fn volume(id: &str) -> Volume {
        Volume {
            id: VolumeId::parse(id).unwrap(),
            name: "data".to_string(),
            tags: String::new(),
            description: String::new(),
            status: "available".to_string(),
            size: 10,
            create_time: String::new(),
            attached_device: None,
            attached_instance_id: None,
            attach_time: None,
            snapshot_id: None,
            num: 1,
        }
    }

    fn image(id: &str, name: &str) -> Image {
        Image {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            tags: String::new(),
            location: None,
            owner_id: None,
            state: Some("available".to_string()),
            architecture: None,
            image_type: None,
            visibility: Some("public".to_string()),
        }
    }

    fn instance(id: &str) -> Instance {
        Instance {
            id: id.to_string(),
            name: "worker".to_string(),
            state: "running".to_string(),
            placement: None,
            image_id: None,
            launch_time: None,
            public_dns_name: None,
            private_dns_name: None,
            key_name: None,
            instance_type: None,
        }
    }

    fn dispatcher(
        api: MockAtmoApi,
        runner: ScriptedRunner,
        console: ScriptedConsole,
        options: Options,
    ) -> (Arc<MockAtmoApi>, TestDispatcher) {
        let api = Arc::new(api);
        let workflows = VolumeWorkflows::new(
            Arc::clone(&api),
            runner,
            console,
            WorkflowConfig::without_delays(),
        );
        (Arc::clone(&api), Dispatcher::new(api, workflows, options))
    }

    fn params(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn volume_listing_is_numbered() {
        let (_api, dispatcher) = dispatcher(
            MockAtmoApi::new().with_volumes(vec![volume("vol-00000001"), volume("vol-00000002")]),
            ScriptedRunner::new(),
            ScriptedConsole::default(),
            Options::default(),
        );

        dispatcher.run(Action::VolumeList, &[]).await.unwrap();

        let printed = dispatcher.console().printed();
        assert!(printed[0].starts_with("1. vol-00000001"));
        assert!(printed[1].starts_with("2. vol-00000002"));
    }

    #[tokio::test]
    async fn allget_prints_three_sections() {
        let (_api, dispatcher) = dispatcher(
            MockAtmoApi::new()
                .with_volumes(vec![volume("vol-00000001")])
                .with_instances(vec![instance("i-00000001")])
                .with_images(vec![image("emi-1", ""), image("emi-2", "")]),
            ScriptedRunner::new(),
            ScriptedConsole::default(),
            Options::default(),
        );

        dispatcher.run(Action::ListAll, &[]).await.unwrap();

        let console = dispatcher.console();
        for heading in ["Images:", "Instances:", "Volumes:"] {
            assert!(console.printed_contains(heading));
        }
        assert!(console.printed_contains("Unnamed Image 2"));
    }

    #[tokio::test]
    async fn create_uses_requested_size_and_name() {
        let options = Options {
            create: CreateVolumeRequest::new(5, "scratch"),
            ..Options::default()
        };
        let (api, dispatcher) = dispatcher(
            MockAtmoApi::new(),
            ScriptedRunner::new(),
            ScriptedConsole::default(),
            options,
        );

        dispatcher.run(Action::VolumeCreate, &[]).await.unwrap();

        assert_eq!(
            api.calls(),
            [MockCall::Create(CreateVolumeRequest::new(5, "scratch"))]
        );
        assert!(dispatcher.console().printed_contains("Created volume"));
    }

    #[tokio::test]
    async fn missing_volume_is_selected_from_listing() {
        let (api, dispatcher) = dispatcher(
            MockAtmoApi::new().with_volumes(vec![volume("vol-00000001"), volume("vol-00000002")]),
            ScriptedRunner::new(),
            ScriptedConsole::with_answers(["2", "YES"]),
            Options::default(),
        );

        dispatcher.run(Action::VolumeDelete, &[]).await.unwrap();

        assert!(api.calls().contains(&MockCall::Delete {
            volume_id: "vol-00000002".to_string()
        }));
    }

    #[tokio::test]
    async fn invalid_selection_reports_usage() {
        let (api, dispatcher) = dispatcher(
            MockAtmoApi::new().with_volumes(vec![volume("vol-00000001")]),
            ScriptedRunner::new(),
            ScriptedConsole::with_answers(["7"]),
            Options::default(),
        );

        let err = dispatcher.run(Action::VolumeDelete, &[]).await.unwrap_err();

        assert!(err.to_string().starts_with("Usage: atmocl voldel"));
        assert!(!api.has_mutations());
    }

    #[tokio::test]
    async fn declined_delete_keeps_volume() {
        let (api, dispatcher) = dispatcher(
            MockAtmoApi::new().with_volumes(vec![volume("vol-00000001")]),
            ScriptedRunner::new(),
            ScriptedConsole::with_answers(["yes"]),
            Options::default(),
        );

        let err = dispatcher
            .run(Action::VolumeDelete, &params(&["vol-00000001"]))
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<WorkflowError>(),
            Some(WorkflowError::ConfirmationDeclined)
        ));
        assert!(!api.has_mutations());
    }

    #[tokio::test]
    async fn mount_discovers_instance_from_host() {
        let runner = ScriptedRunner::new().on(
            atmocl_volume::host::ATMOINFO,
            CommandOutput::with_stdout("hostname: vm-12\ninstance-id: i-4E8B08A7\n"),
        );
        let api = MockAtmoApi::new().with_volumes(vec![volume("vol-0000abcd")]);
        api.fail_attach();
        let dir = tempfile::tempdir().unwrap();
        let options = Options {
            device: Some(dir.path().join("sdz")),
            ..Options::default()
        };
        let (api, dispatcher) = dispatcher(api, runner, ScriptedConsole::default(), options);
        let directory = dir.path().join("mnt").display().to_string();

        let err = dispatcher
            .run(
                Action::VolumeMount,
                &params(&["vol-0000abcd", directory.as_str()]),
            )
            .await
            .unwrap_err();

        assert_eq!(
            err.downcast_ref::<WorkflowError>().map(WorkflowError::exit_code),
            Some(1)
        );
        assert!(matches!(
            api.calls().first(),
            Some(MockCall::Attach { instance_id, device, .. })
                if instance_id == "i-4E8B08A7" && device.ends_with("sdz")
        ));
    }

    #[tokio::test]
    async fn mount_without_instance_id_fails_before_attach() {
        let runner = ScriptedRunner::new().on_spawn_error(atmocl_volume::host::ATMOINFO);
        let (api, dispatcher) = dispatcher(
            MockAtmoApi::new().with_volumes(vec![volume("vol-0000abcd")]),
            runner,
            ScriptedConsole::default(),
            Options::default(),
        );

        let err = dispatcher
            .run(Action::VolumeMount, &params(&["vol-0000abcd", "/mnt/data"]))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("--instance"));
        assert!(!api.has_mutations());
    }

    #[tokio::test]
    async fn detach_with_nothing_attached_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let options = Options {
            device: Some(dir.path().join("sdz")),
            ..Options::default()
        };
        let (api, dispatcher) = dispatcher(
            MockAtmoApi::new(),
            ScriptedRunner::new(),
            ScriptedConsole::default(),
            options,
        );

        dispatcher
            .run(Action::VolumeDetach, &params(&["vol-0000abcd", "/mnt/data"]))
            .await
            .unwrap();

        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn launch_finds_image_by_spaced_name() {
        let (api, dispatcher) = dispatcher(
            MockAtmoApi::new().with_images(vec![
                image("emi-1", "CentOS 5"),
                image("emi-2", "Ubuntu 10.04 Base"),
            ]),
            ScriptedRunner::new(),
            ScriptedConsole::default(),
            Options::default(),
        );

        dispatcher
            .run(Action::InstanceLaunch, &params(&["Ubuntu_10.04_Base"]))
            .await
            .unwrap();

        assert_eq!(
            api.calls(),
            [MockCall::Launch(LaunchInstanceRequest::new(
                "Ubuntu 10.04 Base",
                "emi-2"
            ))]
        );
        assert!(dispatcher.console().printed_contains("Launched instance i-"));
    }

    #[tokio::test]
    async fn terminate_selects_instance() {
        let (api, dispatcher) = dispatcher(
            MockAtmoApi::new().with_instances(vec![instance("i-00000001"), instance("i-00000002")]),
            ScriptedRunner::new(),
            ScriptedConsole::with_answers(["1"]),
            Options::default(),
        );

        dispatcher.run(Action::InstanceTerminate, &[]).await.unwrap();

        assert_eq!(
            api.calls(),
            [MockCall::Terminate {
                instance_id: "i-00000001".to_string()
            }]
        );
    }
}
