//! Command-line arguments and the command keyword.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use atmocl_api::CreateVolumeRequest;
use clap::Parser;

/// Atmosphere CLI - manage volumes, instances and images from an instance shell.
#[derive(Parser, Debug)]
#[command(name = "atmocl")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Atmosphere username.
    #[arg(short = 'u', long)]
    pub user: Option<String>,

    /// Atmosphere password. Prompted for without echo if omitted.
    #[arg(short = 'p', long)]
    pub password: Option<String>,

    /// Block device of the volume (default /dev/sdb). Skips device probing.
    #[arg(short = 'd', long, value_parser = parse_device)]
    pub device: Option<PathBuf>,

    /// Offer to format the device even if it already has a filesystem.
    #[arg(short = 'f', long = "force-format")]
    pub force_format: bool,

    /// Show the command reference and exit.
    #[arg(short = 'x', long = "extended-help")]
    pub extended_help: bool,

    /// Enable debug logging.
    #[arg(short = 'q', long)]
    pub debug: bool,

    /// Instance to attach volumes to. Discovered from the host if omitted.
    #[arg(long, env = "ATMO_INSTANCE_ID")]
    pub instance: Option<String>,

    /// Authentication endpoint.
    #[arg(long, env = "ATMO_AUTH_URL")]
    pub auth_url: Option<String>,

    /// Credential cache file (default ~/.atmocl).
    #[arg(long, env = "ATMOCL_CREDENTIALS")]
    pub credentials_file: Option<PathBuf>,

    /// Size in GB for `volcreate`.
    #[arg(long, default_value_t = CreateVolumeRequest::DEFAULT_SIZE_GB)]
    pub size: u32,

    /// Name for `volcreate`.
    #[arg(long, default_value = CreateVolumeRequest::DEFAULT_NAME)]
    pub name: String,

    /// Run privileged commands through `sudo -n`.
    #[arg(long)]
    pub sudo: bool,

    /// Command keyword, e.g. `volmount`. See `-x` for the full list.
    pub command: Option<String>,

    /// Command parameters.
    pub params: Vec<String>,
}

fn parse_device(value: &str) -> Result<PathBuf, String> {
    if value.starts_with("/dev/") && value.len() > "/dev/".len() {
        Ok(PathBuf::from(value))
    } else {
        Err(format!("device must be a path under /dev/, got {value}"))
    }
}

/// A command keyword, matched ignoring case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// `volmount <volumeId> <dir>`
    VolumeMount,
    /// `voldet <volumeId> <dir>`
    VolumeDetach,
    /// `volget`
    VolumeList,
    /// `volcreate`
    VolumeCreate,
    /// `voldel <volumeId>`
    VolumeDelete,
    /// `instlaunch <imageName>`
    InstanceLaunch,
    /// `instterminate <instanceId>`
    InstanceTerminate,
    /// `instget`
    InstanceList,
    /// `imgget`
    ImageList,
    /// `appget`
    AppList,
    /// `allget`
    ListAll,
}

impl Action {
    /// The keyword as typed on the command line.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::VolumeMount => "volmount",
            Self::VolumeDetach => "voldet",
            Self::VolumeList => "volget",
            Self::VolumeCreate => "volcreate",
            Self::VolumeDelete => "voldel",
            Self::InstanceLaunch => "instlaunch",
            Self::InstanceTerminate => "instterminate",
            Self::InstanceList => "instget",
            Self::ImageList => "imgget",
            Self::AppList => "appget",
            Self::ListAll => "allget",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "volmount" => Ok(Self::VolumeMount),
            "voldet" => Ok(Self::VolumeDetach),
            "volget" => Ok(Self::VolumeList),
            "volcreate" => Ok(Self::VolumeCreate),
            "voldel" => Ok(Self::VolumeDelete),
            "instlaunch" => Ok(Self::InstanceLaunch),
            "instterm" | "instterminate" => Ok(Self::InstanceTerminate),
            "instget" => Ok(Self::InstanceList),
            "imgget" => Ok(Self::ImageList),
            "appget" => Ok(Self::AppList),
            "allget" => Ok(Self::ListAll),
            other => Err(format!("Command not recognized: {other} (see atmocl -x)")),
        }
    }
}

/// Command reference shown by `-x`.
pub const EXTENDED_HELP: &str = "\
Commands:
  volmount <volumeId> <dir>   Attach a volume to this instance and mount it at <dir>.
                              Formats the device after a YES confirmation if it has
                              no filesystem. Use -d to name the device, -f to format.
  voldet <volumeId> <dir>     Unmount <dir> and detach the volume.
  volget                      List volumes.
  volcreate                   Create a volume (--size GB, --name).
  voldel <volumeId>           Delete a volume after a YES confirmation.
  instlaunch <imageName>      Launch one m1.small instance of an image.
                              Underscores in the name stand for spaces.
  instterminate <instanceId>  Terminate an instance.
  instget                     List instances.
  imgget                      List images.
  appget                      List applications.
  allget                      List images, instances and volumes.

Commands that need a volume, image or instance offer a numbered list when it
is not given.

Credentials are cached in ~/.atmocl for 24 hours.";
