use std::path::PathBuf;

use clap::Parser;
use libvolume::config::{
    DEFAULT_CONTAINER_VOLUME_PATH, DEFAULT_HOST_VOLUME_PATH, DEFAULT_VOLUME_ROOT, parse_timeout,
    split_mount_options,
};
use libvolume::{DriverConfig, HelperBinaries, MountFailurePolicy};

pub const DEFAULT_SOCKET_ADDRESS: &str = "/run/docker/plugins/lizardfs.sock";

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Docker volume plugin backed by LizardFS", long_about = None)]
pub struct Args {
    /// LizardFS master host
    #[arg(long, env = "HOST", default_value = "mfsmaster")]
    pub host: String,

    /// LizardFS master port
    #[arg(long, env = "PORT", default_value = "9421")]
    pub port: String,

    /// Remote directory holding the volumes
    #[arg(long, env = "REMOTE_PATH", default_value = "/docker/volumes")]
    pub remote_path: String,

    /// Extra space separated options appended to every lfsmount call
    #[arg(long, env = "MOUNT_OPTIONS", default_value = "", allow_hyphen_values = true)]
    pub mount_options: String,

    /// Volume name that maps to the remote path itself
    #[arg(long, env = "ROOT_VOLUME_NAME", default_value = "")]
    pub root_volume_name: String,

    /// Helper timeout in milliseconds
    #[arg(long, env = "CONNECT_TIMEOUT")]
    pub connect_timeout: Option<String>,

    /// Log verbosity (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Fail Mount requests when lfsmount fails instead of reporting success
    #[arg(long, env = "STRICT_MOUNT")]
    pub strict_mount: bool,

    /// Wait for umount without a timeout
    #[arg(long, env = "UNBOUNDED_UNMOUNT")]
    pub unbounded_unmount: bool,

    /// Skip the reaping supervisor when an init process already reaps zombies
    #[arg(long, env = "NO_REAPER")]
    pub no_reaper: bool,

    /// Plugin socket path
    #[arg(long, env = "SOCKET_ADDRESS", default_value = DEFAULT_SOCKET_ADDRESS)]
    pub socket: PathBuf,

    /// Where the whole remote path is mounted
    #[arg(long, env = "VOLUME_ROOT", default_value = DEFAULT_VOLUME_ROOT)]
    pub volume_root: PathBuf,

    /// Parent of per-volume mountpoints inside the plugin
    #[arg(long, env = "CONTAINER_VOLUME_PATH", default_value = DEFAULT_CONTAINER_VOLUME_PATH)]
    pub container_volume_path: PathBuf,

    /// Parent of per-volume mountpoints as seen by the engine
    #[arg(long, env = "HOST_VOLUME_PATH", default_value = DEFAULT_HOST_VOLUME_PATH)]
    pub host_volume_path: PathBuf,

    #[arg(long, env = "LFSMOUNT_BIN", default_value = "lfsmount")]
    pub mount_bin: String,

    #[arg(long, env = "UMOUNT_BIN", default_value = "umount")]
    pub unmount_bin: String,

    #[arg(long, env = "LIZARDFS_BIN", default_value = "lizardfs")]
    pub admin_bin: String,
}

impl Args {
    /// Builds the driver configuration, substituting defaults for malformed
    /// values. Call after logging is set up so fallbacks are reported.
    pub fn driver_config(&self) -> DriverConfig {
        let root_volume_name = Some(self.root_volume_name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        DriverConfig {
            host: self.host.clone(),
            port: self.port.clone(),
            remote_path: self.remote_path.clone(),
            mount_options: split_mount_options(&self.mount_options),
            root_volume_name,
            timeout: parse_timeout(self.connect_timeout.as_deref()),
            bounded_unmount: !self.unbounded_unmount,
            mount_policy: if self.strict_mount {
                MountFailurePolicy::Strict
            } else {
                MountFailurePolicy::Optimistic
            },
            volume_root: self.volume_root.clone(),
            container_volume_path: self.container_volume_path.clone(),
            host_volume_path: self.host_volume_path.clone(),
            helpers: HelperBinaries {
                mount: self.mount_bin.clone(),
                unmount: self.unmount_bin.clone(),
                admin: self.admin_bin.clone(),
            },
        }
    }
}
