use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_TIMEOUT_MS: u64 = 3000;
pub const DEFAULT_VOLUME_ROOT: &str = "/mnt/lizardfs";
pub const DEFAULT_CONTAINER_VOLUME_PATH: &str = "/mnt/docker-volumes";
pub const DEFAULT_HOST_VOLUME_PATH: &str = "/mnt/docker-volumes";

/// What a failed `lfsmount` means for the caller of `Mount`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MountFailurePolicy {
    /// Log the failure and report the volume as mounted anyway.
    #[default]
    Optimistic,
    /// Leave the volume unmounted and surface the failure.
    Strict,
}

/// Names of the LizardFS client tools the driver shells out to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelperBinaries {
    pub mount: String,
    pub unmount: String,
    pub admin: String,
}

impl Default for HelperBinaries {
    fn default() -> Self {
        HelperBinaries {
            mount: "lfsmount".to_string(),
            unmount: "umount".to_string(),
            admin: "lizardfs".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DriverConfig {
    /// LizardFS master host, passed to `lfsmount -H`.
    pub host: String,
    /// LizardFS master port, passed verbatim to `lfsmount -P`.
    pub port: String,
    /// Remote directory every volume lives under.
    pub remote_path: String,
    /// Extra tokens appended to every `lfsmount` call.
    pub mount_options: Vec<String>,
    /// Alias that maps to `remote_path` itself instead of a subdirectory.
    pub root_volume_name: Option<String>,
    pub timeout: Duration,
    /// Apply `timeout` to `umount` as well.
    pub bounded_unmount: bool,
    pub mount_policy: MountFailurePolicy,
    /// Where the whole remote path is mounted at startup.
    pub volume_root: PathBuf,
    /// Parent of per-volume mountpoints as seen by this process.
    pub container_volume_path: PathBuf,
    /// Parent of per-volume mountpoints as reported to the container host.
    pub host_volume_path: PathBuf,
    pub helpers: HelperBinaries,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            host: "mfsmaster".to_string(),
            port: "9421".to_string(),
            remote_path: "/docker/volumes".to_string(),
            mount_options: Vec::new(),
            root_volume_name: None,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            bounded_unmount: true,
            mount_policy: MountFailurePolicy::default(),
            volume_root: PathBuf::from(DEFAULT_VOLUME_ROOT),
            container_volume_path: PathBuf::from(DEFAULT_CONTAINER_VOLUME_PATH),
            host_volume_path: PathBuf::from(DEFAULT_HOST_VOLUME_PATH),
            helpers: HelperBinaries::default(),
        }
    }
}

impl DriverConfig {
    pub fn is_root_volume(&self, name: &str) -> bool {
        self.root_volume_name.as_deref() == Some(name)
    }

    /// Backing directory of a volume under the root mount.
    pub fn volume_path(&self, name: &str) -> PathBuf {
        if self.is_root_volume(name) {
            self.volume_root.clone()
        } else {
            self.volume_root.join(name)
        }
    }

    pub fn container_mountpoint(&self, name: &str) -> PathBuf {
        self.container_volume_path.join(name)
    }

    pub fn host_mountpoint(&self, name: &str) -> PathBuf {
        self.host_volume_path.join(name)
    }

    /// Remote directory that `lfsmount -S` should expose for `name`.
    pub fn remote_subpath(&self, name: &str) -> String {
        if self.is_root_volume(name) {
            return self.remote_path.clone();
        }
        if self.remote_path.is_empty() {
            return name.to_string();
        }
        format!("{}/{}", self.remote_path.trim_end_matches('/'), name)
    }

    /// Arguments for `lfsmount` mounting `remote` onto `target`.
    pub fn mount_args(&self, target: &Path, remote: &str) -> Vec<String> {
        let mut args = vec![
            target.display().to_string(),
            "-H".to_string(),
            self.host.clone(),
            "-P".to_string(),
            self.port.clone(),
            "-S".to_string(),
            remote.to_string(),
        ];
        args.extend(self.mount_options.iter().cloned());
        args
    }

    pub fn unmount_timeout(&self) -> Option<Duration> {
        self.bounded_unmount.then_some(self.timeout)
    }
}

/// Parses the `CONNECT_TIMEOUT` override in milliseconds.
///
/// A missing value silently yields the default; a malformed or zero value
/// yields the default with a warning.
pub fn parse_timeout(raw: Option<&str>) -> Duration {
    let default = Duration::from_millis(DEFAULT_TIMEOUT_MS);
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return default;
    };
    match raw.parse::<u64>() {
        Ok(0) => {
            warn!("connect timeout of 0ms is unusable, assuming default {DEFAULT_TIMEOUT_MS}ms");
            default
        }
        Ok(ms) => Duration::from_millis(ms),
        Err(err) => {
            warn!(
                "failed to parse timeout {raw:?} with error {err}, assuming default {DEFAULT_TIMEOUT_MS}ms"
            );
            default
        }
    }
}

/// Splits the space-delimited `MOUNT_OPTIONS` value into argv tokens.
pub fn split_mount_options(raw: &str) -> Vec<String> {
    raw.split(' ')
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}
