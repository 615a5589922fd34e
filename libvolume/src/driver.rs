use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::config::{DriverConfig, MountFailurePolicy};
use crate::error::VolumeError;
use crate::exec::{Invocation, Invoker};
use crate::mount_table::{Detached, MountTable};

/// Create option carrying the LizardFS replication goal.
pub const REPLICATION_GOAL_OPTION: &str = "ReplicationGoal";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Volume {
    pub name: String,
    pub mountpoint: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    Local,
    Global,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Local => "local",
            Scope::Global => "global",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub scope: Scope,
}

/// Volume lifecycle operations on top of the root LizardFS mount.
pub struct VolumeDriver {
    config: Arc<DriverConfig>,
    invoker: Arc<dyn Invoker>,
    mounts: MountTable,
}

impl VolumeDriver {
    pub fn new(config: Arc<DriverConfig>, invoker: Arc<dyn Invoker>) -> Self {
        VolumeDriver {
            config,
            invoker,
            mounts: MountTable::new(),
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Creates the backing directory and applies the optional replication goal.
    pub async fn create(
        &self,
        name: &str,
        options: &HashMap<String, String>,
    ) -> Result<(), VolumeError> {
        validate_name(name)?;
        debug!(method = "create", name, ?options);

        if self.config.is_root_volume(name) {
            warn!("tried to create a volume with same name as root volume {name}, ignoring request");
        }

        let path = self.config.volume_path(name);
        fs::create_dir_all(&path)
            .await
            .map_err(VolumeError::io(&path))?;

        let Some(goal) = options.get(REPLICATION_GOAL_OPTION) else {
            return Ok(());
        };
        let goal = match goal.trim().parse::<u32>() {
            Ok(goal) => goal,
            Err(err) => {
                debug!("ignoring replication goal {goal:?} for {name}: {err}");
                return Ok(());
            }
        };

        let invocation = Invocation::new(
            self.config.helpers.admin.clone(),
            [
                "setgoal".to_string(),
                "-r".to_string(),
                goal.to_string(),
                path.display().to_string(),
            ],
        )
        .with_timeout(Some(self.config.timeout));
        match self.invoker.invoke(&invocation).await {
            Ok(output) => debug!("set replication goal {goal} on {name}: {output}"),
            Err(err) => error!("failed to set replication goal {goal} on {name}: {err}"),
        }
        Ok(())
    }

    /// Volumes under the root mount plus the root volume alias, if any.
    pub async fn list(&self) -> Result<Vec<Volume>, VolumeError> {
        debug!(method = "list");
        let root = &self.config.volume_root;
        let mut entries = fs::read_dir(root).await.map_err(VolumeError::io(root))?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(VolumeError::io(root))? {
            let is_dir = entry
                .file_type()
                .await
                .map_err(VolumeError::io(entry.path()))?
                .is_dir();
            if !is_dir {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => warn!("skipping volume with non UTF-8 name {raw:?}"),
            }
        }
        names.sort();
        if let Some(root_name) = &self.config.root_volume_name {
            names.push(root_name.clone());
        }

        let mut volumes = Vec::with_capacity(names.len());
        for name in names {
            let mountpoint = self.mounted_path(&name);
            volumes.push(Volume { name, mountpoint });
        }
        Ok(volumes)
    }

    /// Resolves `name` to its backing path.
    pub async fn get(&self, name: &str) -> Result<Volume, VolumeError> {
        validate_name(name)?;
        debug!(method = "get", name);
        let path = self.config.volume_path(name);
        match fs::metadata(&path).await {
            Ok(_) => Ok(Volume {
                name: name.to_string(),
                mountpoint: Some(path),
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(VolumeError::NotFound(name.to_string()))
            }
            Err(err) => Err(VolumeError::io(path)(err)),
        }
    }

    /// Deletes the backing directory.
    ///
    /// Active mount references are not consulted.
    pub async fn remove(&self, name: &str) -> Result<(), VolumeError> {
        if self.config.is_root_volume(name) {
            return Err(VolumeError::RemoveRootVolume(name.to_string()));
        }
        validate_name(name)?;
        debug!(method = "remove", name);

        let path = self.config.volume_path(name);
        match fs::remove_dir_all(&path).await {
            Ok(()) => {
                info!("removed volume {name}");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(VolumeError::io(path)(err)),
        }
    }

    /// Host-visible mountpoint of `name` while it is mounted.
    pub async fn path(&self, name: &str) -> Option<PathBuf> {
        debug!(method = "path", name);
        self.mounted_path(name)
    }

    /// Attaches `id` to `name`, mounting the volume on the first attach.
    pub async fn mount(&self, name: &str, id: &str) -> Result<PathBuf, VolumeError> {
        validate_name(name)?;
        debug!(method = "mount", name, id);
        let host_mountpoint = self.config.host_mountpoint(name);

        let mut state = self.mounts.lock(name).await;
        if state.is_mounted() {
            state.attach(id);
            debug!("volume {name} already mounted, references {:?}", state.references());
            return Ok(host_mountpoint);
        }

        let mountpoint = self.config.container_mountpoint(name);
        fs::create_dir_all(&mountpoint)
            .await
            .map_err(VolumeError::io(&mountpoint))?;

        let remote = self.config.remote_subpath(name);
        let invocation = Invocation::new(
            self.config.helpers.mount.clone(),
            self.config.mount_args(&mountpoint, &remote),
        )
        .with_timeout(Some(self.config.timeout));

        match self.invoker.invoke(&invocation).await {
            Ok(output) => info!("mounted {remote} on {}: {output}", mountpoint.display()),
            Err(source) => match self.config.mount_policy {
                MountFailurePolicy::Optimistic => {
                    error!("failed to mount {remote} on {}: {source}", mountpoint.display());
                }
                MountFailurePolicy::Strict => {
                    return Err(VolumeError::Mount {
                        name: name.to_string(),
                        source,
                    });
                }
            },
        }

        state.attach(id);
        Ok(host_mountpoint)
    }

    /// Detaches `id` from `name`, unmounting when no reference is left.
    pub async fn unmount(&self, name: &str, id: &str) -> Result<(), VolumeError> {
        validate_name(name)?;
        debug!(method = "unmount", name, id);

        let mut state = self.mounts.lock(name).await;
        match state.detach(id) {
            Detached::NotAttached => {
                debug!("{id} holds no reference on {name}");
                Ok(())
            }
            Detached::StillReferenced => {
                debug!("volume {name} still referenced by {:?}", state.references());
                Ok(())
            }
            Detached::LastReference => {
                let mountpoint = self.config.container_mountpoint(name);
                let invocation = Invocation::new(
                    self.config.helpers.unmount.clone(),
                    [mountpoint.display().to_string()],
                )
                .with_timeout(self.config.unmount_timeout());
                match self.invoker.invoke(&invocation).await {
                    Ok(output) => {
                        info!("unmounted {}: {output}", mountpoint.display());
                        Ok(())
                    }
                    Err(source) => {
                        error!("failed to unmount {}: {source}", mountpoint.display());
                        Err(VolumeError::Unmount {
                            name: name.to_string(),
                            source,
                        })
                    }
                }
            }
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        debug!(method = "capabilities");
        Capabilities {
            scope: Scope::Global,
        }
    }

    /// Mount request ids currently attached to `name`.
    pub fn references(&self, name: &str) -> Vec<String> {
        self.mounts.references(name)
    }

    /// Settled state only; an in-flight mount or unmount is not waited for.
    fn mounted_path(&self, name: &str) -> Option<PathBuf> {
        self.mounts
            .is_mounted(name)
            .then(|| self.config.host_mountpoint(name))
    }
}

/// Volume names become single path components under the volume roots.
fn validate_name(name: &str) -> Result<(), VolumeError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(component)), None) if component == name => Ok(()),
        _ => Err(VolumeError::InvalidName(name.to_string())),
    }
}
