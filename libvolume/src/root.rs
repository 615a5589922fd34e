use tokio::fs;
use tracing::{debug, info};

use crate::config::DriverConfig;
use crate::error::VolumeError;
use crate::exec::{Invocation, Invoker};

/// Mounts the whole remote path onto the volume root.
///
/// Every volume path is relative to this mount, so callers must treat an
/// error as fatal.
pub async fn mount_root(config: &DriverConfig, invoker: &dyn Invoker) -> Result<(), VolumeError> {
    info!(
        host = %config.host,
        port = %config.port,
        remote_path = %config.remote_path,
        "initializing client"
    );

    let root = &config.volume_root;
    fs::create_dir_all(root)
        .await
        .map_err(VolumeError::io(root))?;

    let invocation = Invocation::new(
        config.helpers.mount.clone(),
        config.mount_args(root, &config.remote_path),
    )
    .with_timeout(Some(config.timeout));

    let output = invoker
        .invoke(&invocation)
        .await
        .map_err(|source| VolumeError::RootMount {
            remote_path: config.remote_path.clone(),
            volume_root: root.clone(),
            source,
        })?;
    debug!("root mount output: {output}");
    Ok(())
}
