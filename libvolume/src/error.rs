use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Failure of a single helper process invocation.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to wait for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} timed out after {}ms: {output}", .timeout.as_millis())]
    Timeout {
        program: String,
        timeout: Duration,
        output: String,
    },

    #[error("{program} failed with {status}: {output}")]
    Failed {
        program: String,
        status: ExitStatus,
        output: String,
    },
}

impl InvokeError {
    /// Combined helper output captured before the failure, if any.
    pub fn output(&self) -> &str {
        match self {
            InvokeError::Timeout { output, .. } | InvokeError::Failed { output, .. } => output,
            InvokeError::Spawn { .. } | InvokeError::Wait { .. } => "",
        }
    }
}

#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("invalid volume name {0:?}")]
    InvalidName(String),

    #[error("volume {0} not found")]
    NotFound(String),

    #[error("can't remove root volume {0}")]
    RemoveRootVolume(String),

    #[error("failed to mount volume {name}: {source}")]
    Mount {
        name: String,
        #[source]
        source: InvokeError,
    },

    #[error("failed to unmount volume {name}: {source}")]
    Unmount {
        name: String,
        #[source]
        source: InvokeError,
    },

    #[error("failed to mount {remote_path} on {}: {source}", .volume_root.display())]
    RootMount {
        remote_path: String,
        volume_root: PathBuf,
        #[source]
        source: InvokeError,
    },

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl VolumeError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> VolumeError {
        let path = path.into();
        move |source| VolumeError::Io { path, source }
    }
}
