use std::collections::HashSet;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use libvolume::{DriverConfig, InvokeError, Invocation, Invoker, VolumeDriver};

/// Records every invocation instead of running it.
#[derive(Default)]
pub struct RecordingInvoker {
    calls: Mutex<Vec<Invocation>>,
    failing: Mutex<HashSet<String>>,
    delay: Option<Duration>,
}

#[allow(dead_code)]
impl RecordingInvoker {
    pub fn with_delay(delay: Duration) -> Self {
        RecordingInvoker {
            delay: Some(delay),
            ..Default::default()
        }
    }

    /// Makes every later call of `program` exit with status 1.
    pub fn fail(&self, program: &str) {
        self.failing.lock().unwrap().insert(program.to_string());
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, program: &str) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|call| call.program == program)
            .collect()
    }
}

#[async_trait]
impl Invoker for RecordingInvoker {
    async fn invoke(&self, invocation: &Invocation) -> Result<String, InvokeError> {
        self.calls.lock().unwrap().push(invocation.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(&invocation.program) {
            return Err(InvokeError::Failed {
                program: invocation.program.clone(),
                status: ExitStatus::from_raw(1 << 8),
                output: "transport endpoint is not connected".to_string(),
            });
        }
        Ok(String::new())
    }
}

#[allow(dead_code)]
pub fn test_config(dir: &Path) -> DriverConfig {
    DriverConfig {
        host: "mfsmaster".to_string(),
        port: "9421".to_string(),
        remote_path: "/docker/volumes".to_string(),
        volume_root: dir.join("lizardfs"),
        container_volume_path: dir.join("container-volumes"),
        host_volume_path: dir.join("host-volumes"),
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn driver(config: DriverConfig, invoker: Arc<RecordingInvoker>) -> VolumeDriver {
    std::fs::create_dir_all(&config.volume_root).unwrap();
    VolumeDriver::new(Arc::new(config), invoker)
}
