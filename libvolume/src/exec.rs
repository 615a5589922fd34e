use std::fmt;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, trace, warn};

use crate::error::InvokeError;

/// How long output pipes may stay open after the helper itself has exited.
///
/// `lfsmount` leaves a daemon behind; if that daemon keeps the inherited pipes
/// open, reading them to EOF would never finish.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(200);

/// One helper command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// `None` waits for the helper indefinitely.
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn new<P, I, S>(program: P, args: I) -> Self
    where
        P: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invocation {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Runs helper processes on behalf of the driver.
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Runs `invocation` to completion and returns its combined output.
    async fn invoke(&self, invocation: &Invocation) -> Result<String, InvokeError>;
}

/// Spawns real processes, each in a fresh process group.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessInvoker;

#[async_trait]
impl Invoker for ProcessInvoker {
    async fn invoke(&self, invocation: &Invocation) -> Result<String, InvokeError> {
        debug!(command = %invocation, "invoking helper");

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| InvokeError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;

        let output = CombinedOutput::default();
        let readers = vec![
            output.pump(child.stdout.take()),
            output.pump(child.stderr.take()),
        ];

        let waited = match invocation.timeout {
            Some(limit) => {
                let deadline = time::timeout(limit, child.wait()).await;
                if let Ok(waited) = deadline {
                    waited
                } else {
                    kill_process_group(&mut child);
                    if let Err(err) = child.wait().await {
                        warn!("failed to reap timed out {}: {err}", invocation.program);
                    }
                    let output = output.finish(readers).await;
                    return Err(InvokeError::Timeout {
                        program: invocation.program.clone(),
                        timeout: limit,
                        output,
                    });
                }
            }
            None => child.wait().await,
        };

        let status = match waited {
            Ok(status) => status,
            Err(source) => {
                output.finish(readers).await;
                return Err(InvokeError::Wait {
                    program: invocation.program.clone(),
                    source,
                });
            }
        };

        let output = output.finish(readers).await;
        trace!(command = %invocation, %status, "helper output: {output}");
        if status.success() {
            Ok(output)
        } else {
            Err(InvokeError::Failed {
                program: invocation.program.clone(),
                status,
                output,
            })
        }
    }
}

fn kill_process_group(child: &mut Child) {
    let Some(pid) = child.id() else {
        return;
    };
    // The child leads its own group, so its pid is the group id.
    if let Err(errno) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        warn!("failed to kill process group {pid}: {errno}");
        if let Err(err) = child.start_kill() {
            warn!("failed to kill process {pid}: {err}");
        }
    }
}

/// stdout and stderr interleaved in arrival order.
#[derive(Clone, Default)]
struct CombinedOutput {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CombinedOutput {
    fn pump<R>(&self, reader: Option<R>) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::clone(&self.buf);
        tokio::spawn(async move {
            let Some(mut reader) = reader else {
                return;
            };
            let mut chunk = [0u8; 4096];
            loop {
                match reader.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => buf
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&chunk[..n]),
                }
            }
        })
    }

    async fn finish(&self, mut readers: Vec<JoinHandle<()>>) -> String {
        let drained = time::timeout(OUTPUT_DRAIN_GRACE, async {
            for reader in readers.iter_mut() {
                let _ = reader.await;
            }
        })
        .await;
        if drained.is_err() {
            for reader in &readers {
                reader.abort();
            }
        }
        let buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).trim_end().to_string()
    }
}
