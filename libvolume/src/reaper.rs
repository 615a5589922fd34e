//! Zombie reaping for when the plugin runs as the root of its process tree.
//!
//! Every helper call leaves a terminated process behind, and `lfsmount`
//! orphans its FUSE daemon. Inside a plugin container nobody else collects
//! those, so the first process splits in two: a supervisor that does nothing
//! but `waitpid(-1)`, and a worker (the same binary, re-executed with
//! [`WORKER_MARKER`] set) that serves requests.

use std::ffi::OsString;
use std::io;
use std::os::unix::process::CommandExt;
use std::process::Command;
use std::sync::atomic::{AtomicI32, Ordering};

use nix::errno::Errno;
use nix::libc;
use nix::sys::prctl;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{Pid, getpid};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Environment variable that marks the re-executed worker.
pub const WORKER_MARKER: &str = "REAPER";

const FORWARDED_SIGNALS: [Signal; 3] = [Signal::SIGTERM, Signal::SIGINT, Signal::SIGHUP];

static WORKER_PID: AtomicI32 = AtomicI32::new(0);

#[derive(Debug, Error)]
pub enum ReaperError {
    #[error("failed to locate own executable: {0}")]
    CurrentExe(#[source] io::Error),

    #[error("failed to start worker: {0}")]
    Spawn(#[source] io::Error),

    #[error("failed to install handler for {signal}: {source}")]
    Signal {
        signal: Signal,
        #[source]
        source: Errno,
    },

    #[error("waitpid failed: {0}")]
    Wait(#[source] Errno),

    #[error("worker {0} disappeared without being reaped")]
    WorkerLost(Pid),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// No marker: this process should supervise a worker.
    Supervisor,
    /// Re-executed by a supervisor with this pid.
    Worker { supervisor: Option<i32> },
}

pub fn role() -> Role {
    role_from(std::env::var_os(WORKER_MARKER))
}

fn role_from(marker: Option<OsString>) -> Role {
    match marker {
        None => Role::Supervisor,
        Some(value) => Role::Worker {
            supervisor: value.to_str().and_then(|pid| pid.parse().ok()),
        },
    }
}

/// Re-executes the current binary as the worker and reaps children until the
/// worker terminates. Returns the exit code to terminate with.
pub fn supervise() -> Result<i32, ReaperError> {
    if let Err(errno) = prctl::set_child_subreaper(true) {
        // harmless when running as pid 1
        warn!("failed to become child subreaper: {errno}");
    }

    let exe = std::env::current_exe().map_err(ReaperError::CurrentExe)?;
    let worker = Command::new(exe)
        .args(std::env::args_os().skip(1))
        .env(WORKER_MARKER, getpid().to_string())
        .process_group(0)
        .spawn()
        .map_err(ReaperError::Spawn)?;
    let worker = Pid::from_raw(worker.id() as i32);
    WORKER_PID.store(worker.as_raw(), Ordering::SeqCst);

    forward_signals()?;
    info!(worker = worker.as_raw(), "reaper supervising worker");

    let code = reap_until(worker)?;
    info!(worker = worker.as_raw(), code, "worker exited");
    Ok(code)
}

/// Reaps any terminated child until `worker` itself is reaped.
pub fn reap_until(worker: Pid) -> Result<i32, ReaperError> {
    loop {
        match waitpid(Pid::from_raw(-1), None) {
            Ok(WaitStatus::Exited(pid, code)) if pid == worker => return Ok(code),
            Ok(WaitStatus::Signaled(pid, signal, _)) if pid == worker => {
                return Ok(128 + signal as i32);
            }
            Ok(status) => debug!(?status, "reaped child"),
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => return Err(ReaperError::WorkerLost(worker)),
            Err(errno) => return Err(ReaperError::Wait(errno)),
        }
    }
}

extern "C" fn forward_to_worker(signum: libc::c_int) {
    let pid = WORKER_PID.load(Ordering::SeqCst);
    if pid <= 0 {
        return;
    }
    if let Ok(signal) = Signal::try_from(signum) {
        let _ = signal::kill(Pid::from_raw(pid), signal);
    }
}

fn forward_signals() -> Result<(), ReaperError> {
    let action = SigAction::new(
        SigHandler::Handler(forward_to_worker),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    for signal in FORWARDED_SIGNALS {
        // SAFETY: the handler only loads an atomic and calls kill(2).
        unsafe { signal::sigaction(signal, &action) }
            .map_err(|source| ReaperError::Signal { signal, source })?;
    }
    Ok(())
}
