use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::tempdir;

/// The plugin binary with every path under `dir` and `lfsmount` replaced.
fn plugin(dir: &Path, lfsmount: &str) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_lizardfs-plugin"));
    command
        .current_dir(dir)
        .env_remove("REAPER")
        .env_remove("NO_REAPER")
        .env("LOG_LEVEL", "info")
        .env("LFSMOUNT_BIN", lfsmount)
        .env("CONNECT_TIMEOUT", "2000")
        .env("SOCKET_ADDRESS", dir.join("run/lizardfs.sock"))
        .env("VOLUME_ROOT", dir.join("lizardfs"))
        .env("CONTAINER_VOLUME_PATH", dir.join("volumes"))
        .env("HOST_VOLUME_PATH", dir.join("volumes"));
    command
}

#[test]
fn root_mount_failure_exits_through_the_supervisor() {
    let dir = tempdir().unwrap();
    let output = plugin(dir.path(), "false").output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(1), "stdout: {stdout}");
    assert!(stdout.contains("reaper supervising worker"), "stdout: {stdout}");
    assert!(stdout.contains("worker exited"), "stdout: {stdout}");
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("failed to initialize LizardFS client")
    );
    assert!(!dir.path().join("run/lizardfs.sock").exists());
}

#[test]
fn root_mount_failure_exits_without_the_supervisor() {
    let dir = tempdir().unwrap();
    let output = plugin(dir.path(), "false")
        .env("NO_REAPER", "true")
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(1), "stdout: {stdout}");
    assert!(!stdout.contains("reaper supervising worker"), "stdout: {stdout}");
    assert!(!dir.path().join("run/lizardfs.sock").exists());
}

#[test]
fn sigterm_reaches_the_worker_through_the_supervisor() {
    let dir = tempdir().unwrap();
    let socket = dir.path().join("run/lizardfs.sock");
    let mut child = plugin(dir.path(), "true")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while !socket.exists() {
        if Instant::now() > deadline {
            child.kill().unwrap();
            panic!("socket {} never appeared", socket.display());
        }
        thread::sleep(Duration::from_millis(20));
    }
    // the worker installs its signal handlers once it starts serving
    thread::sleep(Duration::from_millis(500));

    let killed = Command::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(killed.success());

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if Instant::now() > deadline {
            child.kill().unwrap();
            panic!("plugin ignored SIGTERM");
        }
        thread::sleep(Duration::from_millis(20));
    };

    assert!(status.success(), "exit status {status}");
    assert!(!socket.exists());
}
