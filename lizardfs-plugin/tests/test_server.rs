use lizardfs_plugin::server::bind;
use tempfile::tempdir;

#[tokio::test]
async fn bind_replaces_stale_socket_and_creates_parents() {
    let dir = tempdir().unwrap();
    let socket = dir.path().join("run/docker/plugins/lizardfs.sock");

    let first = bind(&socket).await.unwrap();
    drop(first);
    assert!(socket.exists());

    // a leftover socket file from a crashed run must not block startup
    let second = bind(&socket).await.unwrap();
    assert_eq!(
        second.local_addr().unwrap().as_pathname(),
        Some(socket.as_path())
    );
}
