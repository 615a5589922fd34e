use std::io::ErrorKind;
use std::path::Path;

use anyhow::Context;
use tokio::net::UnixListener;
use tokio::signal;
use tracing::{debug, info, warn};

use crate::api::{DriverState, create_router};

/// Serves the plugin protocol on `socket` until SIGINT or SIGTERM.
pub async fn serve(socket: &Path, driver: DriverState) -> anyhow::Result<()> {
    let listener = bind(socket).await?;
    info!("listening on {}", socket.display());

    axum::serve(listener, create_router(driver))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("plugin server failed")?;

    if let Err(err) = tokio::fs::remove_file(socket).await {
        warn!("failed to remove socket {}: {err}", socket.display());
    }
    Ok(())
}

/// Binds `socket`, replacing a stale socket file left by a previous run.
pub async fn bind(socket: &Path) -> anyhow::Result<UnixListener> {
    if let Some(parent) = socket.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    match tokio::fs::remove_file(socket).await {
        Ok(()) => debug!("removed stale socket {}", socket.display()),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("failed to remove {}", socket.display()));
        }
    }
    UnixListener::bind(socket).with_context(|| format!("failed to bind {}", socket.display()))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutting down");
}
