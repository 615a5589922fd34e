use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use libvolume::reaper::{self, Role};
use libvolume::{ProcessInvoker, VolumeDriver, root};
use lizardfs_plugin::cli::Args;
use lizardfs_plugin::{logging, server};
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    logging::init(&args.log_level);

    // Must happen before any runtime threads exist.
    if !args.no_reaper && reaper::role() == Role::Supervisor {
        let code = match reaper::supervise() {
            Ok(code) => code,
            Err(err) => {
                error!("reaper failed: {err}");
                1
            }
        };
        std::process::exit(code);
    }

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(run(args))
}

async fn run(args: Args) -> anyhow::Result<()> {
    info!(
        "{} version {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    let config = Arc::new(args.driver_config());
    let invoker = Arc::new(ProcessInvoker);

    root::mount_root(&config, invoker.as_ref())
        .await
        .context("failed to initialize LizardFS client")?;

    let driver = Arc::new(VolumeDriver::new(config, invoker));
    server::serve(&args.socket, driver).await
}
