//! The dfs-naming server binary.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dfs_naming::storage::DirectiveClient;
use dfs_naming::{Config, NamingServer};

/// Naming server (metadata coordinator) for a distributed file system.
#[derive(Parser, Debug)]
#[command(name = "dfs-naming", version, about)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Address to bind both listeners on.
    #[arg(long)]
    bind: Option<IpAddr>,
    /// Port of the client-facing service interface.
    #[arg(long)]
    service_port: Option<u16>,
    /// Port of the storage-node registration interface.
    #[arg(long)]
    registration_port: Option<u16>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(port) = args.service_port {
        config.service_port = port;
    }
    if let Some(port) = args.registration_port {
        config.registration_port = port;
    }

    let hook = Box::new(|cause| match cause {
        None => info!("naming server stopped"),
        Some(err) => warn!(%err, "naming server stopped after a failure"),
    });
    let server = NamingServer::start(&config, Arc::new(DirectiveClient), hook).await?;

    tokio::signal::ctrl_c().await?;
    server.stop();
    Ok(())
}
