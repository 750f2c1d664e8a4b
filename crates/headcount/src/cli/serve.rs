//! The `headcount serve` command.

use clap::Args;
use headcount_core::{Config, Headcount};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::server;

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind (overrides server.host)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides server.port and PORT)
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Execute the serve command.
pub async fn execute(args: ServeArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let host = (config.server.host.as_str(), config.server.port);
    let addr: SocketAddr = tokio::net::lookup_host(host)
        .await?
        .next()
        .ok_or_else(|| anyhow::anyhow!("Cannot resolve listen host: {}", config.server.host))?;

    let headcount = Arc::new(Headcount::new(config)?);
    server::serve(headcount, addr).await
}
