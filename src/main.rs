use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use onionet::config::{Args, Command, NetworkConfig};
use onionet::network::{call, TcpTransport, Transport};
use onionet::protocol::Request;
use onionet::registry::Registry;
use onionet::server::NodeServer;
use onionet::utils::logging::{init_file_logging, init_logging};
use onionet::utils::wait_for_shutdown_signal;
use onionet::{launch_network, OnionRouter, UserProcess};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Keep the file writer guard alive until exit
    let _log_guard = match &args.log_file {
        Some(file) => Some(init_file_logging(&args.log_level, file)?),
        None => {
            init_logging(&args.log_level)?;
            None
        }
    };

    info!("onionet version: {}", env!("CARGO_PKG_VERSION"));

    let network = NetworkConfig::from_args(&args).context("invalid network configuration")?;
    let transport: Arc<dyn Transport> = Arc::new(TcpTransport::new(network.connect_timeout));

    match args.command {
        Command::Registry => {
            let server = NodeServer::new("registry", network.registry_addr(), Arc::new(Registry::new()));
            server.start().await?;
            wait_for_shutdown_signal().await;
            server.shutdown().await?;
        }
        Command::Relay { node_id } => {
            let router = OnionRouter::launch(node_id, network, transport).await?;
            wait_for_shutdown_signal().await;
            router.shutdown().await?;
        }
        Command::User { user_id } => {
            let user = UserProcess::launch(user_id, network, transport).await?;
            wait_for_shutdown_signal().await;
            user.shutdown().await?;
        }
        Command::Send { from, to, message } => {
            let addr = network.user_addr(from)?;
            let request = Request::SendMessage {
                message,
                destination_user_id: to,
            };
            match call(transport.as_ref(), addr, &request).await?.expect_ok() {
                Ok(()) => info!("User {} sent the message to user {}", from, to),
                Err(e) => {
                    error!("User {} could not send the message: {}", from, e);
                    return Err(e.into());
                }
            }
        }
        Command::Launch { relays, users } => {
            let running = launch_network(network, relays, users).await?;
            wait_for_shutdown_signal().await;
            running.shutdown().await?;
        }
    }

    Ok(())
}
