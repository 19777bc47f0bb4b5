#![deny(clippy::all)]
#![forbid(unsafe_code)]

pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod status;

use crate::config::Config;
use crate::status::StatusPayloads;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Initializes the maintenance responder and serves it until interrupted.
///
/// This precomputes all response payloads from the configuration, binds the server socket and
/// starts the TCP accept loop that answers the server list pings of the players. An operator
/// interrupt (Ctrl-C) stops the accept loop and waits for the in-flight connections to finish.
///
/// # Errors
///
/// Will return an appropriate error if the socket cannot be bound to the configured address,
/// or the accept loop fails in a way that is not scoped to a single connection.
pub async fn start(config: Config, max_connections: usize) -> Result<(), Box<dyn std::error::Error>> {
    // build the immutable response payloads shared by all connections
    let payloads = Arc::new(StatusPayloads::build(&config)?);

    // bind the socket address with the worker bound as backlog
    let address: SocketAddr = config.bind_address().parse()?;
    info!(addr = %address, "binding socket address");
    let listener = match server::bind(address, max_connections) {
        Ok(listener) => listener,
        Err(err) => {
            error!(cause = %err, addr = %address, "failed to bind the listener socket");
            return Err(err.into());
        }
    };
    info!(addr = %address, max_connections, "listening for server list pings");

    // stop accepting once the operator interrupts the process
    let stop = CancellationToken::new();
    let signal_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            signal_stop.cancel();
        }
    });

    let server = server::Server::new(payloads, max_connections);
    server.serve(listener, stop).await?;

    info!("maintenance responder stopped successfully");
    Ok(())
}
