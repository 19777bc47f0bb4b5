use crate::connection::Connection;
use crate::protocol::Error;
use crate::status::StatusPayloads;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// The default number of connections that may be served at the same time.
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;

/// Binds the listener socket with address reuse enabled and a backlog matching the worker
/// bound.
pub fn bind(address: SocketAddr, max_connections: usize) -> std::io::Result<TcpListener> {
    let socket = if address.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(address)?;
    socket.listen(max_connections as u32)
}

/// The accept loop feeding connections into a bounded set of workers.
pub struct Server {
    payloads: Arc<StatusPayloads>,
    workers: Arc<Semaphore>,
    tracker: TaskTracker,
}

impl Server {
    pub fn new(payloads: Arc<StatusPayloads>, max_connections: usize) -> Self {
        Self {
            payloads,
            workers: Arc::new(Semaphore::new(max_connections)),
            tracker: TaskTracker::new(),
        }
    }

    /// Accepts connections until the token is cancelled, then drains the in-flight workers.
    ///
    /// A worker permit is acquired *before* the accept, so a fully busy worker set stalls the
    /// accept loop instead of dropping connections. Every accepted socket is closed on every
    /// exit path of its worker. Consuming `self` makes a second start impossible; cancelling
    /// the token again is a no-op.
    pub async fn serve(
        self,
        listener: TcpListener,
        stop: CancellationToken,
    ) -> std::io::Result<()> {
        info!("accept loop started");

        loop {
            // wait for a free worker first (backpressure instead of unbounded spawning)
            let permit = tokio::select! {
                permit = Arc::clone(&self.workers).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = stop.cancelled() => break,
            };

            let (mut stream, addr) = tokio::select! {
                accepted = listener.accept() => accepted?,
                _ = stop.cancelled() => break,
            };
            debug!(addr = %addr, "accepted connection");

            let payloads = Arc::clone(&self.payloads);
            self.tracker.spawn(async move {
                let mut connection = Connection::new(&mut stream, payloads);
                if let Err(err) = connection.listen().await {
                    log_connection_error(&err, addr);
                }

                // flush and shutdown; the socket closes on every exit path
                if let Err(err) = stream.shutdown().await {
                    debug!(
                        cause = %err,
                        addr = %addr,
                        "failed to close a client connection"
                    );
                }
                debug!(addr = %addr, "closed connection");

                drop(permit);
            });
        }

        // wait for all in-flight connections to finish
        self.tracker.close();
        self.tracker.wait().await;
        info!("accept loop stopped");

        Ok(())
    }
}

fn log_connection_error(err: &Error, addr: SocketAddr) {
    match err {
        err if err.is_connection_closed() => {
            debug!(addr = %addr, "client disconnected early")
        }
        Error::Timeout => debug!(addr = %addr, "client read timed out"),
        Error::Io(cause) => error!(
            cause = %cause,
            addr = %addr,
            "failure communicating with a client"
        ),
        err => warn!(
            cause = %err,
            addr = %addr,
            "received invalid data from a client"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpStream;

    fn build_payloads() -> Arc<StatusPayloads> {
        let config = Config {
            server_icon: "does-not-exist.png".to_string(),
            ..Config::default()
        };
        Arc::new(StatusPayloads::build(&config).expect("build failed"))
    }

    #[tokio::test]
    async fn serves_concurrent_clients_and_drains_on_stop() {
        let listener = bind("127.0.0.1:0".parse().expect("invalid address"), 4)
            .expect("bind failed");
        let addr = listener.local_addr().expect("local addr failed");

        let payloads = build_payloads();
        let stop = CancellationToken::new();
        let server = Server::new(Arc::clone(&payloads), 4);

        let serve_stop = stop.clone();
        let handle = tokio::spawn(async move {
            server.serve(listener, serve_stop).await.expect("serve failed");
        });

        // a malformed client must not affect the well-behaved one
        let mut broken = TcpStream::connect(addr).await.expect("connect failed");
        tokio::io::AsyncWriteExt::write_all(&mut broken, &[0xFF, 0xFF, 0xFF, 0xFF, 0xFF])
            .await
            .expect("write failed");

        let mut client = TcpStream::connect(addr).await.expect("connect failed");
        let mut handshake = vec![0x0F, 0x00, 0x00, 0x09];
        handshake.extend_from_slice(b"localhost");
        handshake.extend_from_slice(&[0x63, 0xDD, 0x01, 0x01, 0x00]);
        tokio::io::AsyncWriteExt::write_all(&mut client, &handshake)
            .await
            .expect("write failed");

        // the status response comes back framed; it is enough to see the first bytes arrive
        let mut prefix = [0; 3];
        client.read_exact(&mut prefix).await.expect("read failed");

        // close both clients so the drain below does not have to wait out read deadlines
        drop(client);
        drop(broken);

        stop.cancel();
        handle.await.expect("server run failed");
    }
}
