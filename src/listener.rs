//! TCP listener for the chat relay.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::error::AppError;
use crate::session::{ServerContext, Session};

/// Pause after a failed accept before trying again
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts connections and spawns one session task per client.
pub struct Listener {
    listener: TcpListener,
    context: ServerContext,
    outbound_capacity: usize,
}

impl Listener {
    /// Bind to the configured address.
    pub async fn bind(config: &ServerConfig, context: ServerContext) -> Result<Self, AppError> {
        let listener = TcpListener::bind(config.bind_addr())
            .await
            .map_err(AppError::Listener)?;
        let local_addr = listener.local_addr().map_err(AppError::Listener)?;

        info!("Chat relay listening on {}", local_addr);

        Ok(Self {
            listener,
            context,
            outbound_capacity: config.outbound_capacity,
        })
    }

    /// Get the local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// A failed accept is logged and retried. The loop only returns an
    /// error once the listening socket itself is unusable.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), AppError>
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Listener shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.spawn_session(stream, addr),
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        if let Err(fatal) = self.listener.local_addr() {
                            return Err(AppError::Listener(fatal));
                        }
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                }
            }
        }
    }

    /// Accept connections until Ctrl-C.
    pub async fn run_until_ctrl_c(self) -> Result<(), AppError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to install Ctrl-C handler: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    fn spawn_session(&self, stream: TcpStream, addr: SocketAddr) {
        info!("New connection from {}", addr);
        let connection = Connection::from_tcp(stream, self.outbound_capacity);
        let session = Session::new(connection, self.context.clone());
        let id = session.id();

        tokio::spawn(async move {
            let state = session.run().await;
            debug!("Session {} for {} finished in {:?}", id, addr, state);
        });
    }
}
