//! TCP listener for the chat daemon.
//!
//! The server:
//! - Binds the configured address once (failure is fatal)
//! - Registers each accepted connection, in accept order
//! - Spawns a `Session` task per connection and never waits on it
//! - Stops on cancellation, closing every connected client
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   ChatServer    │
//! │                 │
//! │  TcpListener    │
//! └───────┬─────────┘
//!         │ accept() + register
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │    Session      │────▶│  RegistryHandle │
//! │  (per client)   │     │                 │
//! └───────┬─────────┘     └────────┬────────┘
//!         │ route                  │ snapshot
//!         ▼                        ▼
//! ┌─────────────────────────────────────────┐
//! │          Router → Outbound streams      │
//! └─────────────────────────────────────────┘
//! ```

pub mod session;

pub use session::{Session, SessionEnd, SessionError};

use std::io;
use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ChatdConfig;
use crate::outbound::Outbound;
use crate::registry::RegistryHandle;

/// TCP chat server.
pub struct ChatServer {
    /// Bound listener
    listener: TcpListener,

    /// Handle to the connection registry
    registry: RegistryHandle,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Longest accepted inbound line, passed to each session
    max_line_length: usize,
}

impl ChatServer {
    /// Binds the configured listen address.
    ///
    /// # Errors
    ///
    /// `ServerError::Bind` if the address cannot be acquired.
    pub async fn bind(
        config: &ChatdConfig,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.listen)
            .await
            .map_err(|e| ServerError::Bind {
                addr: config.listen,
                error: e.to_string(),
            })?;

        Ok(Self {
            listener,
            registry,
            cancel_token,
            max_line_length: config.max_line_length,
        })
    }

    /// Returns the bound address (useful when binding port 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop until the cancellation token is triggered.
    pub async fn run(self) -> Result<(), ServerError> {
        match self.local_addr() {
            Ok(addr) => info!(addr = %addr, "Chat server listening"),
            Err(e) => warn!(error = %e, "Chat server listening on unknown address"),
        }

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => self.handle_connection(stream, peer).await,
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Continue accepting other connections
                        }
                    }
                }
            }
        }

        self.close_sessions().await;
        Ok(())
    }

    /// Registers a new connection and spawns its session task.
    ///
    /// Registration happens here rather than in the task so identities
    /// follow accept order.
    async fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let (reader, writer) = stream.into_split();
        let outbound = Outbound::new(writer);

        let client_id = match self.registry.register(outbound.clone()).await {
            Ok(id) => id,
            Err(e) => {
                error!(peer = %peer, error = %e, "Failed to register connection");
                let _ = outbound.shutdown().await;
                return;
            }
        };

        debug!(client_id = %client_id, peer = %peer, "Accepted connection");

        let session = Session::new(
            client_id,
            reader,
            outbound,
            self.registry.clone(),
            self.cancel_token.child_token(),
            self.max_line_length,
        )
        .with_peer(peer);

        tokio::spawn(async move {
            let end = session.run().await;
            debug!(client_id = %client_id, end = ?end, "Session finished");
        });
    }

    /// Closes every client still registered at shutdown.
    async fn close_sessions(&self) {
        let entries = self.registry.drain().await;
        let count = entries.len();

        for entry in entries {
            if let Err(e) = entry.outbound.shutdown().await {
                debug!(client_id = %entry.id, error = %e, "Error closing connection");
            }
        }

        info!(closed = count, "Server cleanup complete");
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },
}
