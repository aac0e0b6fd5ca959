//! Per-connection chat session.
//!
//! Each accepted connection gets its own `Session` that:
//! - Reads the first line as the client's display name
//! - Announces the arrival to every other client
//! - Parses each following line and hands it to the router
//! - Announces the departure when the client goes away
//! - Deregisters and closes the connection on every exit path
//!
//! Read failures are ordinary outcomes here, not errors to propagate: an
//! I/O error, end of stream, or an empty line all mean the client is gone.

use std::net::SocketAddr;

use chat_core::ClientId;
use chat_protocol::{parse_line, Inbound, ServerLine};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::outbound::Outbound;
use crate::registry::RegistryHandle;
use crate::router::Router;

/// Characters stripped from the end of every inbound line.
const LINE_ENDINGS: &[char] = &['\n', '\r'];

/// Result of waiting for the next inbound line.
#[derive(Debug)]
enum ReadOutcome {
    /// A complete line, terminator removed
    Line(String),
    /// The peer closed its side of the connection
    Closed,
    /// The connection broke or sent something unreadable
    Failed(SessionError),
    /// The server is shutting down
    Cancelled,
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The connection ended before a display name arrived.
    BeforeHandshake,
    /// The client left after joining; a departure line was sent.
    Departed,
    /// The server shut down.
    Shutdown,
}

/// Chat session for a single connection.
pub struct Session<R> {
    /// Identity assigned by the registry on accept
    client_id: ClientId,

    /// Buffered reader for inbound lines
    reader: BufReader<R>,

    /// Shared write half, also held by the registry
    outbound: Outbound,

    /// Handle to the connection registry
    registry: RegistryHandle,

    /// Delivery of outbound lines
    router: Router,

    /// Cancelled when the server shuts down
    cancel_token: CancellationToken,

    /// Longest accepted line in bytes, terminator included
    max_line_length: usize,

    /// Remote address, for logging
    peer: Option<SocketAddr>,
}

impl<R> Session<R>
where
    R: AsyncRead + Unpin,
{
    /// Creates a session for an already registered client.
    pub fn new(
        client_id: ClientId,
        reader: R,
        outbound: Outbound,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
        max_line_length: usize,
    ) -> Self {
        Self {
            client_id,
            reader: BufReader::new(reader),
            outbound,
            router: Router::new(registry.clone()),
            registry,
            cancel_token,
            max_line_length,
            peer: None,
        }
    }

    /// Attaches the remote address used in log fields.
    #[must_use]
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Returns the client identity.
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// Runs the session to completion.
    ///
    /// Always deregisters the client and shuts down its outbound stream
    /// before returning, whatever the reason for ending.
    pub async fn run(mut self) -> SessionEnd {
        debug!(client_id = %self.client_id, peer = ?self.peer, "Session started");

        let end = self.converse().await;
        self.cleanup(end).await;

        end
    }

    /// Handshake followed by the read loop.
    async fn converse(&mut self) -> SessionEnd {
        let name = match self.next_line().await {
            ReadOutcome::Line(name) => name,
            ReadOutcome::Closed => {
                debug!(client_id = %self.client_id, "Connection closed before handshake");
                return SessionEnd::BeforeHandshake;
            }
            ReadOutcome::Failed(e) => {
                debug!(client_id = %self.client_id, error = %e, "Handshake failed");
                return SessionEnd::BeforeHandshake;
            }
            ReadOutcome::Cancelled => return SessionEnd::Shutdown,
        };

        if let Err(e) = self.registry.set_name(self.client_id, name.clone()).await {
            warn!(client_id = %self.client_id, error = %e, "Failed to record display name");
        }

        let joined = ServerLine::joined(self.client_id, &name);
        info!(client_id = %self.client_id, peer = ?self.peer, "{joined}");
        self.router.broadcast(&joined).await;

        loop {
            match self.next_line().await {
                ReadOutcome::Line(line) if line.is_empty() => {
                    debug!(client_id = %self.client_id, "Empty line, treating as disconnect");
                    break;
                }
                ReadOutcome::Line(line) => self.handle_line(&name, &line).await,
                ReadOutcome::Closed => {
                    debug!(client_id = %self.client_id, "Client sent EOF");
                    break;
                }
                ReadOutcome::Failed(e) => {
                    debug!(client_id = %self.client_id, error = %e, "Connection closed");
                    break;
                }
                ReadOutcome::Cancelled => return SessionEnd::Shutdown,
            }
        }

        let left = ServerLine::left(self.client_id, &name);
        info!(client_id = %self.client_id, peer = ?self.peer, "{left}");
        self.router.broadcast(&left).await;

        SessionEnd::Departed
    }

    /// Routes one post-handshake line.
    async fn handle_line(&self, name: &str, line: &str) {
        match parse_line(line) {
            Ok(Inbound::Chat(body)) => {
                self.router
                    .broadcast(&ServerLine::chat(self.client_id, name, body))
                    .await;
            }
            Ok(Inbound::Direct { target, body }) => {
                let delivered = self
                    .router
                    .direct(&ServerLine::private(self.client_id, name, &body), target)
                    .await;
                if delivered == 0 {
                    debug!(
                        client_id = %self.client_id,
                        target = %target,
                        "Private message had no recipient"
                    );
                }
            }
            Err(e) => {
                debug!(client_id = %self.client_id, error = %e, "Dropping malformed directive");
            }
        }
    }

    /// Waits for the next line or for shutdown.
    async fn next_line(&mut self) -> ReadOutcome {
        tokio::select! {
            _ = self.cancel_token.cancelled() => ReadOutcome::Cancelled,
            outcome = read_line(&mut self.reader, self.max_line_length) => outcome,
        }
    }

    /// Deregisters the client and closes the connection.
    async fn cleanup(&self, end: SessionEnd) {
        match self.registry.remove(self.client_id).await {
            Ok(Some(removed)) => {
                debug!(
                    client_id = %self.client_id,
                    connected_secs = removed.connected_secs(),
                    end = ?end,
                    "Client deregistered"
                );
            }
            Ok(None) => {
                debug!(client_id = %self.client_id, "Client already deregistered");
            }
            Err(e) => {
                warn!(client_id = %self.client_id, error = %e, "Failed to deregister client");
            }
        }

        if let Err(e) = self.outbound.shutdown().await {
            debug!(client_id = %self.client_id, error = %e, "Error closing connection");
        }
    }
}

/// Reads one line, classifying the result.
async fn read_line<R>(reader: &mut BufReader<R>, max_line_length: usize) -> ReadOutcome
where
    R: AsyncRead + Unpin,
{
    let mut line = String::new();
    let limit = u64::try_from(max_line_length)
        .unwrap_or(u64::MAX)
        .saturating_add(1);

    // Reading one byte past the limit is enough to detect an oversize line
    let bytes_read = match (&mut *reader).take(limit).read_line(&mut line).await {
        Ok(n) => n,
        Err(e) => return ReadOutcome::Failed(SessionError::Io(e.to_string())),
    };

    if bytes_read == 0 {
        return ReadOutcome::Closed;
    }

    if line.len() > max_line_length {
        return ReadOutcome::Failed(SessionError::LineTooLong {
            size: line.len(),
            max: max_line_length,
        });
    }

    let trimmed_len = line.trim_end_matches(LINE_ENDINGS).len();
    line.truncate(trimmed_len);
    ReadOutcome::Line(line)
}

/// Errors that end a session's read loop.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Line too long: {size} bytes (max: {max})")]
    LineTooLong { size: usize, max: usize },
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    use super::*;
    use crate::registry::{spawn_registry, RegistryEvent};

    const TEST_TIMEOUT: Duration = Duration::from_secs(2);

    /// A session running on an in-memory stream.
    struct Harness {
        client: DuplexStream,
        id: ClientId,
        task: JoinHandle<SessionEnd>,
    }

    async fn start_session(
        registry: &RegistryHandle,
        cancel_token: &CancellationToken,
        max_line_length: usize,
    ) -> Harness {
        let (client, server) = tokio::io::duplex(4096);
        let (read_half, write_half) = tokio::io::split(server);
        let outbound = Outbound::new(write_half);
        let id = registry.register(outbound.clone()).await.unwrap();

        let session = Session::new(
            id,
            read_half,
            outbound,
            registry.clone(),
            cancel_token.child_token(),
            max_line_length,
        );
        let task = tokio::spawn(session.run());

        Harness { client, id, task }
    }

    /// A registered observer that only reads.
    async fn observer(registry: &RegistryHandle) -> BufReader<DuplexStream> {
        let (client, server) = tokio::io::duplex(4096);
        registry.register(Outbound::new(server)).await.unwrap();
        BufReader::new(client)
    }

    async fn recv(reader: &mut BufReader<DuplexStream>) -> String {
        let mut line = String::new();
        timeout(TEST_TIMEOUT, reader.read_line(&mut line))
            .await
            .expect("line within timeout")
            .unwrap();
        line
    }

    #[test]
    fn test_session_error_display() {
        let err = SessionError::LineTooLong { size: 20, max: 10 };
        assert_eq!(err.to_string(), "Line too long: 20 bytes (max: 10)");
    }

    #[tokio::test]
    async fn test_read_line_strips_crlf() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut reader = BufReader::new(server);
        client.write_all(b"hello\r\n").await.unwrap();

        match read_line(&mut reader, 1024).await {
            ReadOutcome::Line(line) => assert_eq!(line, "hello"),
            other => panic!("expected line, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_line_eof_is_closed() {
        let (client, server) = tokio::io::duplex(64);
        let mut reader = BufReader::new(server);
        drop(client);

        assert!(matches!(read_line(&mut reader, 1024).await, ReadOutcome::Closed));
    }

    #[tokio::test]
    async fn test_read_line_too_long_fails() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut reader = BufReader::new(server);
        client.write_all(b"0123456789abcdef\n").await.unwrap();

        assert!(matches!(
            read_line(&mut reader, 8).await,
            ReadOutcome::Failed(SessionError::LineTooLong { size: 9, max: 8 })
        ));
    }

    #[tokio::test]
    async fn test_read_line_invalid_utf8_fails() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut reader = BufReader::new(server);
        client.write_all(&[0xff, 0xfe, b'\n']).await.unwrap();

        assert!(matches!(
            read_line(&mut reader, 1024).await,
            ReadOutcome::Failed(SessionError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_join_chat_and_leave() {
        let registry = spawn_registry();
        let cancel_token = CancellationToken::new();
        let mut watcher = observer(&registry).await;
        let mut harness = start_session(&registry, &cancel_token, 1024).await;
        assert_eq!(harness.id, ClientId::new(2));

        harness.client.write_all(b"Alice\nhello all\n").await.unwrap();
        assert_eq!(recv(&mut watcher).await, "[2] | Alice joined the chat\n");
        assert_eq!(recv(&mut watcher).await, "[2] | Alice: hello all\n");

        drop(harness.client);
        assert_eq!(recv(&mut watcher).await, "[2] | Alice left the chat\n");

        let end = timeout(TEST_TIMEOUT, harness.task).await.unwrap().unwrap();
        assert_eq!(end, SessionEnd::Departed);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_close_before_name_is_silent() {
        let registry = spawn_registry();
        let cancel_token = CancellationToken::new();
        let mut events = registry.subscribe();
        let harness = start_session(&registry, &cancel_token, 1024).await;

        drop(harness.client);

        let end = timeout(TEST_TIMEOUT, harness.task).await.unwrap().unwrap();
        assert_eq!(end, SessionEnd::BeforeHandshake);
        assert!(registry.is_empty().await);
        assert_eq!(
            events.recv().await.unwrap(),
            RegistryEvent::Registered {
                client_id: harness.id
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            RegistryEvent::Removed {
                client_id: harness.id
            }
        );
    }

    #[tokio::test]
    async fn test_empty_line_departs() {
        let registry = spawn_registry();
        let cancel_token = CancellationToken::new();
        let mut watcher = observer(&registry).await;
        let mut harness = start_session(&registry, &cancel_token, 1024).await;

        harness.client.write_all(b"Bob\n\n").await.unwrap();
        assert_eq!(recv(&mut watcher).await, "[2] | Bob joined the chat\n");
        assert_eq!(recv(&mut watcher).await, "[2] | Bob left the chat\n");

        let end = timeout(TEST_TIMEOUT, harness.task).await.unwrap().unwrap();
        assert_eq!(end, SessionEnd::Departed);
    }

    #[tokio::test]
    async fn test_malformed_directives_are_dropped() {
        let registry = spawn_registry();
        let cancel_token = CancellationToken::new();
        let mut watcher = observer(&registry).await;
        let mut harness = start_session(&registry, &cancel_token, 1024).await;

        harness
            .client
            .write_all(b"Eve\n/message 1\n/message one two\n/message 1 ok\n")
            .await
            .unwrap();

        assert_eq!(recv(&mut watcher).await, "[2] | Eve joined the chat\n");
        // Only the valid directive gets through
        assert_eq!(
            recv(&mut watcher).await,
            "[2] | Eve (private message): ok\n"
        );
    }

    #[tokio::test]
    async fn test_cancel_ends_session_without_departure() {
        let registry = spawn_registry();
        let cancel_token = CancellationToken::new();
        let mut watcher = observer(&registry).await;
        let mut harness = start_session(&registry, &cancel_token, 1024).await;

        harness.client.write_all(b"Zed\n").await.unwrap();
        assert_eq!(recv(&mut watcher).await, "[2] | Zed joined the chat\n");

        cancel_token.cancel();

        let end = timeout(TEST_TIMEOUT, harness.task).await.unwrap().unwrap();
        assert_eq!(end, SessionEnd::Shutdown);
        assert_eq!(registry.len().await, 1);

        // The session closed its side of the stream
        let mut rest = Vec::new();
        harness.client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }
}
