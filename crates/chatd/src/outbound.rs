//! Shared write half of a client connection.
//!
//! Every connected client has exactly one `Outbound`. Clones are handed to
//! the registry (for routing) and kept by the owning session (for cleanup).
//! The inner mutex makes each `send_line` atomic with respect to other
//! writers, so two routers never interleave bytes within one line.

use std::fmt;
use std::io;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;

/// Type-erased writer so tests can plug in in-memory streams.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Cheap-to-clone handle to a client's outbound stream.
#[derive(Clone)]
pub struct Outbound {
    writer: Arc<Mutex<BufWriter<BoxedWriter>>>,
}

impl Outbound {
    /// Wraps the write half of a connection.
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let boxed: BoxedWriter = Box::new(writer);
        Self {
            writer: Arc::new(Mutex::new(BufWriter::new(boxed))),
        }
    }

    /// Writes `line` plus a line terminator and flushes immediately.
    pub async fn send_line(&self, line: &str) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await
    }

    /// Flushes and shuts down the write direction of the connection.
    pub async fn shutdown(&self) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.shutdown().await
    }

    /// Returns true if both handles refer to the same connection.
    pub fn same_stream(&self, other: &Outbound) -> bool {
        Arc::ptr_eq(&self.writer, &other.writer)
    }
}

impl fmt::Debug for Outbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outbound")
            .field("handles", &Arc::strong_count(&self.writer))
            .finish()
    }
}
