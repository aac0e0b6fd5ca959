//! Broadcast and direct delivery of server lines.
//!
//! The router takes a registry snapshot, filters it down to the recipients
//! of one line, and writes to each of them in identity order. The registry
//! is only consulted for the snapshot; all network writes happen after the
//! actor has answered, so a slow client never blocks registry updates.
//!
//! A failed write to one client is logged and skipped. The failing client's
//! own session notices the broken connection on its next read and cleans
//! up after itself.

use chat_core::ClientId;
use chat_protocol::ServerLine;
use tracing::{debug, trace};

use crate::registry::RegistryHandle;

/// Delivers lines to connected clients.
#[derive(Clone)]
pub struct Router {
    registry: RegistryHandle,
}

impl Router {
    /// Creates a router over the given registry.
    pub fn new(registry: RegistryHandle) -> Self {
        Self { registry }
    }

    /// Writes `line` to every matching client except `sender`.
    ///
    /// With `receiver` set, only that client is considered. Returns the
    /// number of clients the line was written to.
    pub async fn route(&self, line: &str, sender: ClientId, receiver: Option<ClientId>) -> usize {
        let recipients = self
            .registry
            .snapshot()
            .await
            .into_iter()
            .filter(|entry| is_recipient(entry.id, sender, receiver));

        let mut delivered = 0;
        for entry in recipients {
            match entry.outbound.send_line(line).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    debug!(
                        client_id = %entry.id,
                        sender = %sender,
                        error = %e,
                        "Failed to deliver line"
                    );
                }
            }
        }

        trace!(sender = %sender, receiver = ?receiver, delivered, "Routed line");
        delivered
    }

    /// Sends a line about its sender to every other client.
    pub async fn broadcast(&self, line: &ServerLine) -> usize {
        self.route(&line.to_string(), line.sender(), None).await
    }

    /// Sends a line about its sender to `receiver` only.
    pub async fn direct(&self, line: &ServerLine, receiver: ClientId) -> usize {
        self.route(&line.to_string(), line.sender(), Some(receiver))
            .await
    }
}

/// Recipient rule: never the sender, and only `receiver` when one is given.
fn is_recipient(candidate: ClientId, sender: ClientId, receiver: Option<ClientId>) -> bool {
    if candidate == sender {
        return false;
    }
    match receiver {
        Some(receiver) => candidate == receiver,
        None => true,
    }
}
