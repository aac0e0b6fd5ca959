//! Registry actor commands, errors, and events.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//! - `RegistryEvent`: Lifecycle events published by the registry for subscribers
//! - `RegistryEntry`: One connected client as seen by a snapshot

use chat_core::ClientId;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::outbound::Outbound;

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each command carries a oneshot channel for the response, so callers can
/// await the outcome without sharing any state with the actor.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Assign the next identity and insert the client.
    ///
    /// # Errors
    /// - `RegistryError::IdentitiesExhausted` once the id space is used up
    Register {
        /// Write half of the new connection
        outbound: Outbound,
        /// Channel to send the assigned identity
        respond_to: oneshot::Sender<Result<ClientId, RegistryError>>,
    },

    /// Record the display name of a registered client.
    ///
    /// Responds `false` when the client is not registered.
    SetName {
        /// Client to name
        client_id: ClientId,
        /// Display name, taken verbatim from the handshake line
        name: String,
        /// Channel to send whether the client was found
        respond_to: oneshot::Sender<bool>,
    },

    /// Remove a client. Removing an absent client is a no-op.
    Remove {
        /// Client to remove
        client_id: ClientId,
        /// Channel to send the removed record, if there was one
        respond_to: oneshot::Sender<Option<RemovedSession>>,
    },

    /// Get every connected client, ordered by identity.
    Snapshot {
        /// Channel to send the entries
        respond_to: oneshot::Sender<Vec<RegistryEntry>>,
    },

    /// Get the number of connected clients.
    Count {
        /// Channel to send the count
        respond_to: oneshot::Sender<usize>,
    },

    /// Remove every client and hand the entries back (used on shutdown).
    Drain {
        /// Channel to send the removed entries
        respond_to: oneshot::Sender<Vec<RegistryEntry>>,
    },
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Every 32-bit identity has been handed out.
    #[error("client identities exhausted")]
    IdentitiesExhausted,

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}

// ============================================================================
// Registry Data
// ============================================================================

/// A connected client as returned by snapshots and drains.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    /// Client identity
    pub id: ClientId,
    /// Display name, `None` until the handshake line arrives
    pub name: Option<String>,
    /// Shared write half of the connection
    pub outbound: Outbound,
    /// When the client was registered
    pub connected_at: DateTime<Utc>,
}

/// What was removed by `RegistryCommand::Remove`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedSession {
    /// Client identity
    pub id: ClientId,
    /// Display name, if the handshake completed
    pub name: Option<String>,
    /// When the client was registered
    pub connected_at: DateTime<Utc>,
}

impl RemovedSession {
    /// How long the client was connected, in whole seconds.
    pub fn connected_secs(&self) -> i64 {
        (Utc::now() - self.connected_at).num_seconds()
    }
}

// ============================================================================
// Registry Events
// ============================================================================

/// Lifecycle events published by the registry to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A client was assigned an identity.
    Registered {
        /// ID of the registered client
        client_id: ClientId,
    },

    /// A client completed its handshake.
    Named {
        /// ID of the named client
        client_id: ClientId,
        /// The display name
        name: String,
    },

    /// A client was removed from the registry.
    Removed {
        /// ID of the removed client
        client_id: ClientId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_display() {
        assert_eq!(
            RegistryError::IdentitiesExhausted.to_string(),
            "client identities exhausted"
        );
        assert_eq!(
            RegistryError::ChannelClosed.to_string(),
            "response channel closed"
        );
    }

    #[test]
    fn test_connected_secs_is_non_negative() {
        let removed = RemovedSession {
            id: ClientId::new(1),
            name: None,
            connected_at: Utc::now(),
        };
        assert!(removed.connected_secs() >= 0);
    }

    #[tokio::test]
    async fn test_command_channel_closed_error() {
        let (tx, rx) = oneshot::channel::<Result<ClientId, RegistryError>>();

        drop(tx);

        assert!(rx.await.is_err());
    }
}
