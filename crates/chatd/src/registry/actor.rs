//! Registry actor - owns all connection state and processes commands.
//!
//! The RegistryActor is the single owner of the client maps. It receives
//! commands via an mpsc channel, handles them one at a time, and publishes
//! lifecycle events via broadcast. Because every mutation and every
//! snapshot runs on the actor's task, a snapshot can never observe a client
//! that is half removed.

use std::collections::{BTreeMap, HashMap};

use chat_core::ClientId;
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use super::commands::{RegistryCommand, RegistryEntry, RegistryError, RegistryEvent, RemovedSession};
use crate::outbound::Outbound;

/// Routing half of a registered client.
struct Connection {
    outbound: Outbound,
    connected_at: DateTime<Utc>,
}

/// The registry actor - owns all client state.
///
/// # Ownership
///
/// The actor owns:
/// - `connections`: identity → outbound stream, ordered by identity
/// - `names`: identity → display name (`None` until the handshake)
///
/// An identity is present in both maps or in neither.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Outbound streams keyed by identity
    connections: BTreeMap<ClientId, Connection>,

    /// Display names keyed by identity
    names: HashMap<ClientId, Option<String>>,

    /// Identity for the next registration, `None` once exhausted
    next_id: Option<ClientId>,

    /// Event publisher for lifecycle updates
    event_publisher: broadcast::Sender<RegistryEvent>,
}

impl RegistryActor {
    /// Creates a new registry actor.
    ///
    /// # Arguments
    ///
    /// * `receiver` - Channel for receiving commands
    /// * `event_publisher` - Broadcast channel for publishing events
    pub fn new(
        receiver: mpsc::Receiver<RegistryCommand>,
        event_publisher: broadcast::Sender<RegistryEvent>,
    ) -> Self {
        Self {
            receiver,
            connections: BTreeMap::new(),
            names: HashMap::new(),
            next_id: Some(ClientId::FIRST),
            event_publisher,
        }
    }

    #[cfg(test)]
    fn starting_at(mut self, first: ClientId) -> Self {
        self.next_id = Some(first);
        self
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all handles dropped).
    pub async fn run(mut self) {
        info!("Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(
            "Registry actor stopped (clients: {})",
            self.connections.len()
        );
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Register {
                outbound,
                respond_to,
            } => {
                let result = self.handle_register(outbound);
                // Ignore send error - caller may have dropped the receiver
                let _ = respond_to.send(result);
            }
            RegistryCommand::SetName {
                client_id,
                name,
                respond_to,
            } => {
                let found = self.handle_set_name(client_id, name);
                let _ = respond_to.send(found);
            }
            RegistryCommand::Remove {
                client_id,
                respond_to,
            } => {
                let removed = self.handle_remove(client_id);
                let _ = respond_to.send(removed);
            }
            RegistryCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.handle_snapshot());
            }
            RegistryCommand::Count { respond_to } => {
                let _ = respond_to.send(self.connections.len());
            }
            RegistryCommand::Drain { respond_to } => {
                let _ = respond_to.send(self.handle_drain());
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    fn handle_register(&mut self, outbound: Outbound) -> Result<ClientId, RegistryError> {
        let Some(client_id) = self.next_id else {
            warn!("No client identities left, rejecting registration");
            return Err(RegistryError::IdentitiesExhausted);
        };
        self.next_id = client_id.next();

        self.connections.insert(
            client_id,
            Connection {
                outbound,
                connected_at: Utc::now(),
            },
        );
        self.names.insert(client_id, None);

        debug!(
            client_id = %client_id,
            total = self.connections.len(),
            "Client registered"
        );
        self.publish(RegistryEvent::Registered { client_id });

        Ok(client_id)
    }

    fn handle_set_name(&mut self, client_id: ClientId, name: String) -> bool {
        let Some(slot) = self.names.get_mut(&client_id) else {
            debug!(client_id = %client_id, "Ignoring name for unknown client");
            return false;
        };
        *slot = Some(name.clone());

        self.publish(RegistryEvent::Named { client_id, name });
        true
    }

    fn handle_remove(&mut self, client_id: ClientId) -> Option<RemovedSession> {
        let connection = self.connections.remove(&client_id)?;
        let name = self.names.remove(&client_id).flatten();

        debug!(
            client_id = %client_id,
            remaining = self.connections.len(),
            "Client removed"
        );
        self.publish(RegistryEvent::Removed { client_id });

        Some(RemovedSession {
            id: client_id,
            name,
            connected_at: connection.connected_at,
        })
    }

    fn handle_snapshot(&self) -> Vec<RegistryEntry> {
        self.connections
            .iter()
            .map(|(id, connection)| RegistryEntry {
                id: *id,
                name: self.names.get(id).cloned().flatten(),
                outbound: connection.outbound.clone(),
                connected_at: connection.connected_at,
            })
            .collect()
    }

    fn handle_drain(&mut self) -> Vec<RegistryEntry> {
        let entries = self.handle_snapshot();
        for entry in &entries {
            self.connections.remove(&entry.id);
            self.names.remove(&entry.id);
            self.publish(RegistryEvent::Removed {
                client_id: entry.id,
            });
        }

        if !entries.is_empty() {
            info!(count = entries.len(), "Registry drained");
        }
        entries
    }

    fn publish(&self, event: RegistryEvent) {
        // No subscribers is the normal case outside of tests
        let _ = self.event_publisher.send(event);
    }
}
