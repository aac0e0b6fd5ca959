//! Lines the server writes to clients.

use std::fmt;

use chat_core::ClientId;

/// A server → client line, rendered without its terminator.
///
/// Formats:
/// - `[<id>] | <name> joined the chat`
/// - `[<id>] | <name> left the chat`
/// - `[<id>] | <name>: <body>`
/// - `[<id>] | <name> (private message): <body>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLine {
    /// A client finished its handshake
    Joined { id: ClientId, name: String },

    /// A client disconnected
    Left { id: ClientId, name: String },

    /// Text for everyone
    Chat {
        id: ClientId,
        name: String,
        body: String,
    },

    /// Text for a single recipient
    Private {
        id: ClientId,
        name: String,
        body: String,
    },
}

impl ServerLine {
    /// Creates a join announcement.
    pub fn joined(id: ClientId, name: &str) -> Self {
        Self::Joined {
            id,
            name: name.to_string(),
        }
    }

    /// Creates a departure announcement.
    pub fn left(id: ClientId, name: &str) -> Self {
        Self::Left {
            id,
            name: name.to_string(),
        }
    }

    /// Creates a chat line.
    pub fn chat(id: ClientId, name: &str, body: &str) -> Self {
        Self::Chat {
            id,
            name: name.to_string(),
            body: body.to_string(),
        }
    }

    /// Creates a private message line.
    pub fn private(id: ClientId, name: &str, body: &str) -> Self {
        Self::Private {
            id,
            name: name.to_string(),
            body: body.to_string(),
        }
    }

    /// Identity of the client the line is about.
    pub fn sender(&self) -> ClientId {
        match self {
            Self::Joined { id, .. }
            | Self::Left { id, .. }
            | Self::Chat { id, .. }
            | Self::Private { id, .. } => *id,
        }
    }
}

impl fmt::Display for ServerLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Joined { id, name } => write!(f, "[{id}] | {name} joined the chat"),
            Self::Left { id, name } => write!(f, "[{id}] | {name} left the chat"),
            Self::Chat { id, name, body } => write!(f, "[{id}] | {name}: {body}"),
            Self::Private { id, name, body } => {
                write!(f, "[{id}] | {name} (private message): {body}")
            }
        }
    }
}
