//! Client identity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Identity assigned to a connected client.
///
/// Identities start at 1 and grow monotonically for the lifetime of the
/// server process. They are never reused, so a stale id held by one client
/// can never address a newer client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(u32);

impl ClientId {
    /// The first identity handed out by a fresh registry.
    pub const FIRST: ClientId = ClientId(1);

    /// Creates a ClientId from a raw value.
    ///
    /// No validation happens here; a zero id simply never matches a
    /// registered client.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw integer.
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns the identity that follows this one, or `None` once the
    /// 32-bit space is used up.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ClientId {
    type Err = DomainError;

    /// Parses the decimal form used on the wire (`/message 2 ...`).
    fn from_str(s: &str) -> DomainResult<Self> {
        let raw = s.parse::<u32>().map_err(|e| DomainError::ParseError {
            field: "client id".to_string(),
            reason: format!("{s:?}: {e}"),
        })?;

        if raw == 0 {
            return Err(DomainError::ZeroClientId);
        }

        Ok(Self(raw))
    }
}

impl From<ClientId> for u32 {
    fn from(id: ClientId) -> Self {
        id.0
    }
}
