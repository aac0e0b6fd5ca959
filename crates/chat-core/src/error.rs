//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Parse error for incoming data
    #[error("Failed to parse {field}: {reason}")]
    ParseError { field: String, reason: String },

    /// Identity zero is never handed out
    #[error("Client id 0 is reserved")]
    ZeroClientId,
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
