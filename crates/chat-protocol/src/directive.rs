//! Parsing of client lines into chat requests.
//!
//! After the handshake every client line is either plain chat text or a
//! `/message <target-id> <word> [<word> ...]` directive addressed to one
//! client.

use chat_core::{ClientId, DomainError};
use thiserror::Error;

/// Token that introduces a directed message.
pub const MESSAGE_DIRECTIVE: &str = "/message";

/// Minimum token count for a directed message: directive, target, one word.
const MIN_DIRECTIVE_TOKENS: usize = 3;

/// A parsed client line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound<'a> {
    /// Plain text for every other client, used verbatim.
    Chat(&'a str),

    /// Text for a single client.
    Direct {
        /// Addressed client
        target: ClientId,
        /// Words after the target, rejoined with single spaces
        body: String,
    },
}

/// Reasons a `/message` directive is discarded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectiveError {
    #[error("directive needs a target and a message ({found} tokens, need 3)")]
    TooFewTokens { found: usize },

    #[error("invalid directive target {token:?}: {source}")]
    InvalidTarget {
        token: String,
        #[source]
        source: DomainError,
    },
}

/// Parses one client line (line terminator already stripped).
///
/// Any line starting with [`MESSAGE_DIRECTIVE`] is treated as a directive.
/// Tokens are split on single spaces, so runs of spaces produce empty
/// tokens that are kept when the body is rejoined.
///
/// # Errors
///
/// - `DirectiveError::TooFewTokens` when fewer than 3 tokens are present
/// - `DirectiveError::InvalidTarget` when the target is not a client id
pub fn parse_line(line: &str) -> Result<Inbound<'_>, DirectiveError> {
    if !line.starts_with(MESSAGE_DIRECTIVE) {
        return Ok(Inbound::Chat(line));
    }

    let tokens: Vec<&str> = line.split(' ').collect();
    if tokens.len() < MIN_DIRECTIVE_TOKENS {
        return Err(DirectiveError::TooFewTokens {
            found: tokens.len(),
        });
    }

    let raw_target = tokens.get(1).copied().unwrap_or_default();
    let target = raw_target
        .parse::<ClientId>()
        .map_err(|source| DirectiveError::InvalidTarget {
            token: raw_target.to_string(),
            source,
        })?;

    let body = tokens.get(2..).unwrap_or_default().join(" ");

    Ok(Inbound::Direct { target, body })
}
