//! linechat protocol - the newline-delimited chat grammar
//!
//! This crate provides parsing for lines sent by clients and the exact
//! text formats of lines sent by the server.

pub mod directive;
pub mod line;

pub use directive::{parse_line, DirectiveError, Inbound, MESSAGE_DIRECTIVE};
pub use line::ServerLine;
