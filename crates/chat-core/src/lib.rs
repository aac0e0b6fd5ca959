//! linechat core - shared domain types
//!
//! This crate provides the domain types shared between the wire protocol
//! (`chat-protocol`) and the daemon (`chatd`).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::ClientId;
