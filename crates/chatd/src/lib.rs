//! linechat daemon - connection registry and message router
//!
//! This crate provides the server side of linechat:
//! - `registry` - Connection registry actor (identity → stream, identity → name)
//! - `router` - Broadcast and direct delivery, isolating per-client failures
//! - `server` - TCP listener and per-connection sessions
//! - `config` - TOML/env configuration
//! - `cli` - The `chatd` command-line entry point
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        chatd daemon                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │   ChatServer    │────▶│     RegistryActor           │    │
//! │  │ (TcpListener)   │     │  (connection state owner)   │    │
//! │  └────────┬────────┘     └──────────────┬──────────────┘    │
//! │           │                             │                   │
//! │           │ connections                 │ snapshots         │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │    Session      │────▶│         Router              │    │
//! │  │  (per client)   │     │  (writes to Outbound)       │    │
//! │  └─────────────────┘     └─────────────────────────────┘    │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//!   outside of tests
//! - Channel operations handle closure gracefully
//! - A broken client connection only ever ends that client's session

pub mod cli;
pub mod config;
pub mod outbound;
pub mod registry;
pub mod router;
pub mod server;
