//! Infrastructure layer for Conduit.
//!
//! Implements the ports defined in `conduit-core`: SQLite and in-memory
//! checkpoint stores, the environment secret provider, the HTTP execution
//! listing client and the one-shot poll scheduler. Also loads `config.toml`.

pub mod config;
pub mod listing;
pub mod memory;
pub mod scheduler;
pub mod secret;
pub mod sqlite;
