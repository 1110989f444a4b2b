//! Shared domain types for Conduit.
//!
//! This crate contains the types shared by the reconciliation engine, its
//! infrastructure adapters and the API layer: checkpoints, execution
//! summaries, completion events, trigger specs, configuration, and the
//! associated error types.
//!
//! Zero infrastructure dependencies -- only serde and thiserror.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod event;
pub mod execution;
pub mod secret;
pub mod trigger;
