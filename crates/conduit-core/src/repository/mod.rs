//! Port definitions for state the engine reads and writes.
//!
//! These traits define the storage interface that the infrastructure layer
//! (conduit-infra) implements. The core crate never depends on any specific
//! storage technology.

pub mod checkpoint;
pub mod secret;
