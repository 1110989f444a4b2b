//! Secret provider implementations.

pub mod env;
