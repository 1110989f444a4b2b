//! HTTP/REST API layer for Conduit.
//!
//! Axum-based API at `/api/v1/` carrying webhook ingress and checkpoint
//! inspection, with an envelope response format and CORS support.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
