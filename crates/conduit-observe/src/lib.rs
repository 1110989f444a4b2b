//! Observability setup for Conduit: structured logging and optional
//! OpenTelemetry export.

pub mod tracing_setup;
