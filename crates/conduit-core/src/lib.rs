//! Trigger event-delivery reconciliation for Conduit.
//!
//! This crate turns webhook pushes and listing polls into one checkpointed,
//! de-duplicated, ordered stream of completion events. It defines the
//! "ports" (persistence, secrets, remote listing, scheduling, emission) that
//! the infrastructure layer implements, and depends only on `conduit-types`
//! -- never on `conduit-infra` or any database/HTTP client crate.

pub mod reconcile;
pub mod repository;
