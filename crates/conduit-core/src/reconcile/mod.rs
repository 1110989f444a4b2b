//! Trigger event-delivery reconciliation.
//!
//! Leaves first: `timestamp` and `ordering` are pure rules over checkpoints;
//! `extract` and `auth` handle inbound payloads; `lock` serializes checkpoint
//! mutation per logical key. `engine` ties the rules to the checkpoint store
//! and emitter, and `webhook`, `poll` and `trigger` are the entry points.

pub mod arbiter;
pub mod auth;
pub mod emitter;
pub mod engine;
pub mod extract;
pub mod listing;
pub mod lock;
pub mod ordering;
pub mod poll;
pub mod schedule;
pub mod timestamp;
pub mod trigger;
pub mod webhook;

#[cfg(test)]
mod test_support;
