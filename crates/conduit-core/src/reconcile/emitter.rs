//! Downstream event emission.
//!
//! The workflow engine is the single consumer of completion events. The
//! default emitter is a bounded `tokio::sync::mpsc` channel.

use serde_json::Value;
use tokio::sync::mpsc;

/// Errors that can occur when handing an event downstream.
#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    /// The consumer side has gone away.
    #[error("event consumer closed")]
    Closed,

    /// The consumer rejected the event.
    #[error("emission rejected: {0}")]
    Rejected(String),
}

/// Enqueue-and-forget delivery into the workflow engine.
pub trait EventEmitter: Send + Sync {
    fn emit(
        &self,
        event_type: &str,
        payload: Value,
    ) -> impl std::future::Future<Output = Result<(), EmitError>> + Send;
}

/// One event as received by the consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedEvent {
    pub event_type: String,
    pub payload: Value,
}

/// Single-consumer channel emitter.
///
/// Cloning shares the sender, allowing both ingress paths to emit into the
/// same stream.
#[derive(Clone)]
pub struct ChannelEmitter {
    sender: mpsc::Sender<EmittedEvent>,
}

impl ChannelEmitter {
    /// Create an emitter and its receiving end with the given capacity.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<EmittedEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl EventEmitter for ChannelEmitter {
    async fn emit(&self, event_type: &str, payload: Value) -> Result<(), EmitError> {
        self.sender
            .send(EmittedEvent {
                event_type: event_type.to_string(),
                payload,
            })
            .await
            .map_err(|_| EmitError::Closed)
    }
}

impl std::fmt::Debug for ChannelEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelEmitter")
            .field("capacity", &self.sender.max_capacity())
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}
