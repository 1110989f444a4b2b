//! Remote execution-listing port.

use conduit_types::execution::ExecutionSummary;
use conduit_types::trigger::TriggerSpec;

/// Errors returned by a remote listing call.
#[derive(Debug, thiserror::Error)]
pub enum ListError {
    /// The remote API answered with a non-success status.
    #[error("listing API returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("listing transport error: {0}")]
    Transport(String),

    #[error("listing response could not be decoded: {0}")]
    Decode(String),
}

/// Message fragments that identify a rejected identifier filter.
const FILTER_REJECTION_MARKERS: &[&str] =
    &["pipelineidentifier", "filter", "unknown field", "unsupported"];

impl ListError {
    /// Heuristic: did the remote API reject the server-side identifier filter?
    ///
    /// Only 400/422 responses whose message mentions the filter qualify;
    /// everything else is treated as transient.
    pub fn is_filter_unsupported(&self) -> bool {
        match self {
            ListError::Status { status, message } if *status == 400 || *status == 422 => {
                let lower = message.to_lowercase();
                FILTER_REJECTION_MARKERS.iter().any(|m| lower.contains(m))
            }
            _ => false,
        }
    }
}

/// Paged access to a vendor's execution listing.
///
/// Pages are zero-indexed. `filter` is the optional pipeline identifier to
/// filter on server-side. Items may come back in any order.
pub trait ExecutionLister: Send + Sync {
    fn list_page(
        &self,
        trigger: &TriggerSpec,
        page: u32,
        page_size: u32,
        filter: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Vec<ExecutionSummary>, ListError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16, message: &str) -> ListError {
        ListError::Status {
            status,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_filter_unsupported_heuristic() {
        assert!(status(400, "Unknown field: pipelineIdentifier").is_filter_unsupported());
        assert!(status(422, "filter not supported").is_filter_unsupported());
        assert!(status(400, "Unsupported query parameter").is_filter_unsupported());
    }

    #[test]
    fn test_other_errors_are_transient() {
        assert!(!status(400, "page size too large").is_filter_unsupported());
        assert!(!status(500, "pipelineIdentifier lookup failed").is_filter_unsupported());
        assert!(!ListError::Transport("connection reset".into()).is_filter_unsupported());
        assert!(!ListError::Decode("expected array".into()).is_filter_unsupported());
    }
}
