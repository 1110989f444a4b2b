//! reqwest-backed execution listing client.
//!
//! Sends one GET per page to the trigger's `listing_url` and maps whatever
//! vendor-shaped items come back onto `ExecutionSummary`.

use std::time::Duration;

use conduit_core::reconcile::extract::{get_path, summary_from_value};
use conduit_core::reconcile::listing::{ExecutionLister, ListError};
use conduit_types::execution::ExecutionSummary;
use conduit_types::trigger::TriggerSpec;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

/// Locations the item array is looked up under, in order.
const ITEM_PATHS: &[&str] = &["data.content", "content", "data.items", "items", "executions", "data"];

/// Longest error body kept in a `ListError::Status` message.
const MAX_ERROR_MESSAGE: usize = 512;

/// HTTP listing client. The optional API key is only exposed when building
/// request headers.
pub struct HttpExecutionLister {
    client: reqwest::Client,
    api_key: Option<(String, SecretString)>,
}

impl HttpExecutionLister {
    pub fn new(timeout: Duration) -> Result<Self, ListError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ListError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: None,
        })
    }

    /// Send `key` under `header` on every request.
    pub fn with_api_key(mut self, header: impl Into<String>, key: SecretString) -> Self {
        self.api_key = Some((header.into(), key));
        self
    }
}

impl ExecutionLister for HttpExecutionLister {
    async fn list_page(
        &self,
        trigger: &TriggerSpec,
        page: u32,
        page_size: u32,
        filter: Option<&str>,
    ) -> Result<Vec<ExecutionSummary>, ListError> {
        let mut request = self
            .client
            .get(&trigger.listing_url)
            .query(&query_params(trigger, page, page_size, filter))
            .header("accept", "application/json");
        if let Some((header, key)) = &self.api_key {
            request = request.header(header.as_str(), key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ListError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ListError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ListError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| ListError::Decode(format!("invalid JSON: {e}")))?;
        parse_items(&value)
    }
}

fn query_params(
    trigger: &TriggerSpec,
    page: u32,
    page_size: u32,
    filter: Option<&str>,
) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("page", page.to_string()),
        ("size", page_size.to_string()),
        ("orgIdentifier", trigger.organization.clone()),
        ("projectIdentifier", trigger.project.clone()),
    ];
    if let Some(pipeline) = filter {
        params.push(("pipelineIdentifier", pipeline.to_string()));
    }
    params
}

/// Find the item array in a listing response and map each item.
pub fn parse_items(value: &Value) -> Result<Vec<ExecutionSummary>, ListError> {
    let items = match value {
        Value::Array(items) => items,
        _ => ITEM_PATHS
            .iter()
            .find_map(|path| get_path(value, path).and_then(Value::as_array))
            .ok_or_else(|| ListError::Decode("no execution list in response".to_string()))?,
    };
    Ok(items.iter().map(item_to_summary).collect())
}

fn item_to_summary(item: &Value) -> ExecutionSummary {
    let mut summary = summary_from_value(item);
    if summary.execution_id.is_empty() {
        if let Some(id) = item.get("id").and_then(Value::as_str) {
            summary.execution_id = id.to_string();
        }
    }
    summary
}

/// Prefer the vendor's error message field over the raw body.
fn error_message(body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        ["message", "error", "detail", "errorMessage"]
            .iter()
            .find_map(|key| v.get(key).and_then(Value::as_str).map(str::to_string))
    });
    let message = from_json.unwrap_or_else(|| body.trim().to_string());
    message.chars().take(MAX_ERROR_MESSAGE).collect()
}
