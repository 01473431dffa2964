//! Shared HTTP exchange for provider adapters.

use crate::conversation::ports::{AdapterError, AdapterResult};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Deadline for a single inference request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Builds the HTTP client used by provider adapters.
pub fn build_client() -> AdapterResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(AdapterError::http)
}

/// Sends `request` and decodes a JSON body from a 2xx response.
pub async fn send_json<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> AdapterResult<T> {
    let response = request.send().await.map_err(AdapterError::http)?;
    let status = response.status();
    let body = response.text().await.map_err(AdapterError::http)?;
    debug!(status = status.as_u16(), bytes = body.len(), "model provider answered");

    if !status.is_success() {
        return Err(AdapterError::Status {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|err| AdapterError::InvalidResponse(err.to_string()))
}
