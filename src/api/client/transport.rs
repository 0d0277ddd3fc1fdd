//! HTTP transport helpers shared by the chat API client.

use crate::api::EventStream;
use crate::error::ApiError;
use futures_util::stream::{self, StreamExt};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Build an HTTP client with a connect timeout applied.
///
/// Only connection setup is bounded: a total request timeout would also cut
/// off long-lived event streams.
pub(super) fn build_http_client(connect_timeout: Duration) -> reqwest::Client {
    // Fall back to reqwest defaults if builder creation fails for any reason.
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Turn non-2xx responses into `ApiError::Status`, keeping the body for diagnostics.
pub(super) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, ApiError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let code = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status { code, body })
}

/// Read a full JSON body, reporting shape mismatches as `InvalidResponse`.
pub(super) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ApiError> {
    let response = ensure_success(response).await?;
    let text = response.text().await?;
    serde_json::from_str(&text)
        .map_err(|err| ApiError::InvalidResponse(format!("unexpected JSON body: {err}")))
}

/// Expose a streaming response body as raw chunks.
///
/// With `idle_timeout`, a gap longer than the window between chunks yields one
/// `ApiError::Timeout` and ends the stream.
pub(super) async fn event_stream(
    response: reqwest::Response,
    idle_timeout: Option<Duration>,
) -> Result<EventStream, ApiError> {
    let response = ensure_success(response).await?;
    let chunks = response
        .bytes_stream()
        .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(ApiError::from))
        .boxed();

    let Some(idle) = idle_timeout else {
        return Ok(chunks);
    };
    Ok(stream::unfold(Some(chunks), move |state| async move {
        let mut chunks = state?;
        match tokio::time::timeout(idle, chunks.next()).await {
            Ok(Some(item)) => Some((item, Some(chunks))),
            Ok(None) => None,
            Err(_) => Some((Err(ApiError::Timeout(idle)), None)),
        }
    })
    .boxed())
}
