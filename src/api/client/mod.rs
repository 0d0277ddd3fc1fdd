//! reqwest-backed client for the chat server's session endpoints.
//!
//! Request/response plumbing lives in `transport`; stream bodies are handed
//! back as raw chunks and decoded by the session layer.

mod transport;

use super::{
    ApproveBody, ChatBackend, CreateSessionResponse, EventStream, SendMessageBody,
    TranscriptPayload,
};
use crate::config::{ApiConfig, NetworkConfig};
use crate::error::ApiError;
use async_trait::async_trait;
use std::time::Duration;

/// Client for the chat API rooted at `base_url` (for example `http://host/chat`).
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    stream_idle_timeout: Option<Duration>,
}

impl ApiClient {
    /// Build a client from resolved API and network configuration.
    pub fn new(api: &ApiConfig, network: &NetworkConfig) -> Self {
        Self {
            http: transport::build_http_client(Duration::from_secs(network.connect_timeout_secs)),
            base_url: api.base_url.trim_end_matches('/').to_string(),
            stream_idle_timeout: network.stream_idle_timeout(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Append route segments to the base URL, percent-encoding each one.
    ///
    /// Session ids are opaque, so they travel as a single encoded segment.
    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, ApiError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|err| ApiError::InvalidUrl(format!("`{}`: {err}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(format!("`{}` cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn open_stream(
        &self,
        segments: &[&str],
        body: &impl serde::Serialize,
    ) -> Result<EventStream, ApiError> {
        let response = self
            .http
            .post(self.endpoint(segments)?)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(body)
            .send()
            .await?;
        transport::event_stream(response, self.stream_idle_timeout).await
    }
}

#[async_trait]
impl ChatBackend for ApiClient {
    async fn create_session(&self) -> Result<String, ApiError> {
        let response = self.http.post(self.endpoint(&["sessions"])?).send().await?;
        let created: CreateSessionResponse = transport::read_json(response).await?;
        if created.session_id.trim().is_empty() {
            return Err(ApiError::InvalidResponse(
                "server returned an empty session_id".to_string(),
            ));
        }
        tracing::debug!(session_id = %created.session_id, "created chat session");
        Ok(created.session_id)
    }

    async fn fetch_transcript(&self, session_id: &str) -> Result<TranscriptPayload, ApiError> {
        let response = self
            .http
            .get(self.endpoint(&["sessions", session_id, "messages"])?)
            .send()
            .await?;
        transport::read_json(response).await
    }

    async fn send_message(
        &self,
        session_id: &str,
        content: &str,
    ) -> Result<EventStream, ApiError> {
        self.open_stream(
            &["sessions", session_id, "messages"],
            &SendMessageBody { content },
        )
        .await
    }

    async fn approve(&self, session_id: &str, approved: bool) -> Result<EventStream, ApiError> {
        self.open_stream(
            &["sessions", session_id, "approve"],
            &ApproveBody { approved },
        )
        .await
    }
}
