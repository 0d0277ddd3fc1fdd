//! HTTP surface of the chat server and its event-stream wire format.
//!
//! The API layer is split into cohesive modules:
//! - `sse`: incremental frame decoding of the event stream
//! - `events`: typed events and frame dispatch
//! - `client`: reqwest-backed [`ChatBackend`] implementation

use crate::error::ApiError;
use crate::types::{Receipt, Role, ToolCall};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

mod client;
pub mod events;
pub mod sse;

pub use client::ApiClient;
pub use events::{dispatch, StreamEvent};
pub use sse::{Frame, FrameDecoder};

/// Raw body chunks of one turn's event stream.
pub type EventStream = BoxStream<'static, Result<Vec<u8>, ApiError>>;

/// Chat server operations used by the session layer.
///
/// This trait lets tests script streams without network calls while the
/// production path uses [`ApiClient`].
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// `POST /sessions`: allocate a new server-side session.
    async fn create_session(&self) -> Result<String, ApiError>;

    /// `GET /sessions/{id}/messages`: fetch a stored transcript.
    async fn fetch_transcript(&self, session_id: &str) -> Result<TranscriptPayload, ApiError>;

    /// `POST /sessions/{id}/messages`: send user text and open the reply stream.
    async fn send_message(&self, session_id: &str, content: &str)
        -> Result<EventStream, ApiError>;

    /// `POST /sessions/{id}/approve`: answer a pending approval and open the resume stream.
    async fn approve(&self, session_id: &str, approved: bool) -> Result<EventStream, ApiError>;
}

/// Response body of `POST /sessions`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

/// Response body of `GET /sessions/{id}/messages`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscriptPayload {
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
    /// Receipt of the latest completed turn, if any.
    #[serde(default)]
    pub receipt: Option<Receipt>,
}

/// One message as the server stores it.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredMessage {
    #[serde(default)]
    pub id: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, rename = "toolCalls", alias = "tool_calls")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SendMessageBody<'a> {
    pub(crate) content: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ApproveBody {
    pub(crate) approved: bool,
}
