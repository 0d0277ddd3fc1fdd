//! Typed stream events and frame dispatch.
//!
//! Dispatch maps an event name to a typed payload and nothing else. Unknown
//! event names are skipped without looking at their payload so newer servers
//! can add event types without breaking older clients.

use super::sse::Frame;
use crate::error::ProtocolError;
use crate::types::{Receipt, ToolCall};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// One event emitted by the chat server during a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A chunk of assistant text.
    Token { content: String },
    /// The agent invoked a tool.
    ToolCall(ToolCall),
    /// Output of a previously announced tool call.
    ToolResult { name: String, result: String },
    /// The agent paused and wants a human decision before running `tool_calls`.
    ApprovalRequired { tool_calls: Vec<ToolCall> },
    Receipt(Receipt),
    Done,
    Error { message: String },
}

impl StreamEvent {
    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Token { .. } => "token",
            Self::ToolCall(_) => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::ApprovalRequired { .. } => "approval_required",
            Self::Receipt(_) => "receipt",
            Self::Done => "done",
            Self::Error { .. } => "error",
        }
    }

    /// True for events that end the current stream's turn.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Done | Self::Error { .. } | Self::ApprovalRequired { .. }
        )
    }
}

#[derive(Deserialize)]
struct TokenPayload {
    content: String,
}

#[derive(Deserialize)]
struct ToolResultPayload {
    name: String,
    result: String,
}

#[derive(Deserialize)]
struct ApprovalPayload {
    tool_calls: Vec<ToolCall>,
}

#[derive(Deserialize)]
struct ErrorPayload {
    message: String,
}

/// Route one frame to its typed event.
///
/// Returns `Ok(None)` for event names this client does not know.
pub fn dispatch(frame: &Frame) -> Result<Option<StreamEvent>, ProtocolError> {
    let event = match frame.event.as_str() {
        "token" => {
            let payload: TokenPayload = decode(frame)?;
            StreamEvent::Token {
                content: payload.content,
            }
        }
        "tool_call" => StreamEvent::ToolCall(decode(frame)?),
        "tool_result" => {
            let payload: ToolResultPayload = decode(frame)?;
            StreamEvent::ToolResult {
                name: payload.name,
                result: payload.result,
            }
        }
        "approval_required" => {
            let payload: ApprovalPayload = decode(frame)?;
            StreamEvent::ApprovalRequired {
                tool_calls: payload.tool_calls,
            }
        }
        "receipt" => StreamEvent::Receipt(decode(frame)?),
        // `done` payloads carry nothing the client needs; accept anything.
        "done" => StreamEvent::Done,
        "error" => {
            let payload: ErrorPayload = decode(frame)?;
            StreamEvent::Error {
                message: payload.message,
            }
        }
        other => {
            tracing::debug!(event = other, "ignoring unknown stream event");
            return Ok(None);
        }
    };
    Ok(Some(event))
}

fn decode<T: DeserializeOwned>(frame: &Frame) -> Result<T, ProtocolError> {
    serde_json::from_str(&frame.data).map_err(|source| ProtocolError::MalformedPayload {
        event: frame.event.clone(),
        source,
    })
}
