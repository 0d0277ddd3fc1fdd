//! Transcript state and the stream-event reducer.
//!
//! A turn owns exactly one active assistant message. Every decoded event is
//! folded into that message left to right; nothing else mutates it while the
//! turn is open.

use crate::api::StreamEvent;
use crate::types::{ChatMessage, ToolCall, TurnStatus};

/// Ordered messages plus the status of the current turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    status: TurnStatus,
    /// Id of the assistant message the open (or last) stream writes into.
    active_id: Option<String>,
    /// Description of the most recent failure, cleared when a turn starts.
    last_error: Option<String>,
}

/// Pure transition: fold one event into the transcript.
///
/// Takes the state by value so token appends grow the existing buffer in
/// place instead of copying the whole message per token.
pub fn reduce(mut transcript: Transcript, event: &StreamEvent) -> Transcript {
    transcript.apply(event);
    transcript
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a transcript from rehydrated messages; status starts `idle`.
    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn status(&self) -> TurnStatus {
        self.status
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    /// The assistant message the current stream writes into.
    pub fn active_message(&self) -> Option<&ChatMessage> {
        let id = self.active_id.as_deref()?;
        self.messages.iter().rev().find(|m| m.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop every message and return to `idle`.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Open a turn: append `user` (if any) and a streaming placeholder.
    ///
    /// Returns the placeholder id. Callers must have checked
    /// [`TurnStatus::accepts_input`] or be resuming from an approval.
    pub(crate) fn begin_turn(&mut self, user: Option<ChatMessage>) -> String {
        self.messages.extend(user);
        let placeholder = ChatMessage::assistant_placeholder();
        let id = placeholder.id.clone();
        self.messages.push(placeholder);
        self.active_id = Some(id.clone());
        self.status = TurnStatus::Streaming;
        self.last_error = None;
        id
    }

    /// Clear the approval flag on every message; returns how many were set.
    pub(crate) fn clear_approval_flags(&mut self) -> usize {
        let mut cleared = 0;
        for message in self.messages.iter_mut().filter(|m| m.is_approval_required) {
            message.is_approval_required = false;
            cleared += 1;
        }
        cleared
    }

    /// Fold one stream event into the active message.
    ///
    /// Events arriving with no active message are dropped.
    pub fn apply(&mut self, event: &StreamEvent) {
        let Some(message) = self.active_message_mut() else {
            tracing::debug!(event = event.name(), "no active message; event dropped");
            return;
        };
        match event {
            StreamEvent::Token { content } => message.content.push_str(content),
            StreamEvent::ToolCall(call) => message
                .tool_calls
                .get_or_insert_with(Vec::new)
                .push(call.clone()),
            StreamEvent::ToolResult { name, result } => {
                if !attach_tool_result(message.tool_calls.as_deref_mut(), name, result) {
                    tracing::debug!(tool = %name, "tool_result without an unresolved call; dropped");
                }
            }
            StreamEvent::ApprovalRequired { tool_calls } => {
                // The server's list is canonical; it replaces anything streamed so far.
                message.tool_calls = Some(tool_calls.clone());
                message.is_streaming = false;
                message.is_approval_required = true;
                self.status = TurnStatus::AwaitingApproval;
            }
            StreamEvent::Receipt(receipt) => {
                if message.receipt.is_some() {
                    tracing::debug!("receipt replaced on active message");
                }
                message.receipt = Some(receipt.clone());
            }
            StreamEvent::Done => {
                message.is_streaming = false;
                self.status = TurnStatus::Idle;
            }
            StreamEvent::Error { message: text } => {
                if message.content.is_empty() {
                    message.content = format!("Error: {text}");
                }
                message.is_streaming = false;
                self.status = TurnStatus::Error;
                self.last_error = Some(text.clone());
            }
        }
    }

    /// End the turn after a transport or protocol failure.
    ///
    /// Partial content stays as streamed; only the flags and status change.
    pub(crate) fn fail_turn(&mut self, reason: impl Into<String>) {
        if let Some(message) = self.active_message_mut() {
            message.is_streaming = false;
        }
        self.status = TurnStatus::Error;
        self.last_error = Some(reason.into());
    }

    fn active_message_mut(&mut self) -> Option<&mut ChatMessage> {
        let id = self.active_id.as_deref()?;
        self.messages.iter_mut().rev().find(|m| m.id == id)
    }
}

/// Fill the result of the latest unresolved call named `name`.
///
/// Assumes results for same-named calls arrive in issue order among the
/// unresolved ones; scanning from the end matches the usual case of a single
/// in-flight call whose earlier namesakes are already resolved. Returns
/// `false` when no unresolved call matches.
fn attach_tool_result(calls: Option<&mut [ToolCall]>, name: &str, result: &str) -> bool {
    let Some(call) = calls.and_then(|calls| {
        calls
            .iter_mut()
            .rev()
            .find(|call| call.name == name && call.result.is_none())
    }) else {
        return false;
    };
    call.result = Some(result.to_string());
    true
}
