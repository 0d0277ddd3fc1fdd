//! Approval gate: pausing a turn for a human decision and resuming it.
//!
//! An `approval_required` event leaves the turn in
//! [`TurnStatus::AwaitingApproval`]. Ordinary sends are refused in that state;
//! the only way forward is one yes/no decision, which opens a fresh streaming
//! placeholder and a resume stream on the server.

use crate::transcript::Transcript;
use crate::types::{ToolCall, TurnStatus};

/// Human answer to an approval prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approve,
    Deny,
}

impl ApprovalDecision {
    /// Wire value sent to the resume endpoint.
    pub fn approved(self) -> bool {
        self == Self::Approve
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Deny => "deny",
        }
    }
}

impl From<bool> for ApprovalDecision {
    fn from(approved: bool) -> Self {
        if approved {
            Self::Approve
        } else {
            Self::Deny
        }
    }
}

/// The message currently waiting on a decision and the calls it would run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingApproval<'a> {
    pub message_id: &'a str,
    pub tool_calls: &'a [ToolCall],
}

/// Find the message flagged for approval, if any.
pub fn pending_approval(transcript: &Transcript) -> Option<PendingApproval<'_>> {
    transcript
        .messages()
        .iter()
        .rev()
        .find(|m| m.is_approval_required)
        .map(|m| PendingApproval {
            message_id: &m.id,
            tool_calls: m.tool_calls(),
        })
}

/// True when a decision may be submitted in `status`.
///
/// Only an open stream blocks it. `idle` and `error` are allowed too: a
/// rehydrated session may be paused server-side while the local flags were
/// not restored.
pub fn accepts_decision(status: TurnStatus) -> bool {
    status != TurnStatus::Streaming
}

/// Resolve the gate locally: clear approval flags and open a new placeholder.
///
/// Returns the id of the placeholder the resume stream writes into.
pub(crate) fn resume(transcript: &mut Transcript, decision: ApprovalDecision) -> String {
    let cleared = transcript.clear_approval_flags();
    let id = transcript.begin_turn(None);
    tracing::debug!(
        decision = decision.as_str(),
        cleared,
        message_id = %id,
        "resuming turn after approval decision"
    );
    id
}
