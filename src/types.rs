//! Transcript data model shared by the reducer, session store, and wire codec.
//!
//! Wire-facing types (`ToolCall`, `Receipt`, `ProductSummary`) deserialize
//! directly from the JSON payloads the chat server emits.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Roles and status
// ---------------------------------------------------------------------------

/// Conversation participant role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End-user message.
    User,
    /// Agent reply, possibly streamed token by token.
    Assistant,
}

/// Lifecycle state of the current turn.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    #[default]
    Idle,
    Streaming,
    AwaitingApproval,
    Error,
}

impl TurnStatus {
    /// True when a new message may be sent.
    ///
    /// Input is disabled while a stream is open and while an approval
    /// decision is outstanding.
    pub fn accepts_input(self) -> bool {
        matches!(self, Self::Idle | Self::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Streaming => "streaming",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Error => "error",
        }
    }
}

// ---------------------------------------------------------------------------
// Tool calls and receipts
// ---------------------------------------------------------------------------

/// One tool invocation made by the agent during a turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
    /// Tool output, filled in once by a matching `tool_result` event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            args,
            result: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.result.is_some()
    }
}

fn default_currency() -> String {
    "USD".to_string()
}

/// One product in a multi-product comparison.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductSummary {
    pub product_name: String,
    pub price: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub average_rating: Option<f64>,
    #[serde(default)]
    pub price_range: Option<String>,
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<String>,
}

/// Final structured recommendation attached to an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Receipt {
    pub product_name: String,
    pub price: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub average_rating: Option<f64>,
    /// Price spread across retailers, e.g. `"$49 - $79"`.
    #[serde(default)]
    pub price_range: Option<String>,
    #[serde(default)]
    pub recommendation_reason: Option<String>,
    /// Other products considered when the user asked for a comparison.
    #[serde(default)]
    pub comparison_products: Option<Vec<ProductSummary>>,
    #[serde(default)]
    pub comparison_summary: Option<String>,
}

impl Receipt {
    pub fn new(product_name: impl Into<String>, price: f64, currency: impl Into<String>) -> Self {
        Self {
            product_name: product_name.into(),
            price,
            currency: currency.into(),
            average_rating: None,
            price_range: None,
            recommendation_reason: None,
            comparison_products: None,
            comparison_summary: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// A single message in the transcript.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Client-generated id, unique within the session.
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<Receipt>,
    pub is_streaming: bool,
    pub is_approval_required: bool,
}

impl ChatMessage {
    /// Create a user message with a fresh id.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: generate_message_id(),
            role: Role::User,
            content: content.into(),
            tool_calls: None,
            receipt: None,
            is_streaming: false,
            is_approval_required: false,
        }
    }

    /// Create an empty assistant placeholder that is about to stream.
    pub fn assistant_placeholder() -> Self {
        Self {
            id: generate_message_id(),
            role: Role::Assistant,
            content: String::new(),
            tool_calls: None,
            receipt: None,
            is_streaming: true,
            is_approval_required: false,
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    /// Tool calls recorded on this message (empty when none were made).
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }
}

/// Generate a short lowercase base-36 id for local message bookkeeping.
pub fn generate_message_id() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..8)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
