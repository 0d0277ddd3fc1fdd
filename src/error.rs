//! Unified error types for the chat client.

use std::fmt;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors when loading or parsing configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Toml(e) => write!(f, "toml: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e)
    }
}

// ---------------------------------------------------------------------------
// ApiError
// ---------------------------------------------------------------------------

/// Errors from the HTTP API layer.
#[derive(Debug)]
pub enum ApiError {
    /// Network / reqwest-level error, including a stream dropped mid-body.
    Http(reqwest::Error),
    /// Non-2xx status from the chat API.
    Status { code: u16, body: String },
    /// The response body did not have the expected shape.
    InvalidResponse(String),
    /// The configured base URL cannot carry session route segments.
    InvalidUrl(String),
    /// No stream chunk arrived within the configured idle window.
    Timeout(std::time::Duration),
}

impl ApiError {
    /// HTTP status code when this error came from a non-2xx response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True when the server reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "http: {e}"),
            Self::Status { code, body } if body.trim().is_empty() => write!(f, "status {code}"),
            Self::Status { code, body } => write!(f, "status {code}: {body}"),
            Self::InvalidResponse(msg) => write!(f, "invalid response: {msg}"),
            Self::InvalidUrl(msg) => write!(f, "invalid url: {msg}"),
            Self::Timeout(idle) => write!(f, "stream stalled for {}s", idle.as_secs()),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

// ---------------------------------------------------------------------------
// ProtocolError
// ---------------------------------------------------------------------------

/// Errors decoding one frame of the event stream.
#[derive(Debug)]
pub enum ProtocolError {
    /// A known event carried a payload that is not the expected JSON shape.
    MalformedPayload {
        event: String,
        source: serde_json::Error,
    },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedPayload { event, source } => {
                write!(f, "malformed `{event}` payload: {source}")
            }
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MalformedPayload { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// StorageError
// ---------------------------------------------------------------------------

/// Errors touching the durable session key.
#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    /// The identifier is unsafe to use as (or store in) a file.
    InvalidSessionId(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::InvalidSessionId(msg) => write!(f, "invalid session id: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

// ---------------------------------------------------------------------------
// ChatError (top-level)
// ---------------------------------------------------------------------------

/// Top-level error type for chat session operations.
#[derive(Debug)]
pub enum ChatError {
    Api(ApiError),
    Protocol(ProtocolError),
    /// The stream ended before a `done`, `error`, or `approval_required` frame.
    StreamClosed,
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api(e) => write!(f, "api: {e}"),
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::StreamClosed => write!(f, "stream closed before the turn completed"),
        }
    }
}

impl std::error::Error for ChatError {}

impl From<ApiError> for ChatError {
    fn from(e: ApiError) -> Self {
        Self::Api(e)
    }
}

impl From<ProtocolError> for ChatError {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}
