//! Default configuration constants.

/// Default chat API root (the agent server mounts its router under `/chat`).
pub(super) const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/chat";
/// Default timeout for establishing a connection to the chat API.
pub(super) const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Stream stall timeout; `0` keeps waiting for as long as the server holds the stream.
pub(super) const DEFAULT_STREAM_IDLE_TIMEOUT_SECS: u64 = 0;
/// Directory (relative to the working directory) holding the session key.
pub(super) const DEFAULT_STATE_DIR: &str = ".aigent";
/// Config file name looked up locally and under the global config root.
pub(super) const CONFIG_FILE_NAME: &str = "aigent.toml";
