//! Shared test fixtures for session, stream, and orchestration test modules.
//!
//! Keeping these helpers in one place prevents each test module from
//! rebuilding ad-hoc temp dir, SSE, and fake-server code.

use crate::api::{ChatBackend, EventStream, TranscriptPayload};
use crate::error::ApiError;
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

static TEST_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Temporary directory fixture with best-effort cleanup.
#[derive(Debug)]
pub struct TestTempDir {
    path: PathBuf,
}

impl TestTempDir {
    /// Create a unique temporary directory with a readable prefix.
    pub fn new(prefix: &str) -> Self {
        let suffix = TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let dir = std::env::temp_dir().join(format!(
            "aigent-{prefix}-{}-{millis}-{suffix}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).expect("failed to create temporary fixture directory");
        Self { path: dir }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build a child path under the fixture root.
    pub fn child(&self, relative: &str) -> PathBuf {
        self.path.join(relative)
    }

    /// Write UTF-8 text to a child path, creating parent directories as needed.
    pub fn write_text(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.child(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent directories for fixture");
        }
        fs::write(&path, content).expect("failed to write fixture file");
        path
    }
}

impl Drop for TestTempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// Build one SSE event block with `event:` and `data:` lines.
pub fn sse_event_block(event: &str, data: &str) -> String {
    format!("event: {event}\ndata: {data}\n\n")
}

/// One server call observed by [`ScriptedBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    CreateSession,
    FetchTranscript(String),
    SendMessage { session_id: String, content: String },
    Approve { session_id: String, approved: bool },
}

/// Scripted reply for the next stream-opening call.
pub enum StreamScript {
    /// Stream these chunks in order, then close.
    Chunks(Vec<Result<Vec<u8>, ApiError>>),
    /// Fail before any byte is streamed.
    OpenError(ApiError),
}

impl StreamScript {
    /// A stream delivering `body` split into chunks of at most `chunk_size` bytes.
    pub fn body(body: &str, chunk_size: usize) -> Self {
        let chunks = body
            .as_bytes()
            .chunks(chunk_size.max(1))
            .map(|chunk| Ok(chunk.to_vec()))
            .collect();
        Self::Chunks(chunks)
    }

    /// A stream delivering each SSE event block as its own chunk.
    pub fn events(events: &[(&str, &str)]) -> Self {
        Self::Chunks(
            events
                .iter()
                .map(|(event, data)| Ok(sse_event_block(event, data).into_bytes()))
                .collect(),
        )
    }
}

#[derive(Default)]
struct ScriptedState {
    created: VecDeque<Result<String, ApiError>>,
    transcripts: HashMap<String, TranscriptPayload>,
    streams: VecDeque<StreamScript>,
    calls: Vec<RecordedCall>,
}

/// In-memory [`ChatBackend`] that replays scripted responses and records calls.
///
/// Unknown session ids answer 404; running out of scripted streams answers 500.
#[derive(Default)]
pub struct ScriptedBackend {
    state: Mutex<ScriptedState>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_id(self, id: &str) -> Self {
        self.lock().created.push_back(Ok(id.to_string()));
        self
    }

    pub fn with_create_error(self, err: ApiError) -> Self {
        self.lock().created.push_back(Err(err));
        self
    }

    pub fn with_transcript(self, session_id: &str, payload: TranscriptPayload) -> Self {
        self.lock()
            .transcripts
            .insert(session_id.to_string(), payload);
        self
    }

    pub fn with_stream(self, script: StreamScript) -> Self {
        self.lock().streams.push_back(script);
        self
    }

    /// Calls observed so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptedState> {
        self.state.lock().expect("scripted backend lock poisoned")
    }

    fn next_stream(&self, call: RecordedCall) -> Result<EventStream, ApiError> {
        let mut state = self.lock();
        state.calls.push(call);
        match state.streams.pop_front() {
            Some(StreamScript::Chunks(chunks)) => Ok(stream::iter(chunks).boxed()),
            Some(StreamScript::OpenError(err)) => Err(err),
            None => Err(ApiError::Status {
                code: 500,
                body: "no scripted stream".to_string(),
            }),
        }
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn create_session(&self) -> Result<String, ApiError> {
        let mut state = self.lock();
        state.calls.push(RecordedCall::CreateSession);
        state.created.pop_front().unwrap_or_else(|| {
            Err(ApiError::Status {
                code: 500,
                body: "no scripted session".to_string(),
            })
        })
    }

    async fn fetch_transcript(&self, session_id: &str) -> Result<TranscriptPayload, ApiError> {
        let mut state = self.lock();
        state
            .calls
            .push(RecordedCall::FetchTranscript(session_id.to_string()));
        state
            .transcripts
            .get(session_id)
            .cloned()
            .ok_or_else(|| ApiError::Status {
                code: 404,
                body: "Session not found".to_string(),
            })
    }

    async fn send_message(
        &self,
        session_id: &str,
        content: &str,
    ) -> Result<EventStream, ApiError> {
        self.next_stream(RecordedCall::SendMessage {
            session_id: session_id.to_string(),
            content: content.to_string(),
        })
    }

    async fn approve(&self, session_id: &str, approved: bool) -> Result<EventStream, ApiError> {
        self.next_stream(RecordedCall::Approve {
            session_id: session_id.to_string(),
            approved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_dir_fixture_writes_and_resolves_paths() {
        let fixture = TestTempDir::new("fixture");
        let file = fixture.write_text("nested/file.txt", "hello");
        assert_eq!(fs::read_to_string(file).unwrap(), "hello");
    }

    #[test]
    fn sse_helper_emits_expected_wire_format() {
        let block = sse_event_block("token", r#"{"content":"hi"}"#);
        assert_eq!(block, "event: token\ndata: {\"content\":\"hi\"}\n\n");
    }

    #[tokio::test]
    async fn scripted_backend_replays_streams_in_order_and_records_calls() {
        let backend = ScriptedBackend::new()
            .with_session_id("s1")
            .with_stream(StreamScript::body("abcdef", 4))
            .with_stream(StreamScript::OpenError(ApiError::Status {
                code: 409,
                body: String::new(),
            }));

        assert_eq!(backend.create_session().await.unwrap(), "s1");
        let chunks = backend
            .send_message("s1", "hi")
            .await
            .unwrap()
            .map(|chunk| chunk.unwrap())
            .collect::<Vec<_>>()
            .await;
        assert_eq!(chunks, vec![b"abcd".to_vec(), b"ef".to_vec()]);

        let err = backend.approve("s1", true).await.err().expect("open error");
        assert_eq!(err.status_code(), Some(409));
        assert!(backend.fetch_transcript("nope").await.unwrap_err().is_not_found());
        assert_eq!(
            backend.calls(),
            vec![
                RecordedCall::CreateSession,
                RecordedCall::SendMessage {
                    session_id: "s1".into(),
                    content: "hi".into()
                },
                RecordedCall::Approve {
                    session_id: "s1".into(),
                    approved: true
                },
                RecordedCall::FetchTranscript("nope".into()),
            ]
        );
    }
}
