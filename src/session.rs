//! Session identity: creation, durable persistence, and rehydration.
//!
//! The only durable client state is the current session id, stored in a
//! single key file under the configured state directory (`.aigent/` by
//! default). Everything else is rebuilt from the server on startup.

use crate::api::{ChatBackend, TranscriptPayload};
use crate::error::{ApiError, StorageError};
use crate::transcript::Transcript;
use crate::types::{generate_message_id, ChatMessage, Role};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// File name of the durable session key inside the state directory.
const SESSION_KEY_FILE: &str = "session_id";

/// Filesystem-backed durable key holding the current session id.
#[derive(Debug, Clone)]
pub struct SessionKeyFile {
    path: PathBuf,
}

impl SessionKeyFile {
    /// Key file under `state_dir`; the directory is created on first save.
    pub fn in_dir(state_dir: impl AsRef<Path>) -> Self {
        Self {
            path: state_dir.as_ref().join(SESSION_KEY_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored id; a missing or blank file means "no session".
    pub fn load(&self) -> Result<Option<String>, StorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let id = raw.trim();
        if id.is_empty() {
            return Ok(None);
        }
        validate_session_id(id)?;
        Ok(Some(id.to_string()))
    }

    /// Persist `session_id`, replacing any previous value atomically.
    pub fn save(&self, session_id: &str) -> Result<(), StorageError> {
        validate_session_id(session_id)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write to a sibling temporary file first so a crash mid-write never
        // leaves a truncated id behind.
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, session_id)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Remove the stored id; removing an absent key is not an error.
    pub fn remove(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Owner of the current session id and its durable copy.
///
/// Lifecycle hooks: [`init`](Self::init) on startup, [`ensure`](Self::ensure)
/// before the first send, [`clear`](Self::clear) to forget the session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    key_file: SessionKeyFile,
    session_id: Option<String>,
}

impl SessionStore {
    pub fn new(key_file: SessionKeyFile) -> Self {
        Self {
            key_file,
            session_id: None,
        }
    }

    /// Store keyed under `state_dir`.
    pub fn open(state_dir: impl AsRef<Path>) -> Self {
        Self::new(SessionKeyFile::in_dir(state_dir))
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn key_file(&self) -> &SessionKeyFile {
        &self.key_file
    }

    /// Restore the previous session, if one was saved and the server still knows it.
    ///
    /// Fails open: an unreadable key, an unknown session, or any fetch error
    /// discards the stored id and yields an empty transcript.
    pub async fn init<B>(&mut self, backend: &B) -> Transcript
    where
        B: ChatBackend + ?Sized,
    {
        self.session_id = None;
        let stored = match self.key_file.load() {
            Ok(Some(id)) => id,
            Ok(None) => return Transcript::new(),
            Err(err) => {
                tracing::warn!(error = %err, "discarding unreadable session key");
                self.forget_key();
                return Transcript::new();
            }
        };

        match backend.fetch_transcript(&stored).await {
            Ok(payload) => {
                let messages = rehydrate(payload);
                tracing::info!(session_id = %stored, messages = messages.len(), "rehydrated session");
                self.session_id = Some(stored);
                Transcript::from_messages(messages)
            }
            Err(err) => {
                if err.is_not_found() {
                    tracing::warn!(session_id = %stored, "stored session no longer exists; starting fresh");
                } else {
                    tracing::warn!(session_id = %stored, error = %err, "failed to rehydrate session; starting fresh");
                }
                self.forget_key();
                Transcript::new()
            }
        }
    }

    /// Return the current session id, creating one on the server if needed.
    ///
    /// A new id is persisted before any turn runs so a restart mid-turn can
    /// still rehydrate. A failed write is logged; the in-memory id stays usable.
    pub async fn ensure<B>(&mut self, backend: &B) -> Result<String, ApiError>
    where
        B: ChatBackend + ?Sized,
    {
        if let Some(id) = &self.session_id {
            return Ok(id.clone());
        }
        let id = backend.create_session().await?;
        if let Err(err) = self.key_file.save(&id) {
            tracing::warn!(
                session_id = %id,
                path = %self.key_file.path().display(),
                error = %err,
                "failed to persist session id"
            );
        }
        self.session_id = Some(id.clone());
        Ok(id)
    }

    /// Forget the session locally. No server request is made.
    pub fn clear(&mut self) {
        self.session_id = None;
        self.forget_key();
    }

    fn forget_key(&self) {
        if let Err(err) = self.key_file.remove() {
            tracing::warn!(
                path = %self.key_file.path().display(),
                error = %err,
                "failed to remove session key"
            );
        }
    }
}

/// Rebuild local messages from a stored transcript.
///
/// Messages without an id get a fresh one. A payload-level receipt belongs to
/// the latest assistant message.
pub fn rehydrate(payload: TranscriptPayload) -> Vec<ChatMessage> {
    let mut messages = payload
        .messages
        .into_iter()
        .map(|stored| ChatMessage {
            id: stored
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(generate_message_id),
            role: stored.role,
            content: stored.content,
            tool_calls: stored.tool_calls,
            receipt: None,
            is_streaming: false,
            is_approval_required: false,
        })
        .collect::<Vec<_>>();

    if let Some(receipt) = payload.receipt {
        match messages.iter_mut().rev().find(|m| m.role == Role::Assistant) {
            Some(message) => message.receipt = Some(receipt),
            None => tracing::debug!("receipt without an assistant message; dropped"),
        }
    }
    messages
}

/// Check that `session_id` survives a round trip through the key file.
///
/// Ids are opaque to the client; only values the line-oriented file cannot
/// hold back verbatim are refused.
fn validate_session_id(session_id: &str) -> Result<(), StorageError> {
    if session_id.trim().is_empty() {
        return Err(StorageError::InvalidSessionId(
            "session id cannot be empty".to_string(),
        ));
    }
    if session_id.trim() != session_id {
        return Err(StorageError::InvalidSessionId(format!(
            "`{session_id}` has surrounding whitespace"
        )));
    }
    if session_id.chars().any(char::is_control) {
        return Err(StorageError::InvalidSessionId(format!(
            "{session_id:?} contains control characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::StoredMessage;
    use crate::testsupport::{RecordedCall, ScriptedBackend, TestTempDir};
    use crate::types::{Receipt, TurnStatus};

    fn stored(role: Role, content: &str, id: Option<&str>) -> StoredMessage {
        StoredMessage {
            id: id.map(str::to_string),
            role,
            content: content.to_string(),
            tool_calls: None,
        }
    }

    #[test]
    fn key_file_round_trips_and_overwrites() {
        let dir = TestTempDir::new("key-file");
        let key = SessionKeyFile::in_dir(dir.child("state"));
        assert_eq!(key.load().expect("load"), None);
        key.save("abc-123").expect("save");
        key.save("def_456").expect("overwrite");
        assert_eq!(key.load().expect("load").as_deref(), Some("def_456"));
        assert!(!key.path().with_extension("tmp").exists());
        key.remove().expect("remove");
        key.remove().expect("remove twice");
        assert_eq!(key.load().expect("load"), None);
    }

    #[test]
    fn key_file_keeps_opaque_ids_verbatim() {
        let dir = TestTempDir::new("key-opaque");
        let key = SessionKeyFile::in_dir(dir.path());
        for id in ["sess:42", "q1+w/Z9==", "a b", "../not-a-path"] {
            key.save(id).expect("save");
            assert_eq!(key.load().expect("load").as_deref(), Some(id));
        }
    }

    #[test]
    fn key_file_rejects_ids_it_cannot_round_trip() {
        let dir = TestTempDir::new("key-unsafe");
        let key = SessionKeyFile::in_dir(dir.path());
        let err = key.save("two\nlines").expect_err("must fail");
        assert!(err.to_string().contains("invalid session id"));
        assert!(key.save("  ").is_err());
        assert!(key.save(" padded").is_err());
        assert!(!key.path().exists());

        dir.write_text(SESSION_KEY_FILE, "bad\u{7}id\n");
        assert!(matches!(
            key.load(),
            Err(StorageError::InvalidSessionId(_))
        ));
    }

    #[test]
    fn rehydrate_assigns_ids_and_attaches_receipt_to_last_assistant() {
        let messages = rehydrate(TranscriptPayload {
            messages: vec![
                stored(Role::User, "find headphones", None),
                stored(Role::Assistant, "Here are options", Some("a1")),
                stored(Role::User, "thanks", Some("")),
            ],
            receipt: Some(Receipt::new("Sony WH-1000XM4", 248.0, "USD")),
        });
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].id.len(), 8);
        assert_eq!(messages[1].id, "a1");
        assert!(!messages[2].id.is_empty());
        assert!(messages[1].receipt.is_some());
        assert!(messages[0].receipt.is_none() && messages[2].receipt.is_none());
        assert!(messages.iter().all(|m| !m.is_streaming && !m.is_approval_required));
    }

    #[tokio::test]
    async fn init_without_stored_key_starts_empty_without_server_calls() {
        let dir = TestTempDir::new("init-empty");
        let backend = ScriptedBackend::new();
        let mut store = SessionStore::open(dir.path());
        let transcript = store.init(&backend).await;
        assert!(transcript.is_empty());
        assert_eq!(store.session_id(), None);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn init_rehydrates_known_session() {
        let dir = TestTempDir::new("init-known");
        dir.write_text(SESSION_KEY_FILE, "s-42\n");
        let backend = ScriptedBackend::new().with_transcript(
            "s-42",
            TranscriptPayload {
                messages: vec![
                    stored(Role::User, "hi", Some("u1")),
                    stored(Role::Assistant, "hello", Some("a1")),
                ],
                receipt: None,
            },
        );
        let mut store = SessionStore::open(dir.path());
        let transcript = store.init(&backend).await;
        assert_eq!(store.session_id(), Some("s-42"));
        assert_eq!(transcript.messages().len(), 2);
        assert_eq!(transcript.status(), TurnStatus::Idle);
        assert_eq!(
            backend.calls(),
            vec![RecordedCall::FetchTranscript("s-42".into())]
        );
    }

    #[tokio::test]
    async fn init_fails_open_on_unknown_session() {
        let dir = TestTempDir::new("init-stale");
        dir.write_text(SESSION_KEY_FILE, "gone");
        let backend = ScriptedBackend::new();
        let mut store = SessionStore::open(dir.path());
        let transcript = store.init(&backend).await;
        assert!(transcript.is_empty());
        assert_eq!(store.session_id(), None);
        assert_eq!(store.key_file().load().expect("load"), None);
    }

    #[tokio::test]
    async fn init_discards_corrupt_key_without_fetching() {
        let dir = TestTempDir::new("init-corrupt");
        dir.write_text(SESSION_KEY_FILE, "bad\u{0}id");
        let backend = ScriptedBackend::new();
        let mut store = SessionStore::open(dir.path());
        assert!(store.init(&backend).await.is_empty());
        assert!(backend.calls().is_empty());
        assert!(!store.key_file().path().exists());
    }

    #[tokio::test]
    async fn ids_with_punctuation_persist_and_rehydrate() {
        let dir = TestTempDir::new("opaque-id");
        let backend = ScriptedBackend::new()
            .with_session_id("sess:42")
            .with_transcript(
                "sess:42",
                TranscriptPayload {
                    messages: vec![stored(Role::User, "hi", Some("u1"))],
                    receipt: None,
                },
            );
        let mut store = SessionStore::open(dir.path());
        assert_eq!(store.ensure(&backend).await.expect("create"), "sess:42");
        assert_eq!(
            store.key_file().load().expect("load").as_deref(),
            Some("sess:42")
        );

        let mut restarted = SessionStore::open(dir.path());
        let transcript = restarted.init(&backend).await;
        assert_eq!(restarted.session_id(), Some("sess:42"));
        assert_eq!(transcript.messages().len(), 1);
    }

    #[tokio::test]
    async fn ensure_creates_once_and_persists_immediately() {
        let dir = TestTempDir::new("ensure");
        let backend = ScriptedBackend::new().with_session_id("fresh-1");
        let mut store = SessionStore::open(dir.path());

        assert_eq!(store.ensure(&backend).await.expect("create"), "fresh-1");
        assert_eq!(store.key_file().load().expect("load").as_deref(), Some("fresh-1"));
        assert_eq!(store.ensure(&backend).await.expect("reuse"), "fresh-1");
        assert_eq!(backend.calls(), vec![RecordedCall::CreateSession]);

        store.clear();
        assert_eq!(store.session_id(), None);
        assert_eq!(store.key_file().load().expect("load"), None);
    }

    #[tokio::test]
    async fn ensure_propagates_creation_failure() {
        let dir = TestTempDir::new("ensure-fail");
        let backend = ScriptedBackend::new().with_create_error(ApiError::Status {
            code: 503,
            body: "down".into(),
        });
        let mut store = SessionStore::open(dir.path());
        let err = store.ensure(&backend).await.expect_err("must fail");
        assert_eq!(err.status_code(), Some(503));
        assert_eq!(store.session_id(), None);
        assert!(!store.key_file().path().exists());
    }
}
