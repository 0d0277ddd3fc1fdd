//! Turn orchestration: one session, one open stream at a time.
//!
//! [`ChatSession`] owns the transcript, the session store, and the backend.
//! Each turn runs the pipeline byte chunks -> frames -> events -> reducer
//! until the first terminal event. Nothing here renders; observers subscribe
//! to [`SessionUpdate`]s instead.

use crate::api::{dispatch, ChatBackend, EventStream, Frame, FrameDecoder, StreamEvent};
use crate::approval::{self, ApprovalDecision};
use crate::error::{ApiError, ChatError};
use crate::session::SessionStore;
use crate::transcript::Transcript;
use crate::types::{ChatMessage, TurnStatus};
use futures_util::StreamExt;
use tokio::sync::mpsc;

/// How a send or approval request was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Nothing to do: blank input, or no session to approve against.
    Skipped,
    /// Refused because a turn is already in this state. No state changed.
    Rejected(TurnStatus),
    /// The stream ended; the turn settled in this status.
    Finished(TurnStatus),
}

/// Progress notifications for whatever presents the conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    TurnStarted {
        message_id: String,
    },
    /// One event, already folded into the transcript.
    Event {
        message_id: String,
        event: StreamEvent,
    },
    TurnFinished {
        message_id: String,
        status: TurnStatus,
        /// Transport or protocol failure that ended the turn, if any.
        error: Option<String>,
    },
}

/// A chat session bound to one backend.
pub struct ChatSession<B: ChatBackend> {
    backend: B,
    store: SessionStore,
    transcript: Transcript,
    updates: Option<mpsc::UnboundedSender<SessionUpdate>>,
}

impl<B: ChatBackend> ChatSession<B> {
    /// Session with an empty transcript and no rehydration attempt.
    pub fn new(backend: B, store: SessionStore) -> Self {
        Self {
            backend,
            store,
            transcript: Transcript::new(),
            updates: None,
        }
    }

    /// Session restored from the previously persisted id, if the server still has it.
    pub async fn start(backend: B, mut store: SessionStore) -> Self {
        let transcript = store.init(&backend).await;
        Self {
            backend,
            store,
            transcript,
            updates: None,
        }
    }

    /// Receive [`SessionUpdate`]s for every subsequent turn.
    ///
    /// A newer subscription replaces the previous one.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.updates = Some(tx);
        rx
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn status(&self) -> TurnStatus {
        self.transcript.status()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.store.session_id()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Send user text and stream the reply into the transcript.
    ///
    /// Blank input is skipped. Input is rejected while a stream is open or an
    /// approval is outstanding. Failing to create the session returns the
    /// error with no transcript change; once the turn has started, failures
    /// end it in [`TurnStatus::Error`] and are also returned.
    pub async fn send_message(&mut self, content: &str) -> Result<TurnOutcome, ChatError> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(TurnOutcome::Skipped);
        }
        let status = self.status();
        if !status.accepts_input() {
            tracing::debug!(status = status.as_str(), "send rejected; turn in progress");
            return Ok(TurnOutcome::Rejected(status));
        }

        let session_id = self.store.ensure(&self.backend).await?;
        let message_id = self
            .transcript
            .begin_turn(Some(ChatMessage::user(content)));
        tracing::info!(session_id = %session_id, message_id = %message_id, "turn started");
        self.notify(SessionUpdate::TurnStarted {
            message_id: message_id.clone(),
        });

        let opened = self.backend.send_message(&session_id, content).await;
        self.drive(message_id, opened).await
    }

    /// Answer a pending approval and stream the resumed turn.
    ///
    /// Skipped when there is no session. Rejected only while a stream is open.
    pub async fn approve_tool_call(&mut self, approved: bool) -> Result<TurnOutcome, ChatError> {
        let Some(session_id) = self.store.session_id().map(str::to_string) else {
            tracing::debug!("approval skipped; no session");
            return Ok(TurnOutcome::Skipped);
        };
        let status = self.status();
        if !approval::accepts_decision(status) {
            tracing::debug!(status = status.as_str(), "approval rejected; stream open");
            return Ok(TurnOutcome::Rejected(status));
        }

        let decision = ApprovalDecision::from(approved);
        let message_id = approval::resume(&mut self.transcript, decision);
        tracing::info!(
            session_id = %session_id,
            message_id = %message_id,
            decision = decision.as_str(),
            "resuming turn"
        );
        self.notify(SessionUpdate::TurnStarted {
            message_id: message_id.clone(),
        });

        let opened = self.backend.approve(&session_id, decision.approved()).await;
        self.drive(message_id, opened).await
    }

    /// Forget the session and start over with a blank transcript.
    pub fn clear_session(&mut self) {
        self.store.clear();
        self.transcript.clear();
        tracing::info!("session cleared");
    }

    async fn drive(
        &mut self,
        message_id: String,
        opened: Result<EventStream, ApiError>,
    ) -> Result<TurnOutcome, ChatError> {
        let result = match opened {
            Ok(stream) => self.pump(&message_id, stream).await,
            Err(err) => Err(err.into()),
        };
        match result {
            Ok(()) => {
                let status = self.status();
                tracing::info!(message_id = %message_id, status = status.as_str(), "turn finished");
                self.notify(SessionUpdate::TurnFinished {
                    message_id,
                    status,
                    error: None,
                });
                Ok(TurnOutcome::Finished(status))
            }
            Err(err) => {
                let reason = err.to_string();
                tracing::warn!(message_id = %message_id, error = %reason, "turn failed");
                self.transcript.fail_turn(reason.clone());
                let status = self.status();
                self.notify(SessionUpdate::TurnFinished {
                    message_id,
                    status,
                    error: Some(reason),
                });
                Err(err)
            }
        }
    }

    /// Feed the stream through the decoder until the first terminal event.
    async fn pump(&mut self, message_id: &str, mut stream: EventStream) -> Result<(), ChatError> {
        let mut decoder = FrameDecoder::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            for frame in decoder.feed(&chunk) {
                if self.apply_frame(message_id, &frame)? {
                    return Ok(());
                }
            }
        }
        for frame in decoder.finish() {
            if self.apply_frame(message_id, &frame)? {
                return Ok(());
            }
        }
        Err(ChatError::StreamClosed)
    }

    /// Dispatch and apply one frame; returns true when the turn is over.
    fn apply_frame(&mut self, message_id: &str, frame: &Frame) -> Result<bool, ChatError> {
        let Some(event) = dispatch(frame)? else {
            return Ok(false);
        };
        self.transcript.apply(&event);
        let terminal = event.is_terminal();
        self.notify(SessionUpdate::Event {
            message_id: message_id.to_string(),
            event,
        });
        Ok(terminal)
    }

    fn notify(&mut self, update: SessionUpdate) {
        let closed = match &self.updates {
            Some(tx) => tx.send(update).is_err(),
            None => false,
        };
        if closed {
            tracing::debug!("update receiver dropped; unsubscribing");
            self.updates = None;
        }
    }
}
