//! Aigent: a terminal client for a streaming shopping-assistant chat server.
//!
//! The server runs the agent; this crate consumes its server-sent event
//! stream, folds events into a local transcript, pauses for human approval
//! when the agent asks for it, and keeps the session id on disk so a
//! conversation survives restarts.
//!
//! # Quick start
//!
//! ```no_run
//! use aigent::api::ApiClient;
//! use aigent::chat::ChatSession;
//! use aigent::config::load_config;
//! use aigent::session::SessionStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config(None)?;
//! let client = ApiClient::new(&config.api, &config.network);
//! let store = SessionStore::open(&config.session.state_dir);
//! let mut chat = ChatSession::start(client, store).await;
//! chat.send_message("find me noise-cancelling headphones").await?;
//! for message in chat.transcript().messages() {
//!     println!("{:?}: {}", message.role, message.content);
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod approval;
pub mod chat;
pub mod config;
pub mod error;
pub mod render;
pub mod session;
#[cfg(test)]
pub mod testsupport;
pub mod transcript;
pub mod types;
