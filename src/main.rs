//! CLI entry point for aigent.

mod cli;

use aigent::api::ApiClient;
use aigent::approval::pending_approval;
use aigent::chat::{ChatSession, SessionUpdate, TurnOutcome};
use aigent::config::{apply_cli_overrides, load_config, CliOverrides, Config};
use aigent::error::ChatError;
use aigent::render::Renderer;
use aigent::session::SessionStore;
use aigent::types::TurnStatus;
use clap::Parser;
use cli::{parse_repl_line, ReplCommand};
use std::future::Future;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const REPL_HELP: &str =
    "Commands: /approve, /deny, /clear, /status, /quit. Anything else is sent as a message.";

#[tokio::main]
async fn main() {
    init_logging();
    let args = cli::Args::parse();

    // Load config.
    let mut config = match load_config(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    let overrides = CliOverrides {
        base_url: args.base_url.clone(),
        state_dir: args.state_dir.as_deref().map(PathBuf::from),
        no_color: args.no_color,
    };
    if let Err(e) = apply_cli_overrides(&mut config, &overrides) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }

    let renderer = Renderer::new(config.display.color);
    let client = ApiClient::new(&config.api, &config.network);
    let mut store = SessionStore::open(&config.session.state_dir);

    let mut chat = if args.new {
        store.clear();
        ChatSession::new(client, store)
    } else {
        ChatSession::start(client, store).await
    };
    let mut updates = chat.subscribe();

    let code = match args.prompt.as_deref() {
        Some(prompt) => run_once(&mut chat, &mut updates, &config, &renderer, prompt).await,
        None => run_repl(&mut chat, &mut updates, &config, &renderer).await,
    };
    std::process::exit(code);
}

/// Install the stderr log subscriber.
///
/// `AIGENT_LOG` wins over `RUST_LOG`; without either only warnings from this
/// crate are shown.
fn init_logging() {
    let filter = std::env::var("AIGENT_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("aigent=warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

/// Send one message, render the turn, and map the result to an exit code.
async fn run_once(
    chat: &mut ChatSession<ApiClient>,
    updates: &mut UnboundedReceiver<SessionUpdate>,
    config: &Config,
    renderer: &Renderer,
    prompt: &str,
) -> i32 {
    let result = run_turn(chat.send_message(prompt), updates, config, renderer).await;
    match result {
        Ok(TurnOutcome::Finished(TurnStatus::Error)) | Err(_) => 1,
        Ok(TurnOutcome::Finished(TurnStatus::AwaitingApproval)) => {
            renderer.detail("run `aigent` interactively to /approve or /deny");
            0
        }
        Ok(TurnOutcome::Skipped) => {
            renderer.warn("empty prompt; nothing sent");
            1
        }
        Ok(_) => 0,
    }
}

async fn run_repl(
    chat: &mut ChatSession<ApiClient>,
    updates: &mut UnboundedReceiver<SessionUpdate>,
    config: &Config,
    renderer: &Renderer,
) -> i32 {
    if let Some(id) = chat.session_id() {
        renderer.detail(&format!(
            "resumed session {id} ({} messages)",
            chat.transcript().messages().len()
        ));
    }
    renderer.detail(REPL_HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        renderer.prompt();
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                renderer.error(&format!("failed to read input: {e}"));
                return 1;
            }
        };

        let result = match parse_repl_line(&line) {
            ReplCommand::Message(text) if text.is_empty() => continue,
            ReplCommand::Message(text) => {
                run_turn(chat.send_message(&text), updates, config, renderer).await
            }
            ReplCommand::Approve => {
                run_turn(chat.approve_tool_call(true), updates, config, renderer).await
            }
            ReplCommand::Deny => {
                run_turn(chat.approve_tool_call(false), updates, config, renderer).await
            }
            ReplCommand::Clear => {
                chat.clear_session();
                renderer.detail("started a new conversation");
                continue;
            }
            ReplCommand::Status => {
                render_status(chat, renderer);
                continue;
            }
            ReplCommand::Help => {
                renderer.detail(REPL_HELP);
                continue;
            }
            ReplCommand::Quit => break,
            ReplCommand::Unknown(cmd) => {
                renderer.warn(&format!("unknown command `{cmd}`"));
                continue;
            }
        };

        match result {
            Ok(TurnOutcome::Rejected(TurnStatus::AwaitingApproval)) => {
                renderer.warn("approval pending; answer with /approve or /deny");
            }
            Ok(TurnOutcome::Rejected(status)) => {
                renderer.warn(&format!("busy ({})", status.as_str()));
            }
            Ok(TurnOutcome::Skipped) => renderer.warn("no session to approve"),
            Ok(TurnOutcome::Finished(_)) | Err(_) => {}
        }
    }
    0
}

/// Drive a turn while rendering its updates as they arrive.
async fn run_turn<F>(
    turn: F,
    updates: &mut UnboundedReceiver<SessionUpdate>,
    config: &Config,
    renderer: &Renderer,
) -> Result<TurnOutcome, ChatError>
where
    F: Future<Output = Result<TurnOutcome, ChatError>>,
{
    tokio::pin!(turn);
    let result = loop {
        tokio::select! {
            biased;
            Some(update) = updates.recv() => render_update(&update, config, renderer),
            result = &mut turn => break result,
        }
    };
    while let Ok(update) = updates.try_recv() {
        render_update(&update, config, renderer);
    }
    if let Err(e) = &result {
        renderer.error(&e.to_string());
    }
    result
}

fn render_update(update: &SessionUpdate, config: &Config, renderer: &Renderer) {
    match update {
        SessionUpdate::TurnStarted { .. } => {}
        SessionUpdate::Event { event, .. } => {
            renderer.event(event, config.display.show_tool_calls);
        }
        SessionUpdate::TurnFinished { .. } => {
            renderer.end_assistant();
        }
    }
}

fn render_status(chat: &ChatSession<ApiClient>, renderer: &Renderer) {
    let transcript = chat.transcript();
    renderer.field("server", chat.backend().base_url());
    renderer.field("session", chat.session_id().unwrap_or("none"));
    renderer.field("status", transcript.status().as_str());
    renderer.field("messages", &transcript.messages().len().to_string());
    if let Some(pending) = pending_approval(transcript) {
        renderer.field("pending approval", &pending.tool_calls.len().to_string());
    }
    if let Some(error) = transcript.last_error() {
        renderer.field("last error", error);
    }
}
