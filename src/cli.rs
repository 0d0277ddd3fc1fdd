//! CLI argument parsing via clap.

use clap::Parser;

/// Terminal client for a streaming shopping-assistant chat server.
#[derive(Debug, Parser)]
#[command(name = "aigent", version)]
pub struct Args {
    /// Message to send. If provided, runs one turn and exits.
    pub prompt: Option<String>,

    /// Path to config file (default: ./aigent.toml or ~/.config/aigent/aigent.toml).
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,

    /// Override chat API base URL.
    #[arg(long = "base-url")]
    pub base_url: Option<String>,

    /// Override the directory holding the persisted session id.
    #[arg(long = "state-dir")]
    pub state_dir: Option<String>,

    /// Forget any saved session and start a new conversation.
    #[arg(long = "new")]
    pub new: bool,

    /// Disable color output.
    #[arg(long = "no-color")]
    pub no_color: bool,
}

/// One line of interactive input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Message(String),
    Approve,
    Deny,
    Clear,
    Status,
    Help,
    Quit,
    Unknown(String),
}

/// Classify a line typed at the prompt.
pub fn parse_repl_line(line: &str) -> ReplCommand {
    let trimmed = line.trim();
    let Some(command) = trimmed.strip_prefix('/') else {
        return ReplCommand::Message(trimmed.to_string());
    };
    match command.split_whitespace().next().unwrap_or_default() {
        "approve" | "yes" | "y" => ReplCommand::Approve,
        "deny" | "no" | "n" => ReplCommand::Deny,
        "clear" | "new" => ReplCommand::Clear,
        "status" => ReplCommand::Status,
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" | "q" => ReplCommand::Quit,
        _ => ReplCommand::Unknown(trimmed.to_string()),
    }
}
