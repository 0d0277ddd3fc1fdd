//! Terminal output for the chat CLI.
//!
//! Assistant text streams to stdout; everything else (tool activity,
//! approvals, receipts, diagnostics) goes to stderr so stdout stays pipeable.

use crate::api::StreamEvent;
use crate::types::{Receipt, ToolCall};
use crossterm::style::{Color, Stylize};
use serde_json::{Map, Value};
use std::cell::Cell;
use std::io::{self, Write};

const INDENT: &str = "  ";
const GLYPH_TOOL_CALL: &str = "→";
const GLYPH_TOOL_RESULT: &str = "←";
const GLYPH_RECEIPT: &str = "✓";
const PROMPT_SYMBOL: &str = "›";

/// Terminal renderer; `color` toggles ANSI styling.
#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    /// Streamed assistant text is on stdout without its closing newline.
    assistant_open: Cell<bool>,
}

impl Renderer {
    pub fn new(color: bool) -> Self {
        Self {
            color,
            assistant_open: Cell::new(false),
        }
    }

    /// Print the input prompt (to stderr).
    pub fn prompt(&self) {
        if self.color {
            eprint!("{} ", PROMPT_SYMBOL.with(Color::Cyan).bold());
        } else {
            eprint!("> ");
        }
        let _ = io::stderr().flush();
    }

    /// Render one stream event as it arrives.
    pub fn event(&self, event: &StreamEvent, show_tool_calls: bool) {
        match event {
            StreamEvent::Token { content } => self.token(content),
            StreamEvent::ToolCall(call) if show_tool_calls => {
                self.end_assistant();
                self.tool_call(&call.name, &args_preview(&call.args));
            }
            StreamEvent::ToolResult { name, result } if show_tool_calls => {
                self.end_assistant();
                self.tool_result(name, result);
            }
            StreamEvent::ToolCall(_) | StreamEvent::ToolResult { .. } => {}
            StreamEvent::ApprovalRequired { tool_calls } => {
                self.end_assistant();
                self.approval(tool_calls);
            }
            StreamEvent::Receipt(receipt) => {
                self.end_assistant();
                self.receipt(receipt);
            }
            StreamEvent::Done => {
                self.end_assistant();
            }
            StreamEvent::Error { message } => {
                self.end_assistant();
                self.error(message);
            }
        }
    }

    /// Append streamed assistant text to stdout.
    pub fn token(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut out = io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
        self.assistant_open.set(true);
    }

    /// Close the streamed assistant line, if one is open.
    ///
    /// Returns whether a newline was written.
    pub fn end_assistant(&self) -> bool {
        if !self.assistant_open.replace(false) {
            return false;
        }
        println!();
        true
    }

    pub fn tool_call(&self, name: &str, args: &str) {
        let preview = truncate_single_line(args, 80);
        if self.color {
            eprintln!(
                "\r{INDENT}{} {}({})",
                GLYPH_TOOL_CALL.with(Color::DarkCyan),
                name.with(Color::Cyan).bold(),
                preview.with(Color::DarkGrey),
            );
        } else {
            eprintln!("\r{INDENT}{GLYPH_TOOL_CALL} {name}({preview})");
        }
    }

    pub fn tool_result(&self, name: &str, result: &str) {
        let preview = truncate_single_line(result, 120);
        if self.color {
            eprintln!(
                "\r{INDENT}{} {}: {}",
                GLYPH_TOOL_RESULT.with(Color::DarkGreen),
                name.with(Color::Green),
                preview.with(Color::DarkGrey),
            );
        } else {
            eprintln!("\r{INDENT}{GLYPH_TOOL_RESULT} {name}: {preview}");
        }
    }

    /// Show the calls awaiting a decision and how to answer.
    pub fn approval(&self, tool_calls: &[ToolCall]) {
        let header = "approval required";
        if self.color {
            eprintln!("\r{}", header.with(Color::Yellow).bold());
        } else {
            eprintln!("\r{header}");
        }
        for call in tool_calls {
            self.tool_call(&call.name, &args_preview(&call.args));
        }
        self.detail("answer with /approve or /deny");
    }

    pub fn receipt(&self, receipt: &Receipt) {
        let lines = receipt_lines(receipt);
        let Some((title, rest)) = lines.split_first() else {
            return;
        };
        if self.color {
            eprintln!(
                "\r{} {}",
                GLYPH_RECEIPT.with(Color::Green).bold(),
                title.as_str().bold()
            );
        } else {
            eprintln!("\r{GLYPH_RECEIPT} {title}");
        }
        for line in rest {
            self.detail(line);
        }
    }

    /// Print one key/value row (to stderr).
    pub fn field(&self, key: &str, value: &str) {
        if self.color {
            eprintln!(
                "\r{INDENT}{} {}",
                format!("{key}:").with(Color::DarkGrey),
                value.with(Color::White),
            );
        } else {
            eprintln!("\r{INDENT}{key}: {value}");
        }
    }

    pub fn detail(&self, text: &str) {
        if self.color {
            eprintln!("\r{INDENT}{}", text.with(Color::DarkGrey));
        } else {
            eprintln!("\r{INDENT}{text}");
        }
    }

    pub fn warn(&self, msg: &str) {
        if self.color {
            eprintln!("\r{} {msg}", "warning:".with(Color::Yellow).bold());
        } else {
            eprintln!("\rwarning: {msg}");
        }
    }

    pub fn error(&self, msg: &str) {
        if self.color {
            eprintln!("\r{} {msg}", "error:".with(Color::Red).bold());
        } else {
            eprintln!("\rerror: {msg}");
        }
    }
}

/// Compact one-line rendering of tool arguments.
pub fn args_preview(args: &Map<String, Value>) -> String {
    args.iter()
        .map(|(key, value)| match value {
            Value::String(s) => format!("{key}={s:?}"),
            other => format!("{key}={other}"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Plain-text lines describing a receipt, title first.
pub fn receipt_lines(receipt: &Receipt) -> Vec<String> {
    let mut lines = vec![format!(
        "{} {:.2} {}",
        receipt.product_name, receipt.price, receipt.currency
    )];
    if let Some(rating) = receipt.average_rating {
        lines.push(format!("rating: {rating:.1}/5"));
    }
    if let Some(range) = &receipt.price_range {
        lines.push(format!("price range: {range}"));
    }
    if let Some(reason) = &receipt.recommendation_reason {
        lines.push(format!("why: {reason}"));
    }
    for product in receipt.comparison_products.iter().flatten() {
        let mut line = format!(
            "vs {} {:.2} {}",
            product.product_name, product.price, product.currency
        );
        if !product.pros.is_empty() {
            line.push_str(&format!(" (+ {})", product.pros.join("; ")));
        }
        if !product.cons.is_empty() {
            line.push_str(&format!(" (- {})", product.cons.join("; ")));
        }
        lines.push(line);
    }
    if let Some(summary) = &receipt.comparison_summary {
        lines.push(summary.clone());
    }
    lines
}

/// Flatten newlines and clip to `max_chars` characters.
fn truncate_single_line(s: &str, max_chars: usize) -> String {
    let flat: String = s.chars().map(|c| if c == '\n' { ' ' } else { c }).collect();
    match flat.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}
