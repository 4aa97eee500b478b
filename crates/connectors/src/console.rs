//! Operator console — reads commands from stdin.
//!
//! `say <text>` chats, `pos` prints the position, `quit` leaves. Anything
//! else is sent to chat verbatim.

use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Say(String),
    Pos,
    Quit,
    /// Unrecognized input, relayed to chat as typed.
    Chat(String),
}

impl ConsoleCommand {
    /// Parse one console line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let (head, rest) = match line.split_once(' ') {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };

        let command = match head.to_lowercase().as_str() {
            "say" => ConsoleCommand::Say(rest.to_string()),
            "pos" => ConsoleCommand::Pos,
            "quit" | "exit" => ConsoleCommand::Quit,
            _ => ConsoleCommand::Chat(line.to_string()),
        };
        Some(command)
    }
}

/// Stdin reader producing [`ConsoleCommand`]s.
pub struct ConsoleInput;

impl ConsoleInput {
    /// Spawn the reader. The channel closes on EOF or after `quit`.
    pub fn start() -> mpsc::Receiver<ConsoleCommand> {
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let mut lines = BufReader::new(io::stdin()).lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Some(command) = ConsoleCommand::parse(&line) else {
                            continue;
                        };
                        let quit = command == ConsoleCommand::Quit;
                        if tx.send(command).await.is_err() || quit {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF (Ctrl+D)
                    Err(e) => {
                        tracing::warn!(error = %e, "Console read failed");
                        break;
                    }
                }
            }
        });

        rx
    }
}
