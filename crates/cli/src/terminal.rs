//! Line-oriented console I/O for the chat loop.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};

/// Prefix for system and authorization notices.
pub const SYSTEM_MARKER: &str = "⚙️: ";
/// Prefix for agent messages.
pub const AGENT_MARKER: &str = "🤖: ";
/// Input prompt.
pub const PROMPT: &str = "> ";

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Operator console.
#[async_trait]
pub trait Terminal: Send {
    /// Shows `prompt` and reads one line without its line ending.
    /// `Ok(None)` means the input is closed.
    async fn read_line(&mut self, prompt: &str) -> std::io::Result<Option<String>>;
    /// Writes one line.
    async fn write_line(&mut self, line: &str) -> std::io::Result<()>;
}

/// Terminal on the process's stdin and stdout.
pub struct StdTerminal {
    lines: Lines<BufReader<Stdin>>,
    stdout: Stdout,
}

impl StdTerminal {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            stdout: tokio::io::stdout(),
        }
    }
}

impl Default for StdTerminal {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Terminal for StdTerminal {
    async fn read_line(&mut self, prompt: &str) -> std::io::Result<Option<String>> {
        self.stdout.write_all(prompt.as_bytes()).await?;
        self.stdout.flush().await?;
        self.lines.next_line().await
    }

    async fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.stdout.write_all(line.as_bytes()).await?;
        self.stdout.write_all(b"\n").await?;
        self.stdout.flush().await
    }
}

/// Asks a yes/no question until it gets an answer. Closed input or a read
/// error counts as "no".
pub async fn confirm(terminal: &mut dyn Terminal, question: &str) -> bool {
    let prompt = format!("{question} (y/n) ");
    loop {
        match terminal.read_line(&prompt).await {
            Ok(Some(answer)) => match parse_answer(&answer) {
                Some(answer) => return answer,
                None => {
                    if terminal
                        .write_line("Please answer 'y' or 'n'.")
                        .await
                        .is_err()
                    {
                        return false;
                    }
                }
            },
            Ok(None) | Err(_) => return false,
        }
    }
}

fn parse_answer(answer: &str) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Returns true when the line ends the chat loop.
pub fn is_exit_command(line: &str) -> bool {
    line.eq_ignore_ascii_case("exit")
}

pub fn system_line(text: &str) -> String {
    format!("{SYSTEM_MARKER}{text}")
}

pub fn agent_line(text: &str) -> String {
    format!("{AGENT_MARKER}{text}")
}

pub fn green(text: &str) -> String {
    format!("{GREEN}{text}{RESET}")
}

pub fn red(text: &str) -> String {
    format!("{RED}{text}{RESET}")
}
