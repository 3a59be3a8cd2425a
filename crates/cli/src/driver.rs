//! Interactive chat loop: reads operator input, streams agent updates, and
//! resumes paused turns with the operator's decisions.

use std::sync::Arc;

use agent::{AgentRuntime, AgentUpdate, UpdateStream};
use async_trait::async_trait;
use proto::{Interrupt, Resume, SessionConfig, TurnInput};
use tracing::{debug, error};

use crate::resolver::InterruptResolver;
use crate::terminal::{PROMPT, Terminal, agent_line, green, is_exit_command, red, system_line};

const WELCOME: &str = "Welcome to the chatbot! Type 'exit' to quit.";
const FAREWELL: &str = "👋 Bye...";

/// Something that runs agent turns.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    /// Starts one streaming pass for `input` on the session's thread.
    async fn submit(
        &self,
        input: TurnInput,
        session: &SessionConfig,
    ) -> Result<UpdateStream, proto::Error>;
}

#[async_trait]
impl AgentRunner for Arc<AgentRuntime> {
    async fn submit(
        &self,
        input: TurnInput,
        session: &SessionConfig,
    ) -> Result<UpdateStream, proto::Error> {
        Ok(self.stream(input, session))
    }
}

enum TurnState {
    Start(TurnInput),
    Streaming(UpdateStream),
    Decide(Vec<Interrupt>),
    Done,
}

/// Runs the chat loop until the operator exits or input closes.
pub async fn run_chat(
    runner: &dyn AgentRunner,
    resolver: &InterruptResolver,
    terminal: &mut dyn Terminal,
    session: &SessionConfig,
) -> anyhow::Result<()> {
    terminal.write_line(&green(WELCOME)).await?;

    while let Some(line) = terminal.read_line(PROMPT).await? {
        if is_exit_command(&line) {
            break;
        }
        if let Err(e) = run_turn(runner, resolver, terminal, session, &line).await {
            error!(thread = %session.thread_id, error = %e, "Turn failed");
            terminal
                .write_line(&system_line(&format!("Error: {e}")))
                .await?;
        }
    }

    terminal.write_line(&red(FAREWELL)).await?;
    Ok(())
}

/// Drives one user turn through as many resume passes as it takes.
async fn run_turn(
    runner: &dyn AgentRunner,
    resolver: &InterruptResolver,
    terminal: &mut dyn Terminal,
    session: &SessionConfig,
    line: &str,
) -> anyhow::Result<()> {
    let mut state = TurnState::Start(TurnInput::user(line));

    loop {
        state = match state {
            TurnState::Start(input) => TurnState::Streaming(runner.submit(input, session).await?),
            TurnState::Streaming(mut stream) => {
                let mut interrupts = Vec::new();
                while let Some(update) = stream.recv().await {
                    match update? {
                        AgentUpdate::Node { node, messages } => {
                            debug!(node, count = messages.len(), "Update received");
                            for message in messages {
                                terminal
                                    .write_line(&agent_line(&message.to_formatted_string()))
                                    .await?;
                            }
                        }
                        AgentUpdate::Interrupt(batch) => interrupts.extend(batch),
                    }
                }
                TurnState::Decide(interrupts)
            }
            TurnState::Decide(interrupts) if interrupts.is_empty() => TurnState::Done,
            TurnState::Decide(interrupts) => {
                let mut decisions = Vec::with_capacity(interrupts.len());
                for interrupt in &interrupts {
                    decisions.push(resolver.resolve(interrupt, terminal).await);
                }
                TurnState::Start(TurnInput::Resume(Resume::from_decisions(decisions)))
            }
            TurnState::Done => return Ok(()),
        };
    }
}
