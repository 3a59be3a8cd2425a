//! Runtime orchestration loop for conversation, tools, and checkpoints.
//!
//! A turn is submitted with [`AgentRuntime::stream`] and runs on its own task.
//! It ends either with a final assistant message or paused on interrupts; a
//! paused turn is continued by submitting a [`TurnInput::Resume`] for the same
//! thread.

use std::sync::Arc;

use proto::{
    AgentError, Decision, Interrupt, InterruptKind, LlmError, SessionConfig, ThreadId, ToolResult,
    TurnInput,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    checkpoint::{Checkpoint, Checkpointer, PendingBatch, PendingCall},
    llm::{ChatMessage, ChatRequest, ChatResponse, LlmProvider, TokenUsage},
    tool_registry::{Gate, ToolRegistry},
};

/// Default bound on model rounds that request tools within one turn.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 25;
/// Update node name for model output.
pub const MODEL_NODE: &str = "model";
/// Update node name for tool results.
pub const TOOLS_NODE: &str = "tools";

const UPDATE_BUFFER: usize = 32;
const NOT_AUTHORIZED: &str = "Tool call was not authorized by the user.";
const NOT_EXECUTED: &str = "Tool call was not executed: the user sent a new message instead.";

/// One streamed update of a running turn.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentUpdate {
    /// Messages produced by one step of the turn.
    Node {
        node: &'static str,
        messages: Vec<ChatMessage>,
    },
    /// The turn paused; each interrupt needs one decision.
    Interrupt(Vec<Interrupt>),
}

/// Receiving end of a turn's updates. Closes when the turn pauses or completes.
pub type UpdateStream = mpsc::Receiver<Result<AgentUpdate, proto::Error>>;

/// Static settings of a runtime.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub system_prompt: String,
    pub model: String,
    pub max_tool_rounds: usize,
}

/// The main agent runtime: manages the ReAct loop
pub struct AgentRuntime {
    llm: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    checkpointer: Arc<dyn Checkpointer>,
    options: RuntimeOptions,
}

type UpdateSender = mpsc::Sender<Result<AgentUpdate, proto::Error>>;

impl AgentRuntime {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        checkpointer: Arc<dyn Checkpointer>,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            llm,
            tools,
            checkpointer,
            options,
        }
    }

    /// Starts one pass of a turn and returns its update stream.
    ///
    /// A failure is delivered as the last item of the stream.
    pub fn stream(self: &Arc<Self>, input: TurnInput, session: &SessionConfig) -> UpdateStream {
        let (tx, rx) = mpsc::channel(UPDATE_BUFFER);
        let runtime = Arc::clone(self);
        let thread_id = session.thread_id.clone();

        tokio::spawn(async move {
            if let Err(e) = runtime.run_turn(&thread_id, input, &tx).await {
                warn!(thread = %thread_id, error = %e, "Agent turn failed");
                let _ = tx.send(Err(e)).await;
            }
        });

        rx
    }

    /// Latest checkpoint of a thread (empty for an unknown thread).
    pub async fn checkpoint(&self, thread_id: &ThreadId) -> Result<Checkpoint, proto::Error> {
        Ok(self
            .checkpointer
            .load(thread_id)
            .await?
            .unwrap_or_default())
    }

    async fn run_turn(
        &self,
        thread_id: &ThreadId,
        input: TurnInput,
        tx: &UpdateSender,
    ) -> Result<(), proto::Error> {
        let mut checkpoint = self.checkpoint(thread_id).await?;

        match input {
            TurnInput::Message { messages } => {
                if let Some(batch) = checkpoint.pending.take() {
                    info!(
                        thread = %thread_id,
                        calls = batch.calls.len(),
                        "Abandoning paused tool calls for a new message"
                    );
                    for pending in &batch.calls {
                        checkpoint.messages.push(ChatMessage::tool_result(
                            &pending.call.id,
                            &pending.call.name,
                            NOT_EXECUTED,
                        ));
                    }
                }
                checkpoint
                    .messages
                    .extend(messages.into_iter().map(ChatMessage::from));
                self.save(thread_id, &checkpoint).await?;
            }
            TurnInput::Resume(resume) => {
                let batch = checkpoint
                    .pending
                    .clone()
                    .ok_or_else(|| AgentError::NothingToResume(thread_id.to_string()))?;
                let decisions = resume.into_decisions();
                let expected = batch.interrupt_count();
                if decisions.len() != expected {
                    return Err(AgentError::DecisionMismatch {
                        expected,
                        actual: decisions.len(),
                    }
                    .into());
                }
                debug!(thread = %thread_id, decisions = ?decisions, "Resuming paused tool calls");

                let batch = self.settle_batch(batch, decisions);
                if batch.interrupt_count() > 0 {
                    let interrupts = batch.interrupts();
                    info!(
                        thread = %thread_id,
                        interrupts = interrupts.len(),
                        "Authorized calls still need approval"
                    );
                    checkpoint.pending = Some(batch);
                    self.save(thread_id, &checkpoint).await?;
                    emit(tx, AgentUpdate::Interrupt(interrupts)).await;
                    return Ok(());
                }

                let results = self.run_batch(&batch).await;
                checkpoint.pending = None;
                checkpoint.messages.extend(results.iter().cloned());
                self.save(thread_id, &checkpoint).await?;
                emit(tx, node(TOOLS_NODE, results)).await;
            }
        }

        self.react_loop(thread_id, checkpoint, tx).await
    }

    async fn react_loop(
        &self,
        thread_id: &ThreadId,
        mut checkpoint: Checkpoint,
        tx: &UpdateSender,
    ) -> Result<(), proto::Error> {
        let tool_defs = self.tools.definitions();
        let mut round = 0;
        let mut total_usage = TokenUsage::default();

        loop {
            if round >= self.options.max_tool_rounds {
                warn!(
                    "Max tool rounds ({}) reached for thread {thread_id}",
                    self.options.max_tool_rounds
                );
                return Err(LlmError::MaxToolRoundsExceeded.into());
            }

            let mut messages = Vec::with_capacity(checkpoint.messages.len() + 1);
            messages.push(ChatMessage::system(&self.options.system_prompt));
            messages.extend(checkpoint.messages.iter().cloned());
            let req = ChatRequest {
                messages,
                tools: tool_defs.clone(),
                model: self.options.model.clone(),
            };

            debug!("LLM call (round {round}) for thread {thread_id}");
            let t0 = std::time::Instant::now();
            let response = self.llm.chat(req).await?;
            debug!(elapsed_ms = %t0.elapsed().as_millis(), round = %round, "LLM response received");

            match response {
                ChatResponse::Text(text, usage) => {
                    total_usage.add(&usage);
                    info!(
                        prompt_tokens = total_usage.prompt_tokens,
                        completion_tokens = total_usage.completion_tokens,
                        "Agent final response for thread {thread_id}: {text:.50}"
                    );
                    let assistant = ChatMessage::assistant(text);
                    checkpoint.messages.push(assistant.clone());
                    self.save(thread_id, &checkpoint).await?;
                    emit(tx, node(MODEL_NODE, vec![assistant])).await;
                    return Ok(());
                }

                ChatResponse::ToolCalls(tool_calls, usage) => {
                    total_usage.add(&usage);
                    debug!(
                        "Tool calls requested: {:?}",
                        tool_calls.iter().map(|tc| &tc.name).collect::<Vec<_>>()
                    );
                    let assistant = ChatMessage::assistant_tool_calls(tool_calls.clone());
                    checkpoint.messages.push(assistant.clone());
                    self.save(thread_id, &checkpoint).await?;
                    emit(tx, node(MODEL_NODE, vec![assistant])).await;

                    let mut batch = PendingBatch::default();
                    for call in tool_calls {
                        let mut pending = PendingCall::ready(call);
                        match self
                            .tools
                            .gate(&pending.call.name, &pending.call.arguments)
                            .await
                        {
                            Gate::Ready => {}
                            Gate::Interrupt(kind) => {
                                pending.interrupt = Some(Interrupt::new(&pending.call.id, kind));
                            }
                            Gate::Blocked(reason) => pending.blocked = Some(reason),
                        }
                        batch.calls.push(pending);
                    }

                    if batch.interrupt_count() > 0 {
                        let interrupts = batch.interrupts();
                        info!(
                            thread = %thread_id,
                            interrupts = interrupts.len(),
                            "Turn paused for interrupts"
                        );
                        checkpoint.pending = Some(batch);
                        self.save(thread_id, &checkpoint).await?;
                        emit(tx, AgentUpdate::Interrupt(interrupts)).await;
                        return Ok(());
                    }

                    let results = self.run_batch(&batch).await;
                    checkpoint.messages.extend(results.iter().cloned());
                    self.save(thread_id, &checkpoint).await?;
                    emit(tx, node(TOOLS_NODE, results)).await;
                    round += 1;
                }
            }
        }
    }

    /// Applies decisions to a paused batch, matching them to interrupts
    /// positionally. Denied calls are blocked. A call whose authorization was
    /// granted is held again when the approval policy covers it.
    fn settle_batch(&self, batch: PendingBatch, decisions: Vec<Decision>) -> PendingBatch {
        let mut decisions = decisions.into_iter();
        let calls = batch
            .calls
            .into_iter()
            .map(|mut pending| {
                let Some(interrupt) = pending.interrupt.take() else {
                    return pending;
                };
                if !decisions.next().is_some_and(|d| d.authorized) {
                    debug!(tool = %pending.call.name, call_id = %pending.call.id, "Tool call denied");
                    pending.blocked = Some(NOT_AUTHORIZED.to_string());
                    return pending;
                }
                if matches!(interrupt.kind, InterruptKind::AuthorizationRequired { .. }) {
                    pending.interrupt = self
                        .tools
                        .approval_interrupt(&pending.call.name, &pending.call.arguments)
                        .map(|kind| Interrupt::new(&pending.call.id, kind));
                }
                pending
            })
            .collect();
        PendingBatch { calls }
    }

    async fn run_batch(&self, batch: &PendingBatch) -> Vec<ChatMessage> {
        let mut results = Vec::with_capacity(batch.calls.len());
        for pending in &batch.calls {
            results.push(self.run_call(pending).await);
        }
        results
    }

    async fn run_call(&self, pending: &PendingCall) -> ChatMessage {
        let call = &pending.call;
        let result = match &pending.blocked {
            Some(reason) => ToolResult::error(&call.id, &call.name, reason.clone()),
            None => {
                self.tools
                    .execute(&call.id, &call.name, call.arguments.clone())
                    .await
            }
        };
        if result.is_error {
            debug!(tool = %call.name, output = %result.output, "Tool call failed");
        }
        to_message(result)
    }

    async fn save(&self, thread_id: &ThreadId, checkpoint: &Checkpoint) -> Result<(), proto::Error> {
        self.checkpointer.save(thread_id, checkpoint).await?;
        Ok(())
    }
}

fn node(name: &'static str, messages: Vec<ChatMessage>) -> AgentUpdate {
    AgentUpdate::Node {
        node: name,
        messages,
    }
}

fn to_message(result: ToolResult) -> ChatMessage {
    ChatMessage::tool_result(result.call_id, result.tool_name, result.output)
}

/// Sends an update; a dropped receiver only loses the display, the
/// checkpoint is already saved.
async fn emit(tx: &UpdateSender, update: AgentUpdate) {
    if tx.send(Ok(update)).await.is_err() {
        debug!("Update receiver dropped");
    }
}
