//! Per-thread conversation checkpoints.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use proto::{DatabaseError, Interrupt, ThreadId, ToolCall};
use serde::{Deserialize, Serialize};

use crate::llm::ChatMessage;

/// One tool call of a paused model round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCall {
    pub call: ToolCall,
    /// Set when the call raised an interrupt; such calls wait for a decision.
    #[serde(default)]
    pub interrupt: Option<Interrupt>,
    /// Set when the call must not run; the reason is reported to the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked: Option<String>,
}

impl PendingCall {
    pub fn ready(call: ToolCall) -> Self {
        Self {
            call,
            interrupt: None,
            blocked: None,
        }
    }
}

/// Tool calls of the model round that raised interrupts, in model order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingBatch {
    pub calls: Vec<PendingCall>,
}

impl PendingBatch {
    /// Interrupts of the batch in call order.
    pub fn interrupts(&self) -> Vec<Interrupt> {
        self.calls
            .iter()
            .filter_map(|c| c.interrupt.clone())
            .collect()
    }

    pub fn interrupt_count(&self) -> usize {
        self.calls.iter().filter(|c| c.interrupt.is_some()).count()
    }
}

/// Persisted state of one conversation thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Conversation history without the system prompt.
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub pending: Option<PendingBatch>,
}

/// Storage for thread checkpoints.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Loads the latest checkpoint of a thread, `None` for an unknown thread.
    async fn load(&self, thread_id: &ThreadId) -> Result<Option<Checkpoint>, DatabaseError>;
    /// Replaces the checkpoint of a thread.
    async fn save(&self, thread_id: &ThreadId, checkpoint: &Checkpoint)
    -> Result<(), DatabaseError>;
}

/// Process-local checkpointer; state is lost when the process exits.
#[derive(Default)]
pub struct MemorySaver {
    threads: Mutex<HashMap<ThreadId, Checkpoint>>,
}

impl MemorySaver {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for MemorySaver {
    async fn load(&self, thread_id: &ThreadId) -> Result<Option<Checkpoint>, DatabaseError> {
        Ok(self.threads.lock().get(thread_id).cloned())
    }

    async fn save(
        &self,
        thread_id: &ThreadId,
        checkpoint: &Checkpoint,
    ) -> Result<(), DatabaseError> {
        self.threads
            .lock()
            .insert(thread_id.clone(), checkpoint.clone());
        Ok(())
    }
}
