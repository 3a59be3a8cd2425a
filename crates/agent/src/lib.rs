//! Agent runtime, checkpoint store, and LLM adapter interfaces.

pub mod checkpoint;
pub mod llm;
pub mod runtime;
pub mod sqlite;
pub mod tool_registry;

/// Thread checkpoint model and the in-memory saver.
pub use checkpoint::{Checkpoint, Checkpointer, MemorySaver, PendingBatch, PendingCall};
/// Chat request/response models and provider interfaces.
pub use llm::{ChatMessage, ChatRequest, ChatResponse, LlmProvider, OpenAiProvider, TokenUsage};
/// Main runtime orchestration loop.
pub use runtime::{AgentRuntime, AgentUpdate, RuntimeOptions, UpdateStream};
/// SQLite-backed checkpoint store.
pub use sqlite::SqliteSaver;
/// Runtime tool registry.
pub use tool_registry::{Gate, ToolRegistry};
