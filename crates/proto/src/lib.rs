//! Shared protocol types for the agent runtime, tools, and the CLI.
//!
//! This crate defines serializable interrupt/decision/turn structures,
//! tool call types, session identity, and strongly-typed error enums
//! shared across the workspace.

pub mod error;
pub mod interrupt;
pub mod message;
pub mod tool;

/// Re-export of all protocol error types.
pub use error::*;
/// Re-export of interrupt, decision, and resume types.
pub use interrupt::{Decision, Interrupt, InterruptKind, Resume, TurnInput};
/// Re-export of conversation/session identity types.
pub use message::{InputMessage, Role, SessionConfig, ThreadId};
/// Re-export of tool call definition and result types.
pub use tool::{ToolCall, ToolDefinition, ToolResult};
