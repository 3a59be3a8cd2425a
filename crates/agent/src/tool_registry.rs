//! Tool registry used by the runtime to list, gate, and execute tools.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use proto::{InterruptKind, ToolDefinition, ToolResult};
use serde_json::Value;
use tools::{Authorization, Tool, ToolSet};
use tracing::{debug, warn};

const MAX_TOOL_RESULT_CHARS: usize = 16_000;

/// Whether a tool call may run right away.
#[derive(Debug, Clone, PartialEq)]
pub enum Gate {
    /// Execute now.
    Ready,
    /// Pause the turn until the interrupt is resolved.
    Interrupt(InterruptKind),
    /// Do not execute; report the reason to the model.
    Blocked(String),
}

/// Registry of available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    require_approval: HashSet<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from a provisioned tool set.
    pub fn from_tool_set(tools: ToolSet) -> Self {
        Self {
            tools,
            require_approval: HashSet::new(),
        }
    }

    /// Register a tool
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        debug!("Registering tool: {name}");
        self.tools.insert(name, tool);
    }

    /// Marks tools whose calls need explicit operator approval.
    pub fn require_approval<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.require_approval
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Get tool definitions for the LLM
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition::new(t.name(), t.description(), t.parameters_schema()))
            .collect()
    }

    /// Decides whether a call may run now. Authorization is checked before
    /// the approval policy, so an unauthorized tool asks for authorization first.
    pub async fn gate(&self, name: &str, args: &Value) -> Gate {
        let Some(tool) = self.tools.get(name) else {
            return Gate::Ready;
        };

        match tool.check_authorization().await {
            Ok(Authorization::Pending { id, url }) => {
                debug!(tool = %name, authorization_id = %id, "Tool needs authorization");
                return Gate::Interrupt(InterruptKind::AuthorizationRequired {
                    tool_name: name.to_string(),
                    url,
                    authorization_id: id,
                });
            }
            Ok(Authorization::Granted) => {}
            Err(e) => {
                warn!(tool = %name, error = %e, "Authorization check failed");
                return Gate::Blocked(format!("Authorization check failed: {e}"));
            }
        }

        match self.approval_interrupt(name, args) {
            Some(kind) => Gate::Interrupt(kind),
            None => Gate::Ready,
        }
    }

    /// The operator approval a call needs under the approval policy, if any.
    /// Also applied to calls whose authorization just completed.
    pub fn approval_interrupt(&self, name: &str, args: &Value) -> Option<InterruptKind> {
        self.require_approval
            .contains(name)
            .then(|| InterruptKind::HumanApprovalRequired {
                tool_name: name.to_string(),
                input: args.clone(),
            })
    }

    /// Execute a tool call. The output is truncated for the model's context.
    pub async fn execute(&self, call_id: &str, name: &str, args: Value) -> ToolResult {
        let mut result = if let Some(tool) = self.tools.get(name) {
            debug!("Executing tool: {name} (call_id: {call_id})");
            tool.execute(call_id, args).await
        } else {
            ToolResult::error(call_id, name, format!("Tool '{name}' not found"))
        };
        result.output = truncate_tool_result(&result.output, MAX_TOOL_RESULT_CHARS);
        result
    }

    /// Returns the list of registered tool names.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

/// Truncates a tool result to at most `max_chars` characters.
/// If the result is longer, it appends a note with how many characters were cut.
fn truncate_tool_result(output: &str, max_chars: usize) -> String {
    let total_chars = output.chars().count();
    if total_chars <= max_chars {
        return output.to_string();
    }

    let kept = output.chars().take(max_chars).collect::<String>();
    let cut = total_chars - max_chars;
    format!("{kept}\n...[output truncated: {cut} chars omitted]")
}
