use serde::{Deserialize, Serialize};

/// Tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call identifier.
    pub id: String,
    /// Model-facing tool name.
    pub name: String,
    /// Parsed JSON arguments.
    pub arguments: serde_json::Value,
}

/// Tool schema advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Model-facing tool name.
    pub name: String,
    /// Human-readable description used for tool selection.
    pub description: String,
    /// JSON schema of accepted arguments.
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Creates a tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Outcome of a single tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Call identifier this result answers.
    pub call_id: String,
    /// Tool that produced the result.
    pub tool_name: String,
    /// Output text (or error message) handed back to the model.
    pub output: String,
    /// Whether the call failed.
    pub is_error: bool,
}

impl ToolResult {
    /// Creates a successful result.
    pub fn success(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            output: output.into(),
            is_error: false,
        }
    }

    /// Creates an error result.
    pub fn error(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            output: message.into(),
            is_error: true,
        }
    }
}
