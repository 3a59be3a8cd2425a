//! LLM provider abstraction and OpenAI-compatible implementation.

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionTool, ChatCompletionToolType, CreateChatCompletionRequestArgs, FinishReason,
        FunctionCall, FunctionObjectArgs,
    },
};
use async_trait::async_trait;
use proto::{InputMessage, LlmError, Role, ToolCall, ToolDefinition};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

const BANNER_WIDTH: usize = 80;

/// Represents a message in a chat history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Semantic role of this message.
    pub role: Role,
    /// Human-readable text content.
    pub content: String,
    /// Tool call id when this is a tool result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool name when this is a tool result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Tool calls requested by assistant messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChatMessage {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            tool_name: None,
            tool_calls: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Creates an assistant message that only requests tool calls.
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(tool_calls),
            ..Self::with_role(Role::Assistant, "")
        }
    }

    /// Creates a tool-result message linking a call id, tool name, and output content.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            tool_name: Some(tool_name.into()),
            ..Self::with_role(Role::Tool, content)
        }
    }

    /// Renders the message for the console: a role banner, then the content,
    /// then any requested tool calls.
    pub fn to_formatted_string(&self) -> String {
        let label = match self.role {
            Role::System => "System",
            Role::User => "Human",
            Role::Assistant => "Ai",
            Role::Tool => "Tool",
        };
        let mut out = banner(&format!(" {label} Message "));

        if let Some(name) = &self.tool_name {
            out.push_str(&format!("\nName: {name}\n"));
        }
        if !self.content.is_empty() {
            out.push_str(&format!("\n{}", self.content));
        }
        if let Some(calls) = self.tool_calls.as_ref().filter(|c| !c.is_empty()) {
            out.push_str("\nTool Calls:");
            for call in calls {
                out.push_str(&format!("\n  {} ({})", call.name, call.id));
                out.push_str(&format!("\n Call ID: {}", call.id));
                out.push_str("\n  Args:");
                match call.arguments.as_object() {
                    Some(args) if !args.is_empty() => {
                        for (key, value) in args {
                            out.push_str(&format!("\n    {key}: {}", display_arg(value)));
                        }
                    }
                    _ => out.push_str(&format!("\n    {}", call.arguments)),
                }
            }
        }
        out
    }
}

impl From<InputMessage> for ChatMessage {
    fn from(message: InputMessage) -> Self {
        Self::with_role(message.role, message.content)
    }
}

fn banner(title: &str) -> String {
    let pad = BANNER_WIDTH.saturating_sub(title.chars().count());
    let left = pad / 2;
    format!("{}{title}{}\n", "=".repeat(left), "=".repeat(pad - left))
}

fn display_arg(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Request to the LLM
#[derive(Debug)]
pub struct ChatRequest {
    /// Full chat history including system/user/assistant/tool messages.
    pub messages: Vec<ChatMessage>,
    /// Available tools schema.
    pub tools: Vec<ToolDefinition>,
    /// Target model id.
    pub model: String,
}

/// Token usage reported by the LLM for a single call.
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Accumulates another usage record into this one.
    pub fn add(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}

/// Response from the LLM
#[derive(Debug)]
pub enum ChatResponse {
    /// Final assistant text response.
    Text(String, TokenUsage),
    /// Assistant requested one or more tool calls.
    ToolCalls(Vec<ToolCall>, TokenUsage),
}

/// LLM provider trait
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Sends a chat request to the provider and returns either text or tool calls.
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, LlmError>;
}

/// OpenAI-compatible provider (works with OpenAI, together.ai, Ollama, etc.)
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
}

impl OpenAiProvider {
    /// Creates an OpenAI provider using the default API base URL.
    pub fn new(api_key: impl Into<String>) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: Client::with_config(config),
        }
    }

    /// Creates an OpenAI provider with a custom API base URL.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);
        Self {
            client: Client::with_config(config),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, LlmError> {
        let messages: Vec<ChatCompletionRequestMessage> = req
            .messages
            .iter()
            .map(convert_message)
            .collect::<Result<_, _>>()?;

        let tools: Vec<ChatCompletionTool> = req
            .tools
            .iter()
            .map(convert_tool)
            .collect::<Result<_, _>>()?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(&req.model).messages(messages);

        if !tools.is_empty() {
            builder.tools(tools);
        }

        let request = builder
            .build()
            .map_err(|e| LlmError::Serialization(e.to_string()))?;

        debug!(
            model = %req.model,
            messages = %req.messages.len(),
            tools = %req.tools.len(),
            "Sending request to OpenAI"
        );

        let response = self.client.chat().create(request).await.map_err(|e| {
            let msg = e.to_string();
            debug!(error = %msg, "OpenAI API error");
            let lower = msg.to_lowercase();
            if lower.contains("rate limit") {
                return LlmError::RateLimit;
            }
            let hint = if msg.contains("does not exist") || msg.contains("model_not_found") {
                " Check OPENAI_MODEL."
            } else if lower.contains("billing") || lower.contains("quota") {
                " Check your OpenAI billing at https://platform.openai.com."
            } else {
                ""
            };
            LlmError::Api(format!("{msg}{hint}"))
        })?;

        let usage = TokenUsage {
            prompt_tokens: response.usage.as_ref().map_or(0, |u| u.prompt_tokens),
            completion_tokens: response.usage.as_ref().map_or(0, |u| u.completion_tokens),
        };
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".into()))?;

        let tool_calls = choice.message.tool_calls.unwrap_or_default();
        if matches!(choice.finish_reason, Some(FinishReason::ToolCalls)) || !tool_calls.is_empty()
        {
            let calls = tool_calls
                .into_iter()
                .map(|tc| ToolCall {
                    arguments: parse_tool_arguments(&tc.function.arguments),
                    id: tc.id,
                    name: tc.function.name,
                })
                .collect();
            return Ok(ChatResponse::ToolCalls(calls, usage));
        }

        Ok(ChatResponse::Text(
            choice.message.content.unwrap_or_default(),
            usage,
        ))
    }
}

/// Converts internal chat message into OpenAI request format.
fn convert_message(m: &ChatMessage) -> Result<ChatCompletionRequestMessage, LlmError> {
    let serialization = |e: async_openai::error::OpenAIError| LlmError::Serialization(e.to_string());
    match m.role {
        Role::System => Ok(ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(m.content.clone())
                .build()
                .map_err(serialization)?,
        )),
        Role::User => Ok(ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(m.content.clone())
                .build()
                .map_err(serialization)?,
        )),
        Role::Assistant => {
            let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
            builder.content(m.content.clone());

            if let Some(tool_calls) = &m.tool_calls {
                let tc: Vec<ChatCompletionMessageToolCall> = tool_calls
                    .iter()
                    .map(|tc| ChatCompletionMessageToolCall {
                        id: tc.id.clone(),
                        r#type: ChatCompletionToolType::Function,
                        function: FunctionCall {
                            name: tc.name.clone(),
                            arguments: tc.arguments.to_string(),
                        },
                    })
                    .collect();
                builder.tool_calls(tc);
            }

            Ok(ChatCompletionRequestMessage::Assistant(
                builder.build().map_err(serialization)?,
            ))
        }
        Role::Tool => {
            let call_id = m
                .tool_call_id
                .clone()
                .unwrap_or_else(|| "unknown".to_string());
            Ok(ChatCompletionRequestMessage::Tool(
                ChatCompletionRequestToolMessageArgs::default()
                    .tool_call_id(call_id)
                    .content(m.content.clone())
                    .build()
                    .map_err(serialization)?,
            ))
        }
    }
}

/// Converts internal tool schema into OpenAI function-tool declaration.
fn convert_tool(t: &ToolDefinition) -> Result<ChatCompletionTool, LlmError> {
    Ok(ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObjectArgs::default()
            .name(t.name.clone())
            .description(t.description.clone())
            .parameters(t.parameters.clone())
            .build()
            .map_err(|e| LlmError::Serialization(e.to_string()))?,
    })
}

/// Parses tool call argument JSON with empty-object fallback.
fn parse_tool_arguments(arguments: &str) -> Value {
    serde_json::from_str(arguments).unwrap_or(Value::Object(Default::default()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn scrape_call() -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: "Firecrawl_ScrapeUrl".to_string(),
            arguments: json!({"url": "https://example.com"}),
        }
    }

    #[test]
    fn chat_message_constructors_set_expected_roles() {
        assert_eq!(ChatMessage::system("s").role, Role::System);
        assert_eq!(ChatMessage::user("u").role, Role::User);
        assert_eq!(ChatMessage::assistant("a").role, Role::Assistant);

        let tool = ChatMessage::tool_result("call-1", "Firecrawl_ScrapeUrl", "ok");
        assert_eq!(tool.role, Role::Tool);
        assert_eq!(tool.tool_call_id.as_deref(), Some("call-1"));
        assert_eq!(tool.tool_name.as_deref(), Some("Firecrawl_ScrapeUrl"));

        let calls = ChatMessage::assistant_tool_calls(vec![scrape_call()]);
        assert_eq!(calls.role, Role::Assistant);
        assert!(calls.content.is_empty());
        assert_eq!(calls.tool_calls.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn chat_message_serializes_without_empty_optionals() {
        let encoded = serde_json::to_value(ChatMessage::user("hi")).expect("encode");
        assert_eq!(encoded, json!({"role": "user", "content": "hi"}));

        let with_calls = ChatMessage::assistant_tool_calls(vec![scrape_call()]);
        let decoded: ChatMessage =
            serde_json::from_value(serde_json::to_value(&with_calls).expect("encode"))
                .expect("decode");
        assert_eq!(decoded, with_calls);
    }

    #[test]
    fn formatted_string_has_banner_and_content() {
        let text = ChatMessage::assistant("Here is the page.").to_formatted_string();
        let first = text.lines().next().expect("banner line");
        assert_eq!(first.chars().count(), BANNER_WIDTH);
        assert!(first.contains(" Ai Message "));
        assert!(text.ends_with("Here is the page."));
    }

    #[test]
    fn formatted_string_lists_tool_calls_and_tool_names() {
        let text = ChatMessage::assistant_tool_calls(vec![scrape_call()]).to_formatted_string();
        assert!(text.contains("Tool Calls:"));
        assert!(text.contains("  Firecrawl_ScrapeUrl (call_1)"));
        assert!(text.contains("    url: https://example.com"));

        let result = ChatMessage::tool_result("call_1", "Firecrawl_ScrapeUrl", "# Example")
            .to_formatted_string();
        assert!(result.contains(" Tool Message "));
        assert!(result.contains("Name: Firecrawl_ScrapeUrl"));
        assert!(result.ends_with("# Example"));
    }

    #[test]
    fn convert_message_supports_all_roles() {
        let system = convert_message(&ChatMessage::system("sys")).expect("system");
        assert!(matches!(system, ChatCompletionRequestMessage::System(_)));

        let user = convert_message(&ChatMessage::user("hello")).expect("user");
        assert!(matches!(user, ChatCompletionRequestMessage::User(_)));

        let assistant = convert_message(&ChatMessage::assistant("done")).expect("assistant");
        assert!(matches!(
            assistant,
            ChatCompletionRequestMessage::Assistant(_)
        ));

        let tool = convert_message(&ChatMessage::tool_result("id", "echo", "ok")).expect("tool");
        assert!(matches!(tool, ChatCompletionRequestMessage::Tool(_)));
    }

    #[test]
    fn convert_message_assistant_with_tool_calls_includes_calls() {
        let converted = convert_message(&ChatMessage::assistant_tool_calls(vec![scrape_call()]))
            .expect("assistant with tool calls");
        let ChatCompletionRequestMessage::Assistant(msg) = converted else {
            panic!("expected assistant message");
        };
        let calls = msg.tool_calls.expect("tool calls");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].function.name, "Firecrawl_ScrapeUrl");
    }

    #[test]
    fn convert_tool_builds_function_tool_schema() {
        let def = ToolDefinition::new(
            "Firecrawl_ScrapeUrl",
            "Scrape a URL",
            json!({"type":"object"}),
        );
        let converted = convert_tool(&def).expect("tool conversion");
        assert_eq!(converted.r#type, ChatCompletionToolType::Function);
        assert_eq!(converted.function.name, "Firecrawl_ScrapeUrl");
        assert_eq!(
            converted.function.description.as_deref(),
            Some("Scrape a URL")
        );
    }

    #[test]
    fn parse_tool_arguments_handles_valid_and_invalid_json() {
        assert_eq!(parse_tool_arguments(r#"{"x":1}"#)["x"], 1);

        let invalid = parse_tool_arguments("{invalid");
        assert_eq!(invalid.as_object().map(|o| o.len()), Some(0));
    }

    #[test]
    fn token_usage_add_accumulates_values() {
        let mut total = TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 20,
        };
        total.add(&TokenUsage {
            prompt_tokens: 5,
            completion_tokens: 15,
        });
        assert_eq!(total.prompt_tokens, 15);
        assert_eq!(total.completion_tokens, 35);
    }
}
