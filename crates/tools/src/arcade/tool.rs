//! Remote tool executed through the Arcade API.

use std::sync::Arc;

use async_trait::async_trait;
use proto::{ToolError, ToolResult};
use serde_json::Value;
use tracing::{debug, warn};

use super::{ArcadeClient, AuthorizationResponse, ToolDefinition, parameters_to_schema};
use crate::{Authorization, Tool};

/// A tool definition fetched from Arcade, bound to one user.
pub struct ArcadeTool {
    client: Arc<ArcadeClient>,
    user_id: String,
    model_name: String,
    qualified_name: String,
    description: String,
    schema: Value,
    requires_authorization: bool,
}

impl ArcadeTool {
    /// Wraps a fetched definition for execution on behalf of `user_id`.
    pub fn new(
        client: Arc<ArcadeClient>,
        definition: &ToolDefinition,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            user_id: user_id.into(),
            model_name: definition.model_name(),
            qualified_name: definition.qualified_name(),
            description: definition.description.clone(),
            schema: parameters_to_schema(&definition.input.parameters),
            requires_authorization: definition.requires_authorization(),
        }
    }

    /// Name used by the Arcade API, e.g. `Firecrawl.ScrapeUrl`.
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }
}

#[async_trait]
impl Tool for ArcadeTool {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.clone()
    }

    async fn check_authorization(&self) -> Result<Authorization, ToolError> {
        if !self.requires_authorization {
            return Ok(Authorization::Granted);
        }

        let AuthorizationResponse { id, status, url } = self
            .client
            .authorize(&self.qualified_name, &self.user_id)
            .await?;
        debug!(tool = %self.qualified_name, status = %status, "Authorization checked");

        match (status.as_str(), url) {
            ("completed", _) => Ok(Authorization::Granted),
            ("failed", _) => Err(ToolError::AuthorizationFailed {
                id,
                status: status.clone(),
            }),
            (_, Some(url)) => Ok(Authorization::Pending { id, url }),
            (status, None) => Err(ToolError::InvalidResponse(format!(
                "authorization for {} is '{status}' but has no URL",
                self.qualified_name
            ))),
        }
    }

    async fn execute(&self, call_id: &str, args: Value) -> ToolResult {
        let response = match self
            .client
            .execute(&self.qualified_name, &args, &self.user_id)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(tool = %self.qualified_name, error = %e, "Arcade execution failed");
                return ToolResult::error(call_id, self.name(), e.to_string());
            }
        };

        let output = response.output.unwrap_or_default();

        if output.requires_authorization.is_some() {
            return ToolResult::error(
                call_id,
                self.name(),
                format!("{} requires authorization", self.qualified_name),
            );
        }
        if let Some(error) = output.error {
            return ToolResult::error(call_id, self.name(), error.message);
        }
        if !response.success {
            return ToolResult::error(call_id, self.name(), "Tool execution failed");
        }

        ToolResult::success(call_id, self.name(), render_value(output.value))
    }
}

/// Strings are passed through unquoted; everything else as compact JSON.
fn render_value(value: Option<Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text,
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn render_value_unquotes_strings() {
        assert_eq!(render_value(Some(json!("# Title"))), "# Title");
        assert_eq!(render_value(Some(json!({"pages": 3}))), r#"{"pages":3}"#);
        assert_eq!(render_value(None), "");
        assert_eq!(render_value(Some(Value::Null)), "");
    }

    #[tokio::test]
    async fn tool_without_requirements_is_granted_without_network() {
        let definition: ToolDefinition = serde_json::from_value(json!({
            "name": "MapWebsite",
            "description": "Map a site",
            "toolkit": {"name": "Firecrawl"}
        }))
        .expect("definition");
        // unroutable base URL: any request would fail
        let client = Arc::new(ArcadeClient::with_base_url("key", "http://127.0.0.1:1"));
        let tool = ArcadeTool::new(client, &definition, "user@example.com");

        assert_eq!(tool.name(), "Firecrawl_MapWebsite");
        assert_eq!(tool.qualified_name(), "Firecrawl.MapWebsite");
        assert_eq!(tool.parameters_schema()["type"], "object");
        assert_eq!(
            tool.check_authorization().await.expect("granted"),
            Authorization::Granted
        );
    }
}
