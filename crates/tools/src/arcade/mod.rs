//! Arcade tool service client.

mod schema;
mod tool;

pub use schema::parameters_to_schema;
pub use tool::ArcadeTool;

use async_trait::async_trait;
use proto::ToolError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::AuthorizationWaiter;

/// Default Arcade API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.arcade.dev";
/// Long-poll window for authorization status requests.
const AUTH_WAIT_SECS: u64 = 59;

// ── Wire types ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ToolPage {
    #[serde(default)]
    items: Vec<ToolDefinition>,
}

/// Tool definition as served by `GET /v1/tools`.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub toolkit: ToolkitInfo,
    #[serde(default)]
    pub input: ToolInput,
    #[serde(default)]
    pub requirements: Option<ToolRequirements>,
}

impl ToolDefinition {
    /// Name used when executing or authorizing, e.g. `Firecrawl.ScrapeUrl`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.toolkit.name, self.name)
    }

    /// Name exposed to the model, e.g. `Firecrawl_ScrapeUrl`.
    pub fn model_name(&self) -> String {
        format!("{}_{}", self.toolkit.name, self.name)
    }

    /// Whether calling the tool needs a user authorization.
    pub fn requires_authorization(&self) -> bool {
        self.requirements
            .as_ref()
            .and_then(|r| r.authorization.as_ref())
            .is_some_and(|auth| !auth.is_null())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolkitInfo {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolInput {
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
    pub value_schema: ValueSchema,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValueSchema {
    pub val_type: String,
    #[serde(default)]
    pub inner_val_type: Option<String>,
    #[serde(default, rename = "enum")]
    pub enum_values: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolRequirements {
    #[serde(default)]
    pub authorization: Option<Value>,
}

#[derive(Debug, Serialize)]
struct AuthorizeRequest<'a> {
    tool_name: &'a str,
    user_id: &'a str,
}

/// Authorization record returned by `/v1/tools/authorize` and `/v1/auth/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizationResponse {
    #[serde(default)]
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    tool_name: &'a str,
    input: &'a Value,
    user_id: &'a str,
}

/// Result of `POST /v1/tools/execute`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub output: Option<ExecuteOutput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecuteOutput {
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub error: Option<ExecuteFailure>,
    #[serde(default)]
    pub requires_authorization: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteFailure {
    pub message: String,
}

// ── Client ─────────────────────────────────────────────────────────────────────

/// Bearer-authenticated JSON client for the Arcade API.
pub struct ArcadeClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ArcadeClient {
    /// Creates a client targeting the default Arcade endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Creates a client targeting a custom base URL (useful for proxies/tests).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Lists the tools of one toolkit.
    pub async fn list_tools(
        &self,
        toolkit: &str,
        limit: usize,
    ) -> Result<Vec<ToolDefinition>, ToolError> {
        let url = format!("{}/v1/tools", self.base_url);
        debug!(toolkit = %toolkit, limit = %limit, "Listing Arcade tools");
        let limit = limit.to_string();
        let page: ToolPage = self
            .send(
                self.http
                    .get(&url)
                    .query(&[("toolkit", toolkit), ("limit", limit.as_str())]),
            )
            .await?;
        Ok(page.items)
    }

    /// Fetches a single tool by its qualified name.
    pub async fn get_tool(&self, name: &str) -> Result<ToolDefinition, ToolError> {
        let url = format!("{}/v1/tools/{name}", self.base_url);
        debug!(tool = %name, "Fetching Arcade tool");
        self.send(self.http.get(&url)).await
    }

    /// Starts (or checks) the authorization of a tool for a user.
    pub async fn authorize(
        &self,
        tool_name: &str,
        user_id: &str,
    ) -> Result<AuthorizationResponse, ToolError> {
        let url = format!("{}/v1/tools/authorize", self.base_url);
        self.send(
            self.http
                .post(&url)
                .json(&AuthorizeRequest { tool_name, user_id }),
        )
        .await
    }

    /// Reads an authorization's status, long-polling up to `wait_secs`.
    pub async fn auth_status(
        &self,
        authorization_id: &str,
        wait_secs: u64,
    ) -> Result<AuthorizationResponse, ToolError> {
        let url = format!("{}/v1/auth/status", self.base_url);
        let wait = wait_secs.to_string();
        self.send(
            self.http
                .get(&url)
                .query(&[("id", authorization_id), ("wait", wait.as_str())]),
        )
        .await
    }

    /// Executes a tool on behalf of a user.
    pub async fn execute(
        &self,
        tool_name: &str,
        input: &Value,
        user_id: &str,
    ) -> Result<ExecuteResponse, ToolError> {
        let url = format!("{}/v1/tools/execute", self.base_url);
        debug!(tool = %tool_name, "Executing Arcade tool");
        self.send(self.http.post(&url).json(&ExecuteRequest {
            tool_name,
            input,
            user_id,
        }))
        .await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ToolError> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| ToolError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = %status, body = %body, "Arcade API error");
            return Err(ToolError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ToolError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl AuthorizationWaiter for ArcadeClient {
    async fn wait_for_completion(&self, authorization_id: &str) -> Result<(), ToolError> {
        loop {
            let response = self.auth_status(authorization_id, AUTH_WAIT_SECS).await?;
            match response.status.as_str() {
                "completed" => return Ok(()),
                "pending" => {
                    debug!(id = %authorization_id, "Authorization still pending");
                }
                other => {
                    return Err(ToolError::AuthorizationFailed {
                        id: authorization_id.to_string(),
                        status: other.to_string(),
                    });
                }
            }
        }
    }
}
