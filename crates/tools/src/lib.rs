//! Tool trait and the Arcade-backed remote tool implementation.
//!
//! Tools are not built in: the agent runtime receives them from a
//! [`ToolProvisioner`], which fetches their definitions from the Arcade
//! tool service and wraps each one as an [`ArcadeTool`].

pub mod arcade;
pub mod provision;

pub use arcade::{ArcadeClient, ArcadeTool};
pub use provision::{ArcadeProvisioner, ToolProvisioner, ToolSet, ToolkitRequest};

use async_trait::async_trait;
use proto::{ToolError, ToolResult};

/// Authorization state of a tool for the current user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    /// The tool can run now.
    Granted,
    /// The user must finish an out-of-band authorization first.
    Pending { id: String, url: String },
}

/// Trait that all tools must implement
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name exposed to the LLM.
    fn name(&self) -> &str;
    /// Human-readable description for tool selection.
    fn description(&self) -> &str;
    /// JSON schema for accepted tool arguments.
    fn parameters_schema(&self) -> serde_json::Value;
    /// Checks whether the user has authorized this tool.
    async fn check_authorization(&self) -> Result<Authorization, ToolError> {
        Ok(Authorization::Granted)
    }
    /// Executes the tool with the given call id and JSON args.
    async fn execute(&self, call_id: &str, args: serde_json::Value) -> ToolResult;
}

/// Blocks until an out-of-band authorization finishes.
#[async_trait]
pub trait AuthorizationWaiter: Send + Sync {
    /// Resolves `Ok` once the authorization completed, `Err` when it failed
    /// or could not be observed.
    async fn wait_for_completion(&self, authorization_id: &str) -> Result<(), ToolError>;
}
