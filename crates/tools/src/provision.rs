//! Tool provisioning: turns toolkit/tool names into callable tools.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use proto::ToolError;
use tracing::{debug, info};

use crate::Tool;
use crate::arcade::{ArcadeClient, ArcadeTool, ToolDefinition};

/// Model-facing tool name → tool.
pub type ToolSet = BTreeMap<String, Arc<dyn Tool>>;

/// What to fetch from the tool service, and for whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolkitRequest {
    /// Toolkits whose every tool is included.
    pub toolkits: Vec<String>,
    /// Individual tools included in addition to the toolkits.
    pub tools: Vec<String>,
    /// User on whose behalf tools are authorized and executed.
    pub user_id: String,
    /// Maximum number of definitions fetched per toolkit.
    pub limit: usize,
}

/// Source of tool definitions.
#[async_trait]
pub trait ToolProvisioner: Send + Sync {
    /// Fetches every requested tool; any failure aborts provisioning.
    async fn provision(&self, request: &ToolkitRequest) -> Result<ToolSet, ToolError>;
}

/// Provisioner backed by the Arcade API.
pub struct ArcadeProvisioner {
    client: Arc<ArcadeClient>,
}

impl ArcadeProvisioner {
    pub fn new(client: Arc<ArcadeClient>) -> Self {
        Self { client }
    }

    fn insert(&self, set: &mut ToolSet, definition: &ToolDefinition, user_id: &str) {
        let tool = ArcadeTool::new(Arc::clone(&self.client), definition, user_id);
        debug!(tool = %tool.name(), qualified = %tool.qualified_name(), "Provisioned tool");
        set.insert(tool.name().to_string(), Arc::new(tool));
    }
}

#[async_trait]
impl ToolProvisioner for ArcadeProvisioner {
    async fn provision(&self, request: &ToolkitRequest) -> Result<ToolSet, ToolError> {
        let mut set = ToolSet::new();

        for toolkit in &request.toolkits {
            let definitions = self.client.list_tools(toolkit, request.limit).await?;
            debug!(toolkit = %toolkit, count = definitions.len(), "Toolkit listed");
            for definition in &definitions {
                self.insert(&mut set, definition, &request.user_id);
            }
        }

        for name in &request.tools {
            let definition = self.client.get_tool(name).await?;
            self.insert(&mut set, &definition, &request.user_id);
        }

        info!(
            toolkits = ?request.toolkits,
            tools = set.len(),
            "Tools provisioned"
        );
        Ok(set)
    }
}
