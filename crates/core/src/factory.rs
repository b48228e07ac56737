//! Grouped domain tools and the factory that builds them.
//!
//! One [`GroupedTool`] per catalog entry. A call selects an action, is
//! validated, passes the confirmation gate and only then reaches the API.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use dct_mcp_client::ApiClient;
use dct_mcp_policy::{InvocationState, OperationRef};
use dct_mcp_tools::{ActionError, FieldError, ToolDefinition, ToolsetLoader};

use crate::envelope::{Envelope, ErrorKind};
use crate::invocation::InvocationRequest;
use crate::metrics::InvocationMetrics;

pub const HEALTH_PING: &str = "health_ping";

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> String;
    fn schema(&self) -> Value;

    async fn call(&self, request: &InvocationRequest) -> Envelope;
}

pub struct ToolFactory {
    loader: Arc<ToolsetLoader>,
    client: Arc<ApiClient>,
    metrics: Arc<InvocationMetrics>,
}

impl ToolFactory {
    pub fn new(
        loader: Arc<ToolsetLoader>,
        client: Arc<ApiClient>,
        metrics: Arc<InvocationMetrics>,
    ) -> Self {
        Self {
            loader,
            client,
            metrics,
        }
    }

    pub fn build(&self, definition: Arc<ToolDefinition>) -> GroupedTool {
        GroupedTool {
            definition,
            loader: self.loader.clone(),
            client: self.client.clone(),
            metrics: self.metrics.clone(),
        }
    }

    /// One tool per registered definition, in catalog order.
    pub fn build_all(&self) -> Vec<GroupedTool> {
        self.loader
            .registry()
            .tools()
            .cloned()
            .map(|definition| self.build(definition))
            .collect()
    }
}

pub struct GroupedTool {
    definition: Arc<ToolDefinition>,
    loader: Arc<ToolsetLoader>,
    client: Arc<ApiClient>,
    metrics: Arc<InvocationMetrics>,
}

impl GroupedTool {
    pub fn definition(&self) -> &ToolDefinition {
        &self.definition
    }
}

#[async_trait]
impl Tool for GroupedTool {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn description(&self) -> String {
        self.definition.render_description()
    }

    fn schema(&self) -> Value {
        self.definition.input_schema()
    }

    async fn call(&self, request: &InvocationRequest) -> Envelope {
        let tool = self.definition.name.as_str();
        let Some(action) = request.action.as_deref() else {
            return Envelope::invalid_params(
                tool,
                None,
                &[FieldError::new(
                    "action",
                    format!(
                        "missing required parameter; one of: {}",
                        self.definition.action_names().join(", ")
                    ),
                )],
            );
        };

        let Some(spec) = self.definition.action(action) else {
            return Envelope::from_action_error(
                tool,
                Some(action),
                &ActionError::UnknownAction {
                    tool: tool.to_string(),
                    action: action.to_string(),
                    available: self.definition.action_names(),
                },
            );
        };

        let call = match spec.prepare(&request.params) {
            Ok(call) => call,
            Err(fields) => return Envelope::invalid_params(tool, Some(action), &fields),
        };

        let method = spec.method.as_str();
        let requirement = self.loader.policy().requires_confirmation(&OperationRef {
            tool,
            action,
            method,
            path: &spec.path,
        });
        let state = InvocationState::Requested.advance(requirement.level, request.confirmed);
        if !state.may_execute() {
            info!("{}.{} awaiting confirmation", tool, action);
            return Envelope::ConfirmationRequired {
                tool: tool.to_string(),
                action: action.to_string(),
                confirmation_level: requirement.level,
                message: requirement.message,
                method: method.to_string(),
                path: call.path,
                instructions: format!(
                    "Show this message to the user. If they approve, call {} again with the same parameters and confirmed=true.",
                    tool
                ),
            };
        }

        debug!("{}.{} -> {} {}", tool, action, method, call.path);
        self.metrics.inc_remote_calls();
        match self.client.execute(call).await {
            Ok(response) => Envelope::success(tool, action, response.json()),
            Err(err) => Envelope::from_api_error(tool, action, err),
        }
    }
}

/// Liveness check, always registered.
pub struct HealthPing;

#[async_trait]
impl Tool for HealthPing {
    fn name(&self) -> &str {
        HEALTH_PING
    }

    fn description(&self) -> String {
        "Check that the tool server is running. Does not contact DCT.".to_string()
    }

    fn schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn call(&self, _request: &InvocationRequest) -> Envelope {
        Envelope::success(HEALTH_PING, "ping", json!({"status": "ok"}))
    }
}

/// Envelope for a tool name nothing in the catalog answers to.
pub fn unknown_tool(request: &InvocationRequest) -> Envelope {
    Envelope::failure(
        &request.tool,
        request.action.as_deref(),
        ErrorKind::UnknownToolError,
        format!("Unknown tool: {}", request.tool),
    )
}
