//! The invocation boundary the protocol layer talks to.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use dct_mcp_client::ApiClient;
use dct_mcp_tools::{CatalogError, LoadedToolset, ToolsetLoader};

use crate::envelope::{Envelope, ErrorKind};
use crate::factory::{unknown_tool, HealthPing, Tool, ToolFactory, HEALTH_PING};
use crate::invocation::InvocationRequest;
use crate::meta::{MetaCommand, MetaToolController, ToolListListener};
use crate::metrics::{InvocationMetrics, MetricTimer, MetricsSnapshot};
use crate::session::RegisteredToolSet;
use crate::telemetry::{TelemetryEvent, TelemetryHook};

pub const DEFAULT_TOOLSET: &str = "self_service";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

pub struct ToolServerBuilder {
    loader: Arc<ToolsetLoader>,
    client: Arc<ApiClient>,
    toolset: String,
    listener: Option<Arc<dyn ToolListListener>>,
    telemetry: TelemetryHook,
}

impl ToolServerBuilder {
    pub fn with_toolset(mut self, toolset: impl Into<String>) -> Self {
        self.toolset = toolset.into();
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn ToolListListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryHook) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn build(self) -> Result<ToolServer, CatalogError> {
        let session = match self.loader.load(&self.toolset)? {
            LoadedToolset::Auto => RegisteredToolSet::auto(),
            LoadedToolset::Persona { name, tools } => RegisteredToolSet::fixed(
                &name,
                tools.iter().map(|t| t.name.clone()).collect(),
            ),
        };

        let metrics = InvocationMetrics::new();
        let factory = ToolFactory::new(self.loader.clone(), self.client, metrics.clone());
        let mut tools: HashMap<String, Arc<dyn Tool>> = HashMap::new();
        for tool in factory.build_all() {
            tools.insert(tool.name().to_string(), Arc::new(tool));
        }
        tools.insert(HEALTH_PING.to_string(), Arc::new(HealthPing));

        info!(
            "Tool server ready: toolset={} ({} tools registered, {} active)",
            self.toolset,
            tools.len(),
            session.active_tools().len()
        );

        Ok(ToolServer {
            controller: MetaToolController::new(self.loader.clone(), self.listener),
            loader: self.loader,
            tools,
            session,
            telemetry: self.telemetry,
            metrics,
        })
    }
}

pub struct ToolServer {
    loader: Arc<ToolsetLoader>,
    tools: HashMap<String, Arc<dyn Tool>>,
    session: RegisteredToolSet,
    controller: MetaToolController,
    telemetry: TelemetryHook,
    metrics: Arc<InvocationMetrics>,
}

impl ToolServer {
    pub fn builder(loader: Arc<ToolsetLoader>, client: Arc<ApiClient>) -> ToolServerBuilder {
        ToolServerBuilder {
            loader,
            client,
            toolset: DEFAULT_TOOLSET.to_string(),
            listener: None,
            telemetry: TelemetryHook::disabled(),
        }
    }

    pub fn session(&self) -> &RegisteredToolSet {
        &self.session
    }

    pub fn loader(&self) -> &ToolsetLoader {
        &self.loader
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Tools callable right now: `health_ping`, the meta-tools in auto mode,
    /// then the active domain tools in activation order.
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        let mut listed = Vec::new();
        if let Some(ping) = self.tools.get(HEALTH_PING) {
            listed.push(describe(ping.as_ref()));
        }
        if self.session.is_auto() {
            for (name, description, schema) in MetaCommand::descriptors() {
                listed.push(ToolDescriptor {
                    name: name.to_string(),
                    description: description.to_string(),
                    input_schema: schema,
                });
            }
        }
        for name in self.session.active_tools() {
            if let Some(tool) = self.tools.get(&name) {
                listed.push(describe(tool.as_ref()));
            }
        }
        listed
    }

    /// Entry point for raw protocol arguments.
    pub async fn invoke(&self, tool: &str, arguments: Value) -> Envelope {
        match InvocationRequest::from_arguments(tool, arguments) {
            Ok(request) => self.dispatch(request).await,
            Err(fields) => {
                let started = Instant::now();
                let envelope = Envelope::invalid_params(tool, None, &fields);
                self.finish(&InvocationRequest::bare(tool), envelope, started)
            }
        }
    }

    pub async fn dispatch(&self, request: InvocationRequest) -> Envelope {
        let started = Instant::now();
        let _timer = MetricTimer::start();

        let envelope = self.route(&request).await;
        self.finish(&request, envelope, started)
    }

    /// Waits for telemetry still being recorded.
    pub async fn flush_telemetry(&self) {
        self.telemetry.flush().await;
    }

    fn finish(&self, request: &InvocationRequest, envelope: Envelope, started: Instant) -> Envelope {
        debug!(
            "{} {:?} -> {}",
            request.tool,
            request.action,
            envelope.status()
        );
        self.metrics.observe(&envelope);
        self.telemetry
            .emit(TelemetryEvent::new(request, &envelope, started.elapsed()));
        envelope
    }

    async fn route(&self, request: &InvocationRequest) -> Envelope {
        if self.session.is_auto() {
            if let Some(parsed) = MetaCommand::parse(request) {
                return match parsed {
                    Ok(command) => self.controller.execute(&self.session, command),
                    Err(fields) => Envelope::invalid_params(&request.tool, None, &fields),
                };
            }
        }

        let Some(tool) = self.tools.get(&request.tool) else {
            return unknown_tool(request);
        };
        if request.tool != HEALTH_PING && !self.session.is_active(&request.tool) {
            return self.inactive(request);
        }
        tool.call(request).await
    }

    fn inactive(&self, request: &InvocationRequest) -> Envelope {
        if !self.session.is_auto() {
            // A fixed persona never exposes the tool, so it is as good as unknown.
            return unknown_tool(request);
        }
        let providers: Vec<String> = self
            .loader
            .toolsets()
            .iter()
            .filter(|t| t.tools.contains(&request.tool))
            .map(|t| t.name.clone())
            .collect();
        Envelope::failure(
            &request.tool,
            request.action.as_deref(),
            ErrorKind::ToolsetNotActiveError,
            format!(
                "{} is not active. Enable a toolset that provides it with enable_toolset.",
                request.tool
            ),
        )
        .with_details(serde_json::json!({ "toolsets": providers }))
    }
}

fn describe(tool: &dyn Tool) -> ToolDescriptor {
    ToolDescriptor {
        name: tool.name().to_string(),
        description: tool.description(),
        input_schema: tool.schema(),
    }
}
