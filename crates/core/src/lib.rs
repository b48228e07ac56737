//! Tool dispatch, confirmation gating and runtime toolset management for the
//! DCT tool server.

pub mod envelope;
pub mod factory;
pub mod invocation;
pub mod meta;
pub mod metrics;
pub mod server;
pub mod session;
pub mod telemetry;

pub use envelope::{Envelope, ErrorKind};
pub use factory::{GroupedTool, HealthPing, Tool, ToolFactory, HEALTH_PING};
pub use invocation::InvocationRequest;
pub use meta::{MetaCommand, MetaToolController, ToolListListener, META_TOOL_NAMES};
pub use metrics::{InvocationMetrics, MetricTimer, MetricsSnapshot};
pub use server::{ToolDescriptor, ToolServer, ToolServerBuilder, DEFAULT_TOOLSET};
pub use session::{ActivationMode, RegisteredToolSet, ToolSetSnapshot};
pub use telemetry::{TelemetryError, TelemetryEvent, TelemetryHook, TelemetrySink};
