//! Runtime toolset management for `auto` mode.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use dct_mcp_policy::OperationRef;
use dct_mcp_tools::{ActionError, FieldError, ToolsetLoader};

use crate::envelope::Envelope;
use crate::invocation::InvocationRequest;
use crate::session::RegisteredToolSet;

pub const LIST_AVAILABLE_TOOLSETS: &str = "list_available_toolsets";
pub const GET_TOOLSET_TOOLS: &str = "get_toolset_tools";
pub const ENABLE_TOOLSET: &str = "enable_toolset";
pub const DISABLE_TOOLSET: &str = "disable_toolset";
pub const CHECK_OPERATION_CONFIRMATION: &str = "check_operation_confirmation";

pub const META_TOOL_NAMES: [&str; 5] = [
    LIST_AVAILABLE_TOOLSETS,
    GET_TOOLSET_TOOLS,
    ENABLE_TOOLSET,
    DISABLE_TOOLSET,
    CHECK_OPERATION_CONFIRMATION,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaCommand {
    ListAvailableToolsets,
    GetToolsetTools { toolset_name: String },
    EnableToolset { toolset_name: String },
    DisableToolset,
    CheckOperationConfirmation { tool_name: String, action_name: String },
}

impl MetaCommand {
    pub fn is_meta_tool(name: &str) -> bool {
        META_TOOL_NAMES.contains(&name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            MetaCommand::ListAvailableToolsets => LIST_AVAILABLE_TOOLSETS,
            MetaCommand::GetToolsetTools { .. } => GET_TOOLSET_TOOLS,
            MetaCommand::EnableToolset { .. } => ENABLE_TOOLSET,
            MetaCommand::DisableToolset => DISABLE_TOOLSET,
            MetaCommand::CheckOperationConfirmation { .. } => CHECK_OPERATION_CONFIRMATION,
        }
    }

    /// Parses a meta-tool call. `None` when the tool is not a meta-tool.
    pub fn parse(request: &InvocationRequest) -> Option<Result<Self, Vec<FieldError>>> {
        let required = |field: &str| -> Result<String, FieldError> {
            request
                .str_param(field)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
                .ok_or_else(|| FieldError::new(field, "missing required parameter"))
        };

        let parsed = match request.tool.as_str() {
            LIST_AVAILABLE_TOOLSETS => Ok(MetaCommand::ListAvailableToolsets),
            GET_TOOLSET_TOOLS => required("toolset_name")
                .map(|toolset_name| MetaCommand::GetToolsetTools { toolset_name })
                .map_err(|e| vec![e]),
            ENABLE_TOOLSET => required("toolset_name")
                .map(|toolset_name| MetaCommand::EnableToolset { toolset_name })
                .map_err(|e| vec![e]),
            DISABLE_TOOLSET => Ok(MetaCommand::DisableToolset),
            CHECK_OPERATION_CONFIRMATION => {
                let tool_name = required("tool_name");
                // `action` is consumed as the reserved discriminator, so accept it too.
                let action_name = required("action_name").or_else(|e| {
                    request
                        .action
                        .clone()
                        .filter(|a| !a.is_empty())
                        .ok_or(e)
                });
                match (tool_name, action_name) {
                    (Ok(tool_name), Ok(action_name)) => {
                        Ok(MetaCommand::CheckOperationConfirmation {
                            tool_name,
                            action_name,
                        })
                    }
                    (tool_name, action_name) => Err([tool_name.err(), action_name.err()]
                        .into_iter()
                        .flatten()
                        .collect()),
                }
            }
            _ => return None,
        };
        Some(parsed)
    }

    /// `(name, description, input schema)` for every meta-tool.
    pub fn descriptors() -> Vec<(&'static str, &'static str, Value)> {
        let toolset_arg = json!({
            "type": "object",
            "properties": {
                "toolset_name": {"type": "string", "description": "Name of the toolset"}
            },
            "required": ["toolset_name"],
        });
        vec![
            (
                LIST_AVAILABLE_TOOLSETS,
                "List every toolset with its description and tool count.",
                json!({"type": "object", "properties": {}}),
            ),
            (
                GET_TOOLSET_TOOLS,
                "Show the tools and actions a toolset contains without enabling it.",
                toolset_arg.clone(),
            ),
            (
                ENABLE_TOOLSET,
                "Enable a toolset. Its tools are added to those already active.",
                toolset_arg,
            ),
            (
                DISABLE_TOOLSET,
                "Disable every enabled toolset, leaving only the management tools.",
                json!({"type": "object", "properties": {}}),
            ),
            (
                CHECK_OPERATION_CONFIRMATION,
                "Check whether a tool action needs explicit user confirmation before it runs.",
                json!({
                    "type": "object",
                    "properties": {
                        "tool_name": {"type": "string", "description": "Tool to check, e.g. vdb_tool"},
                        "action_name": {"type": "string", "description": "Action to check, e.g. delete_vdb"}
                    },
                    "required": ["tool_name", "action_name"],
                }),
            ),
        ]
    }
}

/// Told when the set of callable tools changes.
pub trait ToolListListener: Send + Sync {
    fn tool_list_changed(&self, active: &[String]);
}

pub struct MetaToolController {
    loader: Arc<ToolsetLoader>,
    listener: Option<Arc<dyn ToolListListener>>,
}

impl MetaToolController {
    pub fn new(loader: Arc<ToolsetLoader>, listener: Option<Arc<dyn ToolListListener>>) -> Self {
        Self { loader, listener }
    }

    pub fn execute(&self, session: &RegisteredToolSet, command: MetaCommand) -> Envelope {
        let tool = command.name();
        match command {
            MetaCommand::ListAvailableToolsets => self.list(session),
            MetaCommand::GetToolsetTools { toolset_name } => self.describe(&toolset_name),
            MetaCommand::EnableToolset { toolset_name } => self.enable(session, &toolset_name),
            MetaCommand::DisableToolset => self.disable(session),
            MetaCommand::CheckOperationConfirmation {
                tool_name,
                action_name,
            } => self.check(tool, &tool_name, &action_name),
        }
    }

    fn list(&self, session: &RegisteredToolSet) -> Envelope {
        let enabled = session.enabled_toolsets();
        let toolsets: Vec<Value> = self
            .loader
            .toolsets()
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "target_users": t.target_users,
                    "tool_count": t.tools.len(),
                    "enabled": enabled.contains(&t.name),
                })
            })
            .collect();
        Envelope::success(
            LIST_AVAILABLE_TOOLSETS,
            LIST_AVAILABLE_TOOLSETS,
            json!({ "toolsets": toolsets, "active_tools": session.active_tools() }),
        )
    }

    fn describe(&self, toolset_name: &str) -> Envelope {
        let Some(toolset) = self.loader.toolset(toolset_name) else {
            return Envelope::unknown_persona(GET_TOOLSET_TOOLS, &self.loader.unknown(toolset_name));
        };
        let tools: Vec<Value> = toolset
            .tools
            .iter()
            .filter_map(|name| self.loader.registry().get(name))
            .map(|definition| {
                let actions: Vec<Value> = definition
                    .actions
                    .iter()
                    .map(|a| {
                        json!({
                            "name": a.name,
                            "method": a.method.as_str(),
                            "path": a.path,
                            "destructive": a.destructive,
                            "summary": a.summary,
                        })
                    })
                    .collect();
                json!({
                    "name": definition.name,
                    "description": definition.description,
                    "actions": actions,
                })
            })
            .collect();
        Envelope::success(
            GET_TOOLSET_TOOLS,
            GET_TOOLSET_TOOLS,
            json!({
                "toolset": toolset.name,
                "description": toolset.description,
                "target_users": toolset.target_users,
                "tools": tools,
            }),
        )
    }

    fn enable(&self, session: &RegisteredToolSet, toolset_name: &str) -> Envelope {
        let Some(toolset) = self.loader.toolset(toolset_name) else {
            return Envelope::unknown_persona(ENABLE_TOOLSET, &self.loader.unknown(toolset_name));
        };
        let outcome = session.enable(&toolset.name, &toolset.tools);
        let active = session.active_tools();
        if !outcome.added.is_empty() {
            info!(
                "Enabled toolset {} (+{} tools, {} active)",
                toolset.name,
                outcome.added.len(),
                active.len()
            );
            self.notify(&active);
        }
        let status = if outcome.already_enabled {
            "already_enabled"
        } else {
            "enabled"
        };
        Envelope::success(
            ENABLE_TOOLSET,
            ENABLE_TOOLSET,
            json!({
                "toolset": toolset.name,
                "status": status,
                "tools_added": outcome.added,
                "active_tools": active,
                "enabled_toolsets": session.enabled_toolsets(),
            }),
        )
    }

    fn disable(&self, session: &RegisteredToolSet) -> Envelope {
        let removed = session.clear();
        let status = if removed > 0 {
            info!("Disabled all toolsets ({} tools removed)", removed);
            self.notify(&[]);
            "disabled"
        } else {
            "already_minimal"
        };
        Envelope::success(
            DISABLE_TOOLSET,
            DISABLE_TOOLSET,
            json!({ "status": status, "removed_tools": removed }),
        )
    }

    fn check(&self, meta_tool: &str, tool_name: &str, action_name: &str) -> Envelope {
        let spec = match self.loader.registry().resolve(tool_name, action_name) {
            Ok(spec) => spec,
            Err(err @ ActionError::UnknownAction { .. }) => {
                return Envelope::from_action_error(meta_tool, Some(action_name), &err)
            }
            Err(err) => return Envelope::from_action_error(meta_tool, None, &err),
        };
        let requirement = self.loader.policy().requires_confirmation(&OperationRef {
            tool: tool_name,
            action: action_name,
            method: spec.method.as_str(),
            path: &spec.path,
        });
        Envelope::success(
            meta_tool,
            meta_tool,
            json!({
                "tool": tool_name,
                "action": action_name,
                "method": spec.method.as_str(),
                "path": spec.path,
                "confirmation_level": requirement.level,
                "requires_confirmation": requirement.is_required(),
                "message": requirement.message,
                "destructive": spec.destructive,
                "guidance": requirement.level.guidance(),
            }),
        )
    }

    fn notify(&self, active: &[String]) {
        if let Some(listener) = &self.listener {
            listener.tool_list_changed(active);
        }
    }
}
