//! The uniform result of every tool invocation.
//!
//! Every outcome, including caller mistakes and remote failures, is an
//! [`Envelope`]; nothing escapes the dispatcher as a fault.

use serde::Serialize;
use serde_json::{json, Value};

use dct_mcp_client::ApiError;
use dct_mcp_policy::ConfirmationLevel;
use dct_mcp_tools::{ActionError, CatalogError, FieldError};

#[allow(clippy::enum_variant_names)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    UnknownToolError,
    UnknownActionError,
    UnknownPersonaError,
    ParameterValidationError,
    ClientApiError,
    TransientApiError,
    ToolsetNotActiveError,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Envelope {
    Success {
        tool: String,
        action: String,
        data: Value,
    },
    Error {
        tool: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        action: Option<String>,
        error_kind: ErrorKind,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
    ConfirmationRequired {
        tool: String,
        action: String,
        confirmation_level: ConfirmationLevel,
        message: String,
        method: String,
        path: String,
        instructions: String,
    },
}

impl Envelope {
    pub fn success(tool: &str, action: &str, data: Value) -> Self {
        Envelope::Success {
            tool: tool.to_string(),
            action: action.to_string(),
            data,
        }
    }

    pub fn failure(
        tool: &str,
        action: Option<&str>,
        error_kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Envelope::Error {
            tool: tool.to_string(),
            action: action.map(str::to_string),
            error_kind,
            message: message.into(),
            details: None,
        }
    }

    /// Attaches details to an error envelope; other variants pass through.
    pub fn with_details(mut self, value: Value) -> Self {
        if let Envelope::Error { details, .. } = &mut self {
            *details = Some(value);
        }
        self
    }

    pub fn invalid_params(tool: &str, action: Option<&str>, fields: &[FieldError]) -> Self {
        let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
        let message = format!(
            "Invalid parameters: {}",
            fields
                .iter()
                .map(|f| f.to_string())
                .collect::<Vec<_>>()
                .join("; ")
        );
        Self::failure(tool, action, ErrorKind::ParameterValidationError, message).with_details(
            json!({
                "fields": names,
                "problems": fields
                    .iter()
                    .map(|f| json!({"field": f.field, "problem": f.problem}))
                    .collect::<Vec<_>>(),
            }),
        )
    }

    pub fn from_action_error(tool: &str, action: Option<&str>, err: &ActionError) -> Self {
        match err {
            ActionError::UnknownTool(name) => Self::failure(
                tool,
                action,
                ErrorKind::UnknownToolError,
                format!("Unknown tool: {}", name),
            ),
            ActionError::UnknownAction {
                action: name,
                available,
                ..
            } => Self::failure(
                tool,
                action,
                ErrorKind::UnknownActionError,
                format!("Unknown action '{}' for {}", name, tool),
            )
            .with_details(json!({
                "available_actions": available,
                "hint": format!("Use one of: {}", available.join(", ")),
            })),
            ActionError::Validation { fields, .. } => Self::invalid_params(tool, action, fields),
        }
    }

    pub fn from_api_error(tool: &str, action: &str, err: ApiError) -> Self {
        let message = err.to_string();
        match err {
            ApiError::Client { status, body } => {
                Self::failure(tool, Some(action), ErrorKind::ClientApiError, message)
                    .with_details(json!({ "status": status, "body": body }))
            }
            ApiError::Transient {
                status,
                detail,
                attempts,
            } => Self::failure(tool, Some(action), ErrorKind::TransientApiError, message)
                .with_details(json!({
                    "status": status,
                    "detail": detail,
                    "attempts": attempts,
                })),
            ApiError::ConfigError(_) => {
                Self::failure(tool, Some(action), ErrorKind::TransientApiError, message)
            }
        }
    }

    /// Envelope for a toolset name the catalog does not define.
    pub fn unknown_persona(tool: &str, err: &CatalogError) -> Self {
        let (requested, available) = match err {
            CatalogError::UnknownPersona { name, available } => (Some(name.clone()), available.clone()),
            _ => (None, Vec::new()),
        };
        Self::failure(tool, None, ErrorKind::UnknownPersonaError, err.to_string())
            .with_details(json!({ "toolset": requested, "available_toolsets": available }))
    }

    pub fn status(&self) -> &'static str {
        match self {
            Envelope::Success { .. } => "success",
            Envelope::Error { .. } => "error",
            Envelope::ConfirmationRequired { .. } => "confirmation_required",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Envelope::Success { .. })
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Envelope::Error { error_kind, .. } => Some(*error_kind),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            json!({
                "status": "error",
                "error_kind": "SerializationError",
                "message": e.to_string(),
            })
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_success_shape() {
        let env = Envelope::success("vdb_tool", "get_vdb", json!({"id": "vdb-1"}));
        assert_eq!(
            env.to_json(),
            json!({"status": "success", "tool": "vdb_tool", "action": "get_vdb", "data": {"id": "vdb-1"}})
        );
    }

    #[test]
    fn test_error_shape_names_kind() {
        let env = Envelope::failure("vdb_tool", Some("nope"), ErrorKind::UnknownActionError, "bad");
        let value = env.to_json();
        assert_eq!(value["status"], "error");
        assert_eq!(value["error_kind"], "UnknownActionError");
        assert!(value.get("details").is_none());
    }

    #[test]
    fn test_confirmation_shape() {
        let env = Envelope::ConfirmationRequired {
            tool: "vdb_tool".into(),
            action: "delete_vdb".into(),
            confirmation_level: ConfirmationLevel::Manual,
            message: "sure?".into(),
            method: "POST".into(),
            path: "/vdbs/vdb-1/delete".into(),
            instructions: "confirm".into(),
        };
        let value = env.to_json();
        assert_eq!(value["status"], "confirmation_required");
        assert_eq!(value["confirmation_level"], "manual");
        assert_eq!(env.status(), "confirmation_required");
    }

    #[test]
    fn test_client_api_error_surfaces_remote_body() {
        let env = Envelope::from_api_error(
            "vdb_tool",
            "provision_vdb_by_snapshot",
            ApiError::Client {
                status: 400,
                body: "{\"message\":\"bad snapshot\"}".into(),
            },
        );
        let value = env.to_json();
        assert_eq!(value["error_kind"], "ClientApiError");
        assert_eq!(value["details"]["status"], 400);
        assert_eq!(value["details"]["body"], "{\"message\":\"bad snapshot\"}");
    }

    #[test]
    fn test_invalid_params_lists_fields() {
        let env = Envelope::invalid_params(
            "vdb_tool",
            Some("delete_vdb"),
            &[FieldError::new("vdbId", "missing required parameter")],
        );
        assert_eq!(env.error_kind(), Some(ErrorKind::ParameterValidationError));
        assert_eq!(env.to_json()["details"]["fields"], json!(["vdbId"]));
    }
}
