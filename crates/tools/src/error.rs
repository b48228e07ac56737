use std::fmt;
use thiserror::Error;

use dct_mcp_policy::PolicyError;

/// Startup-time catalog failures. Any of these stops the process.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Catalog validation failed:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),

    #[error("Unknown toolset '{name}'. Available: {}", .available.join(", "))]
    UnknownPersona {
        name: String,
        available: Vec<String>,
    },

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    pub fn kind(&self) -> &'static str {
        match self {
            CatalogError::UnknownPersona { .. } => "UnknownPersonaError",
            _ => "ConfigurationError",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub problem: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, problem: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            problem: problem.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.problem)
    }
}

/// Per-call lookup and validation failures. Returned to the caller.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Unknown action '{action}' for {tool}. Valid actions: {}", .available.join(", "))]
    UnknownAction {
        tool: String,
        action: String,
        available: Vec<String>,
    },

    #[error("Invalid parameters for {tool}.{action}: {}", join_fields(.fields))]
    Validation {
        tool: String,
        action: String,
        fields: Vec<FieldError>,
    },
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ActionError {
    pub fn kind(&self) -> &'static str {
        match self {
            ActionError::UnknownTool(_) => "UnknownToolError",
            ActionError::UnknownAction { .. } => "UnknownActionError",
            ActionError::Validation { .. } => "ParameterValidationError",
        }
    }
}
